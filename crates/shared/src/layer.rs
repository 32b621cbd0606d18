use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::LoadError;

/// The identifying slice of a persisted layer file. The full document is kept
/// as a raw `Value` snapshot; only these fields are needed to route a load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerEnvelope {
    pub domain: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        rename = "customDataURL",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub custom_data_url: Option<String>,
}

impl LayerEnvelope {
    /// Extract the envelope from a parsed layer document. Missing or
    /// non-string `domain`/`version` fields fail the whole load.
    pub fn from_value(value: &Value) -> Result<Self, LoadError> {
        let object = value
            .as_object()
            .ok_or_else(|| LoadError::malformed("layer document is not a JSON object"))?;
        let domain = string_field(object, "domain")?;
        let version = match object.get("version") {
            Some(Value::String(version)) => version.clone(),
            Some(Value::Number(version)) => version.to_string(),
            _ => return Err(LoadError::malformed("layer is missing a 'version' field")),
        };
        let name = object
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string);
        let custom_data_url = object
            .get("customDataURL")
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(Self {
            domain,
            version,
            name,
            custom_data_url,
        })
    }
}

fn string_field(
    object: &serde_json::Map<String, Value>,
    name: &str,
) -> Result<String, LoadError> {
    object
        .get(name)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| LoadError::malformed(format!("layer is missing a '{name}' field")))
}
