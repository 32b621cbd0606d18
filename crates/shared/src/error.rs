use thiserror::Error;

/// Failures produced while loading, upgrading or combining layers.
///
/// Every variant is user-presentable; boundary code converts these into a
/// blocking alert and logs the full detail separately.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("invalid input: {0}")]
    MalformedInput(String),
    #[error("the domain and version specified conflict with an existing dataset ({existing})")]
    Conflict { existing: String },
    #[error("uploaded layer version ({version}) is not supported by this build")]
    UnsupportedVersion { version: String },
    #[error("no response received from {url}")]
    Transport { url: String },
    #[error("request to {url} failed with status {status}")]
    Application { url: String, status: u16 },
    #[error("'{domain}' (v{version}) is an invalid domain")]
    InvalidDomain { domain: String, version: String },
    #[error("{0}")]
    Expression(String),
}

impl LoadError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedInput(message.into())
    }

    pub fn expression(message: impl Into<String>) -> Self {
        Self::Expression(message.into())
    }

    /// Status code carried by the failure, in the HTTP-client convention
    /// where 0 means no response was received at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { .. } => Some(0),
            Self::Application { status, .. } => Some(*status),
            _ => None,
        }
    }
}
