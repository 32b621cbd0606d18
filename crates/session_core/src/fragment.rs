use percent_encoding::percent_decode_str;
use regex::Regex;

/// Extract every `name=value` occurrence appearing after a `#` or `&` in the
/// given URL, percent-decoded with `+` converted to space, in the order they
/// appear. Repeated keys are preserved (multiple `layerURL` parameters).
pub fn named_fragment_values(name: &str, url: &str) -> Vec<String> {
    let Ok(pattern) = Regex::new(&format!("[#&]{}=([^&#]*)", regex::escape(name))) else {
        return Vec::new();
    };
    pattern
        .captures_iter(url)
        .filter_map(|captures| captures.get(1))
        .map(|value| decode_component(value.as_str()))
        .collect()
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}
