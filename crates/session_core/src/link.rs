use std::fmt::Write as _;

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

use crate::config::AppConfig;

/// Build a shareable link: the current page URL's path portion, one
/// `layerURL=<encoded>` fragment parameter per entry (the first joined with
/// `#`, the rest with `&`), then one `name=false` parameter for every
/// disabled feature or subfeature.
pub fn layer_link(current_url: &str, layer_urls: &[String], config: &AppConfig) -> String {
    let mut link = current_url
        .split('#')
        .next()
        .unwrap_or_default()
        .to_string();
    let mut join = '#';
    for url in layer_urls {
        let encoded = utf8_percent_encode(url, NON_ALPHANUMERIC);
        let _ = write!(link, "{join}layerURL={encoded}");
        join = '&';
    }
    for name in config.disabled_feature_names() {
        let _ = write!(link, "{join}{name}=false");
        join = '&';
    }
    link
}
