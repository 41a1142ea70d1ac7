//! Query construction for the analysis endpoint.

use crate::config::{CacheMode, DetailLevel, ScanConfig};

/// Base URL for the analysis API.
pub const API_ROOT: &str = "https://api.ssllabs.com/api/v3/analyze";

/// Build the full request URL for one poll of `hostname`.
///
/// `is_first_request` must be true only for the very first request of a
/// host's scan: `startNew=on` restarts the assessment, so repeating it on
/// later polls would loop forever.
pub fn build_query(config: &ScanConfig, hostname: &str, is_first_request: bool) -> String {
    let mut url = String::with_capacity(API_ROOT.len() + 96);
    url.push_str(API_ROOT);

    url.push_str("?host=");
    url.push_str(hostname);

    if config.cache_mode == CacheMode::Never && is_first_request {
        url.push_str("&startNew=on");
    }

    if config.cache_mode == CacheMode::Always {
        url.push_str("&fromCache=on");

        // Let the server pick a cutoff when no age was given.
        if config.max_age > 0 {
            url.push_str("&maxAge=");
            url.push_str(&config.max_age.to_string());
        }
    }

    url.push_str("&publish=");
    url.push_str(bool_to_token(config.publish));

    // Full detail is only worth transferring once the assessment is done.
    if config.detail_level == DetailLevel::Detailed {
        url.push_str("&all=done");
    }

    url.push_str("&ignoreMismatch=");
    url.push_str(bool_to_token(config.ignore_mismatch));

    url
}

/// The API expects literal `on`/`off` tokens for boolean parameters.
fn bool_to_token(state: bool) -> &'static str {
    if state {
        "on"
    } else {
        "off"
    }
}
