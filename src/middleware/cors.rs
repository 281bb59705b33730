use std::time::Duration;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::SecurityConfig;

/// CORS layer accepting only the configured origins.
///
/// Patterns may use `*` for one host or port segment, e.g. `http://192.168.5.*:3000`.
/// Requests without an `Origin` header never reach the predicate and pass through.
pub fn cors_layer(config: &SecurityConfig) -> CorsLayer {
    let patterns = config.cors_origins.clone();

    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _| {
            origin
                .to_str()
                .map(|o| patterns.iter().any(|p| origin_matches(p, o)))
                .unwrap_or(false)
        }))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(3600))
}

/// Glob match where `*` spans any run of characters other than `/` and `:`
pub fn origin_matches(pattern: &str, origin: &str) -> bool {
    match pattern.split_once('*') {
        None => pattern == origin,
        Some((head, tail)) => {
            let Some(rest) = origin.strip_prefix(head) else {
                return false;
            };
            rest.char_indices()
                .map(|(i, _)| i)
                .chain(std::iter::once(rest.len()))
                .take_while(|&i| !rest[..i].contains(['/', ':']))
                .any(|i| origin_matches(tail, &rest[i..]))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_origins() {
        assert!(origin_matches("http://10.10.100.50:3000", "http://10.10.100.50:3000"));
        assert!(!origin_matches("http://10.10.100.50:3000", "http://10.10.100.50:4000"));
    }

    #[test]
    fn wildcard_spans_one_segment() {
        let pattern = "http://192.168.5.*:3000";
        assert!(origin_matches(pattern, "http://192.168.5.17:3000"));
        assert!(origin_matches(pattern, "http://192.168.5.:3000"));
        assert!(!origin_matches(pattern, "http://192.168.5.17:4000"));
        assert!(!origin_matches(pattern, "http://192.168.5.1:80:3000"));
        assert!(!origin_matches(pattern, "http://192.168.6.17:3000"));
    }

    #[test]
    fn layer_builds_from_config() {
        let config = SecurityConfig { cors_origins: vec!["http://localhost:*".to_string()] };
        let _ = cors_layer(&config);
    }
}
