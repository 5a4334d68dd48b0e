//! Development-only enablement
//!
//! Audits are meant for development builds. A page qualifies when its URL
//! carries a `debug` query parameter or it is served from a local host.

use reqwest::Url;

/// Hosts that only exist on a developer machine
const LOCAL_HOSTS: &[&str] = &["localhost", "127.0.0.1", "0.0.0.0", "[::1]"];

/// Top-level domains reserved for local use
const LOCAL_SUFFIXES: &[&str] = &[".local", ".test", ".localhost"];

/// Whether an audit may run against this page
pub fn is_enabled(url: &Url) -> bool {
    if url.scheme() == "file" {
        return true;
    }
    has_debug_flag(url) || url.host_str().is_some_and(is_development_host)
}

fn has_debug_flag(url: &Url) -> bool {
    url.query_pairs().any(|(key, value)| {
        key.eq_ignore_ascii_case("debug") && !matches!(value.as_ref(), "0" | "false")
    })
}

/// Whether a host only resolves on a developer machine
pub fn is_development_host(host: &str) -> bool {
    let host = host.to_lowercase();
    LOCAL_HOSTS.contains(&host.as_str()) || LOCAL_SUFFIXES.iter().any(|s| host.ends_with(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled(url: &str) -> bool {
        is_enabled(&Url::parse(url).unwrap())
    }

    #[test]
    fn test_local_hosts() {
        assert!(enabled("http://localhost:8080/"));
        assert!(enabled("http://127.0.0.1/about.html"));
        assert!(enabled("http://[::1]/"));
        assert!(enabled("http://site.test/"));
        assert!(enabled("http://printer.local/"));
        assert!(enabled("file:///tmp/index.html"));
    }

    #[test]
    fn test_development_host_names() {
        assert!(is_development_host("LOCALHOST"));
        assert!(is_development_host("[::1]"));
        assert!(is_development_host("shop.localhost"));
        assert!(!is_development_host("example.com"));
    }

    #[test]
    fn test_debug_flag() {
        assert!(enabled("https://example.com/?debug"));
        assert!(enabled("https://example.com/page?lang=en&debug=1"));
        assert!(!enabled("https://example.com/?debug=false"));
    }

    #[test]
    fn test_production_disabled() {
        assert!(!enabled("https://example.com/"));
        assert!(!enabled("https://localhost.example.com/"));
        assert!(!enabled("https://example.com/?debugging=1"));
    }
}
