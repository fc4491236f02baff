//! Header construction, forwarding, and single-host URI rewriting.
//!
//! [`build_forwarded_headers`] clones the original client headers (when
//! forwarding is enabled), strips hop-by-hop headers, rewrites `Host`,
//! and adds proxy metadata (`X-Forwarded-For`, `X-Real-IP`, `Via`,
//! `X-Correlation-Id`). [`rewrite_uri`] points an inbound request URI
//! at a host's target.

use std::sync::LazyLock;

use axum::http::{HeaderMap, HeaderName, HeaderValue, Uri};
use url::Url;

pub const X_CORRELATION_ID: HeaderName = HeaderName::from_static("x-correlation-id");
pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
pub const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");
pub const X_REAL_IP: HeaderName = HeaderName::from_static("x-real-ip");

const VIA: &str = "1.1 turnstile";

static HOP_BY_HOP: LazyLock<Vec<HeaderName>> = LazyLock::new(|| {
    [
        "connection",
        "keep-alive",
        "transfer-encoding",
        "te",
        "trailer",
        "upgrade",
        "proxy-connection",
        "proxy-authorization",
        "proxy-authenticate",
    ]
    .iter()
    .filter_map(|name| name.parse::<HeaderName>().ok())
    .collect()
});

/// Which header rewrites a host applies to forwarded requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderPolicy {
    pub forward_headers: bool,
    pub proxy_headers: bool,
    pub strip_hop_by_hop: bool,
}

impl Default for HeaderPolicy {
    fn default() -> Self {
        Self {
            forward_headers: true,
            proxy_headers: true,
            strip_hop_by_hop: true,
        }
    }
}

/// Strip hop-by-hop headers from an upstream response before relaying it.
///
/// The body is streamed through unchanged, so `content-length` is kept.
pub fn strip_response_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
}

pub fn build_forwarded_headers(
    original: &HeaderMap,
    client_ip: &str,
    target_url: &Url,
    policy: &HeaderPolicy,
    correlation_id: &str,
) -> HeaderMap {
    let mut headers = if policy.forward_headers {
        original.clone()
    } else {
        HeaderMap::new()
    };

    if policy.strip_hop_by_hop {
        for header_name in HOP_BY_HOP.iter() {
            headers.remove(header_name);
        }
    }

    // Rewrite Host
    if let Some(host) = target_url.host_str() {
        let host_value = target_url
            .port()
            .map_or_else(|| host.to_string(), |port| format!("{host}:{port}"));
        if let Ok(val) = HeaderValue::from_str(&host_value) {
            headers.insert(hyper::header::HOST, val);
        }
    }

    if policy.proxy_headers {
        let xff = original
            .get(&X_FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .map_or_else(
                || client_ip.to_string(),
                |existing| format!("{existing}, {client_ip}"),
            );
        if let Ok(val) = HeaderValue::from_str(&xff) {
            headers.insert(X_FORWARDED_FOR, val);
        }

        // X-Real-IP (first IP in chain)
        let real_ip = xff.split(',').next().unwrap_or(client_ip).trim();
        if let Ok(val) = HeaderValue::from_str(real_ip) {
            headers.insert(X_REAL_IP, val);
        }

        let proto = if target_url.scheme() == "https" {
            "https"
        } else {
            "http"
        };
        headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static(proto));

        // X-Forwarded-Host (original Host the client targeted)
        if let Some(original_host) = original.get(hyper::header::HOST) {
            headers.insert(X_FORWARDED_HOST, original_host.clone());
        }

        headers.insert(hyper::header::VIA, HeaderValue::from_static(VIA));

        if let Ok(val) = HeaderValue::from_str(correlation_id) {
            headers.insert(X_CORRELATION_ID, val);
        }
    }

    headers
}

/// Point `uri` at `target`: scheme and authority come from the target,
/// the paths are joined with exactly one slash, and both query strings
/// are kept (target first).
pub fn rewrite_uri(target: &Url, uri: &Uri) -> Result<Uri, String> {
    let origin = &target[..url::Position::BeforePath];
    let path = join_paths(target.path(), uri.path());

    let query = match (target.query().unwrap_or(""), uri.query().unwrap_or("")) {
        ("", "") => String::new(),
        (t, "") => format!("?{t}"),
        ("", r) => format!("?{r}"),
        (t, r) => format!("?{t}&{r}"),
    };

    format!("{origin}{path}{query}")
        .parse::<Uri>()
        .map_err(|e| e.to_string())
}

fn join_paths(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{base}{}", &path[1..]),
        (false, false) => format!("{base}/{path}"),
        _ => format!("{base}{path}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> Url {
        Url::parse("http://target:8080").unwrap()
    }

    #[test]
    fn strips_hop_by_hop() {
        let mut original = HeaderMap::new();
        original.insert("connection", "keep-alive".parse().unwrap());
        original.insert("content-type", "application/json".parse().unwrap());

        let result = build_forwarded_headers(
            &original,
            "10.0.0.1",
            &target(),
            &HeaderPolicy::default(),
            "test-id",
        );

        assert!(result.get("connection").is_none());
        assert!(result.get("content-type").is_some());
    }

    #[test]
    fn rewrites_host() {
        let original = HeaderMap::new();
        let target = Url::parse("http://backend:9090/path").unwrap();
        let result = build_forwarded_headers(
            &original,
            "10.0.0.1",
            &target,
            &HeaderPolicy::default(),
            "test-id",
        );

        assert_eq!(result.get("host").unwrap(), "backend:9090");
    }

    #[test]
    fn appends_x_forwarded_for() {
        let mut original = HeaderMap::new();
        original.insert("x-forwarded-for", "1.2.3.4".parse().unwrap());

        let result = build_forwarded_headers(
            &original,
            "10.0.0.1",
            &target(),
            &HeaderPolicy::default(),
            "test-id",
        );

        assert_eq!(result.get("x-forwarded-for").unwrap(), "1.2.3.4, 10.0.0.1");
        assert_eq!(result.get("x-real-ip").unwrap(), "1.2.3.4");
    }

    #[test]
    fn proxy_headers_can_be_disabled() {
        let policy = HeaderPolicy {
            proxy_headers: false,
            ..HeaderPolicy::default()
        };
        let result =
            build_forwarded_headers(&HeaderMap::new(), "10.0.0.1", &target(), &policy, "id");

        assert!(result.get("x-forwarded-for").is_none());
        assert!(result.get("via").is_none());
        assert_eq!(result.get("host").unwrap(), "target:8080");
    }

    #[test]
    fn rewrite_joins_paths_with_single_slash() {
        let uri: Uri = "/orders/42".parse().unwrap();
        assert_eq!(
            rewrite_uri(&target(), &uri).unwrap(),
            "http://target:8080/orders/42"
        );

        let base = Url::parse("http://target:8080/api/").unwrap();
        assert_eq!(
            rewrite_uri(&base, &uri).unwrap(),
            "http://target:8080/api/orders/42"
        );

        let base = Url::parse("http://target:8080/api").unwrap();
        assert_eq!(
            rewrite_uri(&base, &uri).unwrap(),
            "http://target:8080/api/orders/42"
        );
    }

    #[test]
    fn rewrite_merges_queries() {
        let base = Url::parse("http://target:8080/?tenant=a").unwrap();
        let uri: Uri = "/search?q=rust".parse().unwrap();
        assert_eq!(
            rewrite_uri(&base, &uri).unwrap(),
            "http://target:8080/search?tenant=a&q=rust"
        );

        let uri: Uri = "/search".parse().unwrap();
        assert_eq!(
            rewrite_uri(&base, &uri).unwrap(),
            "http://target:8080/search?tenant=a"
        );
    }
}
