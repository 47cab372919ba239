//! CGI-style environment built from a request.

use std::collections::BTreeMap;

use axum::http::header;
use bytes::Bytes;

use crate::protocol::context::RequestContext;

/// Variable name → value. Keys are unique and iterate in sorted order.
///
/// Values are raw bytes: header values are forwarded exactly as received,
/// including obs-text that is not valid UTF-8.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vars(BTreeMap<String, Bytes>);

impl Vars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a variable; a later insert under the same key replaces the earlier value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl AsRef<[u8]>) {
        self.0.insert(key.into(), Bytes::copy_from_slice(value.as_ref()));
    }

    /// Value as text, `None` if absent or not valid UTF-8.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_bytes(key).and_then(|v| std::str::from_utf8(v).ok())
    }

    pub fn get_bytes(&self, key: &str) -> Option<&[u8]> {
        self.0.get(key).map(Bytes::as_ref)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    /// Build the environment for one request.
    pub fn from_context(ctx: &RequestContext) -> Self {
        let mut vars = Vars::new();

        let method = if ctx.method.is_empty() { "GET" } else { ctx.method.as_str() };
        vars.insert("REQUEST_METHOD", method);
        vars.insert("SERVER_PROTOCOL", ctx.protocol.as_str());
        vars.insert("REQUEST_URI", ctx.request_uri());
        vars.insert("QUERY_STRING", ctx.query.as_str());
        vars.insert("HTTP_HOST", ctx.host.as_str());
        vars.insert("REMOTE_ADDR", ctx.remote_addr.as_str());
        if ctx.tls {
            vars.insert("HTTPS", "on");
        }

        for name in ctx.headers.keys() {
            if *name == header::HOST {
                continue;
            }
            let mut value = Vec::new();
            for (i, v) in ctx.headers.get_all(name).iter().enumerate() {
                if i > 0 {
                    value.extend_from_slice(b", ");
                }
                value.extend_from_slice(v.as_bytes());
            }
            vars.insert(normalize_header(name.as_str()), value);
        }

        vars.insert_cgi(ctx);
        vars
    }

    // Variables WSGI loaders expect on top of the request line and headers.
    fn insert_cgi(&mut self, ctx: &RequestContext) {
        let path = if ctx.path.is_empty() { "/" } else { ctx.path.as_str() };
        self.insert("PATH_INFO", percent_decode(path));
        self.insert("SCRIPT_NAME", "");

        let default_port = if ctx.tls { "443" } else { "80" };
        let (name, port) = split_host_port(&ctx.host);
        self.insert("SERVER_NAME", name);
        self.insert("SERVER_PORT", port.unwrap_or(default_port));

        if let (_, Some(port)) = split_host_port(&ctx.remote_addr) {
            self.insert("REMOTE_PORT", port);
        }

        for (name, key) in [
            (header::CONTENT_TYPE, "CONTENT_TYPE"),
            (header::CONTENT_LENGTH, "CONTENT_LENGTH"),
        ] {
            if let Some(value) = ctx.headers.get(&name) {
                self.insert(key, value.as_bytes());
            }
        }
    }
}

/// Map an HTTP header name to its variable name: `X-My-Header` → `HTTP_X_MY_HEADER`.
pub fn normalize_header(name: &str) -> String {
    let mut key = String::with_capacity(name.len() + 5);
    key.push_str("HTTP_");
    for c in name.chars() {
        match c {
            ' ' | '-' => key.push('_'),
            c => key.extend(c.to_uppercase()),
        }
    }
    key
}

/// Split `host:port`, keeping IPv6 literals intact.
fn split_host_port(addr: &str) -> (&str, Option<&str>) {
    if let Some(rest) = addr.strip_prefix('[') {
        if let Some((host, tail)) = rest.split_once(']') {
            return (host, tail.strip_prefix(':').filter(|p| !p.is_empty()));
        }
        return (addr, None);
    }

    match addr.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') && !port.is_empty() => (host, Some(port)),
        _ => (addr, None),
    }
}

/// Decode `%XX` escapes in a request path. Malformed escapes are kept as-is.
pub fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue};

    fn context() -> RequestContext {
        RequestContext {
            method: "GET".into(),
            protocol: "HTTP/1.1".into(),
            path: "/app/hello%20world".into(),
            query: "a=1".into(),
            host: "example.com:8080".into(),
            remote_addr: "10.1.2.3:40000".into(),
            tls: false,
            headers: HeaderMap::new(),
        }
    }

    #[test]
    fn test_normalize_header() {
        assert_eq!(normalize_header("X-My-Header"), "HTTP_X_MY_HEADER");
        assert_eq!(normalize_header("accept encoding"), "HTTP_ACCEPT_ENCODING");
    }

    #[test]
    fn test_multi_value_header_joined() {
        let mut ctx = context();
        ctx.headers.append("x-my-header", HeaderValue::from_static("a"));
        ctx.headers.append("x-my-header", HeaderValue::from_static("b"));

        let vars = Vars::from_context(&ctx);
        assert_eq!(vars.get("HTTP_X_MY_HEADER"), Some("a, b"));
    }

    #[test]
    fn test_request_line_vars() {
        let vars = Vars::from_context(&context());
        assert_eq!(vars.get("REQUEST_METHOD"), Some("GET"));
        assert_eq!(vars.get("SERVER_PROTOCOL"), Some("HTTP/1.1"));
        assert_eq!(vars.get("REQUEST_URI"), Some("/app/hello%20world?a=1"));
        assert_eq!(vars.get("QUERY_STRING"), Some("a=1"));
        assert_eq!(vars.get("HTTP_HOST"), Some("example.com:8080"));
        assert_eq!(vars.get("REMOTE_ADDR"), Some("10.1.2.3:40000"));
        assert_eq!(vars.get("PATH_INFO"), Some("/app/hello world"));
        assert_eq!(vars.get("SERVER_NAME"), Some("example.com"));
        assert_eq!(vars.get("SERVER_PORT"), Some("8080"));
        assert_eq!(vars.get("REMOTE_PORT"), Some("40000"));
    }

    #[test]
    fn test_empty_method_defaults_to_get() {
        let mut ctx = context();
        ctx.method.clear();
        assert_eq!(Vars::from_context(&ctx).get("REQUEST_METHOD"), Some("GET"));
    }

    #[test]
    fn test_https_only_with_tls() {
        let mut ctx = context();
        assert!(!Vars::from_context(&ctx).contains("HTTPS"));

        ctx.tls = true;
        ctx.host = "secure.example.com".into();
        let vars = Vars::from_context(&ctx);
        assert_eq!(vars.get("HTTPS"), Some("on"));
        assert_eq!(vars.get("SERVER_PORT"), Some("443"));
    }

    #[test]
    fn test_host_header_not_duplicated() {
        let mut ctx = context();
        ctx.headers.insert("host", HeaderValue::from_static("other.example.com"));
        let vars = Vars::from_context(&ctx);
        assert_eq!(vars.get("HTTP_HOST"), Some("example.com:8080"));
    }

    #[test]
    fn test_content_headers_get_cgi_names() {
        let mut ctx = context();
        ctx.headers.insert("content-type", HeaderValue::from_static("application/json"));
        ctx.headers.insert("content-length", HeaderValue::from_static("12"));

        let vars = Vars::from_context(&ctx);
        assert_eq!(vars.get("CONTENT_TYPE"), Some("application/json"));
        assert_eq!(vars.get("CONTENT_LENGTH"), Some("12"));
        assert_eq!(vars.get("HTTP_CONTENT_LENGTH"), Some("12"));
    }

    #[test]
    fn test_non_utf8_header_value_forwarded_verbatim() {
        let mut ctx = context();
        ctx.headers.insert("x-latin", HeaderValue::from_bytes(b"caf\xE9").unwrap());
        ctx.headers.insert("content-type", HeaderValue::from_bytes(b"text/plain; x=\xFF").unwrap());

        let vars = Vars::from_context(&ctx);
        assert_eq!(vars.get_bytes("HTTP_X_LATIN"), Some(&b"caf\xE9"[..]));
        assert_eq!(vars.get_bytes("CONTENT_TYPE"), Some(&b"text/plain; x=\xFF"[..]));
        assert_eq!(vars.get("HTTP_X_LATIN"), None);
    }

    #[test]
    fn test_colliding_header_names_last_write_wins() {
        let mut ctx = context();
        ctx.headers.insert("x-a", HeaderValue::from_static("dash"));
        ctx.headers.insert("x_a", HeaderValue::from_static("underscore"));

        let vars = Vars::from_context(&ctx);
        assert_eq!(vars.get("HTTP_X_A"), Some("underscore"));
    }

    #[test]
    fn test_split_host_port() {
        assert_eq!(split_host_port("[::1]:8080"), ("::1", Some("8080")));
        assert_eq!(split_host_port("[::1]"), ("::1", None));
        assert_eq!(split_host_port("localhost"), ("localhost", None));
        assert_eq!(split_host_port("::1"), ("::1", None));
    }

    #[test]
    fn test_percent_decode_keeps_invalid_escapes() {
        assert_eq!(percent_decode("/a%2Fb"), "/a/b");
        assert_eq!(percent_decode("/100%"), "/100%");
        assert_eq!(percent_decode("/%zz"), "/%zz");
    }
}
