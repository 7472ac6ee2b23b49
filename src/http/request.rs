use std::collections::HashMap;

/// HTTP methods the request parser accepts. This is deliberately narrower
/// than the method whitelist a `location` config block can name
/// (`CONNECT`/`TRACE` are valid in `allow_methods` but never produced by a
/// live request here, since this server never acts as a proxy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Options,
    Patch,
    Connect,
    Trace,
}

impl Method {
    pub fn from_str(s: &str) -> Option<Method> {
        match s {
            "GET" => Some(Method::Get),
            "POST" => Some(Method::Post),
            "PUT" => Some(Method::Put),
            "DELETE" => Some(Method::Delete),
            "HEAD" => Some(Method::Head),
            "OPTIONS" => Some(Method::Options),
            "PATCH" => Some(Method::Patch),
            _ => None,
        }
    }

    /// The full whitelist a `location`'s `allow_methods` directive may
    /// reference (`spec.md` §3, `Location.allowed_methods`). Wider than
    /// [`Method::from_str`] because a configured-but-unreachable method is
    /// not an error.
    pub fn from_config_token(s: &str) -> Option<Method> {
        match s {
            "CONNECT" => Some(Method::Connect),
            "TRACE" => Some(Method::Trace),
            other => Method::from_str(other),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Patch => "PATCH",
            Method::Connect => "CONNECT",
            Method::Trace => "TRACE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Case-insensitive, multi-valued header container. Keys are stored
/// lower-cased; insertion order is preserved per key so a header repeated on
/// the wire (e.g. multiple `Cookie` lines) keeps every value, per
/// `spec.md` §3 and Design Note §9.
#[derive(Debug, Clone, Default)]
pub struct HeaderMap {
    values: HashMap<String, Vec<String>>,
}

impl HeaderMap {
    pub fn new() -> Self {
        HeaderMap {
            values: HashMap::new(),
        }
    }

    pub fn append(&mut self, name: &str, value: String) {
        self.values
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value);
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(&name.to_ascii_lowercase())
            .and_then(|v| v.first())
            .map(|s| s.as_str())
    }

    pub fn get_all(&self, name: &str) -> &[String] {
        self.values
            .get(&name.to_ascii_lowercase())
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn count(&self, name: &str) -> usize {
        self.get_all(name).len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(&name.to_ascii_lowercase())
    }

    pub fn remove(&mut self, name: &str) {
        self.values.remove(&name.to_ascii_lowercase());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values
            .iter()
            .flat_map(|(k, vs)| vs.iter().map(move |v| (k.as_str(), v.as_str())))
    }
}

/// A fully parsed HTTP request (`spec.md` §3). `is_error` marks requests the
/// parser could not make sense of; the router turns those into a canned 400
/// without consulting any handler.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub query_string: Option<String>,
    pub version: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    pub is_error: bool,
}

impl Request {
    pub fn new() -> Self {
        Request {
            method: Method::Get,
            path: String::from("/"),
            query_string: None,
            version: String::from("HTTP/1.1"),
            headers: HeaderMap::new(),
            body: Vec::new(),
            is_error: false,
        }
    }

    pub fn error() -> Self {
        let mut r = Request::new();
        r.is_error = true;
        r
    }

    pub fn content_length(&self) -> Option<usize> {
        self.headers.get("content-length").and_then(|v| v.trim().parse().ok())
    }

    pub fn is_chunked(&self) -> bool {
        self.headers
            .get("transfer-encoding")
            .map(|v| v.to_ascii_lowercase().contains("chunked"))
            .unwrap_or(false)
    }

    pub fn host(&self) -> Option<&str> {
        self.headers.get("host").map(|h| h.split(':').next().unwrap_or(h))
    }

    /// Keep-alive rule from `spec.md` §4.9: HTTP/1.1 defaults to keep-alive
    /// unless `Connection: close`; HTTP/1.0 defaults to close unless
    /// `Connection: keep-alive`.
    pub fn wants_keep_alive(&self) -> bool {
        match self.headers.get("connection") {
            Some(conn) => {
                let conn = conn.to_ascii_lowercase();
                if self.version == "HTTP/1.1" {
                    !conn.contains("close")
                } else {
                    conn.contains("keep-alive")
                }
            }
            None => self.version == "HTTP/1.1",
        }
    }
}

impl Default for Request {
    fn default() -> Self {
        Request::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_round_trips() {
        for m in ["GET", "POST", "PUT", "DELETE", "HEAD", "OPTIONS", "PATCH"] {
            assert_eq!(Method::from_str(m).unwrap().as_str(), m);
        }
        assert!(Method::from_str("CONNECT").is_none());
        assert!(Method::from_config_token("CONNECT").is_some());
    }

    #[test]
    fn header_map_is_case_insensitive_and_multi_valued() {
        let mut h = HeaderMap::new();
        h.append("Host", "example.com".to_string());
        h.append("Cookie", "a=1".to_string());
        h.append("cookie", "b=2".to_string());

        assert_eq!(h.get("HOST"), Some("example.com"));
        assert_eq!(h.get_all("Cookie"), &["a=1".to_string(), "b=2".to_string()]);
        assert_eq!(h.count("cookie"), 2);
    }

    #[test]
    fn keep_alive_defaults() {
        let mut req = Request::new();
        req.version = "HTTP/1.1".to_string();
        assert!(req.wants_keep_alive());
        req.headers.append("Connection", "close".to_string());
        assert!(!req.wants_keep_alive());

        let mut req10 = Request::new();
        req10.version = "HTTP/1.0".to_string();
        assert!(!req10.wants_keep_alive());
        req10.headers.append("Connection", "keep-alive".to_string());
        assert!(req10.wants_keep_alive());
    }
}
