use std::collections::HashMap;
use std::fmt;

/// An HTTP response (`spec.md` §3). Every response carries `Content-Length`
/// and never uses chunked transfer-encoding (`spec.md` §6); `body_suppressed`
/// lets the router strip the body for a `HEAD` request without losing the
/// `Content-Length` the client still needs to see.
#[derive(Debug, Clone)]
pub struct Response {
    pub status_code: u16,
    pub status_text: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    pub version: String,
    pub body_suppressed: bool,
}

pub fn status_text(code: u16) -> &'static str {
    match code {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        504 => "Gateway Timeout",
        _ => "Error",
    }
}

impl Response {
    pub fn new(status_code: u16) -> Self {
        let mut headers = HashMap::new();
        headers.insert("Server".to_string(), "webserv/1.0".to_string());
        headers.insert("Date".to_string(), httpdate::fmt_http_date(std::time::SystemTime::now()));

        Response {
            status_code,
            status_text: status_text(status_code).to_string(),
            headers,
            body: Vec::new(),
            version: "HTTP/1.1".to_string(),
            body_suppressed: false,
        }
    }

    pub fn ok() -> Self {
        Self::new(200)
    }

    pub fn set_header(&mut self, name: &str, value: &str) {
        self.headers.insert(name.to_string(), value.to_string());
    }

    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn set_body(&mut self, body: Vec<u8>) {
        self.set_header("Content-Length", &body.len().to_string());
        self.body = body;
    }

    pub fn set_body_string(&mut self, body: impl Into<String>) {
        self.set_body(body.into().into_bytes());
    }

    pub fn set_keep_alive(&mut self, keep_alive: bool) {
        self.set_header("Connection", if keep_alive { "keep-alive" } else { "close" });
    }

    /// Strip the body for a `HEAD` response while leaving `Content-Length`
    /// (and every other header) intact, per `spec.md` §4.6.
    pub fn suppress_body(&mut self) {
        self.body_suppressed = true;
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(256 + self.body.len());
        out.extend_from_slice(format!("{} {} {}\r\n", self.version, self.status_code, self.status_text).as_bytes());
        for (name, value) in &self.headers {
            out.extend_from_slice(format!("{}: {}\r\n", name, value).as_bytes());
        }
        out.extend_from_slice(b"\r\n");
        if !self.body_suppressed {
            out.extend_from_slice(&self.body);
        }
        out
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.version, self.status_code, self.status_text)
    }
}
