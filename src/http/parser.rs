//! Turns one already-framed request byte range into a [`Request`]
//! (`spec.md` §4.5 `RequestParser`). Framing — finding where one request ends
//! and the next begins — is [`crate::net::connection`]'s job; this module
//! only ever sees a buffer that already holds exactly one complete message.

use crate::http::request::{HeaderMap, Method, Request};

const ALLOWED_VERSIONS: &[&str] = &["HTTP/1.1", "HTTP/1.0"];

/// Parse headers + request line out of `raw`, then attach `body` as-is (the
/// caller has already dechunked it if necessary, per `spec.md` §4.4.1).
/// Never fails: a malformed message yields `Request::error()` so the router
/// can answer with a canned `400` instead of the caller matching on `Result`.
pub fn parse(raw: &[u8], body: Vec<u8>) -> Request {
    match try_parse(raw, body) {
        Some(request) => request,
        None => Request::error(),
    }
}

fn try_parse(raw: &[u8], body: Vec<u8>) -> Option<Request> {
    let text = std::str::from_utf8(raw).ok()?;
    let mut lines = text.split("\r\n");

    let request_line = lines.next()?;
    let mut parts = request_line.split(' ');
    let method_token = parts.next()?;
    let path = parts.next()?;
    let version = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    let method = Method::from_str(method_token)?;
    if path.is_empty() {
        return None;
    }
    if method != Method::Connect && method != Method::Options && !path.starts_with('/') {
        return None;
    }
    if path.bytes().any(|b| b <= 0x1F || b == 0x7F || b == b' ') {
        return None;
    }
    if !ALLOWED_VERSIONS.contains(&version) {
        return None;
    }

    let (path, query_string) = match path.split_once('?') {
        Some((p, q)) => (p.to_string(), Some(q.to_string())),
        None => (path.to_string(), None),
    };

    let mut headers = HeaderMap::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let Some((name, value)) = line.split_once(':') else { return None };
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        headers.append(name, value.trim().to_string());
    }

    if version == "HTTP/1.1" && !headers.contains("host") {
        return None;
    }
    if headers.count("host") > 1 {
        return None;
    }
    if headers.contains("content-length") && headers.contains("transfer-encoding") {
        return None;
    }

    Some(Request {
        method,
        path,
        query_string,
        version: version.to_string(),
        headers,
        body,
        is_error: false,
    })
}
