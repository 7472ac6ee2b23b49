//! Error-page rendering. `spec.md` §7: every non-2xx response is produced
//! from a template — the virtual server's configured `error_pages[code]` if
//! set, otherwise a built-in default under `www/errors/`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::http::{response, Response};

fn default_page_name(status: u16) -> Option<&'static str> {
    Some(match status {
        400 => "bad_request_400.html",
        403 => "forbidden_403.html",
        404 => "not_found_404.html",
        405 => "method_not_allowed_405.html",
        408 => "request_timeout_408.html",
        413 => "payload_too_large_413.html",
        500 => "internal_server_error_500.html",
        504 => "gateway_timeout_504.html",
        _ => return None,
    })
}

fn builtin_body(status: u16) -> String {
    format!(
        "<!DOCTYPE html><html><head><title>{code} {text}</title></head>\
         <body><h1>{code} {text}</h1></body></html>",
        code = status,
        text = response::status_text(status),
    )
}

/// Render an error response, preferring a configured custom page, then the
/// conventional `www/errors/<name>.html`, then a minimal built-in fallback.
pub fn render(status: u16, error_pages: &HashMap<u16, PathBuf>, extra_headers: &[(&str, &str)]) -> Response {
    let body = error_pages
        .get(&status)
        .and_then(|path| fs::read_to_string(path).ok())
        .or_else(|| default_page_name(status).and_then(|name| fs::read_to_string(Path::new("www/errors").join(name)).ok()))
        .unwrap_or_else(|| builtin_body(status));

    let mut response = Response::new(status);
    response.set_header("Content-Type", "text/html; charset=utf-8");
    response.set_header("Cache-Control", "no-cache, no-store, must-revalidate");
    for (name, value) in extra_headers {
        response.set_header(name, value);
    }
    response.set_body_string(body);
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_builtin_page_when_no_file_present() {
        let response = render(404, &HashMap::new(), &[]);
        assert_eq!(response.status_code, 404);
        assert!(String::from_utf8_lossy(&response.body).contains("404"));
    }

    #[test]
    fn loads_configured_custom_page() {
        let dir = tempfile::TempDir::new().unwrap();
        let page = dir.path().join("oops.html");
        std::fs::write(&page, "<h1>custom 500</h1>").unwrap();
        let mut pages = HashMap::new();
        pages.insert(500u16, page);

        let response = render(500, &pages, &[]);
        assert_eq!(String::from_utf8_lossy(&response.body), "<h1>custom 500</h1>");
    }

    #[test]
    fn applies_extra_headers() {
        let response = render(405, &HashMap::new(), &[("Allow", "GET, POST")]);
        assert_eq!(response.get_header("Allow"), Some("GET, POST"));
    }
}
