use std::io;
use std::path::PathBuf;

use crate::config::{Location, VirtualServer};
use crate::errors;
use crate::fs::{autoindex, path_utils, static_files};
use crate::http::{Method, Request, Response};

const DEFAULT_INDEX_FILES: &[&str] = &["index.html"];

/// Serve a static file or directory listing (`spec.md` §4.7 `get`). Also
/// handles `HEAD`, which is served identically except the body is stripped
/// before transmission.
pub fn handle(server: &VirtualServer, location: &Location, request: &Request, path: &str) -> Response {
    let target = if path == "/" {
        server.root.join(&server.index)
    } else {
        path_utils::join_under_root(&server.root, path)
    };

    let result = if target.is_dir() {
        serve_directory(server, location, &target, path)
    } else {
        static_files::read_file(&target)
    };

    let mut response = match result {
        Ok(response) => response,
        Err(e) => return map_io_error(server, e),
    };

    if request.method == Method::Head {
        response.suppress_body();
    }
    response
}

fn serve_directory(server: &VirtualServer, location: &Location, dir: &PathBuf, request_path: &str) -> io::Result<Response> {
    if location.autoindex {
        return autoindex::render(dir, request_path);
    }

    let mut candidates = Vec::new();
    if let Some(loc_index) = &location.index {
        candidates.push(dir.join(loc_index));
        candidates.push(server.root.join(loc_index));
    }
    for default_name in DEFAULT_INDEX_FILES {
        candidates.push(dir.join(default_name));
    }

    for candidate in candidates {
        if candidate.is_file() {
            return static_files::read_file(&candidate);
        }
    }

    Err(io::Error::new(io::ErrorKind::NotFound, "no index file found"))
}

fn map_io_error(server: &VirtualServer, e: io::Error) -> Response {
    let status = match e.kind() {
        io::ErrorKind::NotFound => 404,
        io::ErrorKind::PermissionDenied => 403,
        _ => 500,
    };
    errors::render(status, &server.error_pages, &[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn server(root: PathBuf) -> VirtualServer {
        VirtualServer {
            bind_address: "127.0.0.1".to_string(),
            port: 8080,
            server_name: "localhost".to_string(),
            root,
            index: "index.html".to_string(),
            client_max_body_size: 1_000_000,
            error_pages: HashMap::new(),
            locations: Vec::new(),
        }
    }

    fn location(autoindex: bool) -> Location {
        Location {
            pattern: "/".to_string(),
            is_extension: false,
            allowed_methods: vec![Method::Get, Method::Head],
            index: Some("index.html".to_string()),
            autoindex,
            cgi_path: None,
            cgi_ext: Vec::new(),
            upload_path: None,
            return_url: None,
        }
    }

    #[test]
    fn root_path_serves_index_html() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>Hi</h1>").unwrap();
        let server = server(dir.path().to_path_buf());
        let request = Request::new();
        let response = handle(&server, &location(false), &request, "/");
        assert_eq!(response.status_code, 200);
        assert_eq!(response.body, b"<h1>Hi</h1>");
    }

    #[test]
    fn head_request_strips_body_but_keeps_content_length() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>Hi</h1>").unwrap();
        let server = server(dir.path().to_path_buf());
        let mut request = Request::new();
        request.method = Method::Head;
        let response = handle(&server, &location(false), &request, "/");
        assert!(response.body_suppressed);
        assert_eq!(response.get_header("Content-Length"), Some("11"));
    }

    #[test]
    fn missing_file_returns_404() {
        let dir = TempDir::new().unwrap();
        let server = server(dir.path().to_path_buf());
        let request = Request::new();
        let response = handle(&server, &location(false), &request, "/missing.html");
        assert_eq!(response.status_code, 404);
    }

    #[test]
    fn directory_without_index_or_autoindex_returns_404() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let server = server(dir.path().to_path_buf());
        let request = Request::new();
        let loc = Location { index: None, ..location(false) };
        let response = handle(&server, &loc, &request, "/sub");
        assert_eq!(response.status_code, 404);
    }

    #[test]
    fn directory_with_autoindex_lists_contents() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/a.txt"), "a").unwrap();
        let server = server(dir.path().to_path_buf());
        let request = Request::new();
        let response = handle(&server, &location(true), &request, "/sub");
        assert_eq!(response.status_code, 200);
        assert!(String::from_utf8_lossy(&response.body).contains("a.txt"));
    }
}
