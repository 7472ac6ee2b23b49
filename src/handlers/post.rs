use std::fs;
use std::io;

use crate::config::Location;
use crate::errors;
use crate::http::{Request, Response};
use crate::upload::{sanitize_filename, MultipartParser};

const MAX_UPLOAD_SIZE: usize = 1024 * 1024;
/// Upper bound handed to `MultipartParser` itself; kept well above
/// `MAX_UPLOAD_SIZE` so oversized files fail the explicit 413 check below
/// instead of the parser's own `400`-mapped `InvalidData` error.
const PARSER_FILE_SIZE_CEILING: usize = 64 * 1024 * 1024;

/// Accept a single-file multipart upload (`spec.md` §4.7 `post`).
pub fn handle(location: &Location, request: &Request) -> Response {
    let Some(upload_path) = &location.upload_path else {
        return errors::render(403, &Default::default(), &[]);
    };

    let Some(content_type) = request.headers.get("content-type") else {
        return errors::render(400, &Default::default(), &[]);
    };
    let Some(boundary) = parse_boundary(content_type) else {
        return errors::render(400, &Default::default(), &[]);
    };

    let parser = MultipartParser::new(boundary, PARSER_FILE_SIZE_CEILING, PARSER_FILE_SIZE_CEILING);
    let Ok((filename, data)) = parser.first_file(&request.body) else {
        return errors::render(400, &Default::default(), &[]);
    };

    let sanitized = sanitize_filename(&filename);
    if sanitized.is_empty() {
        return errors::render(400, &Default::default(), &[]);
    }
    if data.len() > MAX_UPLOAD_SIZE {
        return errors::render(413, &Default::default(), &[]);
    }

    let destination = upload_path.join(&sanitized);
    if let Err(e) = write_file(&destination, &data) {
        return map_write_error(e);
    }

    let mut response = Response::new(201);
    response.set_header("Content-Type", "text/html");
    response.set_body_string(confirmation_page(&sanitized));
    response
}

fn write_file(path: &std::path::Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, data)
}

fn map_write_error(_e: io::Error) -> Response {
    errors::render(500, &Default::default(), &[])
}

fn parse_boundary(content_type: &str) -> Option<String> {
    if !content_type.to_ascii_lowercase().starts_with("multipart/form-data") {
        return None;
    }
    content_type.split(';').find_map(|part| {
        let part = part.trim();
        part.strip_prefix("boundary=").map(|b| b.trim_matches('"').to_string())
    })
}

fn confirmation_page(filename: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><title>Upload complete</title></head>\
         <body><h1>Upload complete</h1><p>Saved as <code>{filename}</code>.</p></body></html>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Method;
    use tempfile::TempDir;

    fn location(upload_path: Option<std::path::PathBuf>) -> Location {
        Location {
            pattern: "/upload".to_string(),
            is_extension: false,
            allowed_methods: vec![Method::Post],
            index: None,
            autoindex: false,
            cgi_path: None,
            cgi_ext: Vec::new(),
            upload_path,
            return_url: None,
        }
    }

    fn multipart_body(boundary: &str, filename: &str, content: &str) -> Vec<u8> {
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: text/plain\r\n\r\n{content}\r\n--{boundary}--\r\n"
        )
        .into_bytes()
    }

    #[test]
    fn missing_upload_path_returns_403() {
        let mut request = Request::new();
        request.headers.append("Content-Type", "multipart/form-data; boundary=X".to_string());
        let response = handle(&location(None), &request);
        assert_eq!(response.status_code, 403);
    }

    #[test]
    fn non_multipart_content_type_returns_400() {
        let dir = TempDir::new().unwrap();
        let mut request = Request::new();
        request.headers.append("Content-Type", "application/json".to_string());
        let response = handle(&location(Some(dir.path().to_path_buf())), &request);
        assert_eq!(response.status_code, 400);
    }

    #[test]
    fn successful_upload_writes_file_and_returns_201() {
        let dir = TempDir::new().unwrap();
        let mut request = Request::new();
        request.headers.append("Content-Type", "multipart/form-data; boundary=X".to_string());
        request.body = multipart_body("X", "notes.txt", "hello");

        let response = handle(&location(Some(dir.path().to_path_buf())), &request);
        assert_eq!(response.status_code, 201);
        assert_eq!(std::fs::read_to_string(dir.path().join("notes.txt")).unwrap(), "hello");
    }

    #[test]
    fn sanitizes_dangerous_filename_characters() {
        let dir = TempDir::new().unwrap();
        let mut request = Request::new();
        request.headers.append("Content-Type", "multipart/form-data; boundary=X".to_string());
        request.body = multipart_body("X", "../evil.txt", "x");

        let response = handle(&location(Some(dir.path().to_path_buf())), &request);
        assert_eq!(response.status_code, 201);
        assert!(dir.path().join("..evil.txt").exists());
    }

    #[test]
    fn oversized_file_returns_413() {
        let dir = TempDir::new().unwrap();
        let mut request = Request::new();
        request.headers.append("Content-Type", "multipart/form-data; boundary=X".to_string());
        request.body = multipart_body("X", "big.bin", &"a".repeat(MAX_UPLOAD_SIZE + 1));

        let response = handle(&location(Some(dir.path().to_path_buf())), &request);
        assert_eq!(response.status_code, 413);
    }
}
