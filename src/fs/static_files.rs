use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use crate::http::Response;
use crate::mime;

/// Files over this size are refused rather than buffered whole into memory.
/// `spec.md` doesn't name a figure for static files (only for uploads); this
/// keeps a single oversized file from blowing the connection buffer budget.
const MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Read a regular file from disk and build a `200 OK` response with the
/// right `Content-Type`. Returns the underlying `io::Error` on failure so
/// the caller can distinguish not-found from permission-denied from other
/// I/O failure and map each to its `spec.md` §7 status.
pub fn read_file(path: &Path) -> io::Result<Response> {
    let mut file = File::open(path)?;
    let metadata = file.metadata()?;

    if metadata.len() > MAX_FILE_SIZE {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "file too large to serve"));
    }

    let mut content = Vec::with_capacity(metadata.len() as usize);
    file.read_to_end(&mut content)?;

    let mut response = Response::ok();
    response.set_header("Content-Type", mime::lookup(path));
    response.set_body(content);
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn reads_existing_file_with_content_type() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.html");
        std::fs::write(&path, "<h1>Hi</h1>").unwrap();

        let response = read_file(&path).unwrap();
        assert_eq!(response.status_code, 200);
        assert_eq!(response.body, b"<h1>Hi</h1>");
        assert_eq!(response.get_header("Content-Type"), Some("text/html"));
    }

    #[test]
    fn missing_file_returns_not_found_io_error() {
        let dir = TempDir::new().unwrap();
        let result = read_file(&dir.path().join("missing.txt"));
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::NotFound);
    }
}
