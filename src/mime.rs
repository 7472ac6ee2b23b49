use std::path::Path;

/// Extension-to-content-type table for static file serving. Unknown
/// extensions fall back to `application/octet-stream`.
const TYPES: &[(&str, &str)] = &[
    ("html", "text/html"),
    ("htm", "text/html"),
    ("css", "text/css"),
    ("js", "application/javascript"),
    ("json", "application/json"),
    ("xml", "application/xml"),
    ("txt", "text/plain"),
    ("md", "text/markdown"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("svg", "image/svg+xml"),
    ("ico", "image/x-icon"),
    ("woff", "font/woff"),
    ("woff2", "font/woff2"),
    ("pdf", "application/pdf"),
    ("zip", "application/zip"),
    ("mp4", "video/mp4"),
    ("mp3", "audio/mpeg"),
];

pub fn lookup(path: &Path) -> &'static str {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .and_then(|ext| TYPES.iter().find(|(k, _)| *k == ext).map(|(_, v)| *v))
        .unwrap_or("application/octet-stream")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn known_extensions_resolve() {
        assert_eq!(lookup(&PathBuf::from("index.html")), "text/html");
        assert_eq!(lookup(&PathBuf::from("script.js")), "application/javascript");
    }

    #[test]
    fn unknown_extension_falls_back_to_octet_stream() {
        assert_eq!(lookup(&PathBuf::from("file.xyz")), "application/octet-stream");
        assert_eq!(lookup(&PathBuf::from("noextension")), "application/octet-stream");
    }
}
