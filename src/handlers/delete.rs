use std::fs;
use std::io;

use crate::config::Location;
use crate::errors;
use crate::http::Response;
use crate::upload::sanitize_filename;

/// Remove an uploaded file (`spec.md` §4.7 `delete`).
pub fn handle(location: &Location, path: &str) -> Response {
    let Some(upload_path) = &location.upload_path else {
        return errors::render(403, &Default::default(), &[]);
    };

    let Some(tail) = path.strip_prefix("/uploads/") else {
        return errors::render(400, &Default::default(), &[]);
    };

    let sanitized = sanitize_filename(tail);
    if sanitized.is_empty() {
        return errors::render(400, &Default::default(), &[]);
    }

    let target = upload_path.join(&sanitized);
    if !target.is_file() {
        return errors::render(404, &Default::default(), &[]);
    }

    match fs::remove_file(&target) {
        Ok(()) => confirmation(&sanitized),
        Err(e) => map_remove_error(e),
    }
}

fn confirmation(filename: &str) -> Response {
    let mut response = Response::new(200);
    response.set_header("Content-Type", "text/html");
    response.set_body_string(format!(
        "<!DOCTYPE html><html><head><title>File deleted</title></head>\
         <body><h1>File deleted</h1><p><code>{filename}</code> was removed.</p></body></html>"
    ));
    response
}

fn map_remove_error(_e: io::Error) -> Response {
    errors::render(500, &Default::default(), &[])
}
