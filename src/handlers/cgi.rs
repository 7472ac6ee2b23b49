use std::path::{Path, PathBuf};

use crate::cgi::{CgiEnvironment, CgiExecutor};
use crate::config::{Location, VirtualServer};
use crate::errors;
use crate::handlers::get;
use crate::http::{Method, Request, Response};

/// Run a CGI script and relay its output (`spec.md` §4.7 `cgi`, §4.8
/// `CgiExecutor`).
pub fn handle(server: &VirtualServer, location: &Location, request: &Request, path: &str) -> Response {
    let Some(cgi_root) = &location.cgi_path else {
        return errors::render(404, &server.error_pages, &[]);
    };

    let Some((script_path, script_name, path_info)) = resolve_script(cgi_root, path) else {
        return errors::render(404, &server.error_pages, &[]);
    };

    let extension = script_path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if !location.cgi_ext.iter().any(|ext| ext.trim_start_matches('.') == extension) {
        return get::handle(server, location, request, path);
    }

    let mut response = run_script(server, &script_path, &script_name, path_info.as_deref(), request);

    if request.method == Method::Head {
        response.suppress_body();
    }
    response
}

/// Find the script `cgi_root` is actually holding within a request path,
/// and split off whatever comes after it as `PATH_INFO` (`spec.md` §4.8).
/// `cgi_root` names the scripts directory directly, so any leading URL
/// segments (a location prefix like `/cgi-bin`) are just scanned past, not
/// joined onto it: the first segment that resolves to a real file under
/// `cgi_root` is the script, and everything past it is `PATH_INFO`.
fn resolve_script(cgi_root: &Path, path: &str) -> Option<(PathBuf, String, Option<String>)> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    for i in 0..segments.len() {
        let candidate = cgi_root.join(segments[i]);
        if candidate.is_file() {
            let script_name = format!("/{}", segments[..=i].join("/"));
            let path_info =
                if i + 1 < segments.len() { Some(format!("/{}", segments[i + 1..].join("/"))) } else { None };
            return Some((candidate, script_name, path_info));
        }
    }
    None
}

fn run_script(
    server: &VirtualServer,
    script_path: &Path,
    script_name: &str,
    path_info: Option<&str>,
    request: &Request,
) -> Response {
    let env = CgiEnvironment::build(request, script_path, script_name, path_info, &server.server_name, server.port);

    match CgiExecutor::execute(request, script_path, &env) {
        Ok(cgi_response) => cgi_response.into_response(),
        Err(e) => errors::render(e.status_code(), &server.error_pages, &[]),
    }
}
