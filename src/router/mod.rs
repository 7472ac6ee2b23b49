use crate::config::{ListenerGroup, Location, VirtualServer};
use crate::fs::path_utils::{self, PathError};
use crate::handlers;
use crate::http::{Method, Request, Response};

/// Resolve a request against the listener group it was accepted on and
/// dispatch it to a handler (`spec.md` §4.6).
pub fn route(group: &ListenerGroup, request: &Request) -> Response {
    if request.is_error {
        return error_response(group.select_server(request.host()), 400, &[]);
    }

    let normalized = match path_utils::normalize(&request.path) {
        Ok(p) => p,
        Err(PathError::Traversal) => return error_response(group.select_server(request.host()), 403, &[]),
        Err(PathError::TooLong) => return error_response(group.select_server(request.host()), 400, &[]),
        Err(PathError::BadBytes) => return error_response(group.select_server(request.host()), 400, &[]),
    };

    let server = group.select_server(request.host());

    let Some(location) = server.resolve_location(&normalized) else {
        return error_response(server, 404, &[]);
    };

    if !location.allows(request.method) {
        let allow = location.allow_header_value();
        return error_response(server, 405, &[("Allow", &allow)]);
    }

    dispatch(server, location, request, &normalized)
}

fn dispatch(server: &VirtualServer, location: &Location, request: &Request, path: &str) -> Response {
    if location.is_redirect() {
        return handlers::redirect::handle(location);
    }
    if location.is_cgi() {
        return handlers::cgi::handle(server, location, request, path);
    }
    match request.method {
        Method::Post if location.upload_path.is_some() => handlers::post::handle(location, request),
        Method::Delete if location.upload_path.is_some() => handlers::delete::handle(location, path),
        Method::Get | Method::Head => handlers::get::handle(server, location, request, path),
        _ => {
            let allow = location.allow_header_value();
            error_response(server, 405, &[("Allow", &allow)])
        }
    }
}

fn error_response(server: &VirtualServer, status: u16, extra_headers: &[(&str, &str)]) -> Response {
    crate::errors::render(status, &server.error_pages, extra_headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::group_listeners;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn group() -> ListenerGroup {
        let location = Location {
            pattern: "/".to_string(),
            is_extension: false,
            allowed_methods: vec![Method::Get],
            index: Some("index.html".to_string()),
            autoindex: false,
            cgi_path: None,
            cgi_ext: Vec::new(),
            upload_path: None,
            return_url: None,
        };
        let server = VirtualServer {
            bind_address: "127.0.0.1".to_string(),
            port: 8080,
            server_name: "localhost".to_string(),
            root: PathBuf::from("www"),
            index: "index.html".to_string(),
            client_max_body_size: 1_000_000,
            error_pages: HashMap::new(),
            locations: vec![location],
        };
        group_listeners(vec![server]).remove(0)
    }

    #[test]
    fn traversal_path_returns_403() {
        let group = group();
        let mut request = Request::new();
        request.path = "/../etc/passwd".to_string();
        let response = route(&group, &request);
        assert_eq!(response.status_code, 403);
    }

    #[test]
    fn unmatched_location_returns_404() {
        let group = group();
        let mut request = Request::new();
        request.path = "/nope".to_string();
        let response = route(&group, &request);
        assert_eq!(response.status_code, 404);
    }

    #[test]
    fn disallowed_method_returns_405_with_allow_header() {
        let group = group();
        let mut request = Request::new();
        request.path = "/".to_string();
        request.method = Method::Post;
        let response = route(&group, &request);
        assert_eq!(response.status_code, 405);
        assert_eq!(response.get_header("Allow"), Some("GET"));
    }
}
