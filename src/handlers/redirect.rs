use crate::config::Location;
use crate::errors;
use crate::http::Response;

/// Produce a `302 Found` for a `return` location (`spec.md` §4.7 `redirect`).
pub fn handle(location: &Location) -> Response {
    let Some(target) = &location.return_url else {
        return errors::render(404, &Default::default(), &[]);
    };

    let mut response = Response::new(302);
    response.set_header("Location", target);
    response.set_header("Content-Type", "text/html");
    response.set_body_string(format!(
        "<!DOCTYPE html><html><head><title>302 Found</title></head>\
         <body><h1>302 Found</h1><p>See <a href=\"{target}\">{target}</a>.</p></body></html>"
    ));
    response
}
