use crate::http::Response;

/// A parsed CGI script output (`spec.md` §4.8 "Parsing CGI output").
#[derive(Debug, Clone)]
pub struct CgiResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CgiResponse {
    /// Split at the first `CRLF CRLF` (falling back to `LF LF`). Everything
    /// before is header lines, everything after is the body. A `Status:`
    /// header sets the response status; anything else is copied verbatim.
    /// Output with no separator at all is treated as a bodyless-headers
    /// response: the whole thing becomes the body with defaults.
    pub fn parse(data: &[u8]) -> CgiResponse {
        let split = find_separator(data);

        let (header_bytes, body): (&[u8], &[u8]) = match split {
            Some((pos, sep_len)) => (&data[..pos], &data[pos + sep_len..]),
            None => (&[], data),
        };

        let mut status = 200u16;
        let mut headers = Vec::new();
        let mut has_content_type = false;

        if let Ok(header_str) = std::str::from_utf8(header_bytes) {
            for line in header_str.split("\r\n").flat_map(|l| l.split('\n')) {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let Some((name, value)) = line.split_once(':') else { continue };
                let name = name.trim();
                let value = value.trim();

                if name.eq_ignore_ascii_case("status") {
                    if let Some(code) = value.split_whitespace().next().and_then(|s| s.parse::<u16>().ok()) {
                        status = code;
                    }
                    continue;
                }
                if name.eq_ignore_ascii_case("content-type") {
                    has_content_type = true;
                }
                headers.push((name.to_string(), value.to_string()));
            }
        }

        if !has_content_type {
            headers.push(("Content-Type".to_string(), "text/html".to_string()));
        }

        CgiResponse { status, headers, body: body.to_vec() }
    }

    pub fn into_response(self) -> Response {
        let mut response = Response::new(self.status);
        for (name, value) in self.headers {
            response.set_header(&name, &value);
        }
        response.set_body(self.body);
        response
    }
}

fn find_separator(data: &[u8]) -> Option<(usize, usize)> {
    if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
        return Some((pos, 4));
    }
    data.windows(2).position(|w| w == b"\n\n").map(|pos| (pos, 2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_200_and_text_html_with_no_status_header() {
        let output = b"Content-Type: text/html\r\n\r\n<html><body>Hi</body></html>";
        let parsed = CgiResponse::parse(output);
        assert_eq!(parsed.status, 200);
        assert_eq!(parsed.body, b"<html><body>Hi</body></html>");
    }

    #[test]
    fn status_header_sets_response_status() {
        let output = b"Status: 404 Not Found\r\nContent-Type: text/plain\r\n\r\nPage not found";
        let parsed = CgiResponse::parse(output);
        assert_eq!(parsed.status, 404);
        assert_eq!(parsed.body, b"Page not found");
    }

    #[test]
    fn missing_content_type_defaults_to_text_html() {
        let output = b"X-Custom: 1\r\n\r\nbody";
        let parsed = CgiResponse::parse(output);
        assert!(parsed.headers.iter().any(|(k, v)| k == "Content-Type" && v == "text/html"));
    }

    #[test]
    fn no_separator_means_whole_output_is_body() {
        let output = b"just raw output, no headers";
        let parsed = CgiResponse::parse(output);
        assert_eq!(parsed.status, 200);
        assert_eq!(parsed.body, output);
    }

    #[test]
    fn lf_only_separator_is_accepted() {
        let output = b"Content-Type: text/plain\n\nhello";
        let parsed = CgiResponse::parse(output);
        assert_eq!(parsed.body, b"hello");
    }
}
