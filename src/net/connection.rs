//! Per-connection framing state (`spec.md` §4.4 `ConnectionBuffer` &
//! `RequestFramer`).

use std::time::Instant;

use crate::config::ListenerGroup;
use crate::http::{self, ChunkedDecoder, Request, Response};
use crate::net::limits::Limits;

/// Outcome of one framing attempt.
pub enum FrameResult {
    /// A complete request was framed and removed from `inbound`.
    Request(Request),
    /// Not enough bytes yet; try again once more arrive.
    NeedMoreBytes,
    /// The connection violated a framing limit and must be dropped with no
    /// response (the request's boundary could not be determined at all).
    Invalid,
    /// The request is well-formed enough to answer but violates a limit
    /// that has a defined response (`spec.md` §8 End-to-End Scenario #5:
    /// an oversized `Content-Length` gets `413`, not a silent drop).
    Reject(Response),
}

/// Buffered bytes and bookkeeping for one accepted socket.
pub struct ConnectionBuffer {
    pub inbound: Vec<u8>,
    pub outbound: Vec<u8>,
    pub write_pos: usize,
    pub receive_deadline: Option<Instant>,
    pub send_deadline: Option<Instant>,
    pub max_body_size: usize,
    pub data_valid: bool,
    pub keep_alive: bool,
    limits: Limits,
}

impl ConnectionBuffer {
    pub fn new(default_max_body_size: usize, limits: Limits) -> Self {
        ConnectionBuffer {
            inbound: Vec::new(),
            outbound: Vec::new(),
            write_pos: 0,
            receive_deadline: None,
            send_deadline: None,
            max_body_size: default_max_body_size,
            data_valid: true,
            keep_alive: true,
            limits,
        }
    }

    pub fn has_pending_output(&self) -> bool {
        self.write_pos < self.outbound.len()
    }

    pub fn queue_response(&mut self, bytes: Vec<u8>) {
        self.outbound.extend_from_slice(&bytes);
    }

    /// Run the framing algorithm once. Call repeatedly until it reports
    /// `NeedMoreBytes` or `Invalid`, to drain every pipelined request
    /// already sitting in `inbound`.
    pub fn frame_next_request(&mut self, group: &ListenerGroup) -> FrameResult {
        if self.inbound.len() > self.limits.max_buffer_size {
            self.data_valid = false;
            return FrameResult::Invalid;
        }

        let Some(header_end) = find_header_terminator(&self.inbound) else {
            if self.inbound.len() > self.limits.max_header_size {
                self.data_valid = false;
                return FrameResult::Invalid;
            }
            return FrameResult::NeedMoreBytes;
        };

        let header_section_end = header_end + 4;
        let header_bytes = &self.inbound[..header_end];

        let host = extract_host(header_bytes);
        let server = group.select_server(host.as_deref());
        self.max_body_size = server.client_max_body_size;

        let headers_only = http::parser::parse(&self.inbound[..header_section_end], Vec::new());

        if headers_only.is_error {
            self.inbound.drain(..header_section_end);
            return FrameResult::Request(headers_only);
        }

        if headers_only.is_chunked() {
            let mut decoder = ChunkedDecoder::new(self.max_body_size);
            let rest = &self.inbound[header_section_end..];
            match decoder.process(rest) {
                Ok(consumed) if decoder.is_complete() => {
                    let body = decoder.body().to_vec();
                    let total = header_section_end + consumed;
                    let header_bytes = self.inbound[..header_section_end].to_vec();
                    self.inbound.drain(..total);
                    FrameResult::Request(http::parser::parse(&header_bytes, body))
                }
                Ok(_) => FrameResult::NeedMoreBytes,
                Err(_) => {
                    self.data_valid = false;
                    FrameResult::Invalid
                }
            }
        } else if let Some(content_length) = headers_only.content_length() {
            if content_length > self.max_body_size {
                self.data_valid = false;
                self.inbound.clear();
                self.keep_alive = false;
                let response = crate::errors::render(413, &server.error_pages, &[]);
                return FrameResult::Reject(response);
            }
            let available = self.inbound.len().saturating_sub(header_section_end);
            if available < content_length {
                return FrameResult::NeedMoreBytes;
            }
            let total = header_section_end + content_length;
            let header_bytes = self.inbound[..header_section_end].to_vec();
            let body = self.inbound[header_section_end..total].to_vec();
            self.inbound.drain(..total);
            FrameResult::Request(http::parser::parse(&header_bytes, body))
        } else {
            let header_bytes = self.inbound[..header_section_end].to_vec();
            self.inbound.drain(..header_section_end);
            FrameResult::Request(http::parser::parse(&header_bytes, Vec::new()))
        }
    }
}

fn find_header_terminator(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Pull the `Host` header's value out of a raw header section, before the
/// request has been fully parsed (`spec.md` §4.4 step 3 needs it to pick a
/// virtual server and thus a body-size cap, ahead of full request parsing).
fn extract_host(header_bytes: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(header_bytes).ok()?;
    for line in text.split("\r\n").skip(1) {
        let (name, value) = line.split_once(':')?;
        if name.trim().eq_ignore_ascii_case("host") {
            let value = value.trim();
            return Some(value.split(':').next().unwrap_or(value).to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{group_listeners, Location, VirtualServer};
    use crate::http::Method;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn group(max_body_size: usize) -> ListenerGroup {
        let location = Location {
            pattern: "/".to_string(),
            is_extension: false,
            allowed_methods: vec![Method::Get, Method::Post],
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
            client_max_body_size: max_body_size,
            error_pages: HashMap::new(),
            locations: vec![location],
        };
        group_listeners(vec![server]).remove(0)
    }

    #[test]
    fn waits_for_more_bytes_until_headers_complete() {
        let mut buffer = ConnectionBuffer::new(1024, Limits::default());
        buffer.inbound.extend_from_slice(b"GET / HTTP/1.1\r\nHost: localhost\r\n");
        assert!(matches!(buffer.frame_next_request(&group(1024)), FrameResult::NeedMoreBytes));
    }

    #[test]
    fn frames_a_simple_request_with_no_body() {
        let mut buffer = ConnectionBuffer::new(1024, Limits::default());
        buffer.inbound.extend_from_slice(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n");
        match buffer.frame_next_request(&group(1024)) {
            FrameResult::Request(request) => {
                assert_eq!(request.path, "/");
                assert!(request.body.is_empty());
            }
            _ => panic!("expected a framed request"),
        }
        assert!(buffer.inbound.is_empty());
    }

    #[test]
    fn waits_for_full_content_length_body() {
        let mut buffer = ConnectionBuffer::new(1024, Limits::default());
        buffer.inbound.extend_from_slice(b"POST / HTTP/1.1\r\nHost: localhost\r\nContent-Length: 5\r\n\r\nhel");
        assert!(matches!(buffer.frame_next_request(&group(1024)), FrameResult::NeedMoreBytes));
        buffer.inbound.extend_from_slice(b"lo");
        match buffer.frame_next_request(&group(1024)) {
            FrameResult::Request(request) => assert_eq!(request.body, b"hello"),
            _ => panic!("expected a framed request"),
        }
    }

    #[test]
    fn oversized_content_length_rejects_with_413() {
        let mut buffer = ConnectionBuffer::new(1024, Limits::default());
        buffer.inbound.extend_from_slice(b"POST / HTTP/1.1\r\nHost: localhost\r\nContent-Length: 2000\r\n\r\n");
        match buffer.frame_next_request(&group(1024)) {
            FrameResult::Reject(response) => assert_eq!(response.status_code, 413),
            _ => panic!("expected a 413 rejection"),
        }
        assert!(!buffer.data_valid);
        assert!(!buffer.keep_alive);
        assert!(buffer.inbound.is_empty());
    }

    #[test]
    fn frames_pipelined_requests_one_at_a_time() {
        let mut buffer = ConnectionBuffer::new(1024, Limits::default());
        buffer.inbound.extend_from_slice(b"GET /a HTTP/1.1\r\nHost: localhost\r\n\r\nGET /b HTTP/1.1\r\nHost: localhost\r\n\r\n");
        let first = match buffer.frame_next_request(&group(1024)) {
            FrameResult::Request(r) => r,
            _ => panic!("expected a framed request"),
        };
        assert_eq!(first.path, "/a");
        let second = match buffer.frame_next_request(&group(1024)) {
            FrameResult::Request(r) => r,
            _ => panic!("expected a framed request"),
        };
        assert_eq!(second.path, "/b");
    }

    #[test]
    fn decodes_chunked_body() {
        let mut buffer = ConnectionBuffer::new(1024, Limits::default());
        buffer.inbound.extend_from_slice(
            b"POST / HTTP/1.1\r\nHost: localhost\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nHello\r\n0\r\n\r\n",
        );
        match buffer.frame_next_request(&group(1024)) {
            FrameResult::Request(request) => assert_eq!(request.body, b"Hello"),
            _ => panic!("expected a framed request"),
        }
    }
}
