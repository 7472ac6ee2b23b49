use std::io;

/// Chunked transfer-encoding decoder state (`spec.md` §4.4.1). Only
/// incoming decoding is needed: the server never emits chunked responses
/// (`spec.md` §6 — every response carries `Content-Length`).
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkedState {
    ChunkSize,
    ChunkData { size: usize, read: usize },
    ChunkTrailer,
    Trailer,
    Complete,
}

/// Incremental chunked-body decoder. `process` may be called repeatedly as
/// more bytes arrive; it reports how many bytes of `data` it consumed so the
/// caller (the `RequestFramer`) can advance its own cursor.
#[derive(Debug)]
pub struct ChunkedDecoder {
    state: ChunkedState,
    buffer: Vec<u8>,
    body: Vec<u8>,
    max_body_size: usize,
    trailer_headers: Vec<(String, String)>,
}

impl ChunkedDecoder {
    pub fn new(max_body_size: usize) -> Self {
        ChunkedDecoder {
            state: ChunkedState::ChunkSize,
            buffer: Vec::new(),
            body: Vec::new(),
            max_body_size,
            trailer_headers: Vec::new(),
        }
    }

    pub fn process(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut consumed = 0;
        let mut pos = 0;

        while pos < data.len() {
            match &self.state {
                ChunkedState::ChunkSize => {
                    let (used, new_state) = self.parse_chunk_size(&data[pos..])?;
                    pos += used;
                    consumed += used;
                    self.state = new_state;
                }
                ChunkedState::ChunkData { size, read } => {
                    let remaining = size - read;
                    let available = data.len() - pos;
                    let to_read = remaining.min(available);

                    if self.body.len() + to_read > self.max_body_size {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            "chunked body exceeds client_max_body_size",
                        ));
                    }

                    self.body.extend_from_slice(&data[pos..pos + to_read]);
                    pos += to_read;
                    consumed += to_read;

                    let new_read = read + to_read;
                    self.state = if new_read == *size {
                        ChunkedState::ChunkTrailer
                    } else {
                        ChunkedState::ChunkData { size: *size, read: new_read }
                    };
                }
                ChunkedState::ChunkTrailer => {
                    let (used, new_state) = self.parse_chunk_trailer(&data[pos..])?;
                    pos += used;
                    consumed += used;
                    self.state = new_state;
                }
                ChunkedState::Trailer => {
                    let (used, new_state) = self.parse_trailer(&data[pos..])?;
                    pos += used;
                    consumed += used;
                    self.state = new_state;
                }
                ChunkedState::Complete => break,
            }
        }

        Ok(consumed)
    }

    /// Chunk-size line: hex integer, optional `;extension` suffix ignored.
    /// A bad hex line fails the request outright, per `spec.md` §4.4.1.
    fn parse_chunk_size(&mut self, data: &[u8]) -> io::Result<(usize, ChunkedState)> {
        self.buffer.extend_from_slice(data);

        let Some(crlf_pos) = find_line_end(&self.buffer) else {
            return Ok((data.len(), ChunkedState::ChunkSize));
        };

        let line = &self.buffer[..crlf_pos.0];
        let line_str = std::str::from_utf8(line)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "invalid UTF-8 in chunk size line"))?;
        let size_str = line_str.split(';').next().unwrap_or(line_str).trim();
        let chunk_size = usize::from_str_radix(size_str, 16)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "invalid chunk size"))?;

        let consumed = crlf_pos.1;
        self.buffer.drain(..consumed);

        if chunk_size == 0 {
            Ok((consumed, ChunkedState::Trailer))
        } else {
            Ok((consumed, ChunkedState::ChunkData { size: chunk_size, read: 0 }))
        }
    }

    fn parse_chunk_trailer(&mut self, data: &[u8]) -> io::Result<(usize, ChunkedState)> {
        self.buffer.extend_from_slice(data);

        if self.buffer.len() >= 2 && &self.buffer[..2] == b"\r\n" {
            self.buffer.drain(..2);
            Ok((2, ChunkedState::ChunkSize))
        } else if self.buffer.first() == Some(&b'\n') {
            self.buffer.drain(..1);
            Ok((1, ChunkedState::ChunkSize))
        } else if !self.buffer.is_empty() && self.buffer[0] != b'\r' && self.buffer[0] != b'\n' {
            Err(io::Error::new(io::ErrorKind::InvalidData, "expected CRLF after chunk data"))
        } else {
            Ok((data.len(), ChunkedState::ChunkTrailer))
        }
    }

    /// Trailers block after the terminating `0` chunk. Absence of the
    /// closing blank line means "wait for more bytes", never an error
    /// (`spec.md` §4.4.1: "absence = incomplete, not error").
    fn parse_trailer(&mut self, data: &[u8]) -> io::Result<(usize, ChunkedState)> {
        self.buffer.extend_from_slice(data);

        if let Some(empty_line_pos) = find_empty_line(&self.buffer) {
            let headers_str = std::str::from_utf8(&self.buffer[..empty_line_pos])
                .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "invalid UTF-8 in trailers"))?;

            for line in headers_str.lines() {
                if let Some(colon_pos) = line.find(':') {
                    let name = line[..colon_pos].trim().to_string();
                    let value = line[colon_pos + 1..].trim().to_string();
                    self.trailer_headers.push((name, value));
                }
            }

            let consumed = empty_line_pos + 4;
            self.buffer.drain(..consumed);
            Ok((consumed, ChunkedState::Complete))
        } else if self.buffer.len() >= 2 && &self.buffer[..2] == b"\r\n" {
            self.buffer.drain(..2);
            Ok((2, ChunkedState::Complete))
        } else {
            Ok((data.len(), ChunkedState::Trailer))
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.state, ChunkedState::Complete)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn trailer_headers(&self) -> &[(String, String)] {
        &self.trailer_headers
    }
}

/// Find a line terminated by CRLF or bare LF; returns `((line_len, consumed))`.
fn find_line_end(buffer: &[u8]) -> Option<(usize, usize)> {
    if let Some(p) = buffer.windows(2).position(|w| w == b"\r\n") {
        return Some((p, p + 2));
    }
    buffer.iter().position(|&b| b == b'\n').map(|p| (p, p + 1))
}

fn find_empty_line(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|w| w == b"\r\n\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_simple_chunked_body() {
        let mut decoder = ChunkedDecoder::new(4096);
        let data = b"5\r\nHello\r\n5\r\nWorld\r\n0\r\n\r\n";
        let consumed = decoder.process(data).unwrap();
        assert_eq!(consumed, data.len());
        assert!(decoder.is_complete());
        assert_eq!(decoder.body(), b"HelloWorld");
    }

    #[test]
    fn decodes_with_trailer_headers() {
        let mut decoder = ChunkedDecoder::new(4096);
        let data = b"4\r\nTest\r\n0\r\nX-Custom: value\r\n\r\n";
        decoder.process(data).unwrap();
        assert!(decoder.is_complete());
        assert_eq!(decoder.body(), b"Test");
        assert_eq!(decoder.trailer_headers()[0], ("X-Custom".to_string(), "value".to_string()));
    }

    #[test]
    fn decodes_incrementally_across_reads() {
        let mut decoder = ChunkedDecoder::new(4096);
        decoder.process(b"5\r\n").unwrap();
        assert!(!decoder.is_complete());
        decoder.process(b"Hello\r\n").unwrap();
        assert!(!decoder.is_complete());
        decoder.process(b"0\r\n\r\n").unwrap();
        assert!(decoder.is_complete());
        assert_eq!(decoder.body(), b"Hello");
    }

    #[test]
    fn rejects_body_over_max_size() {
        let mut decoder = ChunkedDecoder::new(4);
        let data = b"5\r\nHello\r\n0\r\n\r\n";
        assert!(decoder.process(data).is_err());
    }

    #[test]
    fn rejects_bad_hex_chunk_size() {
        let mut decoder = ChunkedDecoder::new(4096);
        assert!(decoder.process(b"zz\r\n").is_err());
    }

    #[test]
    fn wikipedia_example_matches_spec_scenario_4() {
        let mut decoder = ChunkedDecoder::new(4096);
        let data = b"4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n";
        decoder.process(data).unwrap();
        assert_eq!(decoder.body(), b"Wikipedia");
    }
}
