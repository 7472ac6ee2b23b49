//! Cluster-wide tunables no config directive names (`spec.md` §4.9/§4.4),
//! grouped the way the prior tree grouped `TimeoutConfig`.

use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_buffer_size: usize,
    pub max_header_size: usize,
    pub max_response_chunk: usize,
    pub poll_timeout: Duration,
    pub receive_timeout: Duration,
    pub send_timeout: Duration,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_buffer_size: 10 * 1024 * 1024,
            max_header_size: 8 * 1024,
            max_response_chunk: 64 * 1024,
            poll_timeout: Duration::from_millis(100),
            receive_timeout: Duration::from_millis(2_000_000),
            send_timeout: Duration::from_millis(10_000),
        }
    }
}
