//! Connection deadlines (`spec.md` §4.9 "Timeouts"). Each `ConnectionBuffer`
//! tracks its own `receive_deadline`/`send_deadline`; this module only
//! compares them against the thresholds carried on `net::Limits`.

use std::time::Instant;

pub fn receive_timed_out(deadline: Option<Instant>, inbound_nonempty: bool, threshold: std::time::Duration) -> bool {
    inbound_nonempty && deadline.is_some_and(|d| d.elapsed() > threshold)
}

pub fn send_timed_out(deadline: Option<Instant>, outbound_nonempty: bool, threshold: std::time::Duration) -> bool {
    outbound_nonempty && deadline.is_some_and(|d| d.elapsed() > threshold)
}
