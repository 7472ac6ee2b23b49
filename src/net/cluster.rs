//! The single-threaded `poll()`-based event loop (`spec.md` §4.9, grounded on
//! the original `Cluster::run()`'s one-`poll`-per-iteration shape).

use std::collections::HashMap;
use std::io;
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::config::ListenerGroup;
use crate::error::DropReason;
use crate::net::connection::{ConnectionBuffer, FrameResult};
use crate::net::limits::Limits;
use crate::net::listener::Listener;
use crate::net::timeout;
use crate::router;

const RECV_CHUNK: usize = 4096;

fn max_clients() -> usize {
    let limit = unsafe {
        let mut rl: libc::rlimit = std::mem::zeroed();
        if libc::getrlimit(libc::RLIMIT_NOFILE, &mut rl) == 0 {
            rl.rlim_cur as usize
        } else {
            1024
        }
    };
    900.min(limit.saturating_sub(100))
}

struct ListenerEntry {
    listener: Listener,
    group: ListenerGroup,
}

struct ClientConnection {
    fd: RawFd,
    listener_index: usize,
    buffer: ConnectionBuffer,
}

/// Runs every listener group on one thread, one `poll()` call per iteration.
pub struct EventLoop {
    listeners: Vec<ListenerEntry>,
    clients: HashMap<RawFd, ClientConnection>,
    max_clients: usize,
    limits: Limits,
}

impl EventLoop {
    pub fn new(groups: Vec<ListenerGroup>, limits: Limits) -> io::Result<Self> {
        let mut listeners = Vec::with_capacity(groups.len());
        for group in groups {
            let listener = Listener::bind(&group.bind_address, group.port)?;
            log::info!("listening on {}:{}", group.bind_address, group.port);
            listeners.push(ListenerEntry { listener, group });
        }
        Ok(EventLoop { listeners, clients: HashMap::new(), max_clients: max_clients(), limits })
    }

    /// Run until `shutdown` is set (checked once per iteration, after the
    /// `poll()` call returns).
    pub fn run(&mut self, shutdown: &'static AtomicBool) -> io::Result<()> {
        loop {
            if shutdown.load(Ordering::Relaxed) {
                log::info!("shutdown requested, draining {} client(s)", self.clients.len());
                return Ok(());
            }

            let mut poll_fds = self.build_poll_fds();
            let poll_timeout_ms = self.limits.poll_timeout.as_millis() as libc::c_int;
            let ready = unsafe { libc::poll(poll_fds.as_mut_ptr(), poll_fds.len() as libc::nfds_t, poll_timeout_ms) };

            if ready < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(err);
            }

            if shutdown.load(Ordering::Relaxed) {
                return Ok(());
            }

            self.dispatch_ready(&poll_fds);
            self.check_timeouts();
        }
    }

    fn build_poll_fds(&self) -> Vec<libc::pollfd> {
        let mut poll_fds = Vec::with_capacity(self.listeners.len() + self.clients.len());
        for entry in &self.listeners {
            poll_fds.push(libc::pollfd { fd: entry.listener.fd, events: libc::POLLIN, revents: 0 });
        }
        for client in self.clients.values() {
            let mut events = libc::POLLIN;
            if client.buffer.has_pending_output() {
                events |= libc::POLLOUT;
            }
            poll_fds.push(libc::pollfd { fd: client.fd, events, revents: 0 });
        }
        poll_fds
    }

    fn dispatch_ready(&mut self, poll_fds: &[libc::pollfd]) {
        let listener_count = self.listeners.len();

        for (i, pfd) in poll_fds.iter().enumerate() {
            if pfd.revents == 0 {
                continue;
            }
            if i < listener_count {
                if pfd.revents & libc::POLLIN != 0 {
                    self.accept_on(i);
                }
                continue;
            }
            if pfd.revents & libc::POLLIN != 0 {
                self.handle_readable(pfd.fd);
            }
            if pfd.revents & libc::POLLOUT != 0 {
                self.handle_writable(pfd.fd);
            }
        }
    }

    fn accept_on(&mut self, listener_index: usize) {
        loop {
            if self.clients.len() >= self.max_clients {
                return;
            }
            match self.listeners[listener_index].listener.accept() {
                Ok((fd, peer)) => {
                    log::info!("accepted {peer} on fd {fd}");
                    let default_body_size = self.listeners[listener_index].group.servers[0].client_max_body_size;
                    self.clients.insert(
                        fd,
                        ClientConnection {
                            fd,
                            listener_index,
                            buffer: ConnectionBuffer::new(default_body_size, self.limits),
                        },
                    );
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) => {
                    log::warn!("accept failed: {e}");
                    return;
                }
            }
        }
    }

    fn handle_readable(&mut self, fd: RawFd) {
        let mut chunk = [0u8; RECV_CHUNK];
        let mut got_any = false;

        loop {
            let n = unsafe { libc::recv(fd, chunk.as_mut_ptr() as *mut libc::c_void, chunk.len(), 0) };
            if n > 0 {
                got_any = true;
                if let Some(client) = self.clients.get_mut(&fd) {
                    client.buffer.inbound.extend_from_slice(&chunk[..n as usize]);
                    client.buffer.receive_deadline = Some(Instant::now());
                }
            } else if n == 0 {
                self.drop_client(fd, DropReason::PeerClosed);
                return;
            } else {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::WouldBlock {
                    break;
                }
                self.drop_client(fd, DropReason::RecvError);
                return;
            }
        }

        if got_any {
            self.drain_requests(fd);
        }
    }

    fn drain_requests(&mut self, fd: RawFd) {
        loop {
            let listener_index = match self.clients.get(&fd) {
                Some(c) => c.listener_index,
                None => return,
            };
            let group = &self.listeners[listener_index].group;

            let outcome = match self.clients.get_mut(&fd) {
                Some(client) => client.buffer.frame_next_request(group),
                None => return,
            };

            match outcome {
                FrameResult::Request(request) => {
                    let response_bytes = {
                        let mut response = router::route(group, &request);
                        let keep_alive = !request.is_error && request.wants_keep_alive();
                        response.set_keep_alive(keep_alive);
                        if let Some(client) = self.clients.get_mut(&fd) {
                            client.buffer.keep_alive = keep_alive;
                        }
                        response.to_bytes()
                    };
                    if let Some(client) = self.clients.get_mut(&fd) {
                        client.buffer.queue_response(response_bytes);
                        client.buffer.send_deadline = Some(Instant::now());
                    }
                }
                FrameResult::NeedMoreBytes => return,
                FrameResult::Invalid => {
                    self.drop_client(fd, DropReason::Malformed);
                    return;
                }
                FrameResult::Reject(mut response) => {
                    response.set_keep_alive(false);
                    let response_bytes = response.to_bytes();
                    if let Some(client) = self.clients.get_mut(&fd) {
                        client.buffer.queue_response(response_bytes);
                        client.buffer.send_deadline = Some(Instant::now());
                    }
                    return;
                }
            }
        }
    }

    fn handle_writable(&mut self, fd: RawFd) {
        let Some(client) = self.clients.get_mut(&fd) else { return };
        if !client.buffer.has_pending_output() {
            return;
        }

        let remaining = &client.buffer.outbound[client.buffer.write_pos..];
        let to_send = remaining.len().min(self.limits.max_response_chunk);
        let n = unsafe { libc::send(fd, remaining.as_ptr() as *const libc::c_void, to_send, 0) };

        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::WouldBlock {
                self.drop_client(fd, DropReason::SendError);
            }
            return;
        }

        client.buffer.write_pos += n as usize;
        if !client.buffer.has_pending_output() {
            client.buffer.send_deadline = None;
            let should_close = !client.buffer.keep_alive;
            client.buffer.outbound.clear();
            client.buffer.write_pos = 0;
            if should_close {
                self.drop_client(fd, DropReason::ResponseComplete);
            }
        }
    }

    fn check_timeouts(&mut self) {
        let mut to_drop = Vec::new();
        for client in self.clients.values() {
            let receive_timed_out = timeout::receive_timed_out(
                client.buffer.receive_deadline,
                !client.buffer.inbound.is_empty(),
                self.limits.receive_timeout,
            );
            let send_timed_out = timeout::send_timed_out(
                client.buffer.send_deadline,
                client.buffer.has_pending_output(),
                self.limits.send_timeout,
            );
            if receive_timed_out {
                to_drop.push((client.fd, DropReason::ReceiveTimeout));
            } else if send_timed_out {
                to_drop.push((client.fd, DropReason::SendTimeout));
            }
        }
        for (fd, reason) in to_drop {
            self.drop_client(fd, reason);
        }
    }

    fn drop_client(&mut self, fd: RawFd, reason: DropReason) {
        if self.clients.remove(&fd).is_some() {
            log::info!("dropping connection fd {fd}: {reason}");
            unsafe {
                libc::close(fd);
            }
        }
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        for fd in self.clients.keys() {
            unsafe {
                libc::close(*fd);
            }
        }
    }
}
