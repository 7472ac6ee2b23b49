//! Listening socket creation (`spec.md` §4.3).

use std::io;
use std::mem;
use std::net::Ipv4Addr;
use std::os::unix::io::RawFd;

/// One bound, listening `AF_INET` socket. Closed on drop.
pub struct Listener {
    pub fd: RawFd,
    pub bind_address: String,
    pub port: u16,
}

impl Listener {
    /// Create the socket, set `O_NONBLOCK`, bind, and `listen(SOMAXCONN)`.
    /// Any failed step aborts startup (`spec.md` §4.3: "fatal error on any
    /// step aborts startup").
    pub fn bind(bind_address: &str, port: u16) -> io::Result<Self> {
        let address: Ipv4Addr = bind_address
            .parse()
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, format!("bad bind address: {bind_address}")))?;

        unsafe {
            let fd = libc::socket(libc::AF_INET, libc::SOCK_STREAM, 0);
            if fd < 0 {
                return Err(io::Error::last_os_error());
            }

            let reuse: libc::c_int = 1;
            libc::setsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_REUSEADDR,
                &reuse as *const _ as *const libc::c_void,
                mem::size_of::<libc::c_int>() as libc::socklen_t,
            );

            if set_nonblocking(fd).is_err() {
                let e = io::Error::last_os_error();
                libc::close(fd);
                return Err(e);
            }

            let addr = libc::sockaddr_in {
                sin_family: libc::AF_INET as libc::sa_family_t,
                sin_port: port.to_be(),
                sin_addr: libc::in_addr { s_addr: u32::from(address).to_be() },
                sin_zero: [0; 8],
            };

            if libc::bind(fd, &addr as *const _ as *const libc::sockaddr, mem::size_of::<libc::sockaddr_in>() as u32) < 0 {
                let e = io::Error::last_os_error();
                libc::close(fd);
                return Err(e);
            }

            if libc::listen(fd, libc::SOMAXCONN) < 0 {
                let e = io::Error::last_os_error();
                libc::close(fd);
                return Err(e);
            }

            Ok(Listener { fd, bind_address: bind_address.to_string(), port })
        }
    }

    /// Accept a pending connection, returning the client's file descriptor
    /// (already non-blocking) and its peer address.
    pub fn accept(&self) -> io::Result<(RawFd, String)> {
        unsafe {
            let mut addr: libc::sockaddr_in = mem::zeroed();
            let mut len = mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;
            let client_fd = libc::accept(self.fd, &mut addr as *mut _ as *mut libc::sockaddr, &mut len);
            if client_fd < 0 {
                return Err(io::Error::last_os_error());
            }
            if set_nonblocking(client_fd).is_err() {
                let e = io::Error::last_os_error();
                libc::close(client_fd);
                return Err(e);
            }
            let ip = Ipv4Addr::from(u32::from_be(addr.sin_addr.s_addr));
            Ok((client_fd, format!("{ip}:{}", u16::from_be(addr.sin_port))))
        }
    }
}

fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL, 0);
        if flags < 0 {
            return Err(io::Error::last_os_error());
        }
        if libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

impl Drop for Listener {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}
