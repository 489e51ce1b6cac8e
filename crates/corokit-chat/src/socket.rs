//! Non-blocking IPv4 TCP sockets over libc
//!
//! Thin wrappers returning `Errno` so callers can tell `EAGAIN` apart
//! from real failures. The descriptor closes on drop.

use nix::errno::Errno;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

pub(crate) struct Socket {
    fd: OwnedFd,
}

fn sockaddr_in(addr: &SocketAddrV4) -> libc::sockaddr_in {
    let mut sin: libc::sockaddr_in = unsafe { std::mem::zeroed() };
    sin.sin_family = libc::AF_INET as libc::sa_family_t;
    sin.sin_port = addr.port().to_be();
    sin.sin_addr.s_addr = u32::from(*addr.ip()).to_be();
    sin
}

const SOCKADDR_IN_LEN: libc::socklen_t = std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;

impl Socket {
    /// New non-blocking, close-on-exec TCP socket
    pub(crate) fn stream() -> Result<Self, Errno> {
        let fd = Errno::result(unsafe {
            libc::socket(
                libc::AF_INET,
                libc::SOCK_STREAM | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
                0,
            )
        })?;
        Ok(Socket {
            fd: unsafe { OwnedFd::from_raw_fd(fd) },
        })
    }

    pub(crate) fn set_reuseaddr(&self) -> Result<(), Errno> {
        let opt: libc::c_int = 1;
        Errno::result(unsafe {
            libc::setsockopt(
                self.as_raw_fd(),
                libc::SOL_SOCKET,
                libc::SO_REUSEADDR,
                &opt as *const _ as *const libc::c_void,
                std::mem::size_of_val(&opt) as libc::socklen_t,
            )
        })
        .map(drop)
    }

    pub(crate) fn bind(&self, addr: &SocketAddrV4) -> Result<(), Errno> {
        let sin = sockaddr_in(addr);
        Errno::result(unsafe {
            libc::bind(
                self.as_raw_fd(),
                &sin as *const _ as *const libc::sockaddr,
                SOCKADDR_IN_LEN,
            )
        })
        .map(drop)
    }

    pub(crate) fn listen(&self, backlog: i32) -> Result<(), Errno> {
        Errno::result(unsafe { libc::listen(self.as_raw_fd(), backlog) }).map(drop)
    }

    /// Accept one pending connection as a non-blocking socket
    pub(crate) fn accept(&self) -> Result<Socket, Errno> {
        let fd = Errno::result(unsafe {
            libc::accept4(
                self.as_raw_fd(),
                std::ptr::null_mut(),
                std::ptr::null_mut(),
                libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
            )
        })?;
        Ok(Socket {
            fd: unsafe { OwnedFd::from_raw_fd(fd) },
        })
    }

    /// Start connecting; `Ok(true)` when already connected, `Ok(false)`
    /// while in progress
    pub(crate) fn connect(&self, addr: &SocketAddrV4) -> Result<bool, Errno> {
        let sin = sockaddr_in(addr);
        let ret = unsafe {
            libc::connect(
                self.as_raw_fd(),
                &sin as *const _ as *const libc::sockaddr,
                SOCKADDR_IN_LEN,
            )
        };
        match Errno::result(ret) {
            Ok(_) => Ok(true),
            Err(Errno::EINPROGRESS) => Ok(false),
            Err(errno) => Err(errno),
        }
    }

    /// Pending `SO_ERROR`, cleared by the read
    pub(crate) fn take_error(&self) -> Result<Option<Errno>, Errno> {
        let mut err: libc::c_int = 0;
        let mut len = std::mem::size_of_val(&err) as libc::socklen_t;
        Errno::result(unsafe {
            libc::getsockopt(
                self.as_raw_fd(),
                libc::SOL_SOCKET,
                libc::SO_ERROR,
                &mut err as *mut _ as *mut libc::c_void,
                &mut len,
            )
        })?;
        Ok((err != 0).then(|| Errno::from_raw(err)))
    }

    pub(crate) fn local_addr(&self) -> Result<SocketAddrV4, Errno> {
        let mut sin: libc::sockaddr_in = unsafe { std::mem::zeroed() };
        let mut len = SOCKADDR_IN_LEN;
        Errno::result(unsafe {
            libc::getsockname(
                self.as_raw_fd(),
                &mut sin as *mut _ as *mut libc::sockaddr,
                &mut len,
            )
        })?;
        Ok(SocketAddrV4::new(
            Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr)),
            u16::from_be(sin.sin_port),
        ))
    }

    /// `send` with `MSG_NOSIGNAL`; a closed peer is `EPIPE`, not `SIGPIPE`
    pub(crate) fn send(&self, buf: &[u8]) -> Result<usize, Errno> {
        let n = Errno::result(unsafe {
            libc::send(
                self.as_raw_fd(),
                buf.as_ptr() as *const libc::c_void,
                buf.len(),
                libc::MSG_NOSIGNAL,
            )
        })?;
        Ok(n as usize)
    }

    pub(crate) fn recv(&self, buf: &mut [u8]) -> Result<usize, Errno> {
        let n = Errno::result(unsafe {
            libc::recv(
                self.as_raw_fd(),
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
                0,
            )
        })?;
        Ok(n as usize)
    }
}

impl AsRawFd for Socket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

/// `recv` in `chunk`-sized pieces into `out` until `EAGAIN` or EOF.
/// Returns `true` on EOF.
pub(crate) fn recv_all(
    socket: &Socket,
    chunk: &mut [u8],
    out: &mut crate::buffer::GrowableBuffer,
) -> Result<bool, Errno> {
    loop {
        match socket.recv(chunk) {
            Ok(0) => return Ok(true),
            Ok(n) => out.append(&chunk[..n]),
            Err(Errno::EAGAIN) => return Ok(false),
            Err(Errno::EINTR) => continue,
            Err(errno) => return Err(errno),
        }
    }
}

/// `send` the pending part of `out` until it is empty or `EAGAIN`
///
/// A fully sent buffer is cleared. Returns whether anything is left.
pub(crate) fn send_pending(
    socket: &Socket,
    out: &mut crate::buffer::GrowableBuffer,
) -> Result<bool, Errno> {
    while out.has_pending() {
        match socket.send(out.pending()) {
            Ok(0) => return Err(Errno::EPIPE),
            Ok(n) => out.advance(n),
            Err(Errno::EAGAIN) => return Ok(true),
            Err(Errno::EINTR) => continue,
            Err(errno) => return Err(errno),
        }
    }
    out.clear();
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::GrowableBuffer;

    #[test]
    fn test_loopback_connect_send_recv() {
        let listener = Socket::stream().unwrap();
        listener.set_reuseaddr().unwrap();
        listener.bind(&SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0)).unwrap();
        listener.listen(8).unwrap();
        let addr = listener.local_addr().unwrap();
        assert_ne!(addr.port(), 0);

        let client = Socket::stream().unwrap();
        let _ = client.connect(&addr).unwrap();

        let peer = loop {
            match listener.accept() {
                Ok(peer) => break peer,
                Err(Errno::EAGAIN) => std::thread::sleep(std::time::Duration::from_millis(1)),
                Err(errno) => panic!("accept: {errno}"),
            }
        };
        assert_eq!(client.take_error().unwrap(), None);

        let mut out = GrowableBuffer::new();
        out.append(b"ping\n");
        while send_pending(&client, &mut out).unwrap() {}
        assert!(out.is_empty());

        let mut chunk = [0u8; 2];
        let mut input = GrowableBuffer::new();
        while input.len() < 5 {
            assert!(!recv_all(&peer, &mut chunk, &mut input).unwrap());
        }
        assert_eq!(input.as_slice(), b"ping\n");

        drop(client);
        while !recv_all(&peer, &mut chunk, &mut input).unwrap() {
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        assert_eq!(input.len(), 5);
    }
}
