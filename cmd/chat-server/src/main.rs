//! Chat server executable
//!
//! Usage: chat-server <port>
//!
//! Lines typed on stdin are broadcast to every client; lines from clients
//! are printed on stdout.

use corokit::{kprint, ChatError, ChatServer};
use std::io::Write;
use std::os::fd::AsRawFd;
use std::time::Duration;

fn main() {
    kprint::init();

    let Some(arg) = std::env::args().nth(1) else {
        println!("Usage: chat-server <port>");
        std::process::exit(1);
    };
    let Ok(port) = arg.parse::<u16>() else {
        println!("Invalid port");
        std::process::exit(1);
    };

    let mut server = match ChatServer::new() {
        Ok(server) => server,
        Err(e) => {
            println!("Couldn't create server: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = server.listen(port) {
        println!("Couldn't listen: {}", e);
        std::process::exit(1);
    }
    println!("Listening on port {}", port);

    let stdin = std::io::stdin();
    let mut fds = [
        libc::pollfd {
            fd: stdin.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        },
        libc::pollfd {
            fd: server.get_descriptor(),
            events: 0,
            revents: 0,
        },
    ];
    let mut buf = [0u8; 1024];

    loop {
        fds[1].events = server.get_events().to_poll_events();
        fds[0].revents = 0;
        fds[1].revents = 0;

        let rc = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, -1) };
        if rc < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            println!("Poll error: {}", err);
            break;
        }

        if fds[0].revents != 0 {
            let n = unsafe { libc::read(fds[0].fd, buf.as_mut_ptr().cast(), buf.len()) };
            if n <= 0 {
                println!("EOF - exiting");
                break;
            }
            if let Err(e) = server.feed(&buf[..n as usize]) {
                println!("Feed error: {}", e);
                break;
            }
        }

        if fds[1].revents != 0 {
            match server.update(Some(Duration::ZERO)) {
                Ok(()) | Err(ChatError::Timeout) => {}
                Err(e) => {
                    println!("Update error: {}", e);
                    break;
                }
            }
        }

        let mut out = std::io::stdout().lock();
        while let Some(msg) = server.pop_next() {
            if !msg.is_server_message {
                let _ = out.write_all(msg.as_bytes());
                let _ = out.write_all(b"\n");
            }
        }
        let _ = out.flush();
    }
}
