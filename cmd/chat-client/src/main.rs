//! Chat client executable
//!
//! Usage: chat-client <host:port>
//!
//! Lines typed on stdin are sent to the server; lines from the server are
//! printed on stdout.

use corokit::{kprint, ChatClient, ChatError};
use std::io::Write;
use std::os::fd::AsRawFd;
use std::time::Duration;

fn main() {
    kprint::init();

    let Some(addr) = std::env::args().nth(1) else {
        println!("Usage: chat-client <host:port>");
        std::process::exit(1);
    };

    let mut client = match ChatClient::new() {
        Ok(client) => client,
        Err(e) => {
            println!("Couldn't create client: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = client.connect(&addr) {
        println!("Couldn't connect: {}", e);
        std::process::exit(1);
    }

    let stdin = std::io::stdin();
    let mut fds = [
        libc::pollfd {
            fd: stdin.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        },
        libc::pollfd {
            fd: client.get_descriptor(),
            events: 0,
            revents: 0,
        },
    ];
    let mut buf = [0u8; 1024];
    let mut stdin_open = true;

    loop {
        fds[0].fd = if stdin_open { stdin.as_raw_fd() } else { -1 };
        fds[1].events = client.get_events().to_poll_events();
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
                // Keep receiving until pending output is flushed.
                stdin_open = false;
            } else if let Err(e) = client.feed(&buf[..n as usize]) {
                println!("Feed error: {}", e);
                break;
            }
        }

        if fds[1].revents != 0 {
            let result = client.update(Some(Duration::ZERO));
            let mut out = std::io::stdout().lock();
            while let Some(msg) = client.pop_next() {
                let _ = out.write_all(msg.as_bytes());
                let _ = out.write_all(b"\n");
            }
            let _ = out.flush();
            match result {
                Ok(()) | Err(ChatError::Timeout) => {}
                Err(e) => {
                    println!("Connection closed: {}", e);
                    break;
                }
            }
        }

        if !stdin_open && client.pending_output() == 0 {
            break;
        }
    }
}
