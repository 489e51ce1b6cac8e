//! Chat client
//!
//! One socket, one epoll instance, one event per `update`. The client
//! owns its readiness source so the caller can either drive it with
//! blocking `update` calls or poll `get_descriptor()` for `get_events()`
//! from an outer loop and call `update(Some(Duration::ZERO))` when it
//! fires.
//!
//! Like the server, the client is generic over its `Poller` with
//! `EpollPoller` as the default.

use crate::buffer::GrowableBuffer;
use crate::config::ChatConfig;
use crate::epoll::EpollPoller;
use crate::error::{ChatError, ChatResult};
use crate::frame;
use crate::interest::Interest;
use crate::message::ChatMessage;
use crate::poller::{Event, Poller, Registration};
use crate::socket::{self, Socket};

use corokit_core::{kdebug, kerror};

use std::collections::VecDeque;
use std::io;
use std::net::{SocketAddr, SocketAddrV4, ToSocketAddrs};
use std::os::fd::{AsRawFd, RawFd};
use std::time::Duration;

const CLIENT_TOKEN: u64 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Never connected
    Idle,
    Connecting,
    Connected,
    /// Torn down after an error; `last_error` says why
    Closed,
}

pub struct ChatClient<P: Poller = EpollPoller> {
    config: ChatConfig,
    poller: P,
    socket: Option<Socket>,
    registration: Registration,
    state: ClientState,
    input: GrowableBuffer,
    output: GrowableBuffer,
    messages: VecDeque<ChatMessage>,
    last_error: Option<ChatError>,
    events: Vec<Event>,
    chunk: Vec<u8>,
}

/// Split `host:port` at the last colon
fn split_address(addr: &str) -> ChatResult<(&str, u16)> {
    let (host, port) = addr.rsplit_once(':').ok_or(ChatError::InvalidArgument)?;
    if host.is_empty() || port.is_empty() {
        return Err(ChatError::InvalidArgument);
    }
    let port = port.parse().map_err(|_| ChatError::InvalidArgument)?;
    Ok((host, port))
}

fn resolve_v4(host: &str, port: u16) -> ChatResult<Vec<SocketAddrV4>> {
    let addrs: Vec<SocketAddrV4> = (host, port)
        .to_socket_addrs()
        .map_err(|_| ChatError::NoAddr)?
        .filter_map(|addr| match addr {
            SocketAddr::V4(v4) => Some(v4),
            SocketAddr::V6(_) => None,
        })
        .collect();
    if addrs.is_empty() {
        return Err(ChatError::NoAddr);
    }
    Ok(addrs)
}

impl ChatClient {
    pub fn new() -> ChatResult<Self> {
        Self::with_config(ChatConfig::default())
    }

    pub fn with_config(config: ChatConfig) -> ChatResult<Self> {
        config.validate().map_err(|_| ChatError::InvalidArgument)?;
        let poller = EpollPoller::new(1)?;
        Ok(Self::from_parts(config, poller))
    }
}

impl<P: Poller + AsRawFd> ChatClient<P> {
    /// Descriptor to poll from an outer event loop
    pub fn get_descriptor(&self) -> RawFd {
        self.poller.as_raw_fd()
    }
}

impl<P: Poller> ChatClient<P> {
    /// Connect through `poller` instead of a fresh epoll instance
    pub fn with_poller(config: ChatConfig, poller: P) -> ChatResult<Self> {
        config.validate().map_err(|_| ChatError::InvalidArgument)?;
        Ok(Self::from_parts(config, poller))
    }

    fn from_parts(config: ChatConfig, poller: P) -> Self {
        ChatClient {
            poller,
            socket: None,
            registration: Registration::new(CLIENT_TOKEN),
            state: ClientState::Idle,
            input: GrowableBuffer::new(),
            output: GrowableBuffer::new(),
            messages: VecDeque::new(),
            last_error: None,
            events: Vec::with_capacity(1),
            chunk: vec![0; config.read_chunk],
            config,
        }
    }

    /// Start connecting to `host:port`
    ///
    /// Returns once the non-blocking connect is under way; `update`
    /// completes it. Addresses are tried in resolution order.
    pub fn connect(&mut self, addr: &str) -> ChatResult<()> {
        if matches!(self.state, ClientState::Connecting | ClientState::Connected) {
            return Err(ChatError::AlreadyStarted);
        }
        let (host, port) = split_address(addr)?;
        let candidates = resolve_v4(host, port)?;

        let mut last = ChatError::Sys(io::ErrorKind::NotConnected);
        for candidate in candidates {
            match self.try_connect(&candidate) {
                Ok(()) => {
                    self.last_error = None;
                    kdebug!("chat client: connecting to {}", candidate);
                    return Ok(());
                }
                Err(err) => {
                    kdebug!("chat client: connect to {} failed: {}", candidate, err);
                    last = err;
                }
            }
        }
        self.last_error = Some(last);
        Err(last)
    }

    fn try_connect(&mut self, addr: &SocketAddrV4) -> ChatResult<()> {
        let sock = Socket::stream().map_err(ChatError::from_errno)?;
        let connected = sock.connect(addr).map_err(ChatError::from_errno)?;
        let fd = sock.as_raw_fd();
        self.state = if connected {
            ClientState::Connected
        } else {
            ClientState::Connecting
        };
        self.registration = Registration::new(CLIENT_TOKEN);
        let wanted = self.wanted_interest();
        if let Err(err) = self.registration.update(&mut self.poller, fd, wanted) {
            self.state = ClientState::Idle;
            return Err(err);
        }
        self.socket = Some(sock);
        Ok(())
    }

    fn wanted_interest(&self) -> Interest {
        match self.state {
            ClientState::Connecting => Interest::OUTPUT,
            ClientState::Connected => Interest::INPUT.with_if(Interest::OUTPUT, self.output.has_pending()),
            ClientState::Idle | ClientState::Closed => Interest::NONE,
        }
    }

    fn not_running(&self) -> ChatError {
        self.last_error.unwrap_or(ChatError::NotStarted)
    }

    /// Wait up to `timeout` for one readiness event and handle it
    ///
    /// `Timeout` when nothing happened. Any other error has torn the
    /// connection down, and later calls keep returning it.
    pub fn update(&mut self, timeout: Option<Duration>) -> ChatResult<()> {
        if self.socket.is_none() {
            return Err(self.not_running());
        }
        let ready = match self.poller.wait(&mut self.events, timeout) {
            Ok(n) => n,
            Err(err) => return Err(self.teardown(err)),
        };
        if ready == 0 {
            return Err(ChatError::Timeout);
        }
        let event = self.events[0];
        match self.handle_event(event) {
            Ok(()) => Ok(()),
            Err(err) => Err(self.teardown(err)),
        }
    }

    fn handle_event(&mut self, event: Event) -> ChatResult<()> {
        let Some(sock) = self.socket.as_ref() else {
            return Err(self.not_running());
        };

        if self.state == ClientState::Connecting {
            if !(event.writable || event.error || event.hangup) {
                return Ok(());
            }
            if let Some(errno) = sock.take_error().map_err(ChatError::from_errno)? {
                return Err(ChatError::from_errno(errno));
            }
            if !event.writable {
                return Err(ChatError::Sys(io::ErrorKind::ConnectionRefused));
            }
            self.state = ClientState::Connected;
            kdebug!("chat client: connected");
        } else if event.error {
            let errno = sock.take_error().map_err(ChatError::from_errno)?;
            return Err(errno.map_or(ChatError::Sys(io::ErrorKind::Other), ChatError::from_errno));
        }

        if event.writable {
            socket::send_pending(sock, &mut self.output).map_err(ChatError::from_errno)?;
        }

        let mut eof = false;
        if event.readable || event.hangup {
            eof = socket::recv_all(sock, &mut self.chunk, &mut self.input)
                .map_err(ChatError::from_errno)?;
            for line in frame::split_lines(&mut self.input) {
                self.messages.push_back(ChatMessage::new(line, false));
            }
        }
        if eof || event.hangup {
            return Err(ChatError::Sys(io::ErrorKind::UnexpectedEof));
        }

        self.rearm()
    }

    fn rearm(&mut self) -> ChatResult<()> {
        let fd = match self.socket.as_ref() {
            Some(sock) => sock.as_raw_fd(),
            None => return Ok(()),
        };
        let wanted = self.wanted_interest();
        self.registration.update(&mut self.poller, fd, wanted).map(drop)
    }

    /// Close the connection, remembering `err` for later calls
    fn teardown(&mut self, err: ChatError) -> ChatError {
        match err {
            ChatError::Sys(io::ErrorKind::UnexpectedEof) => kdebug!("chat client: server closed the connection"),
            other => kerror!("chat client: connection failed: {}", other),
        }
        if let Some(sock) = self.socket.take() {
            let _ = self.registration.deregister(&mut self.poller, sock.as_raw_fd());
        }
        self.state = ClientState::Closed;
        self.input.clear();
        self.output.clear();
        self.last_error = Some(err);
        err
    }

    /// Queue `data` for sending; the bytes go out on later `update` calls
    pub fn feed(&mut self, data: &[u8]) -> ChatResult<()> {
        if data.is_empty() {
            return Err(ChatError::InvalidArgument);
        }
        if self.socket.is_none() {
            return Err(self.not_running());
        }
        self.output.append(data);
        if let Err(err) = self.rearm() {
            return Err(self.teardown(err));
        }
        Ok(())
    }

    /// Next received line, oldest first
    pub fn pop_next(&mut self) -> Option<ChatMessage> {
        self.messages.pop_front()
    }

    /// What the client is waiting for right now
    pub fn get_events(&self) -> Interest {
        self.wanted_interest()
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ClientState::Connected
    }

    pub fn last_error(&self) -> Option<ChatError> {
        self.last_error
    }

    /// Bytes fed but not yet accepted by the socket
    pub fn pending_output(&self) -> usize {
        self.output.pending().len()
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    pub fn poller(&self) -> &P {
        &self.poller
    }

    pub fn poller_mut(&mut self) -> &mut P {
        &mut self.poller
    }
}

impl<P: Poller> std::fmt::Debug for ChatClient<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("state", &self.state)
            .field("pending_output", &self.pending_output())
            .field("messages", &self.messages.len())
            .field("last_error", &self.last_error)
            .finish()
    }
}
