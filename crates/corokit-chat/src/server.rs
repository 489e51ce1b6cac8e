//! Chat server
//!
//! A listening socket and every accepted peer share one edge-triggered
//! epoll instance. Each complete line read from a peer is queued locally
//! and copied into the output buffer of every other peer. A peer that
//! fails is removed on its own; the rest keep running.
//!
//! The server is generic over its `Poller`; `EpollPoller` is the default
//! and the only one the OS drives. Any other poller decides which events
//! the server sees.

use crate::buffer::GrowableBuffer;
use crate::config::ChatConfig;
use crate::epoll::EpollPoller;
use crate::error::{ChatError, ChatResult};
use crate::frame;
use crate::interest::Interest;
use crate::message::ChatMessage;
use crate::poller::{Event, Poller, Registration};
use crate::socket::{self, Socket};

use corokit_core::{kdebug, kerror, kwarn};

use nix::errno::Errno;
use std::collections::VecDeque;
use std::io;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::os::fd::{AsRawFd, RawFd};
use std::time::Duration;

const LISTENER_TOKEN: u64 = u64::MAX;

struct Peer {
    socket: Socket,
    registration: Registration,
    input: GrowableBuffer,
    output: GrowableBuffer,
}

impl Peer {
    fn new(token: u64, socket: Socket) -> Self {
        Peer {
            socket,
            registration: Registration::new(token),
            input: GrowableBuffer::new(),
            output: GrowableBuffer::new(),
        }
    }

    fn token(&self) -> u64 {
        self.registration.token()
    }

    fn wanted_interest(&self) -> Interest {
        Interest::INPUT.with_if(Interest::OUTPUT, self.output.has_pending())
    }

    fn rearm<P: Poller>(&mut self, poller: &mut P) -> ChatResult<()> {
        let wanted = self.wanted_interest();
        let fd = self.socket.as_raw_fd();
        self.registration.update(poller, fd, wanted).map(drop)
    }
}

pub struct ChatServer<P: Poller = EpollPoller> {
    config: ChatConfig,
    poller: P,
    listener: Option<Socket>,
    peers: Vec<Peer>,
    next_token: u64,
    messages: VecDeque<ChatMessage>,
    /// Server-side input not yet terminated by a newline
    feed_buffer: GrowableBuffer,
    events: Vec<Event>,
    chunk: Vec<u8>,
}

impl ChatServer {
    pub fn new() -> ChatResult<Self> {
        Self::with_config(ChatConfig::default())
    }

    pub fn with_config(config: ChatConfig) -> ChatResult<Self> {
        config.validate().map_err(|_| ChatError::InvalidArgument)?;
        let poller = EpollPoller::new(config.max_events)?;
        Ok(Self::from_parts(config, poller))
    }
}

impl<P: Poller + AsRawFd> ChatServer<P> {
    /// The descriptor of the poller covering the listener and every peer
    pub fn get_descriptor(&self) -> RawFd {
        self.poller.as_raw_fd()
    }
}

impl<P: Poller> ChatServer<P> {
    /// Serve through `poller` instead of a fresh epoll instance
    pub fn with_poller(config: ChatConfig, poller: P) -> ChatResult<Self> {
        config.validate().map_err(|_| ChatError::InvalidArgument)?;
        Ok(Self::from_parts(config, poller))
    }

    fn from_parts(config: ChatConfig, poller: P) -> Self {
        ChatServer {
            poller,
            listener: None,
            peers: Vec::new(),
            next_token: 0,
            messages: VecDeque::new(),
            feed_buffer: GrowableBuffer::new(),
            events: Vec::with_capacity(config.max_events),
            chunk: vec![0; config.read_chunk],
            config,
        }
    }

    /// Listen on `port` on all IPv4 interfaces; port 0 picks a free one
    pub fn listen(&mut self, port: u16) -> ChatResult<()> {
        if self.listener.is_some() {
            return Err(ChatError::AlreadyStarted);
        }
        let sock = Socket::stream().map_err(ChatError::from_errno)?;
        sock.set_reuseaddr().map_err(ChatError::from_errno)?;
        sock.bind(&SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port))
            .map_err(ChatError::from_errno)?;
        sock.listen(self.config.listen_backlog)
            .map_err(ChatError::from_errno)?;
        self.poller.add(sock.as_raw_fd(), LISTENER_TOKEN, Interest::INPUT)?;
        kdebug!("chat server: listening on port {}", port);
        self.listener = Some(sock);
        Ok(())
    }

    /// Wait up to `timeout` and handle every event that arrived
    ///
    /// `Timeout` when nothing happened. Peer failures only remove that
    /// peer; errors are returned for the listener or the poller itself.
    pub fn update(&mut self, timeout: Option<Duration>) -> ChatResult<()> {
        if self.listener.is_none() {
            return Err(ChatError::NotStarted);
        }
        let mut events = std::mem::take(&mut self.events);
        let ready = self.poller.wait(&mut events, timeout);
        let result = match ready {
            Ok(0) => Err(ChatError::Timeout),
            Ok(_) => {
                let mut first_error = None;
                for event in &events {
                    let outcome = if event.token == LISTENER_TOKEN {
                        self.accept_all()
                    } else {
                        self.handle_peer(*event);
                        Ok(())
                    };
                    if let Err(err) = outcome {
                        first_error.get_or_insert(err);
                    }
                }
                first_error.map_or(Ok(()), Err)
            }
            Err(err) => Err(err),
        };
        self.events = events;
        result
    }

    fn accept_all(&mut self) -> ChatResult<()> {
        let Some(listener) = self.listener.as_ref() else {
            return Err(ChatError::NotStarted);
        };
        loop {
            let sock = match listener.accept() {
                Ok(sock) => sock,
                Err(Errno::EAGAIN) => return Ok(()),
                Err(Errno::EINTR) | Err(Errno::ECONNABORTED) => continue,
                Err(errno @ (Errno::EMFILE | Errno::ENFILE)) => {
                    kwarn!("chat server: accept: {}", errno);
                    return Ok(());
                }
                Err(errno) => {
                    kerror!("chat server: accept failed: {}", errno);
                    return Err(ChatError::from_errno(errno));
                }
            };
            if self.peers.len() >= self.config.max_peers {
                kwarn!("chat server: peer limit {} reached, closing new connection", self.config.max_peers);
                continue;
            }

            let token = self.next_token;
            self.next_token += 1;
            let mut peer = Peer::new(token, sock);
            if let Err(err) = peer.rearm(&mut self.poller) {
                kerror!("chat server: cannot register peer {}: {}", token, err);
                continue;
            }
            kdebug!("chat server: peer {} connected", token);
            self.peers.push(peer);
        }
    }

    fn peer_index(&self, token: u64) -> Option<usize> {
        self.peers.iter().position(|peer| peer.token() == token)
    }

    fn handle_peer(&mut self, event: Event) {
        // Already removed earlier in this batch.
        let Some(idx) = self.peer_index(event.token) else {
            return;
        };
        let (lines, result) = self.service_peer(idx, event);
        for line in lines {
            self.broadcast(Some(event.token), &line);
            self.messages.push_back(ChatMessage::new(line, false));
        }
        let result = match (result, self.peer_index(event.token)) {
            (Ok(()), Some(idx)) => self.peers[idx].rearm(&mut self.poller),
            (result, _) => result,
        };
        if let Err(err) = result {
            self.drop_peer(event.token, err);
        }
    }

    /// Do the I/O for one event; lines read before a failure are still
    /// returned
    fn service_peer(&mut self, idx: usize, event: Event) -> (Vec<Vec<u8>>, ChatResult<()>) {
        let peer = &mut self.peers[idx];
        if event.error {
            let err = match peer.socket.take_error() {
                Ok(Some(errno)) => ChatError::from_errno(errno),
                _ => ChatError::Sys(io::ErrorKind::Other),
            };
            return (Vec::new(), Err(err));
        }
        if event.writable {
            if let Err(errno) = socket::send_pending(&peer.socket, &mut peer.output) {
                return (Vec::new(), Err(ChatError::from_errno(errno)));
            }
        }
        if !(event.readable || event.hangup) {
            return (Vec::new(), Ok(()));
        }

        let read = socket::recv_all(&peer.socket, &mut self.chunk, &mut peer.input);
        let lines = frame::split_lines(&mut peer.input);
        let result = match read {
            Ok(false) if !event.hangup => Ok(()),
            Ok(_) => Err(ChatError::Sys(io::ErrorKind::UnexpectedEof)),
            Err(errno) => Err(ChatError::from_errno(errno)),
        };
        (lines, result)
    }

    fn drop_peer(&mut self, token: u64, err: ChatError) {
        let Some(idx) = self.peer_index(token) else {
            return;
        };
        let mut peer = self.peers.remove(idx);
        let _ = peer.registration.deregister(&mut self.poller, peer.socket.as_raw_fd());
        match err {
            ChatError::Sys(io::ErrorKind::UnexpectedEof | io::ErrorKind::ConnectionReset | io::ErrorKind::BrokenPipe) => {
                kdebug!("chat server: peer {} disconnected", token)
            }
            other => kerror!("chat server: dropping peer {}: {}", token, other),
        }
    }

    /// Queue `line` plus a newline to every peer except `source`
    fn broadcast(&mut self, source: Option<u64>, line: &[u8]) {
        let mut failed = Vec::new();
        for peer in self.peers.iter_mut() {
            if Some(peer.token()) == source {
                continue;
            }
            frame::write_line(&mut peer.output, line);
            if let Err(err) = peer.rearm(&mut self.poller) {
                failed.push((peer.token(), err));
            }
        }
        for (token, err) in failed {
            self.drop_peer(token, err);
        }
    }

    /// Send text typed on the server to every peer
    ///
    /// Complete lines are also queued locally with `is_server_message`
    /// set; a trailing partial line waits for the next call.
    pub fn feed(&mut self, data: &[u8]) -> ChatResult<()> {
        if data.is_empty() {
            return Err(ChatError::InvalidArgument);
        }
        if self.listener.is_none() {
            return Err(ChatError::NotStarted);
        }
        self.feed_buffer.append(data);
        for line in frame::split_lines(&mut self.feed_buffer) {
            self.broadcast(None, &line);
            self.messages.push_back(ChatMessage::new(line, true));
        }
        Ok(())
    }

    /// Next received line, oldest first
    pub fn pop_next(&mut self) -> Option<ChatMessage> {
        self.messages.pop_front()
    }

    /// Listening socket, once `listen` succeeded
    pub fn get_socket(&self) -> Option<RawFd> {
        self.listener.as_ref().map(AsRawFd::as_raw_fd)
    }

    /// `INPUT` while listening, plus `OUTPUT` when any peer has unsent data
    pub fn get_events(&self) -> Interest {
        if self.listener.is_none() {
            return Interest::NONE;
        }
        let pending = self.peers.iter().any(|peer| peer.output.has_pending());
        Interest::INPUT.with_if(Interest::OUTPUT, pending)
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Port actually bound, useful after `listen(0)`
    pub fn local_port(&self) -> Option<u16> {
        let listener = self.listener.as_ref()?;
        listener.local_addr().ok().map(|addr| addr.port())
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

impl<P: Poller> std::fmt::Debug for ChatServer<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatServer")
            .field("listening", &self.listener.is_some())
            .field("peers", &self.peers.len())
            .field("messages", &self.messages.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ChatClient;
    use crate::poller::fake::{Call, FakePoller};
    use std::io::{Read, Write};
    use std::net::TcpStream;
    use std::time::Instant;

    const TICK: Duration = Duration::from_millis(5);

    fn step(server: &mut ChatServer, clients: &mut [&mut ChatClient]) {
        let _ = server.update(Some(TICK));
        for client in clients.iter_mut() {
            let _ = client.update(Some(TICK));
        }
    }

    fn drain(client: &mut ChatClient, into: &mut Vec<String>) {
        while let Some(msg) = client.pop_next() {
            into.push(msg.text().into_owned());
        }
    }

    fn deadline() -> Instant {
        Instant::now() + Duration::from_secs(5)
    }

    fn listening_server() -> (ChatServer, String) {
        let mut server = ChatServer::new().unwrap();
        server.listen(0).unwrap();
        let port = server.local_port().unwrap();
        (server, format!("127.0.0.1:{port}"))
    }

    #[test]
    fn test_calls_before_listen() {
        let mut server = ChatServer::new().unwrap();
        assert_eq!(server.update(Some(Duration::ZERO)), Err(ChatError::NotStarted));
        assert_eq!(server.feed(b"x\n"), Err(ChatError::NotStarted));
        assert_eq!(server.feed(b""), Err(ChatError::InvalidArgument));
        assert_eq!(server.get_events(), Interest::NONE);
        assert_eq!(server.get_socket(), None);
    }

    #[test]
    fn test_listen_twice_and_port_busy() {
        let (mut server, _) = listening_server();
        assert_eq!(server.listen(0), Err(ChatError::AlreadyStarted));
        assert_eq!(server.get_events(), Interest::INPUT);
        assert!(server.get_socket().is_some());

        let taken = server.local_port().unwrap();
        let mut other = ChatServer::new().unwrap();
        assert_eq!(other.listen(taken), Err(ChatError::PortBusy));
        assert_eq!(server.update(Some(Duration::ZERO)), Err(ChatError::Timeout));
    }

    #[test]
    fn test_loopback_broadcast_without_echo() {
        let (mut server, addr) = listening_server();
        let mut alice = ChatClient::new().unwrap();
        let mut bob = ChatClient::new().unwrap();
        alice.connect(&addr).unwrap();
        bob.connect(&addr).unwrap();

        let until = deadline();
        while !(server.peer_count() == 2 && alice.is_connected() && bob.is_connected()) {
            assert!(Instant::now() < until, "peers did not connect");
            step(&mut server, &mut [&mut alice, &mut bob]);
        }

        alice.feed(b"hello\nwor").unwrap();
        alice.feed(b"ld\n").unwrap();
        let mut bob_got = Vec::new();
        let until = deadline();
        while bob_got.len() < 2 {
            assert!(Instant::now() < until, "bob got {bob_got:?}");
            step(&mut server, &mut [&mut alice, &mut bob]);
            drain(&mut bob, &mut bob_got);
        }
        assert_eq!(bob_got, ["hello", "world"]);

        let first = server.pop_next().unwrap();
        assert_eq!(first.as_bytes(), b"hello");
        assert!(!first.is_server_message);
        assert_eq!(server.pop_next().unwrap().text(), "world");
        assert!(server.pop_next().is_none());

        // A few more rounds: nothing comes back to the sender.
        for _ in 0..10 {
            step(&mut server, &mut [&mut alice, &mut bob]);
        }
        assert!(alice.pop_next().is_none());

        server.feed(b"from server\n").unwrap();
        let own = server.pop_next().unwrap();
        assert!(own.is_server_message);
        assert_eq!(own.text(), "from server");

        let (mut alice_got, mut bob_got) = (Vec::new(), Vec::new());
        let until = deadline();
        while alice_got.is_empty() || bob_got.is_empty() {
            assert!(Instant::now() < until, "server line not delivered");
            step(&mut server, &mut [&mut alice, &mut bob]);
            drain(&mut alice, &mut alice_got);
            drain(&mut bob, &mut bob_got);
        }
        assert_eq!(alice_got, ["from server"]);
        assert_eq!(bob_got, ["from server"]);
    }

    #[test]
    fn test_disconnect_removes_only_that_peer() {
        let (mut server, addr) = listening_server();
        let mut alice = ChatClient::new().unwrap();
        let mut bob = ChatClient::new().unwrap();
        alice.connect(&addr).unwrap();
        bob.connect(&addr).unwrap();
        let until = deadline();
        while !(server.peer_count() == 2 && alice.is_connected() && bob.is_connected()) {
            assert!(Instant::now() < until);
            step(&mut server, &mut [&mut alice, &mut bob]);
        }

        drop(bob);
        let until = deadline();
        while server.peer_count() != 1 {
            assert!(Instant::now() < until, "closed peer was not removed");
            step(&mut server, &mut [&mut alice]);
        }

        server.feed(b"still here\n").unwrap();
        let mut got = Vec::new();
        let until = deadline();
        while got.is_empty() {
            assert!(Instant::now() < until);
            step(&mut server, &mut [&mut alice]);
            drain(&mut alice, &mut got);
        }
        assert_eq!(got, ["still here"]);
    }

    #[test]
    fn test_client_sees_lines_then_eof() {
        let (mut server, addr) = listening_server();
        let mut alice = ChatClient::new().unwrap();
        alice.connect(&addr).unwrap();
        let until = deadline();
        while !(server.peer_count() == 1 && alice.is_connected()) {
            assert!(Instant::now() < until);
            step(&mut server, &mut [&mut alice]);
        }

        server.feed(b"bye\n").unwrap();
        let until = deadline();
        while server.get_events().contains(Interest::OUTPUT) {
            assert!(Instant::now() < until, "server output not flushed");
            let _ = server.update(Some(TICK));
        }
        drop(server);

        let until = deadline();
        let err = loop {
            assert!(Instant::now() < until, "client did not see the close");
            match alice.update(Some(TICK)) {
                Ok(()) | Err(ChatError::Timeout) => {}
                Err(err) => break err,
            }
        };
        assert_eq!(err, ChatError::Sys(io::ErrorKind::UnexpectedEof));
        assert_eq!(alice.pop_next().unwrap().text(), "bye");
        assert_eq!(alice.update(Some(Duration::ZERO)), Err(err));
    }

    #[test]
    fn test_peer_limit_closes_extra_connections() {
        let mut server = ChatServer::with_config(ChatConfig::new().max_peers(1)).unwrap();
        server.listen(0).unwrap();
        let addr = format!("127.0.0.1:{}", server.local_port().unwrap());

        let mut alice = ChatClient::new().unwrap();
        let mut bob = ChatClient::new().unwrap();
        alice.connect(&addr).unwrap();
        let until = deadline();
        while !(server.peer_count() == 1 && alice.is_connected()) {
            assert!(Instant::now() < until);
            step(&mut server, &mut [&mut alice]);
        }

        bob.connect(&addr).unwrap();
        let until = deadline();
        let err = loop {
            assert!(Instant::now() < until, "extra peer was not closed");
            step(&mut server, &mut [&mut alice]);
            match bob.update(Some(TICK)) {
                Ok(()) | Err(ChatError::Timeout) => {}
                Err(err) => break err,
            }
        };
        assert!(err.is_fatal());
        assert_eq!(server.peer_count(), 1);
    }

    fn scripted(server: &mut ChatServer<FakePoller>, event: Event) -> ChatResult<()> {
        server.poller_mut().ready.push(event);
        server.update(None)
    }

    fn readable(token: u64) -> Event {
        Event {
            token,
            readable: true,
            ..Event::default()
        }
    }

    fn writable(token: u64) -> Event {
        Event {
            token,
            writable: true,
            ..Event::default()
        }
    }

    #[test]
    fn test_output_interest_follows_pending_bytes() {
        let mut server = ChatServer::with_poller(ChatConfig::default(), FakePoller::default()).unwrap();
        server.listen(0).unwrap();
        let addr = ("127.0.0.1", server.local_port().unwrap());
        assert_eq!(server.poller_mut().take_changes(LISTENER_TOKEN), [Interest::INPUT]);

        let mut alice = TcpStream::connect(addr).unwrap();
        let mut bob = TcpStream::connect(addr).unwrap();
        bob.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        scripted(&mut server, readable(LISTENER_TOKEN)).unwrap();
        assert_eq!(server.peer_count(), 2);
        assert_eq!(server.poller_mut().take_changes(0), [Interest::INPUT]);
        assert_eq!(server.poller_mut().take_changes(1), [Interest::INPUT]);
        assert_eq!(server.get_events(), Interest::INPUT);

        alice.write_all(b"hi\n").unwrap();
        let until = deadline();
        let msg = loop {
            assert!(Instant::now() < until, "line from alice never read");
            scripted(&mut server, readable(0)).unwrap();
            if let Some(msg) = server.pop_next() {
                break msg;
            }
            std::thread::sleep(TICK);
        };
        assert_eq!(msg.text(), "hi");

        // Only the receiving peer gains OUTPUT.
        let both = Interest::INPUT | Interest::OUTPUT;
        assert!(server.poller_mut().take_changes(0).is_empty());
        assert_eq!(server.poller_mut().take_changes(1), [both]);
        assert!(server.get_events().contains(Interest::OUTPUT));

        scripted(&mut server, writable(1)).unwrap();
        assert_eq!(server.poller_mut().take_changes(1), [Interest::INPUT]);
        assert_eq!(server.get_events(), Interest::INPUT);
        let mut got = [0u8; 3];
        bob.read_exact(&mut got).unwrap();
        assert_eq!(&got, b"hi\n");

        // More than the socket buffers hold: a partial send keeps OUTPUT.
        let mut big = vec![b'x'; 32 << 20];
        big.push(b'\n');
        server.feed(&big).unwrap();
        assert_eq!(server.poller_mut().take_changes(0), [both]);
        assert_eq!(server.poller_mut().take_changes(1), [both]);
        scripted(&mut server, writable(1)).unwrap();
        assert!(server.poller_mut().take_changes(1).is_empty());
        assert!(server.get_events().contains(Interest::OUTPUT));

        // A hangup removes the peer and its registration.
        server.poller_mut().calls.clear();
        let hangup = Event {
            token: 0,
            hangup: true,
            ..Event::default()
        };
        scripted(&mut server, hangup).unwrap();
        assert_eq!(server.peer_count(), 1);
        assert!(matches!(server.poller().calls.as_slice(), [Call::Delete(_)]));
    }
}
