//! # corokit-chat
//!
//! Line-oriented chat over TCP, driven by readiness events.
//!
//! Messages are `\n`-terminated byte strings. A `ChatServer` relays every
//! line from one peer to all the others; a `ChatClient` sends fed bytes
//! and collects the lines it receives. Both are single-threaded and
//! non-blocking apart from the bounded wait inside `update`.
//!
//! ## Modules
//!
//! - `buffer` - Growable byte buffer with a processed cursor
//! - `frame` - Newline framing
//! - `message` - Decoded line
//! - `interest` - Read/write interest bitmask
//! - `poller` - Readiness source trait and registration diffing
//! - `epoll` - Edge-triggered epoll poller (Linux)
//! - `client` / `server` - The endpoints (Linux)
//! - `config` - Endpoint limits
//! - `error` - Error types

pub mod buffer;
pub mod config;
pub mod error;
pub mod frame;
pub mod interest;
pub mod message;
pub mod poller;

pub use buffer::GrowableBuffer;
pub use config::ChatConfig;
pub use error::{ChatError, ChatResult};
pub use interest::Interest;
pub use message::ChatMessage;
pub use poller::{Event, Poller, Registration};

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        pub mod client;
        pub mod epoll;
        pub mod server;
        mod socket;

        pub use client::{ChatClient, ClientState};
        pub use epoll::EpollPoller;
        pub use server::ChatServer;
    }
}
