//! Chat endpoint configuration

use corokit_core::constants::{MAX_SERVER_EVENTS, MAX_SERVER_PEERS};
use corokit_core::env::env_get;

pub const MAX_EVENTS_VAR: &str = "COROKIT_CHAT_MAX_EVENTS";
pub const MAX_PEERS_VAR: &str = "COROKIT_CHAT_MAX_PEERS";
pub const READ_CHUNK_VAR: &str = "COROKIT_CHAT_READ_CHUNK";
pub const BACKLOG_VAR: &str = "COROKIT_CHAT_BACKLOG";

#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Events fetched per server `update`
    pub max_events: usize,

    /// Connected peers a server keeps; later ones are closed on accept
    pub max_peers: usize,

    /// Bytes per `recv` call
    pub read_chunk: usize,

    pub listen_backlog: i32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_events: MAX_SERVER_EVENTS,
            max_peers: MAX_SERVER_PEERS,
            read_chunk: 4096,
            listen_backlog: libc::SOMAXCONN,
        }
    }
}

impl ChatConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_events: env_get(MAX_EVENTS_VAR, defaults.max_events),
            max_peers: env_get(MAX_PEERS_VAR, defaults.max_peers),
            read_chunk: env_get(READ_CHUNK_VAR, defaults.read_chunk),
            listen_backlog: env_get(BACKLOG_VAR, defaults.listen_backlog),
        }
    }

    pub fn max_events(mut self, n: usize) -> Self {
        self.max_events = n;
        self
    }

    pub fn max_peers(mut self, n: usize) -> Self {
        self.max_peers = n;
        self
    }

    pub fn read_chunk(mut self, n: usize) -> Self {
        self.read_chunk = n;
        self
    }

    pub fn listen_backlog(mut self, n: i32) -> Self {
        self.listen_backlog = n;
        self
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.max_events == 0 {
            return Err("max_events must be at least 1");
        }
        if self.max_peers == 0 {
            return Err("max_peers must be at least 1");
        }
        if self.read_chunk == 0 {
            return Err("read_chunk must be at least 1");
        }
        if self.listen_backlog < 1 {
            return Err("listen_backlog must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = ChatConfig::default();
        assert_eq!(config.max_events, 64);
        assert_eq!(config.max_peers, 1024);
        assert_eq!(config.read_chunk, 4096);
        assert!(config.validate().is_ok());
        assert!(ChatConfig::new().read_chunk(0).validate().is_err());
        assert!(ChatConfig::new().max_peers(0).validate().is_err());
    }

    #[test]
    fn test_from_env_overrides() {
        std::env::set_var(MAX_PEERS_VAR, "8");
        let config = ChatConfig::from_env();
        std::env::remove_var(MAX_PEERS_VAR);
        assert_eq!(config.max_peers, 8);
        assert_eq!(config.max_events, 64);
    }
}
