//! # corokit-core
//!
//! Core types shared by every corokit crate.
//!
//! This crate is platform-agnostic and contains no OS-specific code.
//!
//! ## Modules
//!
//! - `id` - Coroutine identifier type
//! - `state` - Coroutine lifecycle states
//! - `kprint` - Kernel-style debug printing macros
//! - `env` - Environment variable utilities

pub mod id;
pub mod state;
pub mod kprint;
pub mod env;

// Re-exports for convenience
pub use id::CoroId;
pub use state::CoroState;
pub use env::{env_get, env_get_bool, env_get_opt};

/// Limits and sizes shared across the workspace
pub mod constants {
    /// No coroutine sentinel value
    pub const CORO_NONE: u32 = u32::MAX;

    /// Default maximum live coroutines per scheduler
    pub const DEFAULT_MAX_COROUTINES: usize = 65536;

    /// Upper bound on worker threads in one pool
    pub const MAX_POOL_THREADS: usize = 20;

    /// Upper bound on queued tasks in one pool
    pub const MAX_POOL_TASKS: usize = 100_000;

    /// Starting capacity of a chat I/O buffer
    pub const INITIAL_BUFFER_SIZE: usize = 1024;

    /// Events fetched per server wait
    pub const MAX_SERVER_EVENTS: usize = 64;

    /// Connected peers a server keeps at once
    pub const MAX_SERVER_PEERS: usize = 1024;
}
