//! Environment variable utilities
//!
//! Typed lookups with defaults, used by every `*Config::from_env()`.
//!
//! ```ignore
//! use corokit_core::env::{env_get, env_get_bool};
//!
//! let threads: usize = env_get("COROKIT_POOL_THREADS", 4);
//! let flush = env_get_bool("COROKIT_FLUSH_EPRINT", false);
//! ```

use std::str::FromStr;

/// Get environment variable parsed as type T, or return default
///
/// Unset variables and values that fail to parse both yield `default`.
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    env_get_opt(key).unwrap_or(default)
}

/// Get environment variable as boolean
///
/// "1", "true", "yes", "on" (case-insensitive) are true, any other set
/// value is false. Unset returns the default.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => matches!(val.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

/// `Some(T)` if the variable is set and parses, `None` otherwise
#[inline]
pub fn env_get_opt<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNSET: &str = "__COROKIT_TEST_UNSET_VAR__";

    #[test]
    fn test_env_get_default() {
        let val: usize = env_get(UNSET, 42);
        assert_eq!(val, 42);
        assert_eq!(env_get_opt::<usize>(UNSET), None);
    }

    #[test]
    fn test_env_get_parses_trimmed() {
        std::env::set_var("__COROKIT_TEST_NUM__", " 123 ");
        let val: usize = env_get("__COROKIT_TEST_NUM__", 0);
        assert_eq!(val, 123);
        std::env::remove_var("__COROKIT_TEST_NUM__");
    }

    #[test]
    fn test_env_get_invalid_falls_back() {
        std::env::set_var("__COROKIT_TEST_BAD__", "many");
        let val: u16 = env_get("__COROKIT_TEST_BAD__", 99);
        assert_eq!(val, 99);
        std::env::remove_var("__COROKIT_TEST_BAD__");
    }

    #[test]
    fn test_env_get_bool_variants() {
        let key = "__COROKIT_TEST_BOOL__";
        for truthy in ["1", "true", "TRUE", "yes", "on"] {
            std::env::set_var(key, truthy);
            assert!(env_get_bool(key, false), "{truthy}");
        }
        for falsy in ["0", "false", "garbage"] {
            std::env::set_var(key, falsy);
            assert!(!env_get_bool(key, true), "{falsy}");
        }
        std::env::remove_var(key);
        assert!(env_get_bool(key, true));
    }
}
