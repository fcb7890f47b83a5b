//! Environment variable utilities
//!
//! Every `LAZYPAGE_*` knob goes through these helpers, so a malformed value
//! silently falls back to the default instead of aborting startup.
//!
//! # Usage
//!
//! ```ignore
//! use lazypage_core::env::{env_get, env_get_bool};
//!
//! let port: u16 = env_get("LAZYPAGE_PORT", 8081);
//! let strict = env_get_bool("LAZYPAGE_STRICT_PLACEMENT", false);
//! ```

use std::str::FromStr;

/// Get environment variable parsed as type T, or return default
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Get environment variable as boolean
///
/// Accepts: "1", "true", "yes", "on" (case-insensitive) as true.
/// Any other value is false; unset returns the default.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => matches!(val.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

/// Get environment variable as string, or return default
#[inline]
pub fn env_get_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_get_default() {
        let val: u16 = env_get("__LAZYPAGE_TEST_UNSET__", 8081);
        assert_eq!(val, 8081);
    }

    #[test]
    fn test_env_get_parses_trimmed() {
        std::env::set_var("__LAZYPAGE_TEST_PORT__", " 9090 ");
        let val: u16 = env_get("__LAZYPAGE_TEST_PORT__", 0);
        assert_eq!(val, 9090);
        std::env::remove_var("__LAZYPAGE_TEST_PORT__");
    }

    #[test]
    fn test_env_get_invalid_parse() {
        std::env::set_var("__LAZYPAGE_TEST_BAD__", "eighty");
        let val: u16 = env_get("__LAZYPAGE_TEST_BAD__", 81);
        assert_eq!(val, 81);
        std::env::remove_var("__LAZYPAGE_TEST_BAD__");
    }

    #[test]
    fn test_env_get_bool_variants() {
        std::env::set_var("__LAZYPAGE_TEST_BOOL__", "YES");
        assert!(env_get_bool("__LAZYPAGE_TEST_BOOL__", false));

        std::env::set_var("__LAZYPAGE_TEST_BOOL__", "0");
        assert!(!env_get_bool("__LAZYPAGE_TEST_BOOL__", true));

        std::env::remove_var("__LAZYPAGE_TEST_BOOL__");
        assert!(env_get_bool("__LAZYPAGE_TEST_BOOL__", true));
    }

    #[test]
    fn test_env_get_str_default() {
        assert_eq!(env_get_str("__LAZYPAGE_TEST_UNSET__", "127.0.0.1"), "127.0.0.1");
    }
}
