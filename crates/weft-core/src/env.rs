//! Environment variable utilities
//!
//! ```ignore
//! use weft_core::env::{env_get, env_get_bool, env_get_bytes};
//!
//! let timeout: u64 = env_get("WEFT_PARK_TIMEOUT_MS", 100);
//! let debug = env_get_bool("WEFT_DEBUG", false);
//! let stack = env_get_bytes("WEFT_STACK_SIZE", 512 * 1024); // "256K", "1M", "65536"
//! ```

use std::str::FromStr;

/// Get environment variable parsed as `T`, or `default` if unset or unparsable
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
/// "1", "true", "yes", "on" (any case) are true; "0", "false", "no", "off"
/// are false; anything else, including unset, yields `default`.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => match val.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

/// Get a byte size from the environment
///
/// Accepts a plain integer or one suffixed with `K`, `M` or `G`
/// (binary multiples, case-insensitive, optional trailing `B`).
pub fn env_get_bytes(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| parse_bytes(&v))
        .unwrap_or(default)
}

/// Parse "512", "256k", "1M", "2GB" into a byte count
pub fn parse_bytes(s: &str) -> Option<usize> {
    let s = s.trim();
    let s = s
        .strip_suffix('B')
        .or_else(|| s.strip_suffix('b'))
        .unwrap_or(s);
    let (digits, shift) = match s.chars().last()? {
        'k' | 'K' => (&s[..s.len() - 1], 10),
        'm' | 'M' => (&s[..s.len() - 1], 20),
        'g' | 'G' => (&s[..s.len() - 1], 30),
        _ => (s, 0),
    };
    let n: usize = digits.trim().replace('_', "").parse().ok()?;
    n.checked_mul(1usize << shift)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_get_default() {
        let val: usize = env_get("__WEFT_TEST_UNSET__", 42);
        assert_eq!(val, 42);
    }

    #[test]
    fn test_env_get_set_and_invalid() {
        std::env::set_var("__WEFT_TEST_NUM__", " 123 ");
        assert_eq!(env_get::<usize>("__WEFT_TEST_NUM__", 0), 123);
        std::env::set_var("__WEFT_TEST_NUM__", "many");
        assert_eq!(env_get::<usize>("__WEFT_TEST_NUM__", 9), 9);
        std::env::remove_var("__WEFT_TEST_NUM__");
    }

    #[test]
    fn test_env_get_bool_variants() {
        std::env::set_var("__WEFT_TEST_BOOL__", "YES");
        assert!(env_get_bool("__WEFT_TEST_BOOL__", false));
        std::env::set_var("__WEFT_TEST_BOOL__", "off");
        assert!(!env_get_bool("__WEFT_TEST_BOOL__", true));
        std::env::set_var("__WEFT_TEST_BOOL__", "maybe");
        assert!(env_get_bool("__WEFT_TEST_BOOL__", true));
        std::env::remove_var("__WEFT_TEST_BOOL__");
        assert!(!env_get_bool("__WEFT_TEST_BOOL__", false));
    }

    #[test]
    fn test_parse_bytes() {
        assert_eq!(parse_bytes("4096"), Some(4096));
        assert_eq!(parse_bytes("256k"), Some(256 * 1024));
        assert_eq!(parse_bytes("1M"), Some(1024 * 1024));
        assert_eq!(parse_bytes("2GB"), Some(2 << 30));
        assert_eq!(parse_bytes("1_024"), Some(1024));
        assert_eq!(parse_bytes(""), None);
        assert_eq!(parse_bytes("K"), None);
        assert_eq!(parse_bytes("lots"), None);
    }

    #[test]
    fn test_env_get_bytes() {
        std::env::set_var("__WEFT_TEST_BYTES__", "64K");
        assert_eq!(env_get_bytes("__WEFT_TEST_BYTES__", 1), 64 * 1024);
        std::env::remove_var("__WEFT_TEST_BYTES__");
        assert_eq!(env_get_bytes("__WEFT_TEST_BYTES__", 7), 7);
    }
}
