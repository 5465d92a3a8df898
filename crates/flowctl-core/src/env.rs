//! Environment variable utilities
//!
//! Generic `env_get<T>` for parsing environment-driven configuration
//! defaults, the same shape the teacher scheduler uses for its tuning
//! knobs (`GVT_WORKERS`, `GVT_DEBUG`, ...). flowctl has no on-disk
//! config file (spec.md §6 lists only a handful of scalar knobs, set
//! either at `configure()` call sites or — here — from the process
//! environment at startup).

use std::str::FromStr;

/// Get environment variable parsed as type `T`, or return `default`.
#[inline]
pub fn env_get<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Get environment variable as boolean.
///
/// Accepts "1", "true", "yes", "on" (case-insensitive) as true;
/// everything else, including unset, returns `default`.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => matches!(val.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_when_unset() {
        let v: u32 = env_get("__FLOWCTL_TEST_UNSET__", 7);
        assert_eq!(v, 7);
    }

    #[test]
    fn bool_variants() {
        std::env::set_var("__FLOWCTL_TEST_BOOL__", "yes");
        assert!(env_get_bool("__FLOWCTL_TEST_BOOL__", false));
        std::env::set_var("__FLOWCTL_TEST_BOOL__", "0");
        assert!(!env_get_bool("__FLOWCTL_TEST_BOOL__", true));
        std::env::remove_var("__FLOWCTL_TEST_BOOL__");
    }

    #[test]
    fn parse_failure_falls_back() {
        std::env::set_var("__FLOWCTL_TEST_NUM__", "not_a_number");
        let v: u32 = env_get("__FLOWCTL_TEST_NUM__", 99);
        assert_eq!(v, 99);
        std::env::remove_var("__FLOWCTL_TEST_NUM__");
    }
}
