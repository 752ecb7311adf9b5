//! Typed environment getters for bootstrap.
//!
//! These are consulted exactly once, in `main`, to assemble
//! [`ProxyOptions`](crate::ProxyOptions) and the observability setup.
//! The core never reads the environment after construction.

use std::env;

/// Read a string variable, falling back to `default` when unset or empty.
pub fn get_env_or_default_string(key: &str, default: &str) -> String {
    match env::var(key) {
        Ok(value) if !value.is_empty() => value,
        _ => default.to_string(),
    }
}

/// Read a `u16` variable, falling back to `default` when unset or unparseable.
pub fn get_env_or_default_u16(key: &str, default: u16) -> u16 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read a `usize` variable, falling back to `default` when unset or unparseable.
pub fn get_env_or_default_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read a boolean variable; only the literal `"true"` counts as true.
pub fn get_env_or_default_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) if !value.is_empty() => value == "true",
        _ => default,
    }
}

/// Build identification: release version, overridable via `VERSION`.
pub fn version() -> String {
    get_env_or_default_string("VERSION", "latest")
}

/// Build identification: git commit, overridable via `GIT_COMMIT`.
pub fn git_commit() -> String {
    get_env_or_default_string("GIT_COMMIT", "main")
}
