//! Session-level options.
//!
//! Unlike a daemon's configuration, a session has no persisted state, so
//! there is nothing to load from a file — only environment-variable
//! overrides of otherwise-fixed defaults, resolved once at construction.

/// Tunables for a single [`crate::session::Session`]. These do not affect
/// wire behavior, only local I/O policy.
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    /// Socket read/write timeout. `None` means block indefinitely, matching
    /// the original library (a blocked call is uninterruptible from within
    /// the core).
    pub socket_timeout: Option<std::time::Duration>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions {
            socket_timeout: Self::timeout_from_env(),
        }
    }
}

impl SessionOptions {
    /// Reads `UAMP_SOCKET_TIMEOUT_MS` from the environment, if present and
    /// parseable, overriding the blocking-forever default.
    fn timeout_from_env() -> Option<std::time::Duration> {
        std::env::var("UAMP_SOCKET_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(std::time::Duration::from_millis)
    }
}
