//! Error types shared across Outpost crates.

/// Errors that cross crate boundaries in the Outpost runtime.
///
/// Subsystem-specific errors (browser, transport) live in their own crates;
/// this enum covers the shared surfaces: configuration and session
/// lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum OutpostError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("session error: {0}")]
    Session(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
