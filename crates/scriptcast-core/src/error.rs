//! Error types for the scriptcast engine.
//!
//! The engine absorbs almost everything locally: per-port connect failures
//! leave the port as a candidate for the next cycle, and stale or empty
//! dispatches are policy no-ops. What remains fallible is configuration
//! and target selection.

/// Errors surfaced by the engine's fallible entry points
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configured port range has min above max
    #[error("invalid port range: {min} > {max}")]
    InvalidPortRange { min: u16, max: u16 },

    /// Target selector was neither a port number nor "all"
    #[error("invalid target: {0:?} (expected a port number or \"all\")")]
    InvalidTarget(String),
}

pub type Result<T> = std::result::Result<T, Error>;
