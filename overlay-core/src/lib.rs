//! Overlay Core Library
//!
//! This library provides the data structures for timed video overlays: time
//! windows bound to named screen slots, distributions of activation instances,
//! and the activation documents those instances refer to.

pub mod activation;
pub mod distribution;
pub mod window;

pub use activation::{ActivationDocument, ActivationId};
pub use distribution::{ActivationInstance, Distribution};
pub use window::{Position, TimeWindow, DEFAULT_SLOT};

/// Result type for overlay-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for overlay-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Malformed document: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Invalid time window: start {start} is not before end {end}")]
    InvalidWindow { start: Position, end: Position },

    #[error("Duplicate activation instance: {0}")]
    DuplicateInstance(ActivationId),

    #[error("No {0} data found in response")]
    EmptyResponse(&'static str),
}
