//! Overlay Runtime Library
//!
//! This library drives timed activations over a playing video: a playback
//! monitor samples the position, the scheduler decides which activation owns
//! each screen slot, and every activation runs its own preview/detail state
//! machine. Everything runs on one logical thread, owned by a [`Session`].

pub mod activation;
pub mod config;
pub mod event_loop;
pub mod listener;
pub mod loader;
pub mod monitor;
pub mod scheduler;
pub mod segment;
pub mod session;
pub mod transition;
pub mod view;

pub use activation::{Activation, ActivationEvent, Mode};
pub use config::SessionConfig;
pub use event_loop::{EventLoop, Millis, TimerId};
pub use listener::{HostListener, NoopListener};
pub use loader::{ActivationSource, LoadReport};
pub use monitor::{ManualPlayback, MonitorState, PlaybackSource};
pub use scheduler::{OverlapPolicy, SlotChange, TickReport};
pub use segment::{SegmentProcessor, SegmentRegistry, Widget};
pub use session::Session;
pub use transition::{Completion, FadeTransition, TransitionKind, TransitionRunner, TransitionTicket};
pub use view::{NodeId, ViewOp, ViewTree};

use overlay_core::ActivationId;

/// Result type for overlay-runtime operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for overlay-runtime operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Overlay core error: {0}")]
    Core(#[from] overlay_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Activation not found: {0}")]
    ActivationNotFound(ActivationId),

    #[error("Requested activation {requested} but received {received}")]
    ActivationMismatch {
        requested: ActivationId,
        received: ActivationId,
    },
}
