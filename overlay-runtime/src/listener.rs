//! Callbacks into the application hosting the session

use overlay_core::ActivationId;

/// Implemented by the application. The session holds one for its lifetime
/// and calls it after the corresponding state change has been applied.
pub trait HostListener {
    fn on_enter_detail_mode(&mut self, id: ActivationId);
    fn on_exit_detail_mode(&mut self, id: ActivationId);

    /// The detail activation no longer has an active time window. Closing
    /// the detail view in response is the host's call.
    fn on_time_window_exit(&mut self, id: ActivationId);
}

/// Listener that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl HostListener for NoopListener {
    fn on_enter_detail_mode(&mut self, _: ActivationId) {}
    fn on_exit_detail_mode(&mut self, _: ActivationId) {}
    fn on_time_window_exit(&mut self, _: ActivationId) {}
}
