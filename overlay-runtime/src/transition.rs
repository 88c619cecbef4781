//! Preview/detail transition runners

use crate::event_loop::{EventLoop, Millis, Task};
use crate::NodeId;
use overlay_core::ActivationId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionKind {
    EnterDetail,
    ExitDetail,
}

/// Identifies one started transition. Completions carrying a ticket that is
/// no longer pending are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransitionTicket {
    pub activation: ActivationId,
    pub kind: TransitionKind,
    pub(crate) seq: u64,
}

/// Completion handle passed to a runner. Consumed on use, so a transition
/// completes at most once; a runner that drops it without completing is
/// caught by the session's transition timeout.
#[derive(Debug)]
pub struct Completion {
    ticket: TransitionTicket,
    events: EventLoop,
}

impl Completion {
    pub(crate) fn new(ticket: TransitionTicket, events: EventLoop) -> Self {
        Self { ticket, events }
    }

    pub fn ticket(&self) -> TransitionTicket {
        self.ticket
    }

    /// Signals completion; the session handles it on its next turn
    pub fn complete(self) {
        self.complete_after(0);
    }

    /// Signals completion `delay_ms` from now on the session clock
    pub fn complete_after(self, delay_ms: Millis) {
        self.events
            .schedule(delay_ms, Task::TransitionDone(self.ticket));
    }
}

/// Performs the animated handoff between an activation's two surfaces
pub trait TransitionRunner {
    fn enter_detail(&mut self, preview: NodeId, detail: NodeId, done: Completion);
    fn exit_detail(&mut self, detail: NodeId, preview: NodeId, done: Completion);
}

/// Cross-fade of fixed duration; the renderer animates opacity, this only
/// keeps time
#[derive(Debug, Clone, Copy)]
pub struct FadeTransition {
    pub duration_ms: Millis,
}

impl Default for FadeTransition {
    fn default() -> Self {
        Self { duration_ms: 300 }
    }
}

impl TransitionRunner for FadeTransition {
    fn enter_detail(&mut self, _preview: NodeId, _detail: NodeId, done: Completion) {
        done.complete_after(self.duration_ms);
    }

    fn exit_detail(&mut self, _detail: NodeId, _preview: NodeId, done: Completion) {
        done.complete_after(self.duration_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ViewTree;

    #[test]
    fn test_fade_completes_after_duration() {
        let events = EventLoop::new();
        let mut tree = ViewTree::new();
        let preview = tree.add_surface("preview", vec![]);
        let detail = tree.add_surface("detail", vec![]);
        let ticket = TransitionTicket {
            activation: ActivationId(1),
            kind: TransitionKind::EnterDetail,
            seq: 1,
        };

        let mut fade = FadeTransition { duration_ms: 250 };
        fade.enter_detail(preview, detail, Completion::new(ticket, events.clone()));

        assert_eq!(events.next_deadline(), Some(250));
        assert_eq!(events.pop_due(249), None);
        assert_eq!(events.pop_due(250), Some(Task::TransitionDone(ticket)));
    }
}
