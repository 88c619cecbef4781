//! Per-activation preview/detail state machine
//!
//! An activation owns a root container plus two surfaces built once at
//! creation. `mode` and `visible` are independent: an activation can be
//! hidden in either mode. Transitions are asynchronous; while one is pending
//! further mode requests are rejected, except that an exit requested during
//! an enter is queued and starts as soon as the enter completes.

use crate::event_loop::{EventLoop, Millis, Task, TimerId};
use crate::transition::{Completion, TransitionKind, TransitionRunner, TransitionTicket};
use crate::{NodeId, SegmentRegistry, ViewTree};
use overlay_core::{ActivationDocument, ActivationId};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Preview,
    Detail,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Preview => f.write_str("preview"),
            Mode::Detail => f.write_str("detail"),
        }
    }
}

/// Notifications an activation raises for the session coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationEvent {
    EnteredDetail(ActivationId),
    ExitedDetail(ActivationId),
    TimeWindowExited(ActivationId),
}

/// Everything an activation touches besides itself
pub(crate) struct Stage {
    pub(crate) views: ViewTree,
    /// Top-level layer above every slot, hosting detail surfaces
    pub(crate) overlay: NodeId,
    pub(crate) runner: Option<Box<dyn TransitionRunner>>,
    pub(crate) events: EventLoop,
    pub(crate) transition_timeout: Option<Millis>,
    pub(crate) outbox: VecDeque<ActivationEvent>,
}

impl Stage {
    pub(crate) fn new(
        runner: Option<Box<dyn TransitionRunner>>,
        transition_timeout: Option<Millis>,
    ) -> Self {
        let mut views = ViewTree::new();
        let overlay = views.add_container("overlay");
        Self {
            views,
            overlay,
            runner,
            events: EventLoop::new(),
            transition_timeout,
            outbox: VecDeque::new(),
        }
    }
}

#[derive(Debug)]
struct Pending {
    ticket: TransitionTicket,
    timeout: Option<TimerId>,
}

pub struct Activation {
    doc: ActivationDocument,
    mode: Mode,
    visible: bool,
    root: NodeId,
    preview: NodeId,
    detail: NodeId,
    last_parent: Option<NodeId>,
    pending: Option<Pending>,
    exit_queued: bool,
    transition_seq: u64,
}

impl Activation {
    /// Builds the activation and its surfaces
    pub(crate) fn build(doc: ActivationDocument, views: &mut ViewTree, registry: &SegmentRegistry) -> Self {
        let root = views.add_container(format!("activation:{}", doc.id));
        let preview = views.add_surface(
            format!("activation:{}:preview", doc.id),
            registry.preview_content(&doc),
        );
        let detail = views.add_surface(
            format!("activation:{}:detail", doc.id),
            registry.detail_content(&doc),
        );
        views.set_visible(detail, false);
        debug!("Created activation {} ({})", doc.id, doc.name);

        Self {
            doc,
            mode: Mode::Preview,
            visible: false,
            root,
            preview,
            detail,
            last_parent: None,
            pending: None,
            exit_queued: false,
            transition_seq: 0,
        }
    }

    pub fn id(&self) -> ActivationId {
        self.doc.id
    }

    pub fn name(&self) -> &str {
        &self.doc.name
    }

    pub fn document(&self) -> &ActivationDocument {
        &self.doc
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_in_detail_mode(&self) -> bool {
        self.mode == Mode::Detail
    }

    /// Checks if a transition has started and not yet completed
    pub fn is_transitioning(&self) -> bool {
        self.pending.is_some()
    }

    /// Container the scheduler places into a slot
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn preview_surface(&self) -> NodeId {
        self.preview
    }

    pub fn detail_surface(&self) -> NodeId {
        self.detail
    }

    /// Container the root was in when last shown or expanded
    pub fn last_parent(&self) -> Option<NodeId> {
        self.last_parent
    }

    pub(crate) fn show(&mut self, stage: &mut Stage) -> bool {
        if self.mode != Mode::Preview || self.visible || self.pending.is_some() {
            return false;
        }
        debug!("{}: Showing {}", self.id(), self.mode);
        let views = &mut stage.views;
        self.last_parent = views.parent(self.root);
        views.clear(self.root);
        views.attach(self.preview, self.root);
        views.set_visible(self.root, true);
        self.visible = true;
        true
    }

    pub(crate) fn hide(&mut self, stage: &mut Stage) -> bool {
        if !self.visible {
            return false;
        }
        debug!("{}: Hiding {}", self.id(), self.mode);
        self.visible = false;
        match self.mode {
            Mode::Detail => {
                self.exit_detail_mode(stage);
            }
            Mode::Preview => stage.views.set_visible(self.root, false),
        }
        true
    }

    pub(crate) fn enter_detail_mode(&mut self, stage: &mut Stage) -> bool {
        if self.mode != Mode::Preview || !self.visible || self.pending.is_some() {
            return false;
        }
        debug!("{}: Entering detail mode", self.id());
        self.mode = Mode::Detail;

        let views = &mut stage.views;
        self.last_parent = views.parent(self.root);
        views.attach(self.detail, stage.overlay);
        views.set_visible(self.detail, true);
        views.set_visible(self.root, true);

        if !self.start_transition(TransitionKind::EnterDetail, stage) {
            self.finish_enter(stage);
        }
        true
    }

    pub(crate) fn exit_detail_mode(&mut self, stage: &mut Stage) -> bool {
        if self.mode != Mode::Detail {
            return false;
        }
        match self.pending.as_ref().map(|p| p.ticket.kind) {
            Some(TransitionKind::EnterDetail) => {
                debug!("{}: Exit queued behind enter transition", self.id());
                self.exit_queued = true;
                true
            }
            Some(TransitionKind::ExitDetail) => false,
            None => {
                debug!("{}: Exiting detail mode", self.id());
                if !self.start_transition(TransitionKind::ExitDetail, stage) {
                    self.finish_exit(stage);
                }
                true
            }
        }
    }

    /// Back navigation: consumed only while in detail mode
    pub(crate) fn handle_back_button(&mut self, stage: &mut Stage) -> bool {
        if self.mode != Mode::Detail {
            return false;
        }
        debug!("{}: Back pressed in detail mode", self.id());
        self.exit_detail_mode(stage);
        true
    }

    pub(crate) fn on_time_window_exit(&self, stage: &mut Stage) {
        stage
            .outbox
            .push_back(ActivationEvent::TimeWindowExited(self.id()));
    }

    /// Applies the end state of the pending transition if `ticket` matches.
    /// `forced` marks a timeout standing in for a completion that never came.
    pub(crate) fn complete_transition(
        &mut self,
        ticket: TransitionTicket,
        forced: bool,
        stage: &mut Stage,
    ) -> bool {
        match &self.pending {
            Some(pending) if pending.ticket == ticket => {}
            _ => {
                debug!("{}: Ignoring stale {:?} completion", self.id(), ticket.kind);
                return false;
            }
        }
        if let Some(timer) = self.pending.take().and_then(|p| p.timeout) {
            stage.events.cancel(timer);
        }
        if forced {
            warn!(
                "{}: {:?} transition stalled, forcing end state",
                self.id(),
                ticket.kind
            );
        }
        match ticket.kind {
            TransitionKind::EnterDetail => self.finish_enter(stage),
            TransitionKind::ExitDetail => self.finish_exit(stage),
        }
        true
    }

    /// Hands the surfaces to the runner. Returns false when there is no
    /// runner and the caller must apply the end state itself.
    fn start_transition(&mut self, kind: TransitionKind, stage: &mut Stage) -> bool {
        let Some(runner) = stage.runner.as_deref_mut() else {
            return false;
        };
        self.transition_seq += 1;
        let ticket = TransitionTicket {
            activation: self.id(),
            kind,
            seq: self.transition_seq,
        };
        let timeout = stage
            .transition_timeout
            .map(|ms| stage.events.schedule(ms, Task::TransitionTimeout(ticket)));
        self.pending = Some(Pending { ticket, timeout });

        let done = Completion::new(ticket, stage.events.clone());
        match kind {
            TransitionKind::EnterDetail => runner.enter_detail(self.preview, self.detail, done),
            TransitionKind::ExitDetail => runner.exit_detail(self.detail, self.preview, done),
        }
        true
    }

    fn finish_enter(&mut self, stage: &mut Stage) {
        // Frees the slot for other activations while the detail view is up
        stage.views.detach(self.root);
        debug!("{}: Detail mode enter completed", self.id());
        stage
            .outbox
            .push_back(ActivationEvent::EnteredDetail(self.id()));

        if std::mem::take(&mut self.exit_queued) {
            self.exit_detail_mode(stage);
        }
    }

    fn finish_exit(&mut self, stage: &mut Stage) {
        self.mode = Mode::Preview;
        let views = &mut stage.views;

        if self.visible {
            if let Some(parent) = self.last_parent {
                if views.parent(self.root) != Some(parent) {
                    views.attach(self.root, parent);
                }
            }
        }
        views.clear(self.root);
        views.attach(self.preview, self.root);
        views.set_visible(self.root, self.visible);

        views.detach(self.detail);
        views.set_visible(self.detail, false);

        debug!("{}: Detail mode exit completed", self.id());
        stage
            .outbox
            .push_back(ActivationEvent::ExitedDetail(self.id()));
    }
}

impl fmt::Debug for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Activation")
            .field("id", &self.doc.id)
            .field("mode", &self.mode)
            .field("visible", &self.visible)
            .field("transitioning", &self.pending.is_some())
            .finish()
    }
}

/// Activations loaded this session, keyed by id. Never evicted.
#[derive(Debug, Default)]
pub(crate) struct ActivationCache {
    entries: BTreeMap<ActivationId, Activation>,
}

impl ActivationCache {
    pub(crate) fn contains(&self, id: ActivationId) -> bool {
        self.entries.contains_key(&id)
    }

    pub(crate) fn insert(&mut self, activation: Activation) {
        self.entries.insert(activation.id(), activation);
    }

    pub(crate) fn get(&self, id: ActivationId) -> Option<&Activation> {
        self.entries.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: ActivationId) -> Option<&mut Activation> {
        self.entries.get_mut(&id)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Activation> + '_ {
        self.entries.values()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Activation> + '_ {
        self.entries.values_mut()
    }

    pub(crate) fn ids(&self) -> Vec<ActivationId> {
        self.entries.keys().copied().collect()
    }

    /// The activation currently in (or entering) detail mode
    pub(crate) fn in_detail(&self) -> Option<ActivationId> {
        self.iter().find(|a| a.is_in_detail_mode()).map(Activation::id)
    }

    pub(crate) fn any_transitioning(&self) -> bool {
        self.iter().any(Activation::is_transitioning)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
