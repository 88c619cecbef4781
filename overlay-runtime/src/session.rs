//! Session: the host-level coordinator
//!
//! Owns the view tree, the activation cache, the scheduler and the playback
//! monitor, and is the only place any of them is mutated. Media signals,
//! user input and the host clock all enter through `&mut self` methods, so
//! every state change happens inside one synchronous step.

use crate::activation::{Activation, ActivationCache, ActivationEvent, Stage};
use crate::event_loop::{Millis, Task};
use crate::monitor::PlaybackMonitor;
use crate::scheduler::Scheduler;
use crate::{
    ActivationSource, Error, HostListener, LoadReport, MonitorState, NodeId, PlaybackSource,
    SegmentRegistry, SessionConfig, TickReport, TransitionRunner, TransitionTicket, ViewOp,
    ViewTree,
};
use overlay_core::{ActivationDocument, ActivationId, Distribution, Position};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy)]
struct DetailRecord {
    id: ActivationId,
    window_exit_notified: bool,
}

pub struct Session {
    config: SessionConfig,
    source: Box<dyn PlaybackSource>,
    listener: Box<dyn HostListener>,
    registry: SegmentRegistry,
    stage: Stage,
    activations: ActivationCache,
    scheduler: Scheduler,
    monitor: PlaybackMonitor,
    distribution: Option<Distribution>,
    detail: Option<DetailRecord>,
    evaluations: u64,
}

impl Session {
    /// Creates a session with the default segment registry and synchronous
    /// preview/detail switching
    pub fn new(
        config: SessionConfig,
        source: Box<dyn PlaybackSource>,
        listener: Box<dyn HostListener>,
    ) -> Self {
        // a zero interval would reschedule the poll forever within one advance
        let poll_interval = config.poll_interval_ms.max(1);
        let idle_interval = config.idle_interval_ms.max(1);

        Self {
            stage: Stage::new(None, config.transition_timeout_ms),
            scheduler: Scheduler::new(config.overlap_policy),
            monitor: PlaybackMonitor::new(poll_interval, idle_interval),
            registry: SegmentRegistry::default(),
            activations: ActivationCache::default(),
            distribution: None,
            detail: None,
            evaluations: 0,
            config,
            source,
            listener,
        }
    }

    /// Animates preview/detail switches through `runner`
    pub fn with_transition(mut self, runner: Box<dyn TransitionRunner>) -> Self {
        self.stage.runner = Some(runner);
        self
    }

    /// Replaces the segment registry used to build surfaces of activations
    /// loaded from now on
    pub fn with_registry(mut self, registry: SegmentRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Declares the slots to monitor and returns their containers, for the
    /// host to place over the video
    pub fn declare_slots<I, S>(&mut self, names: I) -> Vec<(String, NodeId)>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scheduler.declare(names, &mut self.stage.views)
    }

    /// Caches an activation. Returns false if one with that id is already
    /// cached; cached activations are never replaced.
    pub fn add_activation(&mut self, doc: ActivationDocument) -> bool {
        if self.activations.contains(doc.id) {
            return false;
        }
        let activation = Activation::build(doc, &mut self.stage.views, &self.registry);
        self.activations.insert(activation);
        true
    }

    /// Installs a distribution, superseding the current one, and preloads
    /// every activation it references. Activations that fail to load are
    /// reported and skipped.
    pub fn load_distribution(
        &mut self,
        distribution: Distribution,
        source: &mut dyn ActivationSource,
    ) -> LoadReport {
        if let Some(previous) = &self.distribution {
            debug!("Replacing distribution {}", previous.id());
            self.scheduler
                .clear_all(&mut self.activations, &mut self.stage);
            self.monitor.forget_position();
        }

        let mut report = LoadReport::default();
        for instance in distribution.instances() {
            let id = instance.external_id;
            if self.activations.contains(id) {
                report.cached.push(id);
                continue;
            }
            match source.fetch(id) {
                Ok(doc) if doc.id != id => {
                    warn!("Failed to preload activation {}: got {}", id, doc.id);
                    report.failed.push((
                        id,
                        Error::ActivationMismatch {
                            requested: id,
                            received: doc.id,
                        },
                    ));
                }
                Ok(doc) => {
                    self.add_activation(doc);
                    report.loaded.push(id);
                }
                Err(e) => {
                    warn!("Failed to preload activation {}: {}", id, e);
                    report.failed.push((id, e));
                }
            }
        }

        info!(
            "Loaded distribution {} ({}): {} instances, {} windows, {} activations unavailable",
            distribution.id(),
            distribution.name(),
            distribution.instances().len(),
            distribution.window_count(),
            report.failed.len()
        );
        self.distribution = Some(distribution);

        // A paused player yields no new positions, so fill the slots now
        if self.monitor.state() == MonitorState::Monitoring {
            let position = self.source.current_position();
            self.run_scheduler(position);
        }
        self.dispatch();
        report
    }

    /// Media prepared: start monitoring
    pub fn on_prepared(&mut self) {
        info!("Video prepared, starting playback monitoring");
        self.monitor.forget_position();
        self.monitor.start(&self.stage.events);
    }

    /// A seek began; position sampling pauses until it completes
    pub fn on_seek_started(&mut self) {
        debug!("Seek started");
        self.monitor.seek_started();
    }

    /// A seek finished: re-evaluate right away and restart the loop
    pub fn on_seek_complete(&mut self) {
        let position = self.source.current_position();
        info!("Seek completed to position: {}", position);
        self.monitor.seek_completed();
        self.evaluate(position);
        self.monitor.start(&self.stage.events);
    }

    /// Playback finished: stop monitoring and hide everything
    pub fn on_completion(&mut self) {
        info!("Video completed");
        self.monitor.stop(&self.stage.events);
        self.scheduler
            .clear_all(&mut self.activations, &mut self.stage);
        self.dispatch();
    }

    /// Tap on a preview. Rejected while any activation is in detail mode or
    /// mid-transition.
    pub fn request_detail(&mut self, id: ActivationId) -> bool {
        if let Some(current) = self.activations.in_detail() {
            debug!("Activation {} is in detail mode, ignoring request for {}", current, id);
            return false;
        }
        if self.activations.any_transitioning() {
            debug!("Transition in flight, ignoring detail request for {}", id);
            return false;
        }
        let Some(activation) = self.activations.get_mut(id) else {
            warn!("Detail requested for unknown activation {}", id);
            return false;
        };
        info!("{}: detail requested", id);
        let started = activation.enter_detail_mode(&mut self.stage);
        self.dispatch();
        started
    }

    /// Closes the detail view of `id`
    pub fn request_exit_detail(&mut self, id: ActivationId) -> bool {
        let closed = self
            .activations
            .get_mut(id)
            .is_some_and(|a| a.exit_detail_mode(&mut self.stage));
        self.dispatch();
        closed
    }

    /// Back navigation. Returns true if an open detail view consumed it.
    pub fn handle_back_button(&mut self) -> bool {
        let Some(id) = self.activations.in_detail() else {
            return false;
        };
        let consumed = self
            .activations
            .get_mut(id)
            .is_some_and(|a| a.handle_back_button(&mut self.stage));
        self.dispatch();
        consumed
    }

    /// Runs every task due up to `now` on the host clock
    pub fn advance_to(&mut self, now: Millis) {
        while let Some(task) = self.stage.events.pop_due(now) {
            self.run_task(task);
        }
        self.stage.events.set_now(now);
    }

    pub fn advance_by(&mut self, delta: Millis) {
        self.advance_to(self.now().saturating_add(delta));
    }

    /// Runs tasks already due, such as immediate transition completions
    pub fn run_pending(&mut self) {
        self.advance_to(self.now());
    }

    fn run_task(&mut self, task: Task) {
        match task {
            Task::MonitorTick { generation } => {
                let detail_open = self.activations.in_detail().is_some();
                let sample = self.monitor.on_tick(
                    generation,
                    self.source.as_ref(),
                    detail_open,
                    &self.stage.events,
                );
                if let Some(position) = sample {
                    self.monitor.record(position);
                    self.evaluate(position);
                }
            }
            Task::TransitionDone(ticket) => self.complete(ticket, false),
            Task::TransitionTimeout(ticket) => self.complete(ticket, true),
        }
    }

    fn complete(&mut self, ticket: TransitionTicket, forced: bool) {
        if let Some(activation) = self.activations.get_mut(ticket.activation) {
            activation.complete_transition(ticket, forced, &mut self.stage);
        }
        self.dispatch();
    }

    fn evaluate(&mut self, position: Position) -> TickReport {
        let report = self.run_scheduler(position);
        self.dispatch();
        report
    }

    fn run_scheduler(&mut self, position: Position) -> TickReport {
        self.evaluations += 1;
        let report = self.scheduler.tick(
            position,
            self.distribution.as_ref(),
            &mut self.activations,
            &mut self.stage,
        );
        self.check_window_exit(position);
        report
    }

    /// Notifies once when the detail activation runs out of active windows
    fn check_window_exit(&mut self, position: Position) {
        let Some(record) = self.detail.as_mut() else {
            return;
        };
        if record.window_exit_notified {
            return;
        }
        let still_active = self
            .distribution
            .as_ref()
            .and_then(|d| d.instance(record.id))
            .is_some_and(|i| i.is_active_at(position));
        if !still_active {
            record.window_exit_notified = true;
            if let Some(activation) = self.activations.get(record.id) {
                activation.on_time_window_exit(&mut self.stage);
            }
        }
    }

    fn dispatch(&mut self) {
        while let Some(event) = self.stage.outbox.pop_front() {
            match event {
                ActivationEvent::EnteredDetail(id) => {
                    info!("Activation {} entered detail mode", id);
                    self.detail = Some(DetailRecord {
                        id,
                        window_exit_notified: false,
                    });
                    for other in self.activations.ids() {
                        if other != id {
                            self.scheduler
                                .evict(other, &mut self.activations, &mut self.stage);
                        }
                    }
                    self.listener.on_enter_detail_mode(id);

                    // The window may have closed while the enter transition ran
                    let position = self.source.current_position();
                    self.check_window_exit(position);
                }
                ActivationEvent::ExitedDetail(id) => {
                    info!("Activation {} exited detail mode", id);
                    if self.detail.is_some_and(|d| d.id == id) {
                        self.detail = None;
                    }
                    self.listener.on_exit_detail_mode(id);

                    // Bring back whatever the detail view displaced, even
                    // while paused
                    if self.detail.is_none() && self.monitor.state() == MonitorState::Monitoring {
                        self.monitor.forget_position();
                        let position = self.source.current_position();
                        self.run_scheduler(position);
                    }
                }
                ActivationEvent::TimeWindowExited(id) => {
                    debug!("Time window of detail activation {} ended", id);
                    self.listener.on_time_window_exit(id);
                    if self.config.close_detail_on_window_exit {
                        if let Some(activation) = self.activations.get_mut(id) {
                            activation.exit_detail_mode(&mut self.stage);
                        }
                    }
                }
            }
        }
    }

    pub fn now(&self) -> Millis {
        self.stage.events.now()
    }

    /// Deadline of the next scheduled task, for hosts that sleep between turns
    pub fn next_deadline(&self) -> Option<Millis> {
        self.stage.events.next_deadline()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn views(&self) -> &ViewTree {
        &self.stage.views
    }

    /// Takes the view mutations recorded since the last call
    pub fn drain_view_ops(&mut self) -> Vec<ViewOp> {
        self.stage.views.drain_ops()
    }

    /// Top-level layer hosting detail surfaces
    pub fn overlay_layer(&self) -> NodeId {
        self.stage.overlay
    }

    pub fn slot_container(&self, slot: &str) -> Option<NodeId> {
        self.scheduler.container(slot)
    }

    pub fn slot_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.scheduler.slot_names()
    }

    /// Activation currently occupying `slot`
    pub fn occupant(&self, slot: &str) -> Option<ActivationId> {
        self.scheduler.occupant(slot)
    }

    pub fn activation(&self, id: ActivationId) -> Option<&Activation> {
        self.activations.get(id)
    }

    pub fn activations(&self) -> impl Iterator<Item = &Activation> + '_ {
        self.activations.iter()
    }

    pub fn activation_count(&self) -> usize {
        self.activations.len()
    }

    /// Activation whose detail view is open (entered and not yet exited)
    pub fn detail_activation(&self) -> Option<ActivationId> {
        self.detail.map(|d| d.id)
    }

    pub fn distribution(&self) -> Option<&Distribution> {
        self.distribution.as_ref()
    }

    pub fn monitor_state(&self) -> MonitorState {
        self.monitor.state()
    }

    pub fn is_seeking(&self) -> bool {
        self.monitor.in_seek()
    }

    /// Position of the last tick that reached the scheduler; cleared by
    /// seeks and restarts
    pub fn last_processed(&self) -> Option<Position> {
        self.monitor.last_processed()
    }

    /// Number of times the scheduler has been asked to evaluate a position
    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FadeTransition, ManualPlayback, Mode};
    use overlay_core::{ActivationInstance, TimeWindow};
    use serde_json::{json, Value};
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Heard {
        Enter(u64),
        Exit(u64),
        WindowExit(u64),
    }

    #[derive(Clone, Default)]
    struct Recorder(Rc<RefCell<Vec<Heard>>>);

    impl Recorder {
        fn take(&self) -> Vec<Heard> {
            self.0.borrow_mut().drain(..).collect()
        }
    }

    impl HostListener for Recorder {
        fn on_enter_detail_mode(&mut self, id: ActivationId) {
            self.0.borrow_mut().push(Heard::Enter(id.0));
        }
        fn on_exit_detail_mode(&mut self, id: ActivationId) {
            self.0.borrow_mut().push(Heard::Exit(id.0));
        }
        fn on_time_window_exit(&mut self, id: ActivationId) {
            self.0.borrow_mut().push(Heard::WindowExit(id.0));
        }
    }

    fn doc(id: u64) -> ActivationDocument {
        serde_json::from_value(json!({
            "id": id,
            "name": format!("activation {}", id),
            "settings": {"preview": {"title": format!("Preview {}", id)}},
            "template": [{"name": "NativeBlock", "settings": {"segments": [
                {"type": "text", "content": "Details"}
            ]}}]
        }))
        .unwrap()
    }

    fn distribution(windows: &[(u64, Position, Position, &str)]) -> Distribution {
        let mut instances: Vec<ActivationInstance> = Vec::new();
        for &(id, start, end, slot) in windows {
            let window = TimeWindow::new(start, end, slot, Value::Null).unwrap();
            match instances.iter_mut().find(|i| i.external_id.0 == id) {
                Some(instance) => instance.windows.push(window),
                None => instances.push(ActivationInstance::new(ActivationId(id), vec![window])),
            }
        }
        Distribution::new(1, "test", instances).unwrap()
    }

    fn library(ids: &[u64]) -> HashMap<ActivationId, ActivationDocument> {
        ids.iter().map(|id| (ActivationId(*id), doc(*id))).collect()
    }

    struct Fixture {
        session: Session,
        player: ManualPlayback,
        heard: Recorder,
    }

    fn fixture(
        config: SessionConfig,
        fade: Option<Millis>,
        windows: &[(u64, Position, Position, &str)],
    ) -> Fixture {
        let player = ManualPlayback::new();
        let heard = Recorder::default();
        let mut session = Session::new(config, Box::new(player.clone()), Box::new(heard.clone()));
        if let Some(duration_ms) = fade {
            session = session.with_transition(Box::new(FadeTransition { duration_ms }));
        }
        session.declare_slots(["top", "bottom"]);
        let dist = distribution(windows);
        let ids: Vec<u64> = dist.instances().iter().map(|i| i.external_id.0).collect();
        let report = session.load_distribution(dist, &mut library(&ids));
        assert!(report.is_complete());
        session.on_prepared();
        player.set_playing(true);
        Fixture {
            session,
            player,
            heard,
        }
    }

    impl Fixture {
        /// Plays forward to `position`, one poll interval at a time
        fn play_to(&mut self, position: Position) {
            while self.player.current_position() < position {
                self.player.advance(15);
                self.session.advance_by(15);
            }
        }

        fn id(n: u64) -> ActivationId {
            ActivationId(n)
        }

        fn mode(&self, n: u64) -> Mode {
            self.session.activation(ActivationId(n)).unwrap().mode()
        }

        fn visible(&self, n: u64) -> bool {
            self.session.activation(ActivationId(n)).unwrap().is_visible()
        }
    }

    #[test]
    fn test_enter_and_exit_detail_round_trip() {
        let mut f = fixture(SessionConfig::default(), Some(200), &[(1, 0, 10_000, "top")]);
        f.play_to(100);
        let top = f.session.slot_container("top").unwrap();
        let root = f.session.activation(Fixture::id(1)).unwrap().root();
        assert_eq!(f.session.views().parent(root), Some(top));

        assert!(f.session.request_detail(Fixture::id(1)));
        assert_eq!(f.mode(1), Mode::Detail);
        assert!(f.heard.take().is_empty());

        f.session.advance_by(200);
        assert_eq!(f.session.detail_activation(), Some(Fixture::id(1)));
        assert_eq!(f.session.views().parent(root), None);
        assert_eq!(f.heard.take(), vec![Heard::Enter(1)]);

        assert!(f.session.handle_back_button());
        f.session.advance_by(200);
        assert_eq!(f.mode(1), Mode::Preview);
        assert_eq!(f.session.views().parent(root), Some(top));
        assert_eq!(f.session.detail_activation(), None);
        assert_eq!(f.heard.take(), vec![Heard::Exit(1)]);
        assert!(!f.session.handle_back_button());
    }

    #[test]
    fn test_tick_during_detail_changes_nothing() {
        let mut f = fixture(
            SessionConfig::default(),
            None,
            &[(1, 0, 1000, "top"), (2, 1000, 5000, "top"), (3, 0, 5000, "bottom")],
        );
        f.play_to(500);
        assert!(f.session.request_detail(Fixture::id(1)));
        // entering hides every other activation
        assert!(!f.visible(3));
        assert_eq!(f.session.occupant("bottom"), None);

        f.play_to(3000);
        assert_eq!(f.session.occupant("top"), Some(Fixture::id(1)));
        assert_eq!(f.session.occupant("bottom"), None);
        assert_eq!(f.mode(1), Mode::Detail);
        assert!(f.visible(1));
        assert!(!f.visible(2));
        // the window ended while detail was open
        assert_eq!(f.heard.take(), vec![Heard::Enter(1), Heard::WindowExit(1)]);

        // closing brings the timeline back in line immediately
        assert!(f.session.handle_back_button());
        assert_eq!(f.session.occupant("top"), Some(Fixture::id(2)));
        assert_eq!(f.session.occupant("bottom"), Some(Fixture::id(3)));
        assert!(!f.visible(1));
    }

    #[test]
    fn test_window_ending_during_enter_fade_is_reported_while_paused() {
        let config = SessionConfig {
            close_detail_on_window_exit: true,
            ..SessionConfig::default()
        };
        let mut f = fixture(config, Some(300), &[(1, 0, 1000, "top")]);
        f.play_to(990);
        assert!(f.session.request_detail(Fixture::id(1)));

        // the window closes before the fade finishes, then playback stops
        f.play_to(1005);
        f.player.set_playing(false);
        f.session.advance_by(5000);

        assert_eq!(
            f.heard.take(),
            vec![Heard::Enter(1), Heard::WindowExit(1), Heard::Exit(1)]
        );
        assert_eq!(f.mode(1), Mode::Preview);
        assert_eq!(f.session.detail_activation(), None);
        assert_eq!(f.session.occupant("top"), None);
    }

    #[test]
    fn test_close_detail_on_window_exit_when_configured() {
        let config = SessionConfig {
            close_detail_on_window_exit: true,
            ..SessionConfig::default()
        };
        let mut f = fixture(config, None, &[(1, 0, 1000, "top")]);
        f.play_to(500);
        f.session.request_detail(Fixture::id(1));
        f.play_to(1100);
        assert_eq!(f.mode(1), Mode::Preview);
        assert_eq!(f.session.occupant("top"), None);
        assert_eq!(
            f.heard.take(),
            vec![Heard::Enter(1), Heard::WindowExit(1), Heard::Exit(1)]
        );
    }

    #[test]
    fn test_second_detail_request_rejected() {
        let mut f = fixture(
            SessionConfig::default(),
            Some(100),
            &[(1, 0, 5000, "top"), (2, 0, 5000, "bottom")],
        );
        f.play_to(100);
        assert!(f.session.request_detail(Fixture::id(1)));
        // still transitioning
        assert!(!f.session.request_detail(Fixture::id(2)));
        f.session.advance_by(100);
        // detail open
        assert!(!f.session.request_detail(Fixture::id(2)));
        assert!(!f.session.request_detail(Fixture::id(42)));
        assert_eq!(
            f.session.activations().filter(|a| a.is_in_detail_mode()).count(),
            1
        );
    }

    #[test]
    fn test_seek_complete_forces_evaluation_at_same_position() {
        let mut f = fixture(SessionConfig::default(), None, &[(1, 0, 5000, "top")]);
        f.play_to(1500);
        let before = f.session.evaluations();

        f.session.on_seek_started();
        assert!(f.session.is_seeking());
        f.session.advance_by(45);
        // suppressed while seeking
        assert_eq!(f.session.evaluations(), before);

        f.session.on_seek_complete();
        assert!(!f.session.is_seeking());
        assert_eq!(f.session.evaluations(), before + 1);

        // position unchanged, yet the next tick still evaluates
        f.session.run_pending();
        assert_eq!(f.session.evaluations(), before + 2);
        f.session.advance_by(15);
        assert_eq!(f.session.evaluations(), before + 2);
    }

    #[test]
    fn test_seek_moves_slot_assignment() {
        let mut f = fixture(
            SessionConfig::default(),
            None,
            &[(1, 0, 1000, "top"), (2, 8000, 9000, "top")],
        );
        f.play_to(300);
        assert_eq!(f.session.occupant("top"), Some(Fixture::id(1)));

        f.session.on_seek_started();
        f.player.set_position(8500);
        f.session.advance_by(30);
        assert_eq!(f.session.occupant("top"), Some(Fixture::id(1)));

        f.session.on_seek_complete();
        assert_eq!(f.session.occupant("top"), Some(Fixture::id(2)));
        assert!(!f.visible(1));
    }

    #[test]
    fn test_paused_playback_backs_off() {
        let mut f = fixture(SessionConfig::default(), None, &[(1, 0, 5000, "top")]);
        f.play_to(90);
        f.player.set_playing(false);
        let before = f.session.evaluations();
        f.player.set_position(2000);
        f.session.advance_by(400);
        assert_eq!(f.session.evaluations(), before);
        assert!(f.session.next_deadline().unwrap() >= f.session.now());
    }

    #[test]
    fn test_completion_hides_everything() {
        let mut f = fixture(
            SessionConfig::default(),
            Some(100),
            &[(1, 0, 5000, "top"), (2, 0, 5000, "bottom")],
        );
        f.play_to(100);
        f.session.request_detail(Fixture::id(1));
        f.session.advance_by(100);
        f.heard.take();

        f.session.on_completion();
        assert_eq!(f.session.monitor_state(), MonitorState::Idle);
        f.session.advance_by(100);
        assert_eq!(f.mode(1), Mode::Preview);
        assert!(!f.visible(1) && !f.visible(2));
        assert_eq!(f.session.occupant("top"), None);
        assert_eq!(f.session.occupant("bottom"), None);
        assert_eq!(f.heard.take(), vec![Heard::Exit(1)]);
        // the stopped monitor does not bring anything back
        f.session.advance_by(1000);
        assert_eq!(f.session.occupant("top"), None);
    }

    #[test]
    fn test_hide_while_in_detail_returns_to_preview() {
        let mut f = fixture(SessionConfig::default(), Some(50), &[(1, 0, 5000, "top")]);
        f.play_to(100);
        f.session.request_detail(Fixture::id(1));
        // completion arrives mid-transition
        f.session.on_completion();
        f.session.advance_by(500);
        assert_eq!(f.mode(1), Mode::Preview);
        assert!(!f.session.activation(Fixture::id(1)).unwrap().is_transitioning());
        assert_eq!(f.heard.take(), vec![Heard::Enter(1), Heard::Exit(1)]);
    }

    #[test]
    fn test_load_failures_are_skipped() {
        let player = ManualPlayback::new();
        let mut session = Session::new(
            SessionConfig::default(),
            Box::new(player.clone()),
            Box::new(crate::NoopListener),
        );
        session.declare_slots(["top"]);
        let dist = distribution(&[(1, 0, 1000, "top"), (2, 0, 1000, "top"), (3, 0, 1000, "top")]);

        let mut lib = library(&[1]);
        lib.insert(ActivationId(3), doc(99));

        let report = session.load_distribution(dist, &mut lib);
        assert_eq!(report.loaded, vec![ActivationId(1)]);
        assert_eq!(report.failed.len(), 2);
        assert!(matches!(report.failed[0], (ActivationId(2), Error::ActivationNotFound(_))));
        assert!(matches!(report.failed[1].1, Error::ActivationMismatch { .. }));

        // 3 wins the slot but is not loaded, so the slot stays empty
        session.on_prepared();
        player.set_playing(true);
        player.set_position(10);
        session.run_pending();
        assert_eq!(session.occupant("top"), None);

        // a later load reuses the cache
        let again = session.load_distribution(distribution(&[(1, 0, 1000, "top")]), &mut library(&[]));
        assert_eq!(again.cached, vec![ActivationId(1)]);
        assert!(again.is_complete());
        session.advance_by(15);
        assert_eq!(session.occupant("top"), Some(ActivationId(1)));
    }

    #[test]
    fn test_stalled_runner_forced_after_timeout() {
        struct Stuck;
        impl TransitionRunner for Stuck {
            fn enter_detail(&mut self, _: NodeId, _: NodeId, _: crate::Completion) {}
            fn exit_detail(&mut self, _: NodeId, _: NodeId, _: crate::Completion) {}
        }

        let player = ManualPlayback::new();
        let heard = Recorder::default();
        let config = SessionConfig {
            transition_timeout_ms: Some(1000),
            ..SessionConfig::default()
        };
        let mut session = Session::new(config, Box::new(player.clone()), Box::new(heard.clone()))
            .with_transition(Box::new(Stuck));
        session.declare_slots(["top"]);
        session.load_distribution(distribution(&[(1, 0, 60_000, "top")]), &mut library(&[1]));
        session.on_prepared();
        player.set_playing(true);
        session.run_pending();

        assert!(session.request_detail(ActivationId(1)));
        session.advance_by(999);
        assert!(heard.take().is_empty());
        session.advance_by(1);
        assert_eq!(heard.take(), vec![Heard::Enter(1)]);
        assert_eq!(session.detail_activation(), Some(ActivationId(1)));
    }

    #[test]
    fn test_detail_surface_lives_on_overlay_layer() {
        let mut f = fixture(SessionConfig::default(), None, &[(1, 0, 5000, "top")]);
        f.play_to(30);
        f.session.request_detail(Fixture::id(1));
        let detail = f.session.activation(Fixture::id(1)).unwrap().detail_surface();
        assert_eq!(f.session.views().parent(detail), Some(f.session.overlay_layer()));
        assert_eq!(
            f.session.views().content(detail).unwrap(),
            &[crate::Widget::Text { content: "Details".into() }]
        );
        f.session.handle_back_button();
        assert_eq!(f.session.views().parent(detail), None);
    }
}
