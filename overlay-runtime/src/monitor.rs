//! Playback monitoring: a self-rescheduling poll of the playback position

use crate::event_loop::{EventLoop, Millis, Task, TimerId};
use overlay_core::Position;
use std::cell::Cell;
use std::rc::Rc;
use tracing::debug;

/// What the monitor needs from the media player
pub trait PlaybackSource {
    fn current_position(&self) -> Position;
    fn is_playing(&self) -> bool;
}

/// Playback source driven by hand: by the host mirroring a real player, by
/// a simulation, or by tests. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct ManualPlayback {
    position: Rc<Cell<Position>>,
    playing: Rc<Cell<bool>>,
}

impl ManualPlayback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_position(&self, position: Position) {
        self.position.set(position);
    }

    /// Moves the position forward by `delta` milliseconds
    pub fn advance(&self, delta: Millis) {
        self.position.set(self.position.get().saturating_add(delta));
    }

    pub fn set_playing(&self, playing: bool) {
        self.playing.set(playing);
    }
}

impl PlaybackSource for ManualPlayback {
    fn current_position(&self) -> Position {
        self.position.get()
    }

    fn is_playing(&self) -> bool {
        self.playing.get()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// No media prepared, or playback completed
    Idle,
    Monitoring,
}

/// Bookkeeping for the polling task. At most one tick is ever scheduled:
/// starting cancels the pending one and bumps the generation, which makes
/// any tick that slipped through inert.
#[derive(Debug)]
pub(crate) struct PlaybackMonitor {
    state: MonitorState,
    in_seek: bool,
    last_processed: Option<Position>,
    generation: u64,
    pending: Option<TimerId>,
    poll_interval: Millis,
    idle_interval: Millis,
}

impl PlaybackMonitor {
    pub(crate) fn new(poll_interval: Millis, idle_interval: Millis) -> Self {
        Self {
            state: MonitorState::Idle,
            in_seek: false,
            last_processed: None,
            generation: 0,
            pending: None,
            poll_interval,
            idle_interval,
        }
    }

    pub(crate) fn state(&self) -> MonitorState {
        self.state
    }

    pub(crate) fn in_seek(&self) -> bool {
        self.in_seek
    }

    pub(crate) fn last_processed(&self) -> Option<Position> {
        self.last_processed
    }

    /// Starts (or restarts) the loop with an immediate first tick
    pub(crate) fn start(&mut self, events: &EventLoop) {
        self.cancel(events);
        self.state = MonitorState::Monitoring;
        self.schedule(0, events);
    }

    pub(crate) fn stop(&mut self, events: &EventLoop) {
        self.cancel(events);
        self.state = MonitorState::Idle;
    }

    fn cancel(&mut self, events: &EventLoop) {
        if let Some(timer) = self.pending.take() {
            events.cancel(timer);
        }
        self.generation += 1;
    }

    fn schedule(&mut self, delay: Millis, events: &EventLoop) {
        let generation = self.generation;
        self.pending = Some(events.schedule(delay, Task::MonitorTick { generation }));
    }

    pub(crate) fn seek_started(&mut self) {
        self.in_seek = true;
    }

    pub(crate) fn seek_completed(&mut self) {
        self.in_seek = false;
        self.forget_position();
    }

    /// Makes the next sample count as new even if the position is unchanged
    pub(crate) fn forget_position(&mut self) {
        self.last_processed = None;
    }

    pub(crate) fn record(&mut self, position: Position) {
        self.last_processed = Some(position);
    }

    /// Runs one tick and reschedules. Returns the position to evaluate, if
    /// the tick sampled one that has not been processed yet.
    pub(crate) fn on_tick(
        &mut self,
        generation: u64,
        source: &dyn PlaybackSource,
        detail_open: bool,
        events: &EventLoop,
    ) -> Option<Position> {
        if generation != self.generation || self.state != MonitorState::Monitoring {
            debug!("Dropping stale monitor tick");
            return None;
        }
        self.pending = None;

        if !source.is_playing() && !detail_open {
            self.schedule(self.idle_interval, events);
            return None;
        }

        let mut sample = None;
        if !self.in_seek {
            let position = source.current_position();
            if self.last_processed != Some(position) {
                sample = Some(position);
            }
        }
        self.schedule(self.poll_interval, events);
        sample
    }
}
