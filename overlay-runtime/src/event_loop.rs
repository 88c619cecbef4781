//! Single-threaded cooperative timer queue
//!
//! The host owns the clock: it calls [`crate::Session::advance_to`] from its
//! frame loop (or a simulation) and due tasks run in deadline order, ties
//! broken by scheduling order. Handles are cheap clones of one shared queue
//! so transition runners can post completions without borrowing the session.

use crate::TransitionTicket;
use std::cell::RefCell;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::rc::Rc;

/// Milliseconds on the host clock
pub type Millis = u64;

/// Handle to a scheduled task, used for cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Task {
    MonitorTick { generation: u64 },
    TransitionDone(TransitionTicket),
    TransitionTimeout(TransitionTicket),
}

#[derive(Debug, Default)]
struct Queue {
    now: Millis,
    next_id: u64,
    deadlines: BinaryHeap<Reverse<(Millis, u64)>>,
    tasks: HashMap<u64, Task>,
}

/// Shared handle to the session's timer queue
#[derive(Debug, Clone, Default)]
pub struct EventLoop {
    queue: Rc<RefCell<Queue>>,
}

impl EventLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current host time as last observed by the queue
    pub fn now(&self) -> Millis {
        self.queue.borrow().now
    }

    pub(crate) fn schedule(&self, delay: Millis, task: Task) -> TimerId {
        let mut queue = self.queue.borrow_mut();
        let id = queue.next_id;
        queue.next_id += 1;
        let due = queue.now.saturating_add(delay);
        queue.deadlines.push(Reverse((due, id)));
        queue.tasks.insert(id, task);
        TimerId(id)
    }

    /// Cancels a pending task. Returns false if it already ran or was cancelled.
    pub fn cancel(&self, timer: TimerId) -> bool {
        self.queue.borrow_mut().tasks.remove(&timer.0).is_some()
    }

    /// Pops the next live task due at or before `until`, moving the clock to
    /// its deadline
    pub(crate) fn pop_due(&self, until: Millis) -> Option<Task> {
        let mut queue = self.queue.borrow_mut();
        while let Some(Reverse((due, id))) = queue.deadlines.peek().copied() {
            if due > until {
                return None;
            }
            queue.deadlines.pop();
            if let Some(task) = queue.tasks.remove(&id) {
                queue.now = queue.now.max(due);
                return Some(task);
            }
        }
        None
    }

    /// Moves the clock forward; never backwards
    pub(crate) fn set_now(&self, now: Millis) {
        let mut queue = self.queue.borrow_mut();
        queue.now = queue.now.max(now);
    }

    /// Deadline of the earliest live task
    pub fn next_deadline(&self) -> Option<Millis> {
        let queue = self.queue.borrow();
        queue
            .deadlines
            .iter()
            .filter(|Reverse((_, id))| queue.tasks.contains_key(id))
            .map(|Reverse((due, _))| *due)
            .min()
    }

    /// Number of live tasks
    pub fn pending(&self) -> usize {
        self.queue.borrow().tasks.len()
    }
}
