//! Event records and the per-session long-poll queue
//!
//! Each session owns one [`EventQueue`]: a FIFO of pending notifications and
//! a condition variable used to wake the session's blocked long poll when an
//! event arrives. At most one poll may be blocked per queue; a second
//! concurrent poll is rejected rather than silently replacing the waiter.

use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// How long a long poll blocks before returning an empty result
pub const DEFAULT_POLL_DELAY: Duration = Duration::from_millis(5000);

/// How often a blocked poll re-checks connection liveness
pub const DEFAULT_LIVENESS_INTERVAL: Duration = Duration::from_millis(250);

/// A queued notification, serialized as `{"name": ..., "parameters": [...]}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub name: String,
    pub parameters: Vec<Value>,
}

impl Event {
    pub fn new(name: impl Into<String>, parameters: Vec<Value>) -> Self {
        Event {
            name: name.into(),
            parameters,
        }
    }

    /// An event that carries no parameters
    pub fn signal(name: impl Into<String>) -> Self {
        Event::new(name, Vec::new())
    }
}

/// Returned when a poll is attempted while another poll is already blocked
/// on the same queue.
#[derive(Debug, thiserror::Error)]
#[error("a poll is already blocked on this queue")]
pub struct PollBusy;

struct QueueState {
    events: VecDeque<Event>,
    poller_blocked: bool,
}

/// FIFO event queue with a single-waiter wake mechanism
pub struct EventQueue {
    state: Mutex<QueueState>,
    wake: Condvar,
}

impl EventQueue {
    pub fn new() -> Self {
        EventQueue {
            state: Mutex::new(QueueState {
                events: VecDeque::new(),
                poller_blocked: false,
            }),
            wake: Condvar::new(),
        }
    }

    /// Append an event; wakes the blocked poller if there is one.
    pub fn push(&self, event: Event) {
        let mut state = self.state.lock().unwrap();
        state.events.push_back(event);
        if state.poller_blocked {
            self.wake.notify_one();
        }
    }

    /// Number of queued events
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drain all queued events immediately, oldest first.
    pub fn try_drain(&self) -> Vec<Event> {
        let mut state = self.state.lock().unwrap();
        state.events.drain(..).collect()
    }

    /// Drain queued events, blocking up to `delay` when the queue is empty.
    ///
    /// Wakes as soon as an event is pushed. While blocked, `alive` is
    /// consulted every `liveness_interval`; a dead connection releases the
    /// waiter early with whatever is queued (usually nothing). Returns
    /// [`PollBusy`] when another poll is already blocked on this queue.
    pub fn wait_drain(
        &self,
        delay: Duration,
        liveness_interval: Duration,
        mut alive: impl FnMut() -> bool,
    ) -> Result<Vec<Event>, PollBusy> {
        let deadline = Instant::now() + delay;
        let mut state = self.state.lock().unwrap();

        if !state.events.is_empty() {
            return Ok(state.events.drain(..).collect());
        }
        if state.poller_blocked {
            return Err(PollBusy);
        }
        state.poller_blocked = true;

        loop {
            let now = Instant::now();
            if now >= deadline || !state.events.is_empty() {
                break;
            }

            let slice = liveness_interval.min(deadline - now);
            let (guard, _) = self.wake.wait_timeout(state, slice).unwrap();
            state = guard;

            if !state.events.is_empty() {
                break;
            }
            if !alive() {
                break;
            }
        }

        state.poller_blocked = false;
        Ok(state.events.drain(..).collect())
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
