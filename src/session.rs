//! Cookie-carried sessions
//!
//! A session is the server-side state for one logical client across repeated
//! requests, identified by an opaque id carried in a cookie. Each session
//! owns a long-poll [`EventQueue`]. The registry is an explicitly owned,
//! lock-guarded object shared by all connection workers; there is no global
//! state.

use crate::events::{Event, EventQueue};
use crate::http::Headers;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Name of the reserved session cookie
pub const SESSION_COOKIE: &str = "pollboxSessionId";

/// Per-client server-side state
pub struct Session {
    id: String,
    queue: EventQueue,
    last_seen: Mutex<Instant>,
}

impl Session {
    fn new(id: String) -> Self {
        Session {
            id,
            queue: EventQueue::new(),
            last_seen: Mutex::new(Instant::now()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    /// Record activity on this session
    pub fn touch(&self) {
        *self.last_seen.lock().unwrap() = Instant::now();
    }

    /// Time since the session was last touched
    pub fn idle_for(&self) -> Duration {
        self.last_seen.lock().unwrap().elapsed()
    }
}

/// Shared id → session map, guarded by a single lock.
///
/// `get_or_create` is one locked operation, so two near-simultaneous first
/// requests with the same id always resolve to the same session object.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        SessionRegistry {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve the session for a request.
    ///
    /// Adopts the id from the session cookie crumb when present; otherwise
    /// mints a fresh UUID. A missing `Cookie` header means "no id" and is
    /// never an error. Returns the session and whether the id was minted
    /// here (in which case the response must carry a `Set-Cookie`).
    pub fn resolve(&self, headers: &Headers) -> (Arc<Session>, bool) {
        match headers.cookie_crumb(SESSION_COOKIE) {
            Some(id) => (self.get_or_create(id), false),
            None => {
                let id = Uuid::new_v4().to_string();
                log::debug!("minted session id {}", id);
                (self.get_or_create(&id), true)
            }
        }
    }

    /// Look up a session by id, creating it on first sight.
    pub fn get_or_create(&self, id: &str) -> Arc<Session> {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Session::new(id.to_string())))
            .clone();
        drop(sessions);
        session.touch();
        session
    }

    /// Look up a session without creating it
    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.lock().unwrap().get(id).cloned()
    }

    /// Number of registered sessions
    pub fn count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    /// Enqueue an event for one session. Returns false for an unknown id.
    pub fn push_to(&self, id: &str, event: Event) -> bool {
        match self.get(id) {
            Some(session) => {
                session.queue().push(event);
                true
            }
            None => false,
        }
    }

    /// Enqueue an event for every registered session.
    pub fn broadcast(&self, event: &Event) {
        let sessions: Vec<Arc<Session>> =
            self.sessions.lock().unwrap().values().cloned().collect();
        for session in sessions {
            session.queue().push(event.clone());
        }
    }

    /// Snapshot of session id → queued-event count, for the status endpoint.
    pub fn snapshot(&self) -> Vec<(String, usize)> {
        let sessions: Vec<Arc<Session>> =
            self.sessions.lock().unwrap().values().cloned().collect();
        sessions
            .iter()
            .map(|s| (s.id().to_string(), s.queue().len()))
            .collect()
    }

    /// Drop sessions idle for longer than `max_idle`. Returns the number
    /// evicted. A session with a blocked poll has been touched recently and
    /// is never idle enough to evict.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.lock().unwrap();
        let before = sessions.len();
        sessions.retain(|_, s| s.idle_for() <= max_idle);
        let evicted = before - sessions.len();
        if evicted > 0 {
            log::info!("evicted {} idle session(s)", evicted);
        }
        evicted
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
