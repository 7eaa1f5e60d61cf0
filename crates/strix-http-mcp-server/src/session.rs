//! Sessions and the session table
//!
//! A [`Session`] is one logical client conversation: an id, activity
//! timestamps, an active flag and an unbounded outbound message queue.
//! Background dispatch tasks and the change fan-out produce into the
//! queue; the session's SSE stream is the single consumer.
//!
//! The table is owned by the transport. The dispatcher core never touches
//! it directly; list-change events reach it through the server's
//! subscription channel.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{Mutex, RwLock, mpsc};
use tracing::debug;

/// Current time as Unix epoch milliseconds
pub(crate) fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis() as u64
}

/// Outcome of one poll of the session queue
#[derive(Debug)]
pub(crate) enum MessagePoll {
    /// A queued message arrived
    Message(Value),
    /// Nothing arrived within the poll window
    Idle,
    /// The queue can produce nothing further
    Closed,
}

/// Per-client state: id, timestamps, outbound queue, active flag.
///
/// `enqueue` is a no-op once the session is terminated; undelivered
/// messages are discarded at termination.
pub struct Session {
    id: String,
    created_at: u64,
    last_accessed: AtomicU64,
    active: AtomicBool,
    tx: mpsc::UnboundedSender<Value>,
    rx: Mutex<mpsc::UnboundedReceiver<Value>>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let now = now_millis();
        Arc::new(Self {
            id: id.into(),
            created_at: now,
            last_accessed: AtomicU64::new(now),
            active: AtomicBool::new(true),
            tx,
            rx: Mutex::new(rx),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn last_accessed(&self) -> u64 {
        self.last_accessed.load(Ordering::Relaxed)
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    /// Record client activity for idle reaping
    pub fn touch(&self) {
        self.last_accessed.store(now_millis(), Ordering::Relaxed);
    }

    /// Queue an outbound message. Silently dropped when terminated.
    pub fn enqueue(&self, message: Value) {
        if !self.is_active() {
            return;
        }
        // The receiver lives as long as the session, so this only fails
        // during teardown
        let _ = self.tx.send(message);
    }

    /// Deactivate and discard any undelivered messages. A concurrently
    /// polling SSE stream notices at its next poll boundary.
    pub fn terminate(&self) {
        self.active.store(false, Ordering::Relaxed);
        if let Ok(mut rx) = self.rx.try_lock() {
            while rx.try_recv().is_ok() {}
        }
    }

    /// Await the next queued message, bounded by `poll`. Only the SSE
    /// stream calls this; the inner lock enforces the single-consumer
    /// discipline.
    pub(crate) async fn next_message(&self, poll: Duration) -> MessagePoll {
        let mut rx = self.rx.lock().await;
        match tokio::time::timeout(poll, rx.recv()).await {
            Ok(Some(message)) => MessagePoll::Message(message),
            Ok(None) => MessagePoll::Closed,
            Err(_elapsed) => MessagePoll::Idle,
        }
    }

    #[cfg(test)]
    pub(crate) fn set_last_accessed(&self, millis: u64) {
        self.last_accessed.store(millis, Ordering::Relaxed);
    }
}

/// All live sessions, keyed by id. Shared between the HTTP handlers, the
/// change fan-out bridge and the idle reaper.
#[derive(Default)]
pub struct SessionTable {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Fetch an existing session or create one under this id. Reusing an
    /// existing session keeps `initialize` idempotent per session id.
    pub async fn get_or_create(&self, id: &str) -> Arc<Session> {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get(id) {
            return Arc::clone(session);
        }
        let session = Session::new(id);
        sessions.insert(id.to_string(), Arc::clone(&session));
        debug!(session = %id, "session created");
        session
    }

    /// Detach a session from the table; the caller decides whether to
    /// terminate it.
    pub async fn remove(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.write().await.remove(id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Enqueue a copy of `message` onto every active session
    pub async fn broadcast(&self, message: Value) {
        let sessions = self.sessions.read().await;
        for session in sessions.values() {
            if session.is_active() {
                session.enqueue(message.clone());
            }
        }
    }

    /// Remove and terminate every session with `last_accessed` older than
    /// `cutoff` (epoch millis). Returns the removed ids.
    pub async fn remove_idle(&self, cutoff: u64) -> Vec<String> {
        let mut sessions = self.sessions.write().await;
        let stale: Vec<String> = sessions
            .iter()
            .filter(|(_, session)| session.last_accessed() < cutoff)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &stale {
            if let Some(session) = sessions.remove(id) {
                session.terminate();
            }
        }
        stale
    }

    /// Terminate everything; used at server shutdown
    pub async fn terminate_all(&self) {
        let mut sessions = self.sessions.write().await;
        for (_, session) in sessions.drain() {
            session.terminate();
        }
    }
}
