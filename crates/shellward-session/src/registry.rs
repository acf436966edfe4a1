//! Session registry and the per-session in-flight guard.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, MutexGuard};
use tracing::debug;

use shellward_types::{SessionId, ShellwardError};

use crate::store::SessionContext;

/// One live session: its context behind the in-flight guard.
///
/// The async mutex *is* the in-flight guard: holding the guard means this
/// session has an evaluation in flight, and dropping it (on every exit
/// path, success, error, or timeout) releases the session exactly once.
/// A session can therefore never remain permanently in flight.
pub struct SessionHandle {
    id: SessionId,
    state: AsyncMutex<SessionContext>,
    /// Requests currently queued behind the in-flight evaluation.
    waiters: AtomicUsize,
}

impl SessionHandle {
    fn new(id: SessionId, history_capacity: usize) -> Self {
        Self {
            state: AsyncMutex::new(SessionContext::new(id.clone(), history_capacity)),
            id,
            waiters: AtomicUsize::new(0),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Acquire the session for evaluation.
    ///
    /// If an evaluation is in flight, the request queues behind it up to
    /// `max_queue` deep; beyond that it is answered immediately with
    /// [`ShellwardError::SessionBusy`]. Queued requests run strictly one at
    /// a time, so two requests for the same session are never evaluated
    /// concurrently.
    pub async fn acquire(
        &self,
        max_queue: usize,
    ) -> Result<MutexGuard<'_, SessionContext>, ShellwardError> {
        if let Ok(guard) = self.state.try_lock() {
            return Ok(guard);
        }
        let queued = self.waiters.fetch_add(1, Ordering::SeqCst);
        if queued >= max_queue {
            self.waiters.fetch_sub(1, Ordering::SeqCst);
            debug!(session = %self.id, queued, "session queue full, answering busy");
            return Err(ShellwardError::SessionBusy);
        }
        let guard = self.state.lock().await;
        self.waiters.fetch_sub(1, Ordering::SeqCst);
        Ok(guard)
    }
}

/// Map from session id to live session, created on first sight.
///
/// The registry lock covers lookup-or-create only; per-session work happens
/// under each session's own guard, so unrelated sessions proceed fully in
/// parallel.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionId, Arc<SessionHandle>>>,
    history_capacity: usize,
}

impl SessionRegistry {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            history_capacity,
        }
    }

    /// Return the session for `id`, creating it on first sight.
    pub fn lookup_or_create(&self, id: &SessionId) -> Arc<SessionHandle> {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = sessions.get(id) {
            return Arc::clone(handle);
        }
        debug!(session = %id, "creating session");
        let handle = Arc::new(SessionHandle::new(id.clone(), self.history_capacity));
        sessions.insert(id.clone(), Arc::clone(&handle));
        handle
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
