//! Session registry: concurrent-safe map from session id to session state.
//!
//! The registry is the only state shared across session tasks. It is an
//! injected value cloned into the server state, not a process-wide global.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::supervisor::SupervisedProcess;

/// Opaque unique session identifier, generated at connect time.
pub type SessionId = Uuid;

/// Per-session state: the close handle for the owning connection and the
/// supervised process, if one has been launched.
#[derive(Debug)]
pub struct SessionRecord {
    pub id: SessionId,
    /// Cancelling this token closes the session's WebSocket connection,
    /// which in turn triggers cleanup.
    pub cancel: CancellationToken,
    /// At most one supervised process per session. An exited process stays
    /// here for status reporting until cleanup.
    pub process: Option<SupervisedProcess>,
}

/// Concurrent-safe mapping from [`SessionId`] to [`SessionRecord`].
///
/// Cheap to clone; all clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<RwLock<HashMap<SessionId, SessionRecord>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fresh session record and return its id along with the
    /// cancellation token the connection loop should watch.
    pub fn create(&self) -> (SessionId, CancellationToken) {
        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let record = SessionRecord {
            id,
            cancel: cancel.clone(),
            process: None,
        };
        self.inner.write().insert(id, record);
        (id, cancel)
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.inner.read().contains_key(id)
    }

    /// Clone of the session's cancellation token, if the session exists.
    pub fn cancel_token(&self, id: &SessionId) -> Option<CancellationToken> {
        self.inner.read().get(id).map(|r| r.cancel.clone())
    }

    /// Run `f` with mutable access to the session's record under the write
    /// lock. Returns `None` if the session does not exist.
    ///
    /// This is how the dispatcher performs its check-then-attach on launch
    /// atomically: liveness check, spawn, and handle attachment all happen
    /// under one lock acquisition. `f` must not block.
    pub fn with_record<R>(
        &self,
        id: &SessionId,
        f: impl FnOnce(&mut SessionRecord) -> R,
    ) -> Option<R> {
        let mut inner = self.inner.write();
        inner.get_mut(id).map(f)
    }

    /// Atomically take and delete a session record. Called exactly once per
    /// session, on the connection's exit path.
    pub fn remove(&self, id: &SessionId) -> Option<SessionRecord> {
        self.inner.write().remove(id)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}
