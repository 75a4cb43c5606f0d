//! In-memory session registry.
//!
//! The store is an injected value owned by whoever builds the service, not a
//! process-wide global. Each session sits behind its own `RwLock`; the
//! orchestrator task that owns a session holds the only write side, readers
//! (status queries, delivery adapters) never block each other.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

use crate::session::types::DebateSession;

/// Shared, independently lockable session record.
pub type SessionHandle = Arc<RwLock<DebateSession>>;

/// What [`SessionStore::sweep`] does with finished sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionPolicy {
    /// Sessions live for the process lifetime.
    #[default]
    KeepAll,
    /// Drop terminal sessions older than the given age. Age is measured from
    /// completion when the session has a completion timestamp, else from
    /// creation.
    DropTerminalAfter(Duration),
}

/// Registry mapping session identifier to session state.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionHandle>>,
    policy: EvictionPolicy,
}

impl SessionStore {
    /// Store that never evicts.
    pub fn new() -> Self {
        Self::with_policy(EvictionPolicy::KeepAll)
    }

    pub fn with_policy(policy: EvictionPolicy) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            policy,
        }
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    /// Create a session and register it under its generated id.
    pub async fn create(&self, design_prompt: &str, project_id: Option<String>) -> SessionHandle {
        let session = DebateSession::new(design_prompt, project_id);
        let session_id = session.session_id.clone();
        let handle: SessionHandle = Arc::new(RwLock::new(session));
        self.sessions
            .write()
            .await
            .insert(session_id.clone(), handle.clone());
        debug!(session_id = %session_id, "session registered");
        handle
    }

    /// Handle for a session id, if registered.
    pub async fn get(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.read().await.get(session_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Registered session ids, in no particular order.
    pub async fn session_ids(&self) -> Vec<String> {
        self.sessions.read().await.keys().cloned().collect()
    }

    /// Apply the eviction policy and return how many sessions were removed.
    ///
    /// Sessions currently locked for writing are live and skipped.
    pub async fn sweep(&self) -> usize {
        let max_age = match self.policy {
            EvictionPolicy::KeepAll => return 0,
            EvictionPolicy::DropTerminalAfter(age) => age,
        };
        let now = chrono::Utc::now();

        let mut expired = Vec::new();
        {
            let sessions = self.sessions.read().await;
            for (session_id, handle) in sessions.iter() {
                let Ok(session) = handle.try_read() else {
                    continue;
                };
                if !session.status.is_terminal() {
                    continue;
                }
                let reference = session.completed_at.unwrap_or(session.created_at);
                let old_enough = (now - reference)
                    .to_std()
                    .map(|age| age >= max_age)
                    .unwrap_or(false);
                if old_enough {
                    expired.push(session_id.clone());
                }
            }
        }

        if expired.is_empty() {
            return 0;
        }
        let mut sessions = self.sessions.write().await;
        let mut removed = 0;
        for session_id in expired {
            if sessions.remove(&session_id).is_some() {
                debug!(session_id = %session_id, "evicted terminal session");
                removed += 1;
            }
        }
        removed
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::types::SessionStatus;

    #[tokio::test]
    async fn test_create_and_get_roundtrip() {
        let store = SessionStore::new();
        let handle = store.create("Logo for a coffee shop", None).await;
        let session_id = handle.read().await.session_id.clone();

        let fetched = store.get(&session_id).await.unwrap();
        assert_eq!(fetched.read().await.design_prompt, "Logo for a coffee shop");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_unknown_id_returns_none() {
        let store = SessionStore::new();
        assert!(store.get("no-such-session").await.is_none());
    }

    #[tokio::test]
    async fn test_keep_all_never_evicts() {
        let store = SessionStore::new();
        let handle = store.create("p", None).await;
        {
            let mut session = handle.write().await;
            session.status = SessionStatus::Completed;
            session.completed_at = Some(chrono::Utc::now() - chrono::Duration::days(30));
        }
        assert_eq!(store.sweep().await, 0);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_sweep_drops_old_terminal_sessions_only() {
        let store =
            SessionStore::with_policy(EvictionPolicy::DropTerminalAfter(Duration::from_secs(3600)));

        let old_done = store.create("old completed", None).await;
        {
            let mut session = old_done.write().await;
            session.status = SessionStatus::Completed;
            session.completed_at = Some(chrono::Utc::now() - chrono::Duration::hours(2));
        }

        let fresh_done = store.create("fresh completed", None).await;
        {
            let mut session = fresh_done.write().await;
            session.status = SessionStatus::Completed;
            session.completed_at = Some(chrono::Utc::now());
        }

        let running = store.create("still running", None).await;
        {
            let mut session = running.write().await;
            session.status = SessionStatus::InProgress;
        }

        assert_eq!(store.sweep().await, 1);
        assert_eq!(store.len().await, 2);
        let old_id = old_done.read().await.session_id.clone();
        assert!(store.get(&old_id).await.is_none());
    }

    #[tokio::test]
    async fn test_sweep_uses_created_at_for_failed_sessions() {
        let store =
            SessionStore::with_policy(EvictionPolicy::DropTerminalAfter(Duration::from_secs(60)));
        let handle = store.create("failed run", None).await;
        {
            let mut session = handle.write().await;
            session.status = SessionStatus::Failed;
            session.created_at = chrono::Utc::now() - chrono::Duration::minutes(5);
        }
        assert_eq!(store.sweep().await, 1);
        assert!(store.is_empty().await);
    }
}
