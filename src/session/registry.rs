use super::coordinator::SessionCoordinator;
use super::stats::SessionStats;
use crate::config::ProvidersConfig;
use crate::events::ClientSink;
use crate::providers::Connector;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::info;
use uuid::Uuid;

/// Identity of one client connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

pub type SessionHandle = Arc<Mutex<SessionCoordinator>>;

/// Process-wide table of active sessions (session id → coordinator)
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<SessionId, SessionHandle>>>,
    connector: Arc<dyn Connector>,
    endpoints: Arc<ProvidersConfig>,
}

impl SessionRegistry {
    pub fn new(connector: Arc<dyn Connector>, endpoints: ProvidersConfig) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            connector,
            endpoints: Arc::new(endpoints),
        }
    }

    /// Register a new idle session for a freshly connected client
    pub async fn create(&self, client: ClientSink) -> (SessionId, SessionHandle) {
        let id = SessionId::new();
        let session = Arc::new(Mutex::new(SessionCoordinator::new(
            id,
            client,
            Arc::clone(&self.connector),
            Arc::clone(&self.endpoints),
        )));

        {
            let mut sessions = self.sessions.write().await;
            sessions.insert(id, Arc::clone(&session));
        }

        info!("[{}] client connected", id);
        (id, session)
    }

    pub async fn get(&self, id: &SessionId) -> Option<SessionHandle> {
        let sessions = self.sessions.read().await;
        sessions.get(id).cloned()
    }

    /// Remove a session and tear down its adapters.
    ///
    /// Returns `false` if the session was already gone.
    pub async fn destroy(&self, id: &SessionId) -> bool {
        // Remove first so the session can't be looked up during teardown
        let session = {
            let mut sessions = self.sessions.write().await;
            sessions.remove(id)
        };

        match session {
            Some(session) => {
                session.lock().await.on_disconnect().await;
                info!("[{}] client disconnected", id);
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Stats for every active session
    pub async fn snapshot(&self) -> Vec<SessionStats> {
        let handles: Vec<SessionHandle> = {
            let sessions = self.sessions.read().await;
            sessions.values().cloned().collect()
        };

        let mut stats = Vec::with_capacity(handles.len());
        for handle in handles {
            stats.push(handle.lock().await.stats());
        }
        stats.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        stats
    }

    /// Destroy every session, e.g. on process shutdown
    pub async fn shutdown(&self) {
        let ids: Vec<SessionId> = {
            let sessions = self.sessions.read().await;
            sessions.keys().copied().collect()
        };

        for id in ids {
            self.destroy(&id).await;
        }
    }
}
