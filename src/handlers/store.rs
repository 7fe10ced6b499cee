use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::session::FoodSession;

/// In-memory sessions, one per browser/client. Nothing survives a restart.
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Arc<Mutex<FoodSession>>>>,
    created: RwLock<Vec<Uuid>>, // oldest first
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            created: RwLock::new(Vec::new()),
            max_sessions: max_sessions.max(1),
        }
    }

    /// Open a new session, evicting the oldest ones when the cap is reached.
    pub async fn create(&self) -> Uuid {
        let session = FoodSession::new();
        let id = session.id;

        let mut sessions = self.sessions.write().await;
        let mut created = self.created.write().await;

        while sessions.len() >= self.max_sessions && !created.is_empty() {
            let oldest = created.remove(0);
            sessions.remove(&oldest);
            log::info!("🧹 Evicted session {} (limit {})", oldest, self.max_sessions);
        }

        sessions.insert(id, Arc::new(Mutex::new(session)));
        created.push(id);
        log::info!("🆕 Session {} created ({} active)", id, sessions.len());
        id
    }

    pub async fn get(&self, id: &Uuid) -> Option<Arc<Mutex<FoodSession>>> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn remove(&self, id: &Uuid) -> bool {
        let mut sessions = self.sessions.write().await;
        let mut created = self.created.write().await;
        created.retain(|existing| existing != id);
        sessions.remove(id).is_some()
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
