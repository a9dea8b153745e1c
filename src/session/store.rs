use chrono::{DateTime, Duration, Utc};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::Session;

struct StoredSession {
    session: Session,
    expires_at: DateTime<Utc>,
}

/// Token → Session table shared by every request.
///
/// Lookups share a read lock; `create` and `destroy` each hold the write lock
/// for a single insert/remove, so neither can be observed half-done.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, StoredSession>>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    pub fn with_ttl_hours(hours: u64) -> Self {
        // Capped at a century so the expiry arithmetic cannot overflow
        Self::new(Duration::hours(hours.min(876_000) as i64))
    }

    /// Issue a fresh token for `identity` and remember it
    pub async fn create(&self, identity: Session) -> Session {
        let now = Utc::now();
        let expires_at = now + self.ttl;
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, stored| stored.expires_at > now);
        if sessions.len() < before {
            tracing::debug!("Swept {} expired sessions", before - sessions.len());
        }
        loop {
            let token = Self::generate_token();
            if let Entry::Vacant(slot) = sessions.entry(token.clone()) {
                let session = Session { sid: Some(token), ..identity };
                slot.insert(StoredSession { session: session.clone(), expires_at });
                tracing::debug!("Session created for user {:?}", session.id);
                return session;
            }
        }
    }

    /// Look up a token. Unknown or expired tokens yield the empty session.
    pub async fn fetch(&self, token: &str) -> Session {
        let now = Utc::now();
        {
            let sessions = self.sessions.read().await;
            match sessions.get(token) {
                None => return Session::empty(),
                Some(stored) if stored.expires_at > now => return stored.session.clone(),
                Some(_) => {}
            }
        }

        // Expired: evict unless someone refreshed it in between
        let mut sessions = self.sessions.write().await;
        if sessions.get(token).is_some_and(|stored| stored.expires_at <= now) {
            sessions.remove(token);
            tracing::debug!("Evicted expired session");
        }
        Session::empty()
    }

    /// Forget a token. Returns whether it was known.
    pub async fn destroy(&self, token: &str) -> bool {
        self.sessions.write().await.remove(token).is_some()
    }

    /// Drop every session, e.g. at shutdown. Returns how many were dropped.
    pub async fn clear(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let count = sessions.len();
        sessions.clear();
        count
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn generate_token() -> String {
        Uuid::new_v4().simple().to_string()
    }
}
