//! In-memory session registry.
//!
//! Sessions live only as long as the process. Each has an absolute expiry
//! fixed at creation; expired entries are dropped when looked up and swept
//! by [`SessionRegistry::purge_expired`].

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use uuid::Uuid;

/// Session lifetime: 24 hours from login.
pub const SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// The principal bound to a session token.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user_id: String,
    pub username: String,
    expires_at: Instant,
}

impl Session {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Session>>,
    ttl: Duration,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(SESSION_TTL)
    }
}

impl SessionRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Create a session and return its opaque token.
    pub async fn create(&self, user_id: &str, username: &str) -> String {
        let token = Uuid::new_v4().simple().to_string();
        let session = Session {
            user_id: user_id.to_string(),
            username: username.to_string(),
            expires_at: Instant::now() + self.ttl,
        };
        self.sessions.write().await.insert(token.clone(), session);
        token
    }

    /// Look up a live session. Expired sessions are removed.
    pub async fn lookup(&self, token: &str) -> Option<Session> {
        let now = Instant::now();
        {
            let sessions = self.sessions.read().await;
            match sessions.get(token) {
                Some(session) if !session.is_expired(now) => return Some(session.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        self.sessions.write().await.remove(token);
        tracing::debug!("Session expired");
        None
    }

    /// Destroy a session. Returns whether it existed.
    pub async fn destroy(&self, token: &str) -> bool {
        self.sessions.write().await.remove(token).is_some()
    }

    /// Drop every expired session. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(now));
        before - sessions.len()
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    #[cfg(test)]
    pub(crate) async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_lookup() {
        let registry = SessionRegistry::default();
        let token = registry.create("user-1", "admin").await;
        let session = registry.lookup(&token).await.unwrap();
        assert_eq!(session.user_id, "user-1");
        assert_eq!(session.username, "admin");
    }

    #[tokio::test]
    async fn test_tokens_are_unique() {
        let registry = SessionRegistry::default();
        let a = registry.create("user-1", "admin").await;
        let b = registry.create("user-1", "admin").await;
        assert_ne!(a, b);
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn test_unknown_token() {
        let registry = SessionRegistry::default();
        assert!(registry.lookup("nope").await.is_none());
    }

    #[tokio::test]
    async fn test_destroy() {
        let registry = SessionRegistry::default();
        let token = registry.create("user-1", "admin").await;
        assert!(registry.destroy(&token).await);
        assert!(!registry.destroy(&token).await);
        assert!(registry.lookup(&token).await.is_none());
    }

    #[tokio::test]
    async fn test_expired_session_is_removed_on_lookup() {
        let registry = SessionRegistry::new(Duration::from_millis(10));
        let token = registry.create("user-1", "admin").await;
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert!(registry.lookup(&token).await.is_none());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let registry = SessionRegistry::new(Duration::from_millis(10));
        registry.create("user-1", "admin").await;
        registry.create("user-2", "other").await;
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert_eq!(registry.purge_expired().await, 2);
        assert!(registry.is_empty().await);
    }
}
