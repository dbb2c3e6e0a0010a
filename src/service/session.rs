use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::{chat::ChatTurn, quiz::IssuedQuiz};

/// Per-user learning state. Everything here lives in memory only and disappears with the
/// session.
#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    /// topic slug -> step name -> completed
    pub progress: HashMap<String, HashMap<String, bool>>,
    /// Shared by every topic page.
    pub chat_history: Vec<ChatTurn>,
    /// history bucket -> question texts already issued
    pub quiz_history: HashMap<String, Vec<String>>,
    /// topic slug -> quiz currently on screen
    pub current_quiz: HashMap<String, IssuedQuiz>,
}

impl Session {
    pub(crate) fn new(id: String) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            progress: HashMap::new(),
            chat_history: Vec::new(),
            quiz_history: HashMap::new(),
            current_quiz: HashMap::new(),
        }
    }

    pub fn history_bucket(&mut self, bucket: &str) -> &mut Vec<String> {
        self.quiz_history.entry(bucket.to_string()).or_default()
    }
}

/// Interactions on one session serialize on this lock.
pub type SessionHandle = Arc<Mutex<Session>>;

struct SessionEntry {
    expires_at: Instant,
    session: SessionHandle,
}

#[derive(Clone)]
pub struct SessionManager {
    session_ttl: Duration,
    sessions: Arc<RwLock<HashMap<String, SessionEntry>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Expired,
    Invalid,
}

impl SessionManager {
    pub fn new(session_ttl: Duration) -> Self {
        let ttl = if session_ttl.is_zero() {
            Duration::from_secs(300)
        } else {
            session_ttl
        };

        Self {
            session_ttl: ttl,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn ttl_secs(&self) -> u64 {
        self.session_ttl.as_secs()
    }

    pub async fn issue_session(&self) -> (String, DateTime<Utc>) {
        self.prune_expired().await;
        let id = Uuid::new_v4().to_string();
        let session = Session::new(id.clone());
        let created_at = session.created_at;
        let entry = SessionEntry {
            expires_at: Instant::now() + self.session_ttl,
            session: Arc::new(Mutex::new(session)),
        };
        self.sessions.write().await.insert(id.clone(), entry);
        tracing::info!(session_id = %id, "session started");
        (id, created_at)
    }

    /// Look up a session and slide its expiry forward.
    pub async fn lookup(&self, id: &str) -> Result<SessionHandle, SessionStatus> {
        let mut guard = self.sessions.write().await;
        let now = Instant::now();
        if let Some(entry) = guard.get_mut(id) {
            if entry.expires_at > now {
                entry.expires_at = now + self.session_ttl;
                return Ok(Arc::clone(&entry.session));
            }
            guard.remove(id);
            tracing::info!(session_id = %id, "session expired");
            return Err(SessionStatus::Expired);
        }
        Err(SessionStatus::Invalid)
    }

    pub async fn end_session(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            tracing::info!(session_id = %id, "session ended");
        }
        removed
    }

    async fn prune_expired(&self) {
        let now = Instant::now();
        self.sessions
            .write()
            .await
            .retain(|_, entry| entry.expires_at > now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn issued_session_is_found_and_ended() {
        let manager = SessionManager::new(Duration::from_secs(60));
        let (id, _) = manager.issue_session().await;

        let handle = manager.lookup(&id).await.expect("session");
        assert_eq!(handle.lock().await.id, id);

        assert!(manager.end_session(&id).await);
        assert_eq!(manager.lookup(&id).await.err(), Some(SessionStatus::Invalid));
        assert!(!manager.end_session(&id).await);
    }

    #[tokio::test]
    async fn expired_session_is_dropped() {
        let manager = SessionManager::new(Duration::from_millis(20));
        let (id, _) = manager.issue_session().await;
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(manager.lookup(&id).await.err(), Some(SessionStatus::Expired));
        assert_eq!(manager.lookup(&id).await.err(), Some(SessionStatus::Invalid));
    }

    #[tokio::test]
    async fn sessions_do_not_share_state() {
        let manager = SessionManager::new(Duration::from_secs(60));
        let (a, _) = manager.issue_session().await;
        let (b, _) = manager.issue_session().await;

        manager
            .lookup(&a)
            .await
            .unwrap()
            .lock()
            .await
            .history_bucket("식각")
            .push("건식 식각의 장점은?".to_string());

        let other = manager.lookup(&b).await.unwrap();
        assert!(other.lock().await.quiz_history.is_empty());
    }

    #[test]
    fn zero_ttl_falls_back_to_default() {
        let manager = SessionManager::new(Duration::ZERO);
        assert_eq!(manager.ttl_secs(), 300);
    }
}
