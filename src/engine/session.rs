// src/engine/session.rs — Per-user conversation sessions

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

/// Where a conversation currently stands. A session always has a state;
/// terminal outcomes (confirmed, cancelled) remove the session instead of
/// being states of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    // Registration flow
    RegAwaitingFullName,
    RegAwaitingPhone,
    RegAwaitingConfirmation,
    // Report flow
    ReportAwaitingZone,
    ReportAwaitingLocation,
    ReportAwaitingReason,
    ReportAwaitingPhoto,
    ReportAwaitingExtra,
    ReportAwaitingConfirmation,
}

/// Answers accumulated so far. Only the fields the current flow has reached
/// are populated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionFields {
    pub full_name: Option<String>,
    pub phone_number: Option<String>,
    pub zone: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub reason: Option<String>,
    pub photo_ref: Option<String>,
    pub plate_number: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: i64,
    pub chat_id: i64,
    pub username: Option<String>,
    pub state: SessionState,
    pub fields: SessionFields,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: i64, chat_id: i64, username: Option<String>, state: SessionState) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            chat_id,
            username,
            state,
            fields: SessionFields::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// In-memory session map, one entry per user. Sessions do not survive a
/// restart; an interrupted conversation starts over from the menu.
///
/// The map's own lock only guards map access. Atomicity of a whole
/// read-modify-write turn for one user comes from the engine's per-user
/// locks, which serialize `handle` calls per user id.
#[derive(Default)]
pub struct SessionStore {
    inner: Mutex<HashMap<i64, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, user_id: i64) -> Option<Session> {
        self.inner.lock().expect("session map poisoned").get(&user_id).cloned()
    }

    pub fn put(&self, mut session: Session) {
        session.updated_at = Utc::now();
        self.inner
            .lock()
            .expect("session map poisoned")
            .insert(session.user_id, session);
    }

    /// Remove and return the user's session, if any.
    pub fn clear(&self, user_id: i64) -> Option<Session> {
        self.inner.lock().expect("session map poisoned").remove(&user_id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("session map poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
