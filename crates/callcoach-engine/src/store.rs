//! In-memory session registry keyed by call id.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use callcoach_core::Timestamp;

use crate::error::EngineError;
use crate::session::Session;

/// Shared handle to one call's session. Lock it for the whole cycle.
pub type SessionHandle = Arc<Mutex<Session>>;

/// Registry of live sessions.
///
/// The outer lock only guards the map; each session has its own lock so
/// that different calls never wait on each other.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, SessionHandle>>,
    first_section: String,
}

impl SessionStore {
    /// New store whose sessions start at `first_section`.
    pub fn new(first_section: impl Into<String>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            first_section: first_section.into(),
        }
    }

    /// The session for `call_id`, created on first reference.
    pub fn get_or_create(&self, call_id: &str, now: Timestamp) -> Result<SessionHandle, EngineError> {
        let mut sessions = self.lock()?;
        let handle = sessions.entry(call_id.to_string()).or_insert_with(|| {
            tracing::info!(call_id, "Created session");
            Arc::new(Mutex::new(Session::new(call_id, self.first_section.clone(), now)))
        });
        Ok(Arc::clone(handle))
    }

    pub fn get(&self, call_id: &str) -> Result<SessionHandle, EngineError> {
        self.lock()?
            .get(call_id)
            .cloned()
            .ok_or_else(|| EngineError::SessionNotFound(call_id.to_string()))
    }

    /// Drop a session. Handles already held elsewhere stay usable.
    pub fn remove(&self, call_id: &str) -> Result<(), EngineError> {
        match self.lock()?.remove(call_id) {
            Some(_) => {
                tracing::info!(call_id, "Removed session");
                Ok(())
            }
            None => Err(EngineError::SessionNotFound(call_id.to_string())),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, SessionHandle>>, EngineError> {
        self.sessions
            .lock()
            .map_err(|e| EngineError::LockPoisoned(format!("session map: {}", e)))
    }
}

/// Lock one session, recovering the lock if a cycle panicked while holding it.
pub fn lock_session(handle: &SessionHandle) -> MutexGuard<'_, Session> {
    handle.lock().unwrap_or_else(|poisoned| {
        tracing::warn!("Recovered poisoned session lock");
        poisoned.into_inner()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_get_or_create_is_idempotent() {
        let store = SessionStore::new("S1");
        let a = store.get_or_create("CA1", 10).unwrap();
        let b = store.get_or_create("CA1", 20).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(store.len(), 1);
        let session = lock_session(&a);
        assert_eq!(session.section, "S1");
        assert_eq!(session.created_at, 10);
    }

    #[test]
    fn test_sessions_are_isolated() {
        let store = SessionStore::new("S1");
        let a = store.get_or_create("CA1", 0).unwrap();
        let b = store.get_or_create("CA2", 0).unwrap();
        lock_session(&a).objection_streak = 2;
        assert_eq!(lock_session(&b).objection_streak, 0);
    }

    #[test]
    fn test_get_unknown_is_not_found() {
        let store = SessionStore::new("S1");
        assert!(matches!(
            store.get("missing"),
            Err(EngineError::SessionNotFound(id)) if id == "missing"
        ));
    }

    #[test]
    fn test_remove() {
        let store = SessionStore::new("S1");
        store.get_or_create("CA1", 0).unwrap();
        store.remove("CA1").unwrap();
        assert!(store.is_empty());
        assert!(matches!(store.remove("CA1"), Err(EngineError::SessionNotFound(_))));
        // Recreated fresh on next reference.
        let again = store.get_or_create("CA1", 5).unwrap();
        assert_eq!(lock_session(&again).created_at, 5);
    }

    #[test]
    fn test_concurrent_get_or_create_yields_one_session() {
        let store = Arc::new(SessionStore::new("S1"));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let handle = store.get_or_create("CA1", 0).unwrap();
                    lock_session(&handle).objection_streak += 1;
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.len(), 1);
        let handle = store.get("CA1").unwrap();
        assert_eq!(lock_session(&handle).objection_streak, 8);
    }

    #[test]
    fn test_poisoned_session_lock_is_recovered() {
        let store = SessionStore::new("S1");
        let handle = store.get_or_create("CA1", 0).unwrap();
        let panicking = Arc::clone(&handle);
        let result = thread::spawn(move || {
            let mut session = panicking.lock().unwrap();
            session.objection_streak = 1;
            panic!("cycle failed");
        })
        .join();
        assert!(result.is_err());
        assert!(handle.is_poisoned());

        let handle = store.get("CA1").unwrap();
        let session = lock_session(&handle);
        assert_eq!(session.objection_streak, 1);
    }
}
