use runner_core::SessionState;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;

pub type SharedSession = Arc<Mutex<SessionState>>;

#[derive(Debug)]
struct SessionEntry {
    session: SharedSession,
    last_used: Instant,
}

impl SessionEntry {
    fn new() -> Self {
        Self {
            session: Arc::new(Mutex::new(SessionState::new())),
            last_used: Instant::now(),
        }
    }
}

/// Per-browser-session histories.
///
/// Each session has its own lock, so one session's slow agent call never
/// blocks another session. Sessions a browser stops using are dropped by
/// [`SessionRegistry::sweep_idle`].
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<Uuid, SessionEntry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<Uuid, SessionEntry>> {
        // Every map operation completes under the lock, so a poisoned map is still usable
        self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn create(&self) -> (Uuid, SharedSession) {
        let id = Uuid::new_v4();
        let entry = SessionEntry::new();
        let session = entry.session.clone();
        self.sessions().insert(id, entry);
        debug!("Created session {}", id);
        (id, session)
    }

    /// Existing session for `id`, or a fresh one registered under it.
    /// Either way the session counts as used now.
    pub fn get_or_create(&self, id: Uuid) -> SharedSession {
        let mut sessions = self.sessions();
        let entry = sessions.entry(id).or_insert_with(|| {
            debug!("Creating session {} on first use", id);
            SessionEntry::new()
        });
        entry.last_used = Instant::now();
        entry.session.clone()
    }

    pub fn remove(&self, id: &Uuid) -> bool {
        self.sessions().remove(id).is_some()
    }

    /// Drop sessions unused for longer than `max_idle`. Sessions a request
    /// is still holding are kept. Returns how many were removed.
    pub fn sweep_idle(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions();
        let before = sessions.len();
        sessions.retain(|id, entry| {
            let keep =
                entry.last_used.elapsed() <= max_idle || Arc::strong_count(&entry.session) > 1;
            if !keep {
                debug!("Expiring idle session {}", id);
            }
            keep
        });
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions().is_empty()
    }
}

/// Lock a session, recovering the state if a previous holder panicked.
///
/// Turns are committed in pairs, so the state is consistent even then.
pub fn lock_session(session: &SharedSession) -> MutexGuard<'_, SessionState> {
    session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use runner_core::Turn;

    #[test]
    fn test_sessions_are_isolated() {
        let registry = SessionRegistry::new();
        let (a, session_a) = registry.create();
        let (b, _) = registry.create();
        assert_ne!(a, b);

        lock_session(&session_a).record_exchange(Turn::user("x"), Turn::assistant("y"));

        assert_eq!(lock_session(&registry.get_or_create(a)).len(), 2);
        assert!(lock_session(&registry.get_or_create(b)).is_empty());
    }

    #[test]
    fn test_unknown_id_is_created_once() {
        let registry = SessionRegistry::new();
        let id = Uuid::new_v4();
        let first = registry.get_or_create(id);
        let second = registry.get_or_create(id);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);

        assert!(registry.remove(&id));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_sweep_drops_only_idle_sessions() {
        let registry = SessionRegistry::new();
        let (stale, _) = registry.create();
        let (held, held_session) = registry.create();
        std::thread::sleep(Duration::from_millis(30));
        let fresh = Uuid::new_v4();
        registry.get_or_create(fresh);

        assert_eq!(registry.sweep_idle(Duration::from_millis(20)), 1);
        assert_eq!(registry.len(), 2);
        assert!(!registry.remove(&stale));
        assert!(registry.remove(&held));
        assert!(registry.remove(&fresh));
        drop(held_session);
    }

    #[test]
    fn test_use_refreshes_idle_clock() {
        let registry = SessionRegistry::new();
        let (id, session) = registry.create();
        drop(session);
        std::thread::sleep(Duration::from_millis(30));
        drop(registry.get_or_create(id));

        assert_eq!(registry.sweep_idle(Duration::from_millis(20)), 0);
        assert_eq!(registry.sweep_idle(Duration::from_secs(60)), 0);
        assert_eq!(registry.len(), 1);
    }
}
