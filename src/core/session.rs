// src/core/session.rs — Per-caller conversation state with idle expiry
//
// Entries live in memory only and expire a fixed time after their last write.
// Sessions are handed out by clone and written back with `save`, so two
// concurrent requests for the same identity race and the last save wins.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::core::types::Turn;

/// Alphabet for the random suffix of upstream session ids.
const ID_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const ID_SUFFIX_LEN: usize = 9;

/// Generate an upstream session id: `session_<unix-millis>_<9 chars>`.
pub fn new_upstream_session_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    format!("session_{millis}_{}", random_suffix(ID_SUFFIX_LEN))
}

/// Random `[a-z0-9]` string using the OS CSPRNG, with rejection sampling to
/// avoid modular bias.
fn random_suffix(len: usize) -> String {
    // 252 = 36 * 7, the largest multiple of the alphabet size below 256
    const REJECT_THRESHOLD: u8 = (256 - (256 % ID_CHARSET.len())) as u8;

    let mut out = String::with_capacity(len);
    let mut buf = [0u8; 32];
    while out.len() < len {
        getrandom::getrandom(&mut buf).expect("OS CSPRNG unavailable");
        for &b in &buf {
            if out.len() >= len {
                break;
            }
            if b < REJECT_THRESHOLD {
                out.push(ID_CHARSET[(b as usize) % ID_CHARSET.len()] as char);
            }
        }
    }
    out
}

/// One caller's conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub key: String,
    /// Identifier sent upstream; fixed for the session's lifetime.
    pub upstream_session_id: String,
    pub history: Vec<Turn>,
}

impl Session {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            upstream_session_id: new_upstream_session_id(),
            history: Vec::new(),
        }
    }

    /// Append a completed exchange: the user turn, then the assistant turn.
    pub fn record_exchange(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        self.history.push(Turn::user(user));
        self.history.push(Turn::assistant(assistant));
    }
}

struct Entry {
    session: Session,
    expires_at: Instant,
}

/// Bounded map from caller identity to `Session`.
pub struct SessionStore {
    entries: Mutex<HashMap<String, Entry>>,
    ttl: Duration,
    capacity: usize,
}

impl SessionStore {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            capacity: capacity.max(1),
        }
    }

    /// Return the live session for `key`, creating and storing a fresh one
    /// when none exists or the old one expired.
    pub fn get_or_create(&self, key: &str) -> Session {
        let now = Instant::now();
        let mut entries = self.lock();

        if let Some(entry) = entries.get(key) {
            if entry.expires_at > now {
                return entry.session.clone();
            }
            tracing::debug!(key, "Session expired");
            entries.remove(key);
        }

        let session = Session::new(key);
        tracing::info!(
            key,
            upstream_session_id = %session.upstream_session_id,
            "Created session"
        );
        self.insert(&mut entries, session.clone(), now);
        session
    }

    /// Overwrite the stored session and restart its expiry clock.
    pub fn save(&self, session: Session) {
        let now = Instant::now();
        let mut entries = self.lock();
        self.insert(&mut entries, session, now);
    }

    /// Number of live (unexpired) sessions.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.lock().values().filter(|e| e.expires_at > now).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&self, entries: &mut HashMap<String, Entry>, session: Session, now: Instant) {
        if !entries.contains_key(&session.key) && entries.len() >= self.capacity {
            entries.retain(|_, e| e.expires_at > now);
            if entries.len() >= self.capacity {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, e)| e.expires_at)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    tracing::debug!(key = %oldest, "Evicting session to stay within capacity");
                    entries.remove(&oldest);
                }
            }
        }

        entries.insert(
            session.key.clone(),
            Entry {
                session,
                expires_at: now + self.ttl,
            },
        );
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        // A panic while holding the lock cannot leave an entry half-written,
        // so a poisoned map is still usable.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn store() -> SessionStore {
        SessionStore::new(Duration::from_secs(60), 16)
    }

    #[test]
    fn test_upstream_session_id_format() {
        let id = new_upstream_session_id();
        let parts: Vec<&str> = id.splitn(3, '_').collect();
        assert_eq!(parts[0], "session");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), ID_SUFFIX_LEN);
        assert!(parts[2]
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_upstream_session_ids_are_distinct() {
        let ids: HashSet<String> = (0..200).map(|_| new_upstream_session_id()).collect();
        assert_eq!(ids.len(), 200);
    }

    #[test]
    fn test_same_key_returns_same_upstream_id() {
        let store = store();
        let first = store.get_or_create("u1");
        let second = store.get_or_create("u1");
        assert_eq!(first.upstream_session_id, second.upstream_session_id);
        assert!(first.history.is_empty());
    }

    #[test]
    fn test_different_keys_get_different_sessions() {
        let store = store();
        let a = store.get_or_create("a");
        let b = store.get_or_create("b");
        assert_ne!(a.upstream_session_id, b.upstream_session_id);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_save_persists_history() {
        let store = store();
        let mut session = store.get_or_create("u1");
        session.record_exchange("hi", "hello");
        store.save(session);

        let reloaded = store.get_or_create("u1");
        assert_eq!(
            reloaded.history,
            vec![Turn::user("hi"), Turn::assistant("hello")]
        );
    }

    #[test]
    fn test_unsaved_changes_are_not_visible() {
        let store = store();
        let mut session = store.get_or_create("u1");
        session.record_exchange("hi", "hello");

        assert!(store.get_or_create("u1").history.is_empty());
    }

    #[test]
    fn test_expired_session_is_replaced() {
        let store = SessionStore::new(Duration::from_millis(20), 16);
        let mut first = store.get_or_create("u1");
        first.record_exchange("hi", "hello");
        store.save(first.clone());

        std::thread::sleep(Duration::from_millis(40));
        assert!(store.is_empty());

        let second = store.get_or_create("u1");
        assert_ne!(first.upstream_session_id, second.upstream_session_id);
        assert!(second.history.is_empty());
    }

    #[test]
    fn test_save_resets_expiry() {
        let store = SessionStore::new(Duration::from_millis(60), 16);
        let session = store.get_or_create("u1");
        std::thread::sleep(Duration::from_millis(40));
        store.save(session.clone());
        std::thread::sleep(Duration::from_millis(40));

        assert_eq!(
            store.get_or_create("u1").upstream_session_id,
            session.upstream_session_id
        );
    }

    #[test]
    fn test_capacity_evicts_oldest_expiring() {
        let store = SessionStore::new(Duration::from_secs(60), 2);
        let a = store.get_or_create("a");
        std::thread::sleep(Duration::from_millis(5));
        store.get_or_create("b");
        std::thread::sleep(Duration::from_millis(5));
        store.get_or_create("c");

        assert_eq!(store.len(), 2);
        // "a" had the earliest expiry, so it was evicted and is recreated
        assert_ne!(store.get_or_create("a").upstream_session_id, a.upstream_session_id);
    }

    #[test]
    fn test_saving_existing_key_at_capacity_does_not_evict() {
        let store = SessionStore::new(Duration::from_secs(60), 2);
        let a = store.get_or_create("a");
        let b = store.get_or_create("b");
        store.save(a.clone());

        assert_eq!(store.len(), 2);
        assert_eq!(store.get_or_create("b").upstream_session_id, b.upstream_session_id);
    }
}
