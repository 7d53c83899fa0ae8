//! In-memory studio sessions, at most one per user.
//!
//! Sessions live only as long as the process; the durable equivalent is
//! [`super::visit_manager::VisitManager`].

use std::collections::HashMap;
use std::sync::Mutex;

use uuid::Uuid;

use super::visit::StudioVisit;
use crate::entities::UserRecord;

#[derive(Default)]
pub struct SessionManager {
    sessions: Mutex<HashMap<String, StudioVisit>>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.sessions.lock().map(|s| s.len()).unwrap_or(0);
        write!(f, "SessionManager({count} sessions)")
    }
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// The user's session, created on first use.
    pub fn get_or_create(&self, user: &UserRecord) -> StudioVisit {
        let mut map = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = map.values().find(|s| s.user_id == user.id) {
            return existing.clone();
        }
        insert_new(&mut map, user)
    }

    /// Drop the user's session (if any) and start a fresh one.
    pub fn reset(&self, user: &UserRecord) -> StudioVisit {
        let mut map = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        map.retain(|_, s| s.user_id != user.id);
        insert_new(&mut map, user)
    }

    pub fn has(&self, user_id: &str) -> bool {
        self.sessions
            .lock()
            .map(|map| map.values().any(|s| s.user_id == user_id))
            .unwrap_or(false)
    }

    /// Returns `true` if a session was removed.
    pub fn delete(&self, user_id: &str) -> bool {
        let mut map = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        let before = map.len();
        map.retain(|_, s| s.user_id != user_id);
        map.len() != before
    }
}

fn insert_new(map: &mut HashMap<String, StudioVisit>, user: &UserRecord) -> StudioVisit {
    let visit = StudioVisit::new(Uuid::new_v4().to_string(), user);
    map.insert(visit.session_id.clone(), visit.clone());
    visit
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entities::user::test_user;
    use crate::entities::UserRole;

    #[test]
    fn get_or_create_is_stable_until_reset() {
        let manager = SessionManager::new();
        let user = test_user("s@example.com", UserRole::User);

        let first = manager.get_or_create(&user);
        assert_eq!(manager.get_or_create(&user), first);
        assert!(manager.has(&user.id));

        let reset = manager.reset(&user);
        assert_ne!(reset.session_id, first.session_id);
        assert_eq!(manager.get_or_create(&user), reset);
    }

    #[test]
    fn sessions_are_per_user() {
        let manager = SessionManager::new();
        let a = test_user("a@example.com", UserRole::User);
        let b = test_user("b@example.com", UserRole::User);

        let sa = manager.get_or_create(&a);
        let sb = manager.get_or_create(&b);
        assert_ne!(sa.session_id, sb.session_id);

        assert!(manager.delete(&a.id));
        assert!(!manager.delete(&a.id));
        assert!(!manager.has(&a.id));
        assert!(manager.has(&b.id));
    }
}
