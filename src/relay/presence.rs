use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::{auth::UserId, session::ConnId};

/// Which users have at least one live connection.
///
/// Process-local only: running several relay processes would need a shared
/// presence store, which this is not.
#[derive(Debug, Default)]
pub struct PresenceTable {
    entries: HashMap<UserId, PresenceEntry>,
}

#[derive(Debug, Default)]
struct PresenceEntry {
    handles: HashSet<ConnId>,
    status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineUser {
    pub user_id: UserId,
    pub connections: usize,
    pub status: Option<String>,
}

impl PresenceTable {
    /// Returns true if this made the user go online.
    pub fn register(&mut self, user: UserId, conn: ConnId) -> bool {
        let entry = self.entries.entry(user).or_default();
        entry.handles.insert(conn);
        entry.handles.len() == 1
    }

    /// Returns true if this was the user's last connection.
    pub fn unregister(&mut self, user: UserId, conn: ConnId) -> bool {
        let Some(entry) = self.entries.get_mut(&user) else {
            return false;
        };

        entry.handles.remove(&conn);
        if entry.handles.is_empty() {
            self.entries.remove(&user);
            return true;
        }
        false
    }

    pub fn is_online(&self, user: UserId) -> bool {
        self.entries.contains_key(&user)
    }

    pub fn handles_for(&self, user: UserId) -> HashSet<ConnId> {
        self.entries
            .get(&user)
            .map(|e| e.handles.clone())
            .unwrap_or_default()
    }

    /// Free-text status; ignored for users who aren't online.
    pub fn set_status(&mut self, user: UserId, status: Option<String>) -> bool {
        match self.entries.get_mut(&user) {
            Some(entry) => {
                entry.status = status;
                true
            }
            None => false,
        }
    }

    pub fn online(&self) -> Vec<OnlineUser> {
        self.entries
            .iter()
            .map(|(user_id, entry)| OnlineUser {
                user_id: *user_id,
                connections: entry.handles.len(),
                status: entry.status.clone(),
            })
            .collect()
    }
}
