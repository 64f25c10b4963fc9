//! Tracks every session an app knows about.

use std::collections::HashMap;
use std::sync::Arc;

use crate::UserSnapshot;
use crate::user::SessionCell;

struct Entry {
    cell: Arc<SessionCell>,
    /// Bumped on every login; the highest logged-in entry is "current".
    login_seq: u64,
}

/// All logged-in and logged-out sessions of one app, keyed by user id.
///
/// Removed sessions are dropped from the registry. Handles to them keep
/// working (they hold the cell), but the app no longer lists them.
///
/// Not thread-safe by itself; [`App`](crate::App) keeps it behind a mutex
/// and never holds that lock across a remote call.
#[derive(Default)]
pub(crate) struct SessionRegistry {
    sessions: HashMap<String, Entry>,
    next_seq: u64,
}

impl SessionRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Records a fresh login.
    ///
    /// If the user already has a cell (logged out earlier, or a second
    /// login), the new snapshot is swapped into that same cell so every
    /// existing handle sees it.
    pub(crate) fn register(&mut self, snapshot: UserSnapshot) -> Arc<SessionCell> {
        self.next_seq += 1;
        let login_seq = self.next_seq;
        let id = snapshot.id().to_string();

        match self.sessions.get_mut(&id) {
            Some(entry) => {
                entry.cell.replace(snapshot);
                entry.login_seq = login_seq;
                Arc::clone(&entry.cell)
            }
            None => {
                let cell = Arc::new(SessionCell::new(snapshot));
                self.sessions.insert(
                    id,
                    Entry {
                        cell: Arc::clone(&cell),
                        login_seq,
                    },
                );
                cell
            }
        }
    }

    pub(crate) fn get(&self, user_id: &str) -> Option<Arc<SessionCell>> {
        self.sessions.get(user_id).map(|entry| Arc::clone(&entry.cell))
    }

    /// Drops `cell` from the registry. Only the exact cell is removed, so a
    /// stale handle can't evict a session that was registered after it.
    pub(crate) fn remove(&mut self, cell: &Arc<SessionCell>) -> bool {
        let id = cell.load().id().to_string();
        match self.sessions.get(&id) {
            Some(entry) if Arc::ptr_eq(&entry.cell, cell) => {
                self.sessions.remove(&id);
                true
            }
            _ => false,
        }
    }

    /// The most recently logged-in session that is still logged in.
    pub(crate) fn current(&self) -> Option<Arc<SessionCell>> {
        self.sessions
            .values()
            .filter(|entry| entry.cell.load().state().is_logged_in())
            .max_by_key(|entry| entry.login_seq)
            .map(|entry| Arc::clone(&entry.cell))
    }

    pub(crate) fn all(&self) -> Vec<Arc<SessionCell>> {
        self.sessions
            .values()
            .map(|entry| Arc::clone(&entry.cell))
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.sessions.len()
    }
}
