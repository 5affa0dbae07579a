//! User reconciliation between the panel and the engine
//!
//! The directory mirrors what is registered on the listener. Each cycle
//! diffs it against a fresh panel snapshot by value of `(id, secret)` and
//! applies removes before adds.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::adapter::ProxyEngineAdapter;
use super::api::{PanelApi, UserInfo};
use crate::core::{CipherKind, UserIdentity, UserRecord};
use crate::error::{EngineError, NodeError, Result};
use crate::logger::log;

/// Identities to remove and to add, each sorted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserDelta {
    pub removed: Vec<UserIdentity>,
    pub added: Vec<UserIdentity>,
}

impl UserDelta {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}

/// `removed = old \ new`, `added = new \ old`, by value
pub fn diff(old: &HashSet<UserIdentity>, new: &HashSet<UserIdentity>) -> UserDelta {
    let mut removed: Vec<UserIdentity> = old.difference(new).cloned().collect();
    let mut added: Vec<UserIdentity> = new.difference(old).cloned().collect();
    removed.sort();
    added.sort();
    UserDelta { removed, added }
}

/// Last known user set of the listener
///
/// Only the reconciler writes it; other readers take a copy.
#[derive(Debug, Clone, Default)]
pub struct UserDirectory {
    users: Arc<RwLock<HashMap<UserIdentity, UserRecord>>>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current records, sorted by identity
    pub async fn snapshot(&self) -> Vec<UserRecord> {
        let mut records: Vec<UserRecord> = self.users.read().await.values().cloned().collect();
        records.sort_by(|a, b| a.identity.cmp(&b.identity));
        records
    }

    pub async fn identities(&self) -> HashSet<UserIdentity> {
        self.users.read().await.keys().cloned().collect()
    }

    pub async fn contains(&self, identity: &UserIdentity) -> bool {
        self.users.read().await.contains_key(identity)
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

/// Outcome of one sync cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub added: usize,
    pub removed: usize,
    pub failed: usize,
    /// Directory size after the cycle
    pub total: usize,
}

impl SyncReport {
    fn into_result(self) -> Result<SyncReport> {
        if self.failed > 0 {
            Err(NodeError::PartialSync {
                failed: self.failed,
                attempted: self.added + self.removed + self.failed,
            })
        } else {
            Ok(self)
        }
    }
}

/// Keeps the listener's user table in line with the panel
pub struct Reconciler {
    api: Arc<dyn PanelApi>,
    adapter: Arc<ProxyEngineAdapter>,
    directory: UserDirectory,
    cipher: CipherKind,
}

impl Reconciler {
    pub fn new(api: Arc<dyn PanelApi>, adapter: Arc<ProxyEngineAdapter>, cipher: &str) -> Self {
        let cipher = CipherKind::from_name(cipher);
        if cipher == CipherKind::Unknown {
            log::warn!(tag = adapter.tag(), "Node cipher is not supported by the engine");
        }
        log::info!(tag = adapter.tag(), cipher = %cipher, "User cipher method");
        Self {
            api,
            adapter,
            directory: UserDirectory::new(),
            cipher,
        }
    }

    /// Handle to the directory for readers
    pub fn directory(&self) -> UserDirectory {
        self.directory.clone()
    }

    fn records(&self, users: &[UserInfo]) -> HashMap<UserIdentity, UserRecord> {
        users
            .iter()
            .map(|u| {
                let identity = UserIdentity::from(u);
                (identity.clone(), UserRecord::new(identity, self.cipher))
            })
            .collect()
    }

    /// Initial full sync: add every panel user.
    ///
    /// Every user is attempted. The directory keeps the ones the engine
    /// accepted and any failure is returned as `PartialSync`.
    pub async fn start(&self) -> Result<SyncReport> {
        let users = self.api.fetch_users().await?;
        let fetched = self.records(&users);

        let mut identities: Vec<&UserIdentity> = fetched.keys().collect();
        identities.sort();

        let mut accepted = HashMap::with_capacity(fetched.len());
        let mut report = SyncReport::default();

        for identity in identities {
            let record = &fetched[identity];
            match self.adapter.add_user(record) {
                Ok(()) => {
                    accepted.insert(identity.clone(), record.clone());
                    report.added += 1;
                }
                Err(EngineError::UserExists(email)) => {
                    log::warn!(user_id = identity.id, email = %email, "User already registered");
                    accepted.insert(identity.clone(), record.clone());
                    report.added += 1;
                }
                Err(e) => {
                    log::error!(user_id = identity.id, error = %e, "Failed to add user");
                    report.failed += 1;
                }
            }
        }

        let mut users_map = self.directory.users.write().await;
        *users_map = accepted;
        report.total = users_map.len();
        drop(users_map);

        log::info!(
            added = report.added,
            failed = report.failed,
            total = report.total,
            "Users initialized"
        );

        report.into_result()
    }

    /// Periodic sync: apply the delta between the directory and the panel.
    ///
    /// A failed fetch leaves everything untouched. Per-user failures are
    /// logged and skipped; the directory only records what the engine took.
    pub async fn reconcile(&self) -> Result<SyncReport> {
        let users = self.api.fetch_users().await?;
        let mut fetched = self.records(&users);
        let new_ids: HashSet<UserIdentity> = fetched.keys().cloned().collect();

        let mut users_map = self.directory.users.write().await;
        let old_ids: HashSet<UserIdentity> = users_map.keys().cloned().collect();
        let delta = diff(&old_ids, &new_ids);

        let mut report = SyncReport::default();
        let tag = self.adapter.tag().to_string();

        for identity in &delta.removed {
            match self.adapter.remove_user(&identity.key(&tag)) {
                Ok(()) => {
                    users_map.remove(identity);
                    report.removed += 1;
                }
                Err(EngineError::UserNotFound(email)) => {
                    log::warn!(user_id = identity.id, email = %email, "User already gone from engine");
                    users_map.remove(identity);
                    report.removed += 1;
                }
                Err(e) => {
                    log::error!(user_id = identity.id, error = %e, "Failed to remove user");
                    report.failed += 1;
                }
            }
        }

        for identity in &delta.added {
            let Some(record) = fetched.remove(identity) else {
                continue;
            };
            match self.adapter.add_user(&record) {
                Ok(()) => {
                    users_map.insert(identity.clone(), record);
                    report.added += 1;
                }
                Err(EngineError::UserExists(email)) => {
                    log::warn!(user_id = identity.id, email = %email, "User already registered");
                    users_map.insert(identity.clone(), record);
                    report.added += 1;
                }
                Err(e) => {
                    log::error!(user_id = identity.id, error = %e, "Failed to add user");
                    report.failed += 1;
                }
            }
        }

        report.total = users_map.len();
        drop(users_map);

        log::info!(
            removed = report.removed,
            added = report.added,
            failed = report.failed,
            total = report.total,
            "Users updated"
        );

        report.into_result()
    }
}
