use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::models::{CachedProfile, DecisionStatus, ProfileFields, ProfileId, RemoteRecord};

use super::persist::{load_json, save_json};

/// Result of applying one remote sighting to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

struct StoreInner {
    /// Stable storage order: first insertion first.
    rows: Vec<CachedProfile>,
    saved_at: Option<DateTime<Utc>>,
}

/// Deduplicated store of `CachedProfile`, keyed by identity.
///
/// Every mutation is applied in memory and then written through to the JSON
/// file (when opened with a path). A failed write is logged and otherwise
/// ignored: memory may run ahead of disk until the next successful write.
/// All operations take the same lock, so writes to one identity never
/// interleave.
pub struct ProfileStore {
    path: Option<PathBuf>,
    inner: Mutex<StoreInner>,
}

impl ProfileStore {
    /// Open (or create) the durable store at `path` and enforce the
    /// one-row-per-identity invariant on whatever was on disk.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let loaded = load_json::<Vec<CachedProfile>>(&path)?;
        let (rows, saved_at) = match loaded {
            Some(cached) => (cached.data, Some(cached.cached_at)),
            None => (Vec::new(), None),
        };
        debug!(path = %path.display(), count = rows.len(), "Profile store loaded");

        let store = Self {
            path: Some(path),
            inner: Mutex::new(StoreInner { rows, saved_at }),
        };
        store.purge_duplicates();
        Ok(store)
    }

    /// Store that never touches disk.
    pub fn in_memory() -> Self {
        Self::with_rows(Vec::new())
    }

    /// In-memory store seeded with raw rows, duplicates included.
    pub fn with_rows(rows: Vec<CachedProfile>) -> Self {
        Self {
            path: None,
            inner: Mutex::new(StoreInner {
                rows,
                saved_at: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Write the current rows through to disk, logging on failure.
    fn persist(&self, inner: &mut StoreInner) {
        let Some(ref path) = self.path else {
            return;
        };
        match save_json(path, &inner.rows) {
            Ok(saved_at) => inner.saved_at = Some(saved_at),
            Err(e) => warn!(error = %e, path = %path.display(), "Failed to write profile store"),
        }
    }

    // ===== Reads =====

    pub fn get(&self, id: ProfileId) -> Option<CachedProfile> {
        self.lock().rows.iter().find(|p| p.id == id).cloned()
    }

    /// Every cached profile in storage order.
    pub fn get_all(&self) -> Vec<CachedProfile> {
        self.lock().rows.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().rows.is_empty()
    }

    /// When the durable snapshot was last written (or loaded).
    pub fn last_saved(&self) -> Option<DateTime<Utc>> {
        self.lock().saved_at
    }

    // ===== Writes =====

    /// Insert unless the identity is already present. Returns whether the
    /// profile was inserted.
    pub fn insert(&self, profile: CachedProfile) -> bool {
        let mut inner = self.lock();
        if inner.rows.iter().any(|p| p.id == profile.id) {
            debug!(id = %profile.id, "Profile already exists, skipping insert");
            return false;
        }
        inner.rows.push(profile);
        self.persist(&mut inner);
        true
    }

    /// Overwrite the remote-owned fields of `id`, or insert a new undecided
    /// profile. Status and local asset path are never touched on update.
    pub fn upsert(&self, id: ProfileId, fields: ProfileFields) -> UpsertOutcome {
        let mut inner = self.lock();
        let outcome = match inner.rows.iter().position(|p| p.id == id) {
            Some(i) => {
                inner.rows[i].fields = fields;
                UpsertOutcome::Updated
            }
            None => {
                inner.rows.push(CachedProfile::new(id, fields));
                UpsertOutcome::Inserted
            }
        };
        self.persist(&mut inner);
        outcome
    }

    /// `upsert` for a whole page with a single durable write.
    pub fn upsert_batch(&self, records: &[RemoteRecord]) -> Vec<UpsertOutcome> {
        let mut inner = self.lock();
        let mut index: HashMap<ProfileId, usize> = inner
            .rows
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id, i))
            .collect();

        let mut outcomes = Vec::with_capacity(records.len());
        for record in records {
            match index.get(&record.id) {
                Some(&i) => {
                    inner.rows[i].fields = record.fields.clone();
                    outcomes.push(UpsertOutcome::Updated);
                }
                None => {
                    index.insert(record.id, inner.rows.len());
                    inner.rows.push(CachedProfile::from(record.clone()));
                    outcomes.push(UpsertOutcome::Inserted);
                }
            }
        }

        if !records.is_empty() {
            self.persist(&mut inner);
        }
        outcomes
    }

    /// Set the decision status. Unknown identities are a no-op; returns
    /// whether a profile was found.
    pub fn set_status(&self, id: ProfileId, status: DecisionStatus) -> bool {
        let mut inner = self.lock();
        let Some(profile) = inner.rows.iter_mut().find(|p| p.id == id) else {
            debug!(%id, "Status update for unknown profile ignored");
            return false;
        };
        if profile.status == status {
            return true;
        }
        profile.status = status;
        self.persist(&mut inner);
        true
    }

    /// Record where avatars were cached, with at most one durable write.
    /// Unknown identities and repeats of the same path are no-ops. Returns
    /// how many profiles changed.
    pub fn set_local_asset_paths(&self, paths: &[(ProfileId, PathBuf)]) -> usize {
        let mut inner = self.lock();
        let mut changed = 0;
        for (id, path) in paths {
            let Some(profile) = inner.rows.iter_mut().find(|p| p.id == *id) else {
                continue;
            };
            if profile.local_asset_path.as_ref() == Some(path) {
                continue;
            }
            profile.local_asset_path = Some(path.clone());
            changed += 1;
        }
        if changed > 0 {
            self.persist(&mut inner);
        }
        changed
    }

    /// Delete one identity. Returns whether anything was removed.
    pub fn delete(&self, id: ProfileId) -> bool {
        let mut inner = self.lock();
        let before = inner.rows.len();
        inner.rows.retain(|p| p.id != id);
        let removed = inner.rows.len() != before;
        if removed {
            self.persist(&mut inner);
        }
        removed
    }

    /// Administrative purge of every cached profile.
    pub fn purge_all(&self) {
        let mut inner = self.lock();
        info!(count = inner.rows.len(), "Purging all cached profiles");
        inner.rows.clear();
        self.persist(&mut inner);
    }

    /// Keep the first row per identity in storage order and delete the rest.
    /// Returns the number of rows removed.
    pub fn purge_duplicates(&self) -> usize {
        let mut inner = self.lock();
        let before = inner.rows.len();
        let mut seen = HashSet::with_capacity(before);
        inner.rows.retain(|p| seen.insert(p.id));

        let removed = before - inner.rows.len();
        if removed > 0 {
            warn!(removed, "Removed duplicate cached profiles");
            self.persist(&mut inner);
        }
        removed
    }
}

// ============================================================================
// Tests
// ============================================================================
