use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use anyhow::Result;
use tracing::{debug, warn};

use crate::models::{Decision, PendingAction, ProfileId};

use super::persist::{load_json, save_json};

/// Decisions made while disconnected, keyed by identity.
///
/// An identity has at most one pending action: a later decision replaces the
/// earlier one and moves to the back of the queue. `drain_all` takes the whole
/// queue under the lock, so a concurrent `enqueue` lands either before the
/// drain (and is returned) or after it (and stays queued).
pub struct ActionQueue {
    path: Option<PathBuf>,
    entries: Mutex<Vec<PendingAction>>,
}

impl ActionQueue {
    /// Open (or create) the persisted queue at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = load_json::<Vec<PendingAction>>(&path)?
            .map(|cached| coalesce(cached.data))
            .unwrap_or_default();
        debug!(path = %path.display(), count = entries.len(), "Pending actions loaded");

        Ok(Self {
            path: Some(path),
            entries: Mutex::new(entries),
        })
    }

    /// Queue that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<PendingAction>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(&self, entries: &[PendingAction]) {
        let Some(ref path) = self.path else {
            return;
        };
        if let Err(e) = save_json(path, &entries) {
            warn!(error = %e, path = %path.display(), "Failed to write pending actions");
        }
    }

    /// Queue `decision` for `id`, replacing any earlier pending decision.
    pub fn enqueue(&self, id: ProfileId, decision: Decision) {
        let mut entries = self.lock();
        let replaced = replace_entry(&mut entries, PendingAction { id, decision });
        debug!(%id, %decision, replaced, queued = entries.len(), "Decision queued for replay");
        self.persist(&entries);
    }

    /// Remove and return every pending action, oldest first.
    pub fn drain_all(&self) -> Vec<PendingAction> {
        let mut entries = self.lock();
        let drained = std::mem::take(&mut *entries);
        if !drained.is_empty() {
            self.persist(&entries);
        }
        drained
    }

    /// Drop the pending decision for `id`, returning it. Used when a newer
    /// decision for the same identity is delivered directly.
    pub fn remove(&self, id: ProfileId) -> Option<Decision> {
        let mut entries = self.lock();
        let index = entries.iter().position(|a| a.id == id)?;
        let removed = entries.remove(index);
        debug!(%id, decision = %removed.decision, "Superseded pending decision dropped");
        self.persist(&entries);
        Some(removed.decision)
    }

    /// The pending decision for `id`, if any.
    pub fn pending(&self, id: ProfileId) -> Option<Decision> {
        self.lock().iter().find(|a| a.id == id).map(|a| a.decision)
    }

    pub fn snapshot(&self) -> Vec<PendingAction> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Drop any entry for the same identity and append. Returns whether an
/// earlier entry was replaced.
fn replace_entry(entries: &mut Vec<PendingAction>, action: PendingAction) -> bool {
    let before = entries.len();
    entries.retain(|a| a.id != action.id);
    let replaced = entries.len() != before;
    entries.push(action);
    replaced
}

/// Re-apply last-write-wins to a loaded list in case the file held repeats.
fn coalesce(loaded: Vec<PendingAction>) -> Vec<PendingAction> {
    let mut entries = Vec::with_capacity(loaded.len());
    for action in loaded {
        replace_entry(&mut entries, action);
    }
    entries
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enqueue_overwrites_same_identity() {
        let queue = ActionQueue::in_memory();
        let id = ProfileId::random();

        queue.enqueue(id, Decision::Accepted);
        queue.enqueue(id, Decision::Declined);

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pending(id), Some(Decision::Declined));
    }

    #[test]
    fn test_overwrite_moves_to_back() {
        let queue = ActionQueue::in_memory();
        let a = ProfileId::random();
        let b = ProfileId::random();

        queue.enqueue(a, Decision::Accepted);
        queue.enqueue(b, Decision::Accepted);
        queue.enqueue(a, Decision::Declined);

        let ids: Vec<ProfileId> = queue.snapshot().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![b, a]);
    }

    #[test]
    fn test_remove_drops_only_that_identity() {
        let queue = ActionQueue::in_memory();
        let a = ProfileId::random();
        let b = ProfileId::random();
        queue.enqueue(a, Decision::Declined);
        queue.enqueue(b, Decision::Accepted);

        assert_eq!(queue.remove(a), Some(Decision::Declined));
        assert_eq!(queue.remove(a), None);
        assert_eq!(
            queue.snapshot(),
            vec![PendingAction { id: b, decision: Decision::Accepted }]
        );
    }

    #[test]
    fn test_drain_all_empties_queue() {
        let queue = ActionQueue::in_memory();
        let a = ProfileId::random();
        let b = ProfileId::random();
        queue.enqueue(a, Decision::Accepted);
        queue.enqueue(b, Decision::Declined);

        let drained = queue.drain_all();
        assert_eq!(
            drained,
            vec![
                PendingAction { id: a, decision: Decision::Accepted },
                PendingAction { id: b, decision: Decision::Declined },
            ]
        );
        assert!(queue.is_empty());
        assert!(queue.drain_all().is_empty());
    }

    #[test]
    fn test_persisted_queue_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pending_actions.json");
        let id = ProfileId::random();
        {
            let queue = ActionQueue::open(&path).unwrap();
            queue.enqueue(id, Decision::Declined);
        }

        let reopened = ActionQueue::open(&path).unwrap();
        assert_eq!(reopened.pending(id), Some(Decision::Declined));

        reopened.drain_all();
        let again = ActionQueue::open(&path).unwrap();
        assert!(again.is_empty());
    }

    #[test]
    fn test_open_coalesces_repeats() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pending_actions.json");
        let id = ProfileId::random();
        save_json(
            &path,
            &vec![
                PendingAction { id, decision: Decision::Accepted },
                PendingAction { id, decision: Decision::Declined },
            ],
        )
        .unwrap();

        let queue = ActionQueue::open(&path).unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pending(id), Some(Decision::Declined));
    }

    #[test]
    fn test_concurrent_enqueue_and_drain_loses_nothing() {
        use std::sync::Arc;

        let queue = Arc::new(ActionQueue::in_memory());
        let ids: Vec<ProfileId> = (0..200).map(|_| ProfileId::random()).collect();

        let writer = {
            let queue = Arc::clone(&queue);
            let ids = ids.clone();
            std::thread::spawn(move || {
                for id in ids {
                    queue.enqueue(id, Decision::Accepted);
                }
            })
        };

        let mut seen = Vec::new();
        while seen.len() < ids.len() {
            seen.extend(queue.drain_all());
            if writer.is_finished() {
                seen.extend(queue.drain_all());
                break;
            }
        }
        writer.join().unwrap();
        seen.extend(queue.drain_all());

        assert_eq!(seen.len(), ids.len());
    }
}
