//! Queue State Model
//!
//! Holds the current snapshot of the queue server's three partitions and
//! publishes it to any number of readers through `tokio::sync::watch`.
//!
//! # Consistency
//!
//! Every mutation builds a complete new [`QueueSnapshot`] from the current one and
//! swaps it in under the watch channel's write lock. Readers receive an
//! `Arc<QueueSnapshot>`, so a render pass always sees one whole snapshot, never a
//! mix of old and new partitions. The model performs no I/O and owns no task.
//!
//! # Update rules
//!
//! - `update_queue` replaces `pending`. Items listed there leave `active` and
//!   `completed` (the server re-queued them).
//! - `update_active` sets or clears `active`. A different previous item moves to
//!   the end of `completed`, marked `completed`, or `preempted` when the caller
//!   passes [`Handoff::Preempt`]. The new item leaves `pending`.
//! - `update_completed` replaces `completed` (full snapshot, chronological order,
//!   newest last). Listed items leave `pending` and `active`.
//! - `apply_snapshot` replaces all three partitions at once.
//! - `move_pending` reorders one pending item locally; the next server snapshot
//!   wins.
//!
//! A candidate snapshot that still lists one uid twice is rejected with
//! [`GuiError::SnapshotInconsistency`] and the last good snapshot is kept.
//!
//! # Example
//!
//! ```rust,ignore
//! let model = QueueStateModel::new();
//! let mut rx = model.subscribe();
//! model.update_queue(vec![QueueItem::new("a", "plan", "count")])?;
//! rx.changed().await?;
//! assert_eq!(rx.borrow().pending.len(), 1);
//! ```

use super::client::ServerStatus;
use super::item::{ExitStatus, Partition, QueueItem};
use crate::error::{AppResult, GuiError};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Complete, immutable point-in-time copy of the queue.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueSnapshot {
    /// Incremented on every accepted change
    pub revision: u64,
    /// Waiting items in submission order
    pub pending: Vec<QueueItem>,
    /// Currently executing item
    pub active: Option<QueueItem>,
    /// Progress of the active item in percent, if reported
    pub active_progress: Option<u8>,
    /// Finished items, oldest first
    pub completed: Vec<QueueItem>,
}

impl QueueSnapshot {
    /// True when nothing is executing.
    pub fn is_idle(&self) -> bool {
        self.active.is_none()
    }

    /// Partition holding `uid`, if any.
    pub fn locate(&self, uid: &str) -> Option<Partition> {
        self.entries()
            .find(|(_, item)| item.uid == uid)
            .map(|(partition, _)| partition)
    }

    /// All items tagged with their partition.
    pub fn entries(&self) -> impl Iterator<Item = (Partition, &QueueItem)> {
        self.pending
            .iter()
            .map(|item| (Partition::Pending, item))
            .chain(self.active.iter().map(|item| (Partition::Active, item)))
            .chain(self.completed.iter().map(|item| (Partition::Completed, item)))
    }

    /// Check that no uid appears twice across or within partitions.
    pub fn validate(&self) -> AppResult<()> {
        let mut seen: HashMap<&str, Partition> = HashMap::new();
        for (partition, item) in self.entries() {
            if let Some(first) = seen.insert(item.uid.as_str(), partition) {
                return Err(GuiError::SnapshotInconsistency {
                    uid: item.uid.clone(),
                    first,
                    second: partition,
                });
            }
        }
        Ok(())
    }

    /// Same partitions, ignoring the revision counter.
    fn same_contents(&self, other: &QueueSnapshot) -> bool {
        self.pending == other.pending
            && self.active == other.active
            && self.active_progress == other.active_progress
            && self.completed == other.completed
    }
}

/// What happens to the previous active item when a different one becomes active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Handoff {
    /// Record the previous item as completed
    #[default]
    Complete,
    /// Record the previous item as preempted
    Preempt,
}

impl Handoff {
    fn exit_status(self) -> ExitStatus {
        match self {
            Handoff::Complete => ExitStatus::Completed,
            Handoff::Preempt => ExitStatus::Preempted,
        }
    }
}

/// Shared queue state, written by the queue client side and read by widgets.
#[derive(Debug)]
pub struct QueueStateModel {
    snapshot: watch::Sender<Arc<QueueSnapshot>>,
    status: watch::Sender<ServerStatus>,
}

impl Default for QueueStateModel {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueStateModel {
    /// Create an empty model.
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(QueueSnapshot::default()));
        let (status, _) = watch::channel(ServerStatus::default());
        Self { snapshot, status }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<QueueSnapshot> {
        self.snapshot.borrow().clone()
    }

    /// Receiver notified after every accepted change.
    pub fn subscribe(&self) -> watch::Receiver<Arc<QueueSnapshot>> {
        self.snapshot.subscribe()
    }

    /// Last reported server status.
    pub fn status(&self) -> ServerStatus {
        self.status.borrow().clone()
    }

    /// Receiver notified when the server status changes.
    pub fn subscribe_status(&self) -> watch::Receiver<ServerStatus> {
        self.status.subscribe()
    }

    /// Publish a new server status.
    pub fn update_status(&self, status: ServerStatus) {
        self.status.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            *current = status;
            true
        });
    }

    /// Replace the pending sequence, keeping the given order.
    pub fn update_queue(&self, pending: Vec<QueueItem>) -> AppResult<()> {
        self.apply("update_queue", move |current| {
            let mut next = current.clone();
            let queued: HashSet<&str> = pending.iter().map(|item| item.uid.as_str()).collect();
            if next
                .active
                .as_ref()
                .is_some_and(|active| queued.contains(active.uid.as_str()))
            {
                next.active = None;
                next.active_progress = None;
            }
            next.completed
                .retain(|item| !queued.contains(item.uid.as_str()));
            next.pending = pending;
            next
        })
        .map(|_| ())
    }

    /// Set or clear the active item, completing any different previous one.
    pub fn update_active(&self, item: Option<QueueItem>) -> AppResult<()> {
        self.update_active_with(item, Handoff::Complete)
    }

    /// Set or clear the active item with an explicit handoff policy.
    pub fn update_active_with(&self, item: Option<QueueItem>, handoff: Handoff) -> AppResult<()> {
        self.apply("update_active", move |current| {
            let mut next = current.clone();
            match (next.active.take(), item) {
                (Some(previous), Some(item)) if previous.uid == item.uid => {
                    next.active = Some(item);
                }
                (previous, item) => {
                    if let Some(previous) = previous {
                        next.completed.push(previous.finished(handoff.exit_status()));
                    }
                    next.active_progress = None;
                    if let Some(item) = item {
                        next.pending.retain(|p| p.uid != item.uid);
                        next.completed.retain(|c| c.uid != item.uid);
                        next.active = Some(item);
                    }
                }
            }
            next
        })
        .map(|_| ())
    }

    /// Replace the completed list (full snapshot, oldest first).
    pub fn update_completed(&self, completed: Vec<QueueItem>) -> AppResult<()> {
        self.apply("update_completed", move |current| {
            let mut next = current.clone();
            let done: HashSet<&str> = completed.iter().map(|item| item.uid.as_str()).collect();
            if next
                .active
                .as_ref()
                .is_some_and(|active| done.contains(active.uid.as_str()))
            {
                next.active = None;
                next.active_progress = None;
            }
            next.pending.retain(|item| !done.contains(item.uid.as_str()));
            next.completed = completed;
            next
        })
        .map(|_| ())
    }

    /// Replace all three partitions in one swap.
    pub fn apply_snapshot(
        &self,
        pending: Vec<QueueItem>,
        active: Option<QueueItem>,
        completed: Vec<QueueItem>,
    ) -> AppResult<()> {
        self.apply("apply_snapshot", move |current| {
            let keep_progress = match (&current.active, &active) {
                (Some(old), Some(new)) => old.uid == new.uid,
                _ => false,
            };
            QueueSnapshot {
                revision: current.revision,
                pending,
                active,
                active_progress: if keep_progress {
                    current.active_progress
                } else {
                    None
                },
                completed,
            }
        })
        .map(|_| ())
    }

    /// Report progress of the active item. Ignored while idle.
    pub fn update_progress(&self, percent: Option<u8>) -> AppResult<()> {
        self.apply("update_progress", move |current| {
            let mut next = current.clone();
            if next.active.is_some() {
                next.active_progress = percent.map(|p| p.min(100));
            }
            next
        })
        .map(|_| ())
    }

    /// Remove a pending item without a completion record.
    ///
    /// Returns `false` when no pending item has that uid.
    pub fn cancel(&self, uid: &str) -> bool {
        let removed = self.apply("cancel", |current| {
            let mut next = current.clone();
            next.pending.retain(|item| item.uid != uid);
            next
        });
        matches!(removed, Ok(true))
    }

    /// Move a pending item to `index` (clamped to the pending range).
    ///
    /// Local only: the next full snapshot from the server replaces the order.
    /// Returns `false` when no pending item has that uid or it is already there.
    pub fn move_pending(&self, uid: &str, index: usize) -> bool {
        let moved = self.apply("move_pending", |current| {
            let mut next = current.clone();
            if let Some(from) = next.pending.iter().position(|item| item.uid == uid) {
                let to = index.min(next.pending.len() - 1);
                let item = next.pending.remove(from);
                next.pending.insert(to, item);
            }
            next
        });
        matches!(moved, Ok(true))
    }

    /// Build the next snapshot from the current one and swap it in.
    ///
    /// Returns `Ok(false)` when the candidate equals the current snapshot, in which
    /// case subscribers are not woken.
    fn apply<F>(&self, operation: &'static str, mutate: F) -> AppResult<bool>
    where
        F: FnOnce(&QueueSnapshot) -> QueueSnapshot,
    {
        let mut outcome = Ok(false);
        self.snapshot.send_if_modified(|current| {
            let mut next = mutate(current.as_ref());
            if let Err(err) = next.validate() {
                outcome = Err(err);
                return false;
            }
            if next.same_contents(&**current) {
                return false;
            }
            next.revision = current.revision + 1;
            *current = Arc::new(next);
            outcome = Ok(true);
            true
        });

        match &outcome {
            Ok(true) => debug!(operation, "queue snapshot updated"),
            Ok(false) => {}
            Err(err) => warn!(
                operation,
                error = %err,
                "rejected inconsistent queue update, keeping last good snapshot"
            ),
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::item::ItemResult;
    use tracing_test::traced_test;

    fn item(uid: &str) -> QueueItem {
        QueueItem::new(uid, "plan", format!("plan_{uid}"))
    }

    fn uids(items: &[QueueItem]) -> Vec<&str> {
        items.iter().map(|i| i.uid.as_str()).collect()
    }

    #[test]
    fn test_update_queue_preserves_order() {
        let model = QueueStateModel::new();
        model.update_queue(vec![item("q"), item("r")]).unwrap();
        model
            .update_queue(vec![item("x"), item("y"), item("z")])
            .unwrap();
        assert_eq!(uids(&model.snapshot().pending), vec!["x", "y", "z"]);
    }

    #[test]
    fn test_active_handoff_completes_previous() {
        let model = QueueStateModel::new();
        model.update_queue(vec![item("p")]).unwrap();
        model.update_active(Some(item("a"))).unwrap();
        model.update_active(Some(item("b"))).unwrap();

        let snapshot = model.snapshot();
        assert_eq!(snapshot.active.as_ref().unwrap().uid, "b");
        assert_eq!(uids(&snapshot.completed), vec!["a"]);
        assert_eq!(
            snapshot.completed[0].exit_status(),
            Some(&ExitStatus::Completed)
        );
        assert_eq!(uids(&snapshot.pending), vec!["p"]);
    }

    #[test]
    fn test_active_handoff_preempt() {
        let model = QueueStateModel::new();
        model.update_active(Some(item("a"))).unwrap();
        model
            .update_active_with(Some(item("b")), Handoff::Preempt)
            .unwrap();
        let snapshot = model.snapshot();
        assert_eq!(
            snapshot.completed[0].exit_status(),
            Some(&ExitStatus::Preempted)
        );
    }

    #[test]
    fn test_activation_removes_from_pending() {
        let model = QueueStateModel::new();
        model.update_queue(vec![item("a"), item("b")]).unwrap();
        model.update_active(Some(item("a"))).unwrap();
        let snapshot = model.snapshot();
        assert_eq!(uids(&snapshot.pending), vec!["b"]);
        assert_eq!(snapshot.locate("a"), Some(Partition::Active));
    }

    #[test]
    fn test_same_active_uid_does_not_complete() {
        let model = QueueStateModel::new();
        model.update_active(Some(item("a"))).unwrap();
        model.update_progress(Some(40)).unwrap();
        model
            .update_active(Some(item("a").with_kwarg("n", serde_json::json!(3))))
            .unwrap();
        let snapshot = model.snapshot();
        assert!(snapshot.completed.is_empty());
        assert_eq!(snapshot.active_progress, Some(40));
    }

    #[test]
    fn test_clearing_active_completes_it() {
        let model = QueueStateModel::new();
        model.update_active(Some(item("a"))).unwrap();
        model.update_active(None).unwrap();
        let snapshot = model.snapshot();
        assert!(snapshot.is_idle());
        assert_eq!(uids(&snapshot.completed), vec!["a"]);
    }

    #[test]
    fn test_update_completed_full_replace_clears_active() {
        let model = QueueStateModel::new();
        model.update_completed(vec![item("old")]).unwrap();
        model.update_queue(vec![item("b")]).unwrap();
        model.update_active(Some(item("a"))).unwrap();

        let finished = item("a").with_result(ItemResult::new(ExitStatus::Failed));
        model.update_completed(vec![finished]).unwrap();

        let snapshot = model.snapshot();
        assert!(snapshot.is_idle());
        assert_eq!(uids(&snapshot.completed), vec!["a"]);
        assert_eq!(snapshot.completed[0].exit_status(), Some(&ExitStatus::Failed));
        assert_eq!(uids(&snapshot.pending), vec!["b"]);
    }

    #[test]
    fn test_requeue_moves_active_back_to_pending() {
        let model = QueueStateModel::new();
        model.update_active(Some(item("a"))).unwrap();
        model.update_queue(vec![item("a"), item("b")]).unwrap();
        let snapshot = model.snapshot();
        assert!(snapshot.is_idle());
        assert_eq!(uids(&snapshot.pending), vec!["a", "b"]);
    }

    #[test]
    #[traced_test]
    fn test_duplicate_within_update_is_rejected() {
        let model = QueueStateModel::new();
        model.update_queue(vec![item("a")]).unwrap();
        let before = model.snapshot();

        let err = model.update_queue(vec![item("x"), item("x")]).unwrap_err();
        assert!(matches!(err, GuiError::SnapshotInconsistency { .. }));
        assert_eq!(model.snapshot(), before);
        assert!(logs_contain("rejected inconsistent queue update"));
    }

    #[test]
    fn test_inconsistent_full_snapshot_is_rejected() {
        let model = QueueStateModel::new();
        let err = model
            .apply_snapshot(vec![item("a")], Some(item("a")), vec![])
            .unwrap_err();
        match err {
            GuiError::SnapshotInconsistency { uid, first, second } => {
                assert_eq!(uid, "a");
                assert_eq!(first, Partition::Pending);
                assert_eq!(second, Partition::Active);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(model.snapshot().revision, 0);
    }

    #[test]
    fn test_cancel_removes_without_record() {
        let model = QueueStateModel::new();
        model.update_queue(vec![item("a"), item("b")]).unwrap();
        assert!(model.cancel("a"));
        assert!(!model.cancel("missing"));
        let snapshot = model.snapshot();
        assert_eq!(uids(&snapshot.pending), vec!["b"]);
        assert!(snapshot.completed.is_empty());
    }

    #[test]
    fn test_move_pending_reorders_locally() {
        let model = QueueStateModel::new();
        model.update_queue(vec![item("a"), item("b"), item("c")]).unwrap();
        assert!(model.move_pending("c", 0));
        assert_eq!(uids(&model.snapshot().pending), vec!["c", "a", "b"]);
        assert!(model.move_pending("c", 99));
        assert_eq!(uids(&model.snapshot().pending), vec!["a", "b", "c"]);

        let revision = model.snapshot().revision;
        assert!(!model.move_pending("c", 2));
        assert!(!model.move_pending("missing", 0));
        assert_eq!(model.snapshot().revision, revision);
    }

    #[test]
    fn test_noop_update_keeps_revision() {
        let model = QueueStateModel::new();
        model.update_queue(vec![item("a")]).unwrap();
        let revision = model.snapshot().revision;
        model.update_queue(vec![item("a")]).unwrap();
        assert_eq!(model.snapshot().revision, revision);
    }

    #[test]
    fn test_progress_is_clamped_and_ignored_when_idle() {
        let model = QueueStateModel::new();
        model.update_progress(Some(50)).unwrap();
        assert_eq!(model.snapshot().active_progress, None);

        model.update_active(Some(item("a"))).unwrap();
        model.update_progress(Some(250)).unwrap();
        assert_eq!(model.snapshot().active_progress, Some(100));
    }

    #[test]
    fn test_status_updates() {
        let model = QueueStateModel::new();
        assert!(!model.status().connected);
        model.update_status(ServerStatus::connected("idle", "idle"));
        assert!(model.status().connected);
        assert_eq!(model.status().queue_state, "idle");
    }

    #[tokio::test]
    async fn test_subscribers_notified() {
        let model = QueueStateModel::new();
        let mut rx = model.subscribe();
        model.update_queue(vec![item("a")]).unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().pending.len(), 1);
        assert_eq!(rx.borrow().revision, 1);
    }
}
