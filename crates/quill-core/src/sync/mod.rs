//! Sync engine: push, pull, merge cycles against the remote feed.

mod ledger;

pub use ledger::{Conflict, ConflictLedger, Resolution, SharedLedger};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::error::Result;
use crate::notify::{NoticeKind, Notifier};
use crate::remote::{RecordPayload, RemoteApi, RemoteRecord, DEFAULT_PAGE_SIZE};
use crate::store::SharedStore;

/// Default pause between scheduled cycles.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(30);

/// Phases of a single cycle. Fresh on every call; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    Pushing,
    Pulling,
    Merging,
    Done,
    Failed,
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Pushing => "pushing",
            Self::Pulling => "pulling",
            Self::Merging => "merging",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Counts produced by one completed cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// Local records that acquired a remote identity
    pub pushed: usize,
    /// Pulled records appended as new quotes
    pub added: usize,
    /// Existing records overwritten by divergent pulls
    pub updated: usize,
    /// Divergences recorded for manual review
    pub conflicts: usize,
}

impl SyncSummary {
    /// Whether the cycle changed nothing.
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        self.pushed == 0 && self.added == 0 && self.updated == 0 && self.conflicts == 0
    }

    /// One-line description surfaced to the user.
    #[must_use]
    pub fn describe(&self) -> String {
        if self.is_noop() {
            return "Already up to date".to_string();
        }

        let mut message = format!(
            "Quotes synced: {} pushed, {} added, {} updated",
            self.pushed, self.added, self.updated
        );
        if self.conflicts > 0 {
            message.push_str(&format!("; {} awaiting conflict review", self.conflicts));
        }
        message
    }
}

/// Outcome of a [`SyncEngine::sync_once`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The cycle ran to completion.
    Completed(SyncSummary),
    /// A cycle was already in flight; this request was dropped.
    Skipped,
}

#[derive(Debug, Default, Clone, Copy)]
struct MergeCounts {
    added: usize,
    updated: usize,
    conflicts: usize,
}

impl MergeCounts {
    const fn mutated(&self) -> bool {
        self.added > 0 || self.updated > 0
    }
}

/// Drives push, pull, merge cycles over a shared store and ledger.
///
/// Cycles are single-flight: a request that lands while a cycle is in
/// flight is dropped, never queued, so concurrent cycles cannot race on
/// the shared quote list.
pub struct SyncEngine<R, N> {
    store: SharedStore,
    ledger: SharedLedger,
    remote: R,
    notifier: N,
    page_size: usize,
    cycle_gate: Arc<Mutex<()>>,
}

impl<R: RemoteApi, N: Notifier> SyncEngine<R, N> {
    /// Build an engine over shared store and ledger handles.
    pub fn new(store: SharedStore, ledger: SharedLedger, remote: R, notifier: N) -> Self {
        Self {
            store,
            ledger,
            remote,
            notifier,
            page_size: DEFAULT_PAGE_SIZE,
            cycle_gate: Arc::new(Mutex::new(())),
        }
    }

    /// Set the pull page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Run one cycle, unless one is already in flight.
    ///
    /// Completion and failure are both surfaced through the notifier. A
    /// failure aborts the remaining phases of this cycle only; later
    /// cycles start from a clean slate.
    pub async fn sync_once(&self) -> Result<CycleOutcome> {
        let Ok(_running) = self.cycle_gate.try_lock() else {
            tracing::debug!(phase = %CyclePhase::Idle, "sync cycle already in flight; dropping request");
            return Ok(CycleOutcome::Skipped);
        };

        match self.run_cycle().await {
            Ok(summary) => {
                tracing::debug!(phase = %CyclePhase::Done, ?summary, "sync cycle finished");
                self.notifier.notify(&summary.describe(), NoticeKind::Success);
                Ok(CycleOutcome::Completed(summary))
            }
            Err(error) => {
                tracing::debug!(phase = %CyclePhase::Failed, "sync cycle aborted: {error}");
                self.notifier
                    .notify(&format!("Sync failed: {error}"), NoticeKind::Error);
                Err(error)
            }
        }
    }

    /// Run cycles forever at a fixed interval.
    ///
    /// Every failure is recoverable: the next tick proceeds regardless of
    /// prior outcomes, with no backoff and no failure cap.
    pub async fn watch(&self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(error) = self.sync_once().await {
                tracing::warn!("sync cycle failed: {error}");
            }
        }
    }

    async fn run_cycle(&self) -> Result<SyncSummary> {
        let pushed = self.push_pending().await;

        tracing::debug!(phase = %CyclePhase::Pulling, limit = self.page_size, "fetching remote page");
        let records = self.remote.list_records(self.page_size).await?;

        let counts = self.merge(records).await;

        Ok(SyncSummary {
            pushed,
            added: counts.added,
            updated: counts.updated,
            conflicts: counts.conflicts,
        })
    }

    /// One create attempt per pending record; individual failures are
    /// skipped and retried on the next scheduled cycle.
    async fn push_pending(&self) -> usize {
        let pending = self.store.lock().await.pending();
        tracing::debug!(phase = %CyclePhase::Pushing, count = pending.len(), "pushing pending quotes");

        let mut pushed = 0usize;
        for quote in pending {
            let payload = RecordPayload::for_quote(&quote);
            match self.remote.create_record(&payload).await {
                Ok(record) => {
                    let mut store = self.store.lock().await;
                    let adopted = match store.position_of(&quote.id) {
                        Some(position) => store.adopt_remote_identity(position, record.id),
                        None => false,
                    };
                    if adopted {
                        pushed += 1;
                    } else {
                        tracing::warn!(
                            id = %quote.id,
                            remote_id = record.id,
                            "pushed quote could not adopt its remote identity"
                        );
                    }
                }
                Err(error) => {
                    tracing::warn!(id = %quote.id, "push failed, retrying next cycle: {error}");
                }
            }
        }

        if pushed > 0 {
            // Adopted identities must survive a pull failure later in the cycle.
            self.store.lock().await.persist();
        }
        pushed
    }

    /// Reconcile pulled records against the store.
    ///
    /// Unknown remote identities are appended; identical content is a
    /// no-op; divergent content records a conflict and is provisionally
    /// overwritten remote-wins, with identity fields kept local.
    async fn merge(&self, records: Vec<RemoteRecord>) -> MergeCounts {
        tracing::debug!(phase = %CyclePhase::Merging, count = records.len(), "merging pulled records");
        let mut store = self.store.lock().await;
        let mut ledger = self.ledger.lock().await;
        let mut counts = MergeCounts::default();

        for record in records {
            let remote_id = record.id;
            let incoming = record.into_quote();

            let Some((position, existing)) = store.find_by_remote_id(remote_id) else {
                store.add(incoming);
                counts.added += 1;
                continue;
            };

            if existing.same_content(&incoming) {
                continue;
            }

            let local_snapshot = existing.clone();
            ledger.record(Conflict::new(
                local_snapshot.clone(),
                incoming.clone(),
                remote_id,
            ));

            let mut merged = local_snapshot;
            merged.text = incoming.text;
            merged.category = incoming.category;
            merged.updated_at = incoming.updated_at;
            if store.replace_at(position, merged).is_ok() {
                counts.updated += 1;
                counts.conflicts += 1;
            }
        }

        if counts.mutated() {
            store.persist();
        }
        if counts.conflicts > 0 {
            ledger.persist();
        }
        counts
    }
}
