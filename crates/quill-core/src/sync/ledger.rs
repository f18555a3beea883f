//! Pending conflict ledger.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::models::{Quote, QuoteId};
use crate::storage::ConflictStorage;
use crate::store::QuoteStore;

/// Shared ledger handle passed to the sync engine.
pub type SharedLedger = Arc<Mutex<ConflictLedger>>;

/// A detected content divergence awaiting a manual decision.
///
/// Holds shallow snapshots of both sides and a stable back-reference into
/// the store; resolution looks the record up by identifier, so reordering
/// the store between detection and resolution is harmless.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    /// Identifier of the store record at detection time
    pub quote_id: QuoteId,
    /// Divergent remote identity
    pub remote_id: i64,
    /// Local snapshot at detection time
    pub local: Quote,
    /// Incoming remote version
    pub server: Quote,
    /// Detection timestamp (Unix ms)
    pub detected_at: i64,
}

impl Conflict {
    /// Record a divergence between a store record and an incoming version.
    #[must_use]
    pub fn new(local: Quote, server: Quote, remote_id: i64) -> Self {
        Self {
            quote_id: local.id.clone(),
            remote_id,
            local,
            server,
            detected_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Which side wins a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Keep the local snapshot and renegotiate the remote identity.
    KeepLocal,
    /// Keep the incoming remote version.
    KeepRemote,
}

/// Pending conflicts in detection order, awaiting user decisions.
///
/// Whether anything needs review is a pure function of [`len`](Self::len).
pub struct ConflictLedger {
    pending: Vec<Conflict>,
    storage: Box<dyn ConflictStorage>,
}

impl ConflictLedger {
    /// Open a ledger from the persisted snapshot.
    ///
    /// Absent and malformed snapshots both start the ledger empty.
    #[must_use]
    pub fn open(storage: Box<dyn ConflictStorage>) -> Self {
        let pending = match storage.load() {
            Ok(Some(pending)) => pending,
            Ok(None) => Vec::new(),
            Err(error) => {
                tracing::warn!("failed to load conflict snapshot, starting empty: {error}");
                Vec::new()
            }
        };
        Self { pending, storage }
    }

    /// Wrap the ledger in a shared handle.
    #[must_use]
    pub fn into_shared(self) -> SharedLedger {
        Arc::new(Mutex::new(self))
    }

    /// Record a detected divergence.
    ///
    /// At most one pending conflict exists per remote identity: a
    /// re-detection replaces the stale entry in place.
    pub fn record(&mut self, conflict: Conflict) {
        if let Some(existing) = self
            .pending
            .iter_mut()
            .find(|pending| pending.remote_id == conflict.remote_id)
        {
            *existing = conflict;
        } else {
            self.pending.push(conflict);
        }
    }

    /// Pending conflicts in detection order.
    #[must_use]
    pub fn list(&self) -> &[Conflict] {
        &self.pending
    }

    /// Number of pending conflicts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no conflicts are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Apply a user decision to the `index`-th pending conflict.
    ///
    /// `KeepLocal` writes the local snapshot back and clears the record's
    /// remote identity, so the next cycle re-pushes it as a new remote
    /// creation. `KeepRemote` writes the server snapshot back. Either way
    /// the entry leaves the ledger and both snapshots are persisted.
    pub fn resolve(
        &mut self,
        index: usize,
        choice: Resolution,
        store: &mut QuoteStore,
    ) -> Result<Quote> {
        let conflict = self
            .pending
            .get(index)
            .ok_or_else(|| Error::NotFound(format!("no pending conflict #{}", index + 1)))?;

        let Some(position) = store.position_of(&conflict.quote_id) else {
            let gone = self.pending.remove(index);
            self.persist();
            return Err(Error::NotFound(format!(
                "quote {} is no longer in the store; dropped the stale conflict",
                gone.quote_id
            )));
        };

        let resolved = match choice {
            Resolution::KeepLocal => {
                let mut quote = conflict.local.clone();
                quote.remote_id = None;
                quote
            }
            Resolution::KeepRemote => conflict.server.clone(),
        };

        store.replace_at(position, resolved.clone())?;
        self.pending.remove(index);

        store.persist();
        self.persist();
        Ok(resolved)
    }

    /// Best-effort save of the pending list.
    pub fn persist(&self) {
        if let Err(error) = self.storage.save(&self.pending) {
            tracing::warn!("failed to persist conflict snapshot: {error}");
        }
    }
}
