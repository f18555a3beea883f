//! Quote store: the authoritative in-memory list.

use std::sync::Arc;

use rand::Rng;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::export::QuoteSeed;
use crate::models::{Quote, QuoteId};
use crate::storage::QuoteStorage;

/// Shared store handle passed to the sync engine and the conflict ledger.
pub type SharedStore = Arc<Mutex<QuoteStore>>;

/// Starter quotes seeded when no snapshot exists yet.
fn starter_quotes() -> Vec<Quote> {
    vec![
        Quote::new(
            "The best way to get started is to quit talking and begin doing.",
            "Motivation",
        ),
        Quote::new("Don't let yesterday take up too much of today.", "Life"),
        Quote::new(
            "It's not whether you get knocked down, it's whether you get up.",
            "Perseverance",
        ),
    ]
}

/// Authoritative, ordered collection of quotes.
///
/// Owns the canonical list; durability is delegated to the storage
/// collaborator and never blocks or fails a mutation. Among records that
/// carry a remote identity, `remote_id` values are unique.
pub struct QuoteStore {
    quotes: Vec<Quote>,
    storage: Box<dyn QuoteStorage>,
}

impl QuoteStore {
    /// Open a store from the persisted snapshot.
    ///
    /// An absent snapshot seeds the starter quotes; a malformed one is
    /// reported and treated as absent, leaving the in-memory state
    /// authoritative for the session.
    #[must_use]
    pub fn open(storage: Box<dyn QuoteStorage>) -> Self {
        let quotes = match storage.load() {
            Ok(Some(quotes)) => quotes,
            Ok(None) => starter_quotes(),
            Err(error) => {
                tracing::warn!("failed to load quote snapshot, starting fresh: {error}");
                starter_quotes()
            }
        };
        Self { quotes, storage }
    }

    /// Open a store with no quotes and no snapshot read.
    #[must_use]
    pub fn empty(storage: Box<dyn QuoteStorage>) -> Self {
        Self {
            quotes: Vec::new(),
            storage,
        }
    }

    /// Wrap the store in a shared handle.
    #[must_use]
    pub fn into_shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }

    /// Append a quote and return its identifier.
    ///
    /// No duplicate detection by content.
    pub fn add(&mut self, quote: Quote) -> QuoteId {
        let id = quote.id.clone();
        self.quotes.push(quote);
        id
    }

    /// Overwrite the record at `index`.
    pub fn replace_at(&mut self, index: usize, quote: Quote) -> Result<()> {
        let slot = self
            .quotes
            .get_mut(index)
            .ok_or_else(|| Error::NotFound(format!("no quote at index {index}")))?;
        *slot = quote;
        Ok(())
    }

    /// Find a record by remote identity.
    ///
    /// Linear scan; `None` tells the merge pass the incoming record is new
    /// to this store.
    #[must_use]
    pub fn find_by_remote_id(&self, remote_id: i64) -> Option<(usize, &Quote)> {
        self.quotes
            .iter()
            .enumerate()
            .find(|(_, quote)| quote.remote_id == Some(remote_id))
    }

    /// Position of the record with the given identifier.
    #[must_use]
    pub fn position_of(&self, id: &QuoteId) -> Option<usize> {
        self.quotes.iter().position(|quote| &quote.id == id)
    }

    /// Switch a pushed record into the `remote-` namespace.
    ///
    /// Refuses when another record already carries `remote_id`; the record
    /// stays pending and is retried on a later cycle.
    pub fn adopt_remote_identity(&mut self, index: usize, remote_id: i64) -> bool {
        if let Some((existing, _)) = self.find_by_remote_id(remote_id) {
            if existing != index {
                tracing::warn!(
                    remote_id,
                    "remote id already in use locally; leaving record pending"
                );
                return false;
            }
        }
        let Some(quote) = self.quotes.get_mut(index) else {
            return false;
        };
        quote.remote_id = Some(remote_id);
        quote.id = QuoteId::remote(remote_id);
        true
    }

    /// Snapshots of the records that still await a successful push.
    #[must_use]
    pub fn pending(&self) -> Vec<Quote> {
        self.quotes
            .iter()
            .filter(|quote| quote.is_pending())
            .cloned()
            .collect()
    }

    /// All quotes, in insertion order.
    #[must_use]
    pub fn quotes(&self) -> &[Quote] {
        &self.quotes
    }

    /// Quotes in the given category, or all when no filter is given.
    #[must_use]
    pub fn filtered(&self, category: Option<&str>) -> Vec<&Quote> {
        self.quotes
            .iter()
            .filter(|quote| category.map_or(true, |wanted| quote.category == wanted))
            .collect()
    }

    /// Pick a random quote, optionally restricted to a category.
    #[must_use]
    pub fn random(&self, category: Option<&str>) -> Option<&Quote> {
        let candidates = self.filtered(category);
        if candidates.is_empty() {
            return None;
        }
        let index = rand::thread_rng().gen_range(0..candidates.len());
        Some(candidates[index])
    }

    /// Distinct categories with quote counts, most populous first.
    #[must_use]
    pub fn categories(&self) -> Vec<(String, usize)> {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for quote in &self.quotes {
            if let Some(entry) = counts.iter_mut().find(|(name, _)| *name == quote.category) {
                entry.1 += 1;
            } else {
                counts.push((quote.category.clone(), 1));
            }
        }
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        counts
    }

    /// Append imported seeds as new local quotes.
    ///
    /// No merge and no conflict detection; returns how many were added.
    pub fn import(&mut self, seeds: Vec<QuoteSeed>) -> usize {
        let count = seeds.len();
        for seed in seeds {
            self.quotes.push(Quote::new(seed.text, seed.category));
        }
        count
    }

    /// Number of quotes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    /// Whether the store holds no quotes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    /// Best-effort save through the storage collaborator.
    ///
    /// Failures are logged and swallowed; the in-memory list stays
    /// authoritative for the running session.
    pub fn persist(&self) {
        if let Err(error) = self.storage.save(&self.quotes) {
            tracing::warn!("failed to persist quote snapshot: {error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::storage::MemoryStorage;

    fn memory_store() -> (QuoteStore, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let store = QuoteStore::empty(Box::new(Arc::clone(&storage)));
        (store, storage)
    }

    #[test]
    fn open_seeds_starter_quotes_when_snapshot_absent() {
        let store = QuoteStore::open(Box::new(MemoryStorage::new()));
        assert_eq!(store.len(), 3);
        assert!(store.quotes().iter().all(Quote::is_pending));
    }

    #[test]
    fn open_prefers_persisted_snapshot() {
        let storage = Arc::new(MemoryStorage::new());
        {
            let mut store = QuoteStore::empty(Box::new(Arc::clone(&storage)));
            store.add(Quote::new("Persisted", "Test"));
            store.persist();
        }

        let reopened = QuoteStore::open(Box::new(storage));
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.quotes()[0].text, "Persisted");
    }

    #[test]
    fn add_keeps_insertion_order_and_allows_duplicates() {
        let (mut store, _storage) = memory_store();
        store.add(Quote::new("Same", "X"));
        store.add(Quote::new("Same", "X"));

        assert_eq!(store.len(), 2);
        assert_ne!(store.quotes()[0].id, store.quotes()[1].id);
    }

    #[test]
    fn replace_at_rejects_out_of_bounds() {
        let (mut store, _storage) = memory_store();
        store.add(Quote::new("A", "X"));

        assert!(store.replace_at(0, Quote::new("B", "X")).is_ok());
        assert!(store.replace_at(5, Quote::new("C", "X")).is_err());
        assert_eq!(store.quotes()[0].text, "B");
    }

    #[test]
    fn find_by_remote_id_uses_sentinel_not_error() {
        let (mut store, _storage) = memory_store();
        let mut quote = Quote::new("A", "X");
        quote.remote_id = Some(7);
        store.add(quote);

        assert!(store.find_by_remote_id(7).is_some());
        assert!(store.find_by_remote_id(8).is_none());
    }

    #[test]
    fn adopt_remote_identity_switches_namespace() {
        let (mut store, _storage) = memory_store();
        store.add(Quote::new("A", "X"));

        assert!(store.adopt_remote_identity(0, 7));
        let quote = &store.quotes()[0];
        assert_eq!(quote.id, QuoteId::remote(7));
        assert_eq!(quote.id.to_string(), "remote-7");
        assert_eq!(quote.remote_id, Some(7));
        assert!(!quote.is_pending());
    }

    #[test]
    fn adopt_remote_identity_refuses_duplicate_remote_id() {
        let (mut store, _storage) = memory_store();
        let mut synced = Quote::new("A", "X");
        synced.remote_id = Some(7);
        store.add(synced);
        store.add(Quote::new("B", "Y"));

        assert!(!store.adopt_remote_identity(1, 7));
        assert!(store.quotes()[1].is_pending());
    }

    #[test]
    fn pending_returns_only_unsynced_records() {
        let (mut store, _storage) = memory_store();
        let mut synced = Quote::new("A", "X");
        synced.remote_id = Some(7);
        store.add(synced);
        store.add(Quote::new("B", "Y"));

        let pending = store.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].text, "B");
    }

    #[test]
    fn filtered_respects_category() {
        let (mut store, _storage) = memory_store();
        store.add(Quote::new("A", "Life"));
        store.add(Quote::new("B", "Work"));
        store.add(Quote::new("C", "Life"));

        assert_eq!(store.filtered(None).len(), 3);
        assert_eq!(store.filtered(Some("Life")).len(), 2);
        assert_eq!(store.filtered(Some("Nope")).len(), 0);
    }

    #[test]
    fn random_draws_from_the_filtered_set() {
        let (mut store, _storage) = memory_store();
        assert!(store.random(None).is_none());

        store.add(Quote::new("A", "Life"));
        store.add(Quote::new("B", "Work"));

        let picked = store.random(Some("Work")).unwrap();
        assert_eq!(picked.text, "B");
        assert!(store.random(Some("Nope")).is_none());
    }

    #[test]
    fn categories_counts_and_sorts() {
        let (mut store, _storage) = memory_store();
        store.add(Quote::new("A", "Life"));
        store.add(Quote::new("B", "Work"));
        store.add(Quote::new("C", "Life"));

        assert_eq!(
            store.categories(),
            vec![("Life".to_string(), 2), ("Work".to_string(), 1)]
        );
    }

    #[test]
    fn import_appends_without_merging() {
        let (mut store, _storage) = memory_store();
        store.add(Quote::new("A", "X"));

        let added = store.import(vec![
            QuoteSeed {
                text: "A".to_string(),
                category: "X".to_string(),
            },
            QuoteSeed {
                text: "B".to_string(),
                category: "Y".to_string(),
            },
        ]);

        assert_eq!(added, 2);
        assert_eq!(store.len(), 3);
        assert!(store.quotes().iter().all(Quote::is_pending));
    }

    #[test]
    fn persist_swallows_storage_failures() {
        struct FailingStorage;

        impl QuoteStorage for FailingStorage {
            fn save(&self, _quotes: &[Quote]) -> crate::Result<()> {
                Err(Error::Storage("disk full".to_string()))
            }

            fn load(&self) -> crate::Result<Option<Vec<Quote>>> {
                Ok(None)
            }
        }

        let mut store = QuoteStore::empty(Box::new(FailingStorage));
        store.add(Quote::new("A", "X"));
        store.persist();
        assert_eq!(store.len(), 1);
    }
}
