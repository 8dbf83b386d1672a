//! In-process publish point for the current rule set.
//!
//! Readers clone an `Arc` to an immutable snapshot and never see a partial
//! rule set. Writers hold a single-writer guard for the whole training run and
//! publish by swapping the `Arc`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, TryLockError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::AssociationRule;
use crate::errors::MiningError;
use crate::ranking::{RuleIndex, SuggestionQuery};

/// Provenance of a published rule set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RuleSetMetadata {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub min_support: f64,
    pub min_confidence: f64,
    pub transaction_count: u64,
}

#[derive(Debug, Default)]
pub struct RuleSnapshot {
    generation: u64,
    metadata: Option<RuleSetMetadata>,
    rules: Vec<AssociationRule>,
    index: RuleIndex,
}

impl RuleSnapshot {
    fn new(generation: u64, rules: Vec<AssociationRule>, metadata: Option<RuleSetMetadata>) -> Self {
        let index = RuleIndex::build(rules.iter().cloned());
        Self { generation, metadata, rules, index }
    }

    /// Zero until the first publish.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn metadata(&self) -> Option<&RuleSetMetadata> {
        self.metadata.as_ref()
    }

    /// Rules in the order they were published.
    pub fn rules(&self) -> &[AssociationRule] {
        &self.rules
    }

    pub fn index(&self) -> &RuleIndex {
        &self.index
    }

    pub fn suggest(&self, query: &SuggestionQuery) -> Result<Vec<AssociationRule>, MiningError> {
        self.index.suggest(query)
    }
}

#[derive(Debug, Default)]
pub struct RuleSetStore {
    current: RwLock<Arc<RuleSnapshot>>,
    writer: Mutex<()>,
}

impl RuleSetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<RuleSnapshot> {
        Arc::clone(&*self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Claims exclusive write access; a second concurrent writer is rejected.
    pub fn begin_write(&self) -> Result<RuleSetWriter<'_>, MiningError> {
        let guard = match self.writer.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return Err(MiningError::MiningInProgress),
        };
        Ok(RuleSetWriter { store: self, _guard: guard })
    }

    fn swap(&self, rules: Vec<AssociationRule>, metadata: Option<RuleSetMetadata>) -> Arc<RuleSnapshot> {
        let generation = self.snapshot().generation + 1;
        // The index is built outside the write lock.
        let snapshot = Arc::new(RuleSnapshot::new(generation, rules, metadata));
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *current = Arc::clone(&snapshot);
        snapshot
    }
}

/// Exclusive write access for one training run. Dropping it without
/// publishing leaves the current snapshot untouched.
pub struct RuleSetWriter<'a> {
    store: &'a RuleSetStore,
    _guard: MutexGuard<'a, ()>,
}

impl RuleSetWriter<'_> {
    /// Replaces the whole rule set in one swap.
    pub fn publish(
        self,
        rules: Vec<AssociationRule>,
        metadata: Option<RuleSetMetadata>,
    ) -> Arc<RuleSnapshot> {
        self.store.swap(rules, metadata)
    }
}
