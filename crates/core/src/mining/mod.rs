//! Level-wise (Apriori) frequent itemset mining.
//!
//! Level 1 counts single products. Each later level joins frequent
//! (k-1)-itemsets that share their first k-2 items, drops any candidate with an
//! infrequent (k-1)-subset before counting, then counts the survivors with one
//! pass over the transactions. Support never grows with itemset size, so a
//! pruned candidate can never be frequent.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::debug;

use crate::domain::{ItemId, Itemset, Support, Threshold, TransactionSet};
use crate::errors::{InsufficientDataReason, MiningError};

/// Cooperative cancellation checked once per mining level.
#[derive(Clone, Debug, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-level counters reported after a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LevelStats {
    pub size: usize,
    pub candidates: usize,
    pub pruned: usize,
    pub frequent: usize,
}

/// All frequent itemsets of one run, grouped by size.
#[derive(Clone, Debug, Default)]
pub struct FrequentItemsets {
    // levels[k - 1] holds the k-itemsets, sorted by identifier tuple.
    levels: Vec<Vec<Itemset>>,
    supports: HashMap<Vec<ItemId>, Support>,
    stats: Vec<LevelStats>,
    transaction_count: u64,
}

impl FrequentItemsets {
    pub fn from_itemsets(itemsets: impl IntoIterator<Item = Itemset>, transaction_count: u64) -> Self {
        let mut levels: Vec<Vec<Itemset>> = Vec::new();
        let mut supports = HashMap::new();

        for mut itemset in itemsets {
            if itemset.is_empty() {
                continue;
            }
            itemset.items.sort();
            itemset.items.dedup();
            let size = itemset.len();
            if levels.len() < size {
                levels.resize_with(size, Vec::new);
            }
            supports.insert(itemset.items.clone(), itemset.support);
            levels[size - 1].push(itemset);
        }

        for level in &mut levels {
            level.sort_by(|a, b| a.items.cmp(&b.items));
        }
        while levels.last().is_some_and(Vec::is_empty) {
            levels.pop();
        }

        Self { levels, supports, stats: Vec::new(), transaction_count }
    }

    /// Itemsets of exactly `size` items in identifier-tuple order.
    pub fn of_size(&self, size: usize) -> &[Itemset] {
        size.checked_sub(1)
            .and_then(|index| self.levels.get(index))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn support_of(&self, items: &[ItemId]) -> Option<Support> {
        self.supports.get(items).copied()
    }

    pub fn singleton_support(&self, item: ItemId) -> Option<Support> {
        self.supports.get([item].as_slice()).copied()
    }

    /// Every itemset, ordered by size asc, support desc, identifier tuple asc.
    pub fn ordered(&self) -> Vec<Itemset> {
        let mut all: Vec<Itemset> = self.levels.iter().flatten().cloned().collect();
        all.sort_by(|a, b| {
            a.len()
                .cmp(&b.len())
                .then_with(|| b.support.count.cmp(&a.support.count))
                .then_with(|| a.items.cmp(&b.items))
        });
        all
    }

    pub fn len(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_size(&self) -> usize {
        self.levels.len()
    }

    pub fn stats(&self) -> &[LevelStats] {
        &self.stats
    }

    pub fn transaction_count(&self) -> u64 {
        self.transaction_count
    }
}

/// Apriori miner configured with a support threshold and optional bounds.
#[derive(Clone, Debug)]
pub struct ItemsetMiner {
    min_support: Threshold,
    max_itemset_len: Option<usize>,
    time_limit: Option<Duration>,
}

impl ItemsetMiner {
    pub fn new(min_support: f64) -> Result<Self, MiningError> {
        Ok(Self {
            min_support: Threshold::new("min_support", min_support)?,
            max_itemset_len: None,
            time_limit: None,
        })
    }

    /// Stop after itemsets of this size. `None` mines until nothing survives.
    #[must_use]
    pub fn with_max_itemset_len(mut self, max_itemset_len: Option<usize>) -> Self {
        self.max_itemset_len = max_itemset_len;
        self
    }

    /// Wall-clock cap, checked between levels.
    #[must_use]
    pub fn with_time_limit(mut self, time_limit: Option<Duration>) -> Self {
        self.time_limit = time_limit;
        self
    }

    pub fn min_support(&self) -> Threshold {
        self.min_support
    }

    pub fn mine(&self, transactions: &TransactionSet) -> Result<FrequentItemsets, MiningError> {
        self.mine_with_cancellation(transactions, &CancellationFlag::default())
    }

    pub fn mine_with_cancellation(
        &self,
        transactions: &TransactionSet,
        cancel: &CancellationFlag,
    ) -> Result<FrequentItemsets, MiningError> {
        if let Some(0) = self.max_itemset_len {
            return Err(MiningError::InvalidParameter {
                name: "max_itemset_len",
                value: "0".to_owned(),
                reason: "must be at least 1",
            });
        }
        if transactions.is_empty() {
            return Err(MiningError::InsufficientData(
                InsufficientDataReason::NoMultiItemTransactions,
            ));
        }

        let started = Instant::now();
        let total = transactions.len() as u64;
        let mut result = FrequentItemsets { transaction_count: total, ..Default::default() };

        self.checkpoint(1, started, cancel)?;
        let (mut current, first_stats) = self.frequent_singletons(transactions, total);
        self.record_level(&mut result, current.clone(), first_stats);

        let mut size = 2;
        while !current.is_empty() && self.max_itemset_len.map_or(true, |max| size <= max) {
            self.checkpoint(size, started, cancel)?;

            let (candidates, pruned) = generate_candidates(&current);
            let candidate_count = candidates.len() + pruned;
            if candidates.is_empty() {
                debug!(
                    event_name = "mining.level.exhausted",
                    level = size,
                    pruned,
                    "no candidates survived subset pruning"
                );
                break;
            }

            let counts = count_support(&candidates, transactions, size);
            current = candidates
                .into_iter()
                .zip(counts)
                .map(|(items, count)| Itemset { items, support: Support::new(count, total) })
                .filter(|itemset| itemset.support.meets(self.min_support))
                .collect();

            let stats =
                LevelStats { size, candidates: candidate_count, pruned, frequent: current.len() };
            self.record_level(&mut result, current.clone(), stats);
            size += 1;
        }

        debug!(
            event_name = "mining.itemsets.completed",
            itemsets = result.len(),
            max_size = result.max_size(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "frequent itemset mining finished"
        );
        Ok(result)
    }

    fn checkpoint(
        &self,
        level: usize,
        started: Instant,
        cancel: &CancellationFlag,
    ) -> Result<(), MiningError> {
        if cancel.is_cancelled() {
            return Err(MiningError::Cancelled { level });
        }
        if let Some(limit) = self.time_limit {
            let elapsed = started.elapsed();
            if elapsed >= limit {
                return Err(MiningError::MiningTimedOut { elapsed, limit });
            }
        }
        Ok(())
    }

    fn frequent_singletons(
        &self,
        transactions: &TransactionSet,
        total: u64,
    ) -> (Vec<Itemset>, LevelStats) {
        let mut counts: HashMap<ItemId, u64> = HashMap::new();
        for transaction in transactions.transactions() {
            for &item in transaction.items() {
                *counts.entry(item).or_insert(0) += 1;
            }
        }

        let candidates = counts.len();
        let mut frequent: Vec<Itemset> = counts
            .into_iter()
            .map(|(item, count)| Itemset { items: vec![item], support: Support::new(count, total) })
            .filter(|itemset| itemset.support.meets(self.min_support))
            .collect();
        frequent.sort_by(|a, b| a.items.cmp(&b.items));

        let stats = LevelStats { size: 1, candidates, pruned: 0, frequent: frequent.len() };
        (frequent, stats)
    }

    fn record_level(&self, result: &mut FrequentItemsets, level: Vec<Itemset>, stats: LevelStats) {
        debug!(
            event_name = "mining.level.completed",
            level = stats.size,
            candidates = stats.candidates,
            pruned = stats.pruned,
            frequent = stats.frequent,
            "mining level completed"
        );
        result.stats.push(stats);
        if level.is_empty() {
            return;
        }
        for itemset in &level {
            result.supports.insert(itemset.items.clone(), itemset.support);
        }
        result.levels.push(level);
    }
}

/// One-shot mining returning every frequent itemset in deterministic order.
pub fn mine(transactions: &TransactionSet, min_support: f64) -> Result<Vec<Itemset>, MiningError> {
    Ok(ItemsetMiner::new(min_support)?.mine(transactions)?.ordered())
}

/// Joins sorted (k-1)-itemsets sharing a (k-2)-prefix, then drops candidates
/// with an infrequent (k-1)-subset. Returns survivors and the pruned count.
fn generate_candidates(previous: &[Itemset]) -> (Vec<Vec<ItemId>>, usize) {
    let frequent: HashSet<&[ItemId]> = previous.iter().map(|itemset| itemset.items.as_slice()).collect();
    let mut candidates = Vec::new();
    let mut pruned = 0;

    for (index, left) in previous.iter().enumerate() {
        let prefix_len = left.items.len() - 1;
        let prefix = &left.items[..prefix_len];

        for right in &previous[index + 1..] {
            if &right.items[..prefix_len] != prefix {
                break;
            }

            let mut candidate = left.items.clone();
            candidate.push(right.items[prefix_len]);

            let all_subsets_frequent = Itemset::subsets_without_one(&candidate)
                .all(|subset| frequent.contains(subset.as_slice()));
            if all_subsets_frequent {
                candidates.push(candidate);
            } else {
                pruned += 1;
            }
        }
    }

    (candidates, pruned)
}

/// Counts how many transactions contain each candidate. Short transactions
/// enumerate their own k-subsets; long ones test each candidate instead.
fn count_support(candidates: &[Vec<ItemId>], transactions: &TransactionSet, size: usize) -> Vec<u64> {
    let lookup: HashMap<&[ItemId], usize> =
        candidates.iter().enumerate().map(|(index, items)| (items.as_slice(), index)).collect();
    let mut counts = vec![0u64; candidates.len()];
    let mut buffer = Vec::with_capacity(size);

    for transaction in transactions.transactions() {
        let items = transaction.items();
        if items.len() < size {
            continue;
        }

        if combinations_at_most(items.len(), size, candidates.len()) {
            for_each_combination(items, size, &mut buffer, &mut |subset: &[ItemId]| {
                if let Some(&index) = lookup.get(subset) {
                    counts[index] += 1;
                }
            });
        } else {
            for (index, candidate) in candidates.iter().enumerate() {
                if transaction.contains_all(candidate) {
                    counts[index] += 1;
                }
            }
        }
    }

    counts
}

/// Whether C(n, k) <= limit, without overflowing.
fn combinations_at_most(n: usize, k: usize, limit: usize) -> bool {
    let k = k.min(n - k);
    let mut value: u128 = 1;
    for step in 0..k {
        value = value * (n - step) as u128 / (step + 1) as u128;
        if value > limit as u128 {
            return false;
        }
    }
    true
}

fn for_each_combination(
    items: &[ItemId],
    size: usize,
    buffer: &mut Vec<ItemId>,
    visit: &mut impl FnMut(&[ItemId]),
) {
    if buffer.len() == size {
        visit(buffer);
        return;
    }
    let needed = size - buffer.len();
    for start in 0..items.len() {
        if items.len() - start < needed {
            break;
        }
        buffer.push(items[start]);
        for_each_combination(&items[start + 1..], size, buffer, visit);
        buffer.pop();
    }
}
