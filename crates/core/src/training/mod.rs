//! Batch training: orders in, published rule set out.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{MiningConfig, RankingConfig};
use crate::domain::{AssociationRule, ItemId, TransactionSet};
use crate::errors::MiningError;
use crate::mining::{CancellationFlag, ItemsetMiner, LevelStats};
use crate::ranking::SuggestionQuery;
use crate::rules::RuleGenerator;
use crate::store::{RuleSetMetadata, RuleSetStore, RuleSnapshot};

/// Summary of one successful run, printed by the CLI and stored alongside the
/// rules.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrainingReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub transactions: usize,
    pub dropped_single_item: usize,
    pub levels: Vec<LevelStats>,
    pub frequent_itemsets: usize,
    pub rule_count: usize,
    pub elapsed_ms: u64,
    pub min_support: f64,
    pub min_confidence: f64,
}

impl TrainingReport {
    pub fn metadata(&self) -> RuleSetMetadata {
        RuleSetMetadata {
            run_id: self.run_id,
            generated_at: self.generated_at,
            min_support: self.min_support,
            min_confidence: self.min_confidence,
            transaction_count: self.transactions as u64,
        }
    }
}

#[derive(Clone, Debug)]
pub struct TrainingOutcome {
    pub rules: Vec<AssociationRule>,
    pub report: TrainingReport,
}

#[derive(Clone, Debug)]
pub struct TrainingPipeline {
    miner: ItemsetMiner,
    generator: RuleGenerator,
}

impl TrainingPipeline {
    pub fn new(config: &MiningConfig) -> Result<Self, MiningError> {
        let miner = ItemsetMiner::new(config.min_support)?
            .with_max_itemset_len(config.max_itemset_len)
            .with_time_limit(Some(config.time_limit()));
        let generator = RuleGenerator::new(config.min_confidence)?;
        Ok(Self { miner, generator })
    }

    pub fn run<I, O>(
        &self,
        orders: I,
        cancel: &CancellationFlag,
    ) -> Result<TrainingOutcome, MiningError>
    where
        I: IntoIterator<Item = O>,
        O: IntoIterator<Item = ItemId>,
    {
        let run_id = Uuid::new_v4();
        let started = Instant::now();
        info!(
            event_name = "mining.run.started",
            correlation_id = %run_id,
            min_support = self.miner.min_support().as_f64(),
            min_confidence = self.generator.min_confidence().as_f64(),
            "starting rule mining run"
        );

        match self.execute(run_id, started, orders, cancel) {
            Ok(outcome) => {
                info!(
                    event_name = "mining.run.completed",
                    correlation_id = %run_id,
                    transactions = outcome.report.transactions,
                    frequent_itemsets = outcome.report.frequent_itemsets,
                    rules = outcome.report.rule_count,
                    elapsed_ms = outcome.report.elapsed_ms,
                    "rule mining run completed"
                );
                Ok(outcome)
            }
            Err(error) => {
                warn!(
                    event_name = "mining.run.failed",
                    correlation_id = %run_id,
                    error_class = error.error_class(),
                    error = %error,
                    "rule mining run failed"
                );
                Err(error)
            }
        }
    }

    fn execute<I, O>(
        &self,
        run_id: Uuid,
        started: Instant,
        orders: I,
        cancel: &CancellationFlag,
    ) -> Result<TrainingOutcome, MiningError>
    where
        I: IntoIterator<Item = O>,
        O: IntoIterator<Item = ItemId>,
    {
        let transactions = TransactionSet::from_orders(orders)?;
        let frequent = self.miner.mine_with_cancellation(&transactions, cancel)?;
        let rules = self.generator.generate(&frequent)?;

        let report = TrainingReport {
            run_id,
            generated_at: Utc::now(),
            transactions: transactions.len(),
            dropped_single_item: transactions.dropped_single_item(),
            levels: frequent.stats().to_vec(),
            frequent_itemsets: frequent.len(),
            rule_count: rules.len(),
            elapsed_ms: started.elapsed().as_millis() as u64,
            min_support: self.miner.min_support().as_f64(),
            min_confidence: self.generator.min_confidence().as_f64(),
        };
        Ok(TrainingOutcome { rules, report })
    }
}

/// Training pipeline plus the in-process rule set it publishes to.
#[derive(Debug)]
pub struct RecommendationEngine {
    pipeline: TrainingPipeline,
    ranking: RankingConfig,
    store: RuleSetStore,
}

impl RecommendationEngine {
    pub fn new(mining: &MiningConfig, ranking: RankingConfig) -> Result<Self, MiningError> {
        Ok(Self { pipeline: TrainingPipeline::new(mining)?, ranking, store: RuleSetStore::new() })
    }

    /// Runs a full training pass and publishes the result. The writer guard is
    /// held for the whole run, so a concurrent retrain fails fast with
    /// [`MiningError::MiningInProgress`].
    pub fn retrain<I, O>(
        &self,
        orders: I,
        cancel: &CancellationFlag,
    ) -> Result<TrainingOutcome, MiningError>
    where
        I: IntoIterator<Item = O>,
        O: IntoIterator<Item = ItemId>,
    {
        let writer = self.store.begin_write()?;
        let outcome = self.pipeline.run(orders, cancel)?;
        writer.publish(outcome.rules.clone(), Some(outcome.report.metadata()));
        Ok(outcome)
    }

    /// Publishes a rule set loaded from storage.
    pub fn load(
        &self,
        rules: Vec<AssociationRule>,
        metadata: Option<RuleSetMetadata>,
    ) -> Result<Arc<RuleSnapshot>, MiningError> {
        let writer = self.store.begin_write()?;
        Ok(writer.publish(rules, metadata))
    }

    /// Ranks against the current snapshot. `k` falls back to the configured
    /// default.
    pub fn suggest(
        &self,
        cart: impl IntoIterator<Item = ItemId>,
        k: Option<usize>,
    ) -> Result<Vec<AssociationRule>, MiningError> {
        let query = SuggestionQuery::new(cart)
            .with_limit(k.unwrap_or(self.ranking.default_k))
            .with_distinct_consequents(self.ranking.distinct_consequents);
        self.store.snapshot().suggest(&query)
    }

    pub fn snapshot(&self) -> Arc<RuleSnapshot> {
        self.store.snapshot()
    }

    pub fn store(&self) -> &RuleSetStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::{RecommendationEngine, TrainingPipeline};
    use crate::config::{MiningConfig, RankingConfig};
    use crate::domain::ItemId;
    use crate::errors::{InsufficientDataReason, MiningError};
    use crate::mining::CancellationFlag;

    const A: u64 = 1;
    const B: u64 = 2;
    const C: u64 = 3;

    fn scenario_orders() -> Vec<Vec<ItemId>> {
        [vec![A, B], vec![A, B], vec![A, C], vec![B, C], vec![A, B, C], vec![C]]
            .into_iter()
            .map(|order| order.into_iter().map(ItemId).collect())
            .collect()
    }

    fn mining(min_support: f64, min_confidence: f64) -> MiningConfig {
        MiningConfig { min_support, min_confidence, ..MiningConfig::default() }
    }

    fn ranking() -> RankingConfig {
        RankingConfig { default_k: 5, distinct_consequents: false }
    }

    #[test]
    fn pipeline_reports_what_it_mined() {
        let pipeline = TrainingPipeline::new(&mining(0.2, 0.3)).expect("valid config");
        let outcome = pipeline.run(scenario_orders(), &CancellationFlag::new()).expect("trained");

        assert_eq!(outcome.report.transactions, 5);
        assert_eq!(outcome.report.dropped_single_item, 1);
        assert_eq!(outcome.report.rule_count, outcome.rules.len());
        assert_eq!(outcome.rules.len(), 6);
        assert_eq!(outcome.report.levels[0].frequent, 3);
        assert_eq!(outcome.report.metadata().transaction_count, 5);
    }

    #[test]
    fn invalid_thresholds_are_rejected_at_construction() {
        let error = TrainingPipeline::new(&mining(0.0, 0.3)).expect_err("zero support");
        assert!(matches!(error, MiningError::InvalidParameter { name: "min_support", .. }));
    }

    #[test]
    fn engine_publishes_and_suggests() {
        let engine = RecommendationEngine::new(&mining(0.2, 0.3), ranking()).expect("engine");
        engine.retrain(scenario_orders(), &CancellationFlag::new()).expect("trained");

        let suggestions = engine.suggest([ItemId(A)], None).expect("suggestions");
        let consequents: Vec<ItemId> = suggestions.iter().map(|rule| rule.consequent).collect();
        assert_eq!(consequents, vec![ItemId(B), ItemId(C)]);
        assert_eq!(engine.snapshot().generation(), 1);
        assert!(engine.snapshot().metadata().is_some());
    }

    #[test]
    fn failed_retrain_keeps_previous_rules() {
        let engine = RecommendationEngine::new(&mining(0.2, 0.3), ranking()).expect("engine");
        engine.retrain(scenario_orders(), &CancellationFlag::new()).expect("trained");
        let before = engine.snapshot();

        let singles = vec![vec![ItemId(A)], vec![ItemId(B)]];
        let error = engine.retrain(singles, &CancellationFlag::new()).expect_err("no pairs");
        assert_eq!(
            error,
            MiningError::InsufficientData(InsufficientDataReason::NoMultiItemTransactions)
        );

        let after = engine.snapshot();
        assert_eq!(after.generation(), before.generation());
        assert_eq!(after.rules(), before.rules());
    }

    #[test]
    fn cancelled_retrain_publishes_nothing() {
        let engine = RecommendationEngine::new(&mining(0.2, 0.3), ranking()).expect("engine");
        let cancel = CancellationFlag::new();
        cancel.cancel();

        let error = engine.retrain(scenario_orders(), &cancel).expect_err("cancelled");
        assert_eq!(error, MiningError::Cancelled { level: 1 });
        assert!(engine.snapshot().rules().is_empty());
        assert_eq!(engine.snapshot().generation(), 0);
    }

    #[test]
    fn retrain_is_rejected_while_a_write_is_open() {
        let engine = RecommendationEngine::new(&mining(0.2, 0.3), ranking()).expect("engine");
        let held = engine.store().begin_write().expect("writer");

        let error = engine.retrain(scenario_orders(), &CancellationFlag::new()).expect_err("busy");
        assert_eq!(error, MiningError::MiningInProgress);
        drop(held);
    }

    #[test]
    fn explicit_k_overrides_default() {
        let engine = RecommendationEngine::new(&mining(0.2, 0.3), ranking()).expect("engine");
        engine.retrain(scenario_orders(), &CancellationFlag::new()).expect("trained");

        let suggestions = engine.suggest([ItemId(A)], Some(1)).expect("suggestions");
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].consequent, ItemId(B));
    }
}
