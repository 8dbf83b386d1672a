use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;

use affinity_core::config::ConfigOverrides;
use affinity_core::domain::ItemId;
use affinity_core::mining::CancellationFlag;
use affinity_core::training::RecommendationEngine;
use affinity_db::{OrderHistoryRepository, RuleRepository, RuleSetRecord};
use affinity_db::{SqlOrderHistoryRepository, SqlRuleRepository};

use crate::commands::{
    block_on, load_config, mining_failure, open_database, persistence_failure, to_data,
    CommandResult, Failure,
};

#[derive(Debug, Clone, Default)]
pub struct TrainArgs {
    /// JSON file holding an array of orders, each an array of product ids.
    pub transactions: Option<PathBuf>,
    pub min_support: Option<f64>,
    pub min_confidence: Option<f64>,
    pub max_itemset_len: Option<usize>,
}

pub fn run(args: TrainArgs) -> CommandResult {
    let overrides = ConfigOverrides {
        min_support: args.min_support,
        min_confidence: args.min_confidence,
        max_itemset_len: args.max_itemset_len,
        ..ConfigOverrides::default()
    };

    let result = load_config(overrides).and_then(|config| {
        let engine = RecommendationEngine::new(&config.mining, config.ranking.clone())
            .map_err(|error| mining_failure(&error))?;

        block_on(async {
            let pool = open_database(&config).await?;

            let orders = match &args.transactions {
                Some(path) => read_transactions(path)
                    .map_err(|error| ("transactions_input", format!("{error:#}"), 6u8))?,
                None => SqlOrderHistoryRepository::new(pool.clone())
                    .confirmed_orders()
                    .await
                    .map_err(persistence_failure)?,
            };

            let outcome = engine
                .retrain(orders, &CancellationFlag::new())
                .map_err(|error| mining_failure(&error))?;

            SqlRuleRepository::new(pool.clone())
                .replace_all(RuleSetRecord {
                    metadata: outcome.report.metadata(),
                    rules: outcome.rules,
                })
                .await
                .map_err(persistence_failure)?;
            pool.close().await;

            Ok::<_, Failure>(outcome.report)
        })
    });

    match result {
        Ok(report) => CommandResult::success_with(
            "train",
            format!("Successfully generated {} recommendation rules", report.rule_count),
            to_data(&report),
        ),
        Err(failure) => CommandResult::from_failure("train", failure),
    }
}

fn read_transactions(path: &Path) -> anyhow::Result<Vec<Vec<ItemId>>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("could not read transactions file `{}`", path.display()))?;
    serde_json::from_str(&raw).with_context(|| {
        format!("`{}` must be a JSON array of arrays of product ids", path.display())
    })
}
