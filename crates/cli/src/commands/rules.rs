use serde::Serialize;

use affinity_core::config::ConfigOverrides;
use affinity_core::store::RuleSetMetadata;
use affinity_db::RuleRepository;
use affinity_db::SqlRuleRepository;

use crate::commands::{
    block_on, load_config, open_database, persistence_failure, to_data, CommandResult, Failure,
    RuleView,
};

#[derive(Debug, Serialize)]
struct RuleListing {
    run: Option<RuleSetMetadata>,
    total: usize,
    rules: Vec<RuleView>,
}

/// Lists persisted rules by confidence, highest first.
pub fn run(limit: Option<usize>) -> CommandResult {
    let result = load_config(ConfigOverrides::default()).and_then(|config| {
        block_on(async {
            let pool = open_database(&config).await?;
            let stored = SqlRuleRepository::new(pool.clone())
                .load_current()
                .await
                .map_err(persistence_failure)?;
            pool.close().await;
            Ok::<_, Failure>(stored)
        })
    });

    match result {
        Ok(None) => CommandResult::success_with(
            "rules",
            "no recommendation rules have been generated yet",
            to_data(&RuleListing { run: None, total: 0, rules: Vec::new() }),
        ),
        Ok(Some(record)) => {
            let total = record.rules.len();
            let shown = limit.unwrap_or(total).min(total);
            let listing = RuleListing {
                run: Some(record.metadata),
                total,
                rules: record.rules.iter().take(shown).map(RuleView::from).collect(),
            };
            CommandResult::success_with(
                "rules",
                format!("showing {shown} of {total} recommendation rules"),
                to_data(&listing),
            )
        }
        Err(failure) => CommandResult::from_failure("rules", failure),
    }
}
