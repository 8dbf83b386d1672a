use serde::Serialize;

use affinity_core::config::ConfigOverrides;
use affinity_core::domain::ItemId;
use affinity_core::training::RecommendationEngine;
use affinity_db::RuleRepository;
use affinity_db::SqlRuleRepository;

use crate::commands::{
    block_on, load_config, mining_failure, open_database, persistence_failure, to_data,
    CommandResult, Failure, RuleView,
};

#[derive(Debug, Serialize)]
struct SuggestionData {
    cart: Vec<u64>,
    k: usize,
    suggestions: Vec<RuleView>,
}

pub fn run(cart: Vec<ItemId>, k: Option<usize>) -> CommandResult {
    let result = load_config(ConfigOverrides::default()).and_then(|config| {
        let engine = RecommendationEngine::new(&config.mining, config.ranking.clone())
            .map_err(|error| mining_failure(&error))?;

        let stored = block_on(async {
            let pool = open_database(&config).await?;
            let stored = SqlRuleRepository::new(pool.clone())
                .load_current()
                .await
                .map_err(persistence_failure)?;
            pool.close().await;
            Ok::<_, Failure>(stored)
        })?;

        if let Some(record) = stored {
            engine
                .load(record.rules, Some(record.metadata))
                .map_err(|error| mining_failure(&error))?;
        }

        let suggestions = engine
            .suggest(cart.iter().copied(), k)
            .map_err(|error| mining_failure(&error))?;
        Ok(SuggestionData {
            cart: cart.iter().map(|item| item.get()).collect(),
            k: k.unwrap_or(config.ranking.default_k),
            suggestions: suggestions.iter().map(RuleView::from).collect(),
        })
    });

    match result {
        Ok(data) => CommandResult::success_with(
            "suggest",
            format!("{} suggestions", data.suggestions.len()),
            to_data(&data),
        ),
        Err(failure) => CommandResult::from_failure("suggest", failure),
    }
}
