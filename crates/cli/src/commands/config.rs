use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use toml::Value;

use affinity_core::config::{AppConfig, LoadOptions};

use crate::commands::{to_data, CommandResult};

#[derive(Debug, Serialize)]
struct ConfigEntry {
    key: &'static str,
    value: String,
    source: String,
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                2,
            );
        }
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let entry = |key: &'static str, env_keys: &[&str], value: String| ConfigEntry {
        key,
        value,
        source: field_source(key, env_keys, config_file_doc.as_ref(), config_file_path.as_deref()),
    };

    let entries = vec![
        entry("database.url", &["AFFINITY_DATABASE_URL"], config.database.url.clone()),
        entry(
            "database.max_connections",
            &["AFFINITY_DATABASE_MAX_CONNECTIONS"],
            config.database.max_connections.to_string(),
        ),
        entry(
            "database.timeout_secs",
            &["AFFINITY_DATABASE_TIMEOUT_SECS"],
            config.database.timeout_secs.to_string(),
        ),
        entry(
            "mining.min_support",
            &["AFFINITY_MINING_MIN_SUPPORT"],
            config.mining.min_support.to_string(),
        ),
        entry(
            "mining.min_confidence",
            &["AFFINITY_MINING_MIN_CONFIDENCE"],
            config.mining.min_confidence.to_string(),
        ),
        entry(
            "mining.max_itemset_len",
            &["AFFINITY_MINING_MAX_ITEMSET_LEN"],
            config
                .mining
                .max_itemset_len
                .map_or_else(|| "<unbounded>".to_string(), |len| len.to_string()),
        ),
        entry(
            "mining.timeout_secs",
            &["AFFINITY_MINING_TIMEOUT_SECS"],
            config.mining.timeout_secs.to_string(),
        ),
        entry(
            "ranking.default_k",
            &["AFFINITY_RANKING_DEFAULT_K"],
            config.ranking.default_k.to_string(),
        ),
        entry(
            "ranking.distinct_consequents",
            &["AFFINITY_RANKING_DISTINCT_CONSEQUENTS"],
            config.ranking.distinct_consequents.to_string(),
        ),
        entry(
            "logging.level",
            &["AFFINITY_LOGGING_LEVEL", "AFFINITY_LOG_LEVEL"],
            config.logging.level.clone(),
        ),
        entry(
            "logging.format",
            &["AFFINITY_LOGGING_FORMAT", "AFFINITY_LOG_FORMAT"],
            format!("{:?}", config.logging.format).to_lowercase(),
        ),
    ];

    CommandResult::success_with(
        "config",
        "effective config (source precedence: env > file > default)",
        to_data(&entries),
    )
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("affinity.toml"), PathBuf::from("config/affinity.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    // Aliases are listed in the order the loader reads them.
    let set_key = env_keys
        .iter()
        .copied()
        .find(|key| env::var(key).is_ok_and(|value| !value.trim().is_empty()));
    if let Some(env_key) = set_key {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}
