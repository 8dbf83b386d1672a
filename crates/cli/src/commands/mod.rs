pub mod config;
pub mod migrate;
pub mod rules;
pub mod suggest;
pub mod train;

use serde::Serialize;
use serde_json::Value;

use affinity_core::config::{AppConfig, ConfigOverrides, LoadOptions};
use affinity_core::domain::AssociationRule;
use affinity_db::{connect_with_settings, migrations, DbPool};

/// Error class, user-facing message, process exit code.
pub(crate) type Failure = (&'static str, String, u8);

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::success_with(command, message, None)
    }

    pub fn success_with(command: &str, message: impl Into<String>, data: Option<Value>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    fn from_failure(command: &str, (error_class, message, exit_code): Failure) -> Self {
        Self::failure(command, error_class, message, exit_code)
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// A rule as printed by `suggest` and `rules`.
#[derive(Debug, Serialize)]
pub(crate) struct RuleView {
    antecedent_id: u64,
    consequent_id: u64,
    support: f64,
    confidence: f64,
    lift: f64,
    label: String,
}

impl From<&AssociationRule> for RuleView {
    fn from(rule: &AssociationRule) -> Self {
        Self {
            antecedent_id: rule.antecedent.get(),
            consequent_id: rule.consequent.get(),
            support: rule.support,
            confidence: rule.confidence,
            lift: rule.lift,
            label: rule.label(),
        }
    }
}

pub(crate) fn to_data(value: impl Serialize) -> Option<Value> {
    serde_json::to_value(value).ok()
}

pub(crate) fn load_config(overrides: ConfigOverrides) -> Result<AppConfig, Failure> {
    AppConfig::load(LoadOptions { overrides, ..LoadOptions::default() })
        .map_err(|error| ("config_validation", format!("configuration issue: {error}"), 2))
}

/// Runs `future` on a current-thread runtime, mapping setup failures to the
/// same exit codes every command uses.
pub(crate) fn block_on<F, T>(future: F) -> Result<T, Failure>
where
    F: std::future::Future<Output = Result<T, Failure>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|error| ("runtime_init", format!("failed to initialize async runtime: {error}"), 3))?;
    runtime.block_on(future)
}

/// Connects and brings the schema up to date.
pub(crate) async fn open_database(config: &AppConfig) -> Result<DbPool, Failure> {
    let pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
    migrations::run_pending(&pool).await.map_err(|error| ("migration", error.to_string(), 5u8))?;
    Ok(pool)
}

pub(crate) fn persistence_failure(error: impl std::fmt::Display) -> Failure {
    ("persistence", error.to_string(), 8)
}

pub(crate) fn mining_failure(error: &affinity_core::errors::MiningError) -> Failure {
    (error.error_class(), error.user_message(), 7)
}
