use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub mining: MiningConfig,
    pub ranking: RankingConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MiningConfig {
    pub min_support: f64,
    pub min_confidence: f64,
    /// Deepest itemset level to mine; `None` mines until no candidate survives.
    pub max_itemset_len: Option<usize>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RankingConfig {
    pub default_k: usize,
    pub distinct_consequents: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub min_support: Option<f64>,
    pub min_confidence: Option<f64>,
    pub max_itemset_len: Option<usize>,
    pub mining_timeout_secs: Option<u64>,
    pub default_k: Option<usize>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://affinity.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            mining: MiningConfig::default(),
            ranking: RankingConfig {
                default_k: crate::ranking::DEFAULT_MAX_SUGGESTIONS,
                distinct_consequents: false,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self { min_support: 0.01, min_confidence: 0.10, max_itemset_len: None, timeout_secs: 300 }
    }
}

impl MiningConfig {
    pub fn time_limit(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("affinity.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(mining) = patch.mining {
            if let Some(min_support) = mining.min_support {
                self.mining.min_support = min_support;
            }
            if let Some(min_confidence) = mining.min_confidence {
                self.mining.min_confidence = min_confidence;
            }
            if let Some(max_itemset_len) = mining.max_itemset_len {
                self.mining.max_itemset_len = Some(max_itemset_len);
            }
            if let Some(timeout_secs) = mining.timeout_secs {
                self.mining.timeout_secs = timeout_secs;
            }
        }

        if let Some(ranking) = patch.ranking {
            if let Some(default_k) = ranking.default_k {
                self.ranking.default_k = default_k;
            }
            if let Some(distinct_consequents) = ranking.distinct_consequents {
                self.ranking.distinct_consequents = distinct_consequents;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("AFFINITY_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("AFFINITY_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_env("AFFINITY_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("AFFINITY_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_env("AFFINITY_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("AFFINITY_MINING_MIN_SUPPORT") {
            self.mining.min_support = parse_env("AFFINITY_MINING_MIN_SUPPORT", &value)?;
        }
        if let Some(value) = read_env("AFFINITY_MINING_MIN_CONFIDENCE") {
            self.mining.min_confidence = parse_env("AFFINITY_MINING_MIN_CONFIDENCE", &value)?;
        }
        if let Some(value) = read_env("AFFINITY_MINING_MAX_ITEMSET_LEN") {
            self.mining.max_itemset_len =
                Some(parse_env("AFFINITY_MINING_MAX_ITEMSET_LEN", &value)?);
        }
        if let Some(value) = read_env("AFFINITY_MINING_TIMEOUT_SECS") {
            self.mining.timeout_secs = parse_env("AFFINITY_MINING_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("AFFINITY_RANKING_DEFAULT_K") {
            self.ranking.default_k = parse_env("AFFINITY_RANKING_DEFAULT_K", &value)?;
        }
        if let Some(value) = read_env("AFFINITY_RANKING_DISTINCT_CONSEQUENTS") {
            self.ranking.distinct_consequents =
                parse_env("AFFINITY_RANKING_DISTINCT_CONSEQUENTS", &value)?;
        }

        let log_level =
            read_env("AFFINITY_LOGGING_LEVEL").or_else(|| read_env("AFFINITY_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("AFFINITY_LOGGING_FORMAT").or_else(|| read_env("AFFINITY_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(min_support) = overrides.min_support {
            self.mining.min_support = min_support;
        }
        if let Some(min_confidence) = overrides.min_confidence {
            self.mining.min_confidence = min_confidence;
        }
        if let Some(max_itemset_len) = overrides.max_itemset_len {
            self.mining.max_itemset_len = Some(max_itemset_len);
        }
        if let Some(timeout_secs) = overrides.mining_timeout_secs {
            self.mining.timeout_secs = timeout_secs;
        }
        if let Some(default_k) = overrides.default_k {
            self.ranking.default_k = default_k;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_mining(&self.mining)?;
        validate_ranking(&self.ranking)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("affinity.toml"), PathBuf::from("config/affinity.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_mining(mining: &MiningConfig) -> Result<(), ConfigError> {
    let in_unit_interval = |value: f64| value.is_finite() && value > 0.0 && value <= 1.0;

    if !in_unit_interval(mining.min_support) {
        return Err(ConfigError::Validation(format!(
            "mining.min_support must be in (0, 1], got {}",
            mining.min_support
        )));
    }
    if !in_unit_interval(mining.min_confidence) {
        return Err(ConfigError::Validation(format!(
            "mining.min_confidence must be in (0, 1], got {}",
            mining.min_confidence
        )));
    }
    if mining.max_itemset_len == Some(0) {
        return Err(ConfigError::Validation(
            "mining.max_itemset_len must be at least 1 when set".to_string(),
        ));
    }
    if mining.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "mining.timeout_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_ranking(ranking: &RankingConfig) -> Result<(), ConfigError> {
    if ranking.default_k == 0 {
        return Err(ConfigError::Validation(
            "ranking.default_k must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    mining: Option<MiningPatch>,
    ranking: Option<RankingPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct MiningPatch {
    min_support: Option<f64>,
    min_confidence: Option<f64>,
    max_itemset_len: Option<usize>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RankingPatch {
    default_k: Option<usize>,
    distinct_consequents: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_match_training_thresholds() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure((config.mining.min_support - 0.01).abs() < f64::EPSILON, "default support is 1%")?;
        ensure(
            (config.mining.min_confidence - 0.10).abs() < f64::EPSILON,
            "default confidence is 10%",
        )?;
        ensure(config.ranking.default_k == 5, "default k is 5")?;
        ensure(config.mining.max_itemset_len.is_none(), "level depth is unbounded by default")?;
        ensure(matches!(config.logging.format, LogFormat::Compact), "compact logs by default")
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_AFFINITY_DB", "sqlite://interpolated.db");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("affinity.toml");
            fs::write(
                &path,
                r#"
[database]
url = "${TEST_AFFINITY_DB}"

[mining]
min_support = 0.05
max_itemset_len = 3
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://interpolated.db",
                "database url should be interpolated from environment",
            )?;
            ensure(
                (config.mining.min_support - 0.05).abs() < f64::EPSILON,
                "file min_support should apply",
            )?;
            ensure(config.mining.max_itemset_len == Some(3), "file level depth should apply")?;
            Ok(())
        })();

        clear_vars(&["TEST_AFFINITY_DB"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("AFFINITY_LOG_LEVEL", "warn");
        env::set_var("AFFINITY_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["AFFINITY_LOG_LEVEL", "AFFINITY_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("AFFINITY_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("AFFINITY_MINING_MIN_CONFIDENCE", "0.4");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("affinity.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[mining]
min_support = 0.2
min_confidence = 0.3

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                (config.mining.min_confidence - 0.4).abs() < f64::EPSILON,
                "env confidence should win over file",
            )?;
            ensure(
                (config.mining.min_support - 0.2).abs() < f64::EPSILON,
                "file support should win over defaults",
            )?;
            Ok(())
        })();

        clear_vars(&["AFFINITY_DATABASE_URL", "AFFINITY_MINING_MIN_CONFIDENCE"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("AFFINITY_MINING_MIN_SUPPORT", "1.5");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("mining.min_support")
            );
            ensure(has_message, "validation failure should mention mining.min_support")
        })();

        clear_vars(&["AFFINITY_MINING_MIN_SUPPORT"]);
        result
    }

    #[test]
    fn malformed_env_override_is_reported_with_key() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("AFFINITY_RANKING_DEFAULT_K", "five");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("expected parse failure".to_string()),
                Err(error) => error,
            };
            ensure(
                matches!(
                    error,
                    ConfigError::InvalidEnvOverride { ref key, .. } if key == "AFFINITY_RANKING_DEFAULT_K"
                ),
                "parse failure should name the env key",
            )
        })();

        clear_vars(&["AFFINITY_RANKING_DEFAULT_K"]);
        result
    }

    #[test]
    fn required_file_must_exist() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let missing = dir.path().join("absent.toml");
        let error = match AppConfig::load(LoadOptions {
            config_path: Some(missing),
            require_file: true,
            ..LoadOptions::default()
        }) {
            Ok(_) => return Err("expected missing file failure".to_string()),
            Err(error) => error,
        };
        ensure(matches!(error, ConfigError::MissingConfigFile(_)), "missing file should be reported")
    }
}
