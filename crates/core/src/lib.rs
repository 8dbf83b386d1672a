pub mod config;
pub mod domain;
pub mod errors;
pub mod mining;
pub mod ranking;
pub mod rules;
pub mod store;
pub mod training;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use domain::{AssociationRule, ItemId, Itemset, Support, Threshold, Transaction, TransactionSet};
pub use errors::{ApplicationError, InsufficientDataReason, InterfaceError, MiningError};
pub use mining::{CancellationFlag, FrequentItemsets, ItemsetMiner, LevelStats};
pub use ranking::{RuleIndex, SuggestionQuery, DEFAULT_MAX_SUGGESTIONS};
pub use rules::RuleGenerator;
pub use store::{RuleSetMetadata, RuleSetStore, RuleSnapshot};
pub use training::{RecommendationEngine, TrainingOutcome, TrainingPipeline, TrainingReport};
