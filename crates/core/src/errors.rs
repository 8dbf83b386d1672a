use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::domain::item::ItemId;

/// Why a training run had nothing to learn from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsufficientDataReason {
    NoTransactions,
    NoMultiItemTransactions,
    NoFrequentItemsets,
    NoFrequentPairs,
    NoConfidentRules,
}

impl InsufficientDataReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoTransactions => "no_transactions",
            Self::NoMultiItemTransactions => "no_multi_item_transactions",
            Self::NoFrequentItemsets => "no_frequent_itemsets",
            Self::NoFrequentPairs => "no_frequent_pairs",
            Self::NoConfidentRules => "no_confident_rules",
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NoTransactions => "No confirmed sales found to train the recommender.",
            Self::NoMultiItemTransactions => {
                "Not enough complex orders (minimum 2 items per order) to find correlations."
            }
            Self::NoFrequentItemsets => {
                "No frequent patterns found. Lower mining.min_support or sell more products."
            }
            Self::NoFrequentPairs => {
                "No products are bought together often enough. Lower mining.min_support."
            }
            Self::NoConfidentRules => {
                "Co-purchases were found but none reach mining.min_confidence. Lower the threshold."
            }
        }
    }
}

impl fmt::Display for InsufficientDataReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.user_message())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MiningError {
    #[error("invalid parameter `{name}` = {value}: {reason}")]
    InvalidParameter { name: &'static str, value: String, reason: &'static str },
    #[error("insufficient data: {0}")]
    InsufficientData(InsufficientDataReason),
    #[error("singleton support for item {item} was not retained before rule generation")]
    MissingBaseSupport { item: ItemId },
    #[error("mining exceeded its {limit:?} time limit after {elapsed:?}")]
    MiningTimedOut { elapsed: Duration, limit: Duration },
    #[error("mining was cancelled before level {level}")]
    Cancelled { level: usize },
    #[error("another mining run is already in progress")]
    MiningInProgress,
}

impl MiningError {
    pub fn invalid_threshold(name: &'static str, value: f64) -> Self {
        Self::InvalidParameter {
            name,
            value: value.to_string(),
            reason: "must be greater than 0 and at most 1",
        }
    }

    pub fn error_class(&self) -> &'static str {
        match self {
            Self::InvalidParameter { .. } => "invalid_parameter",
            Self::InsufficientData(_) => "insufficient_data",
            Self::MissingBaseSupport { .. } => "missing_base_support",
            Self::MiningTimedOut { .. } => "mining_timed_out",
            Self::Cancelled { .. } => "mining_cancelled",
            Self::MiningInProgress => "mining_in_progress",
        }
    }

    /// Whether the operator can fix the condition by changing input or settings.
    pub fn is_user_recoverable(&self) -> bool {
        !matches!(self, Self::MissingBaseSupport { .. })
    }

    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidParameter { name, reason, .. } => format!("`{name}` {reason}."),
            Self::InsufficientData(reason) => reason.user_message().to_owned(),
            Self::MissingBaseSupport { .. } => "An unexpected internal error occurred.".to_owned(),
            Self::MiningTimedOut { .. } => {
                "Mining took too long. Raise mining.min_support or mining.timeout_secs and retry."
                    .to_owned()
            }
            Self::Cancelled { .. } => "Mining was cancelled; the previous rules are unchanged."
                .to_owned(),
            Self::MiningInProgress => {
                "A training run is already in progress. Wait for it to finish.".to_owned()
            }
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Mining(#[from] MiningError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("unprocessable data: {message}")]
    UnprocessableData { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::UnprocessableData { message, .. } => message,
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::UnprocessableData { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::UnprocessableData { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Mining(error @ MiningError::InvalidParameter { .. }) => {
                Self::BadRequest { message: error.to_string(), correlation_id }
            }
            ApplicationError::Mining(MiningError::MissingBaseSupport { item }) => Self::Internal {
                message: format!("missing singleton support for item {item}"),
                correlation_id,
            },
            ApplicationError::Mining(MiningError::MiningInProgress) => Self::ServiceUnavailable {
                message: MiningError::MiningInProgress.to_string(),
                correlation_id,
            },
            ApplicationError::Mining(error) => {
                Self::UnprocessableData { message: error.user_message(), correlation_id }
            }
            ApplicationError::Persistence(message) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
            ApplicationError::Configuration(message) => Self::Internal { message, correlation_id },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::domain::item::ItemId;
    use crate::errors::{ApplicationError, InsufficientDataReason, InterfaceError, MiningError};

    #[test]
    fn invalid_parameter_maps_to_bad_request_interface_error() {
        let interface = ApplicationError::from(MiningError::invalid_threshold("min_support", 1.5))
            .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest {
                ref correlation_id,
                ..
            } if correlation_id == "req-1"
        ));
        assert_eq!(
            interface.user_message(),
            "The request could not be processed. Check inputs and try again."
        );
    }

    #[test]
    fn insufficient_data_surfaces_actionable_message() {
        let interface = ApplicationError::from(MiningError::InsufficientData(
            InsufficientDataReason::NoMultiItemTransactions,
        ))
        .into_interface("run-7");

        assert!(matches!(interface, InterfaceError::UnprocessableData { .. }));
        assert_eq!(
            interface.user_message(),
            "Not enough complex orders (minimum 2 items per order) to find correlations."
        );
        assert_eq!(interface.correlation_id(), "run-7");
    }

    #[test]
    fn missing_base_support_is_an_internal_error() {
        let error = MiningError::MissingBaseSupport { item: ItemId(9) };
        assert!(!error.is_user_recoverable());

        let interface = ApplicationError::from(error).into_interface("run-8");
        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
    }

    #[test]
    fn timeout_is_recoverable_and_hints_at_settings() {
        let error = MiningError::MiningTimedOut {
            elapsed: Duration::from_secs(31),
            limit: Duration::from_secs(30),
        };

        assert!(error.is_user_recoverable());
        assert_eq!(error.error_class(), "mining_timed_out");
        assert!(error.user_message().contains("mining.min_support"));
    }

    #[test]
    fn persistence_error_maps_to_service_unavailable() {
        let interface = ApplicationError::Persistence("database lock timeout".to_owned())
            .into_interface("req-3");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(
            interface.user_message(),
            "The service is temporarily unavailable. Please retry shortly."
        );
    }
}
