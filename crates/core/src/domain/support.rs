use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::MiningError;

/// Exact `count / total` frequency of an itemset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Support {
    pub count: u64,
    pub total: u64,
}

impl Support {
    pub fn new(count: u64, total: u64) -> Self {
        debug_assert!(count <= total, "support count cannot exceed transaction total");
        Self { count, total }
    }

    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.count as f64 / self.total as f64
    }

    pub fn meets(&self, threshold: Threshold) -> bool {
        threshold.admits(self.count, self.total)
    }
}

/// A ratio threshold in `(0, 1]`, held as a decimal so comparisons against
/// integer counts are exact.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Threshold(Decimal);

impl Threshold {
    pub fn new(name: &'static str, value: f64) -> Result<Self, MiningError> {
        if !value.is_finite() || value <= 0.0 || value > 1.0 {
            return Err(MiningError::invalid_threshold(name, value));
        }

        // Values below Decimal's scale round to zero, which would admit every count.
        match Decimal::from_f64(value) {
            Some(decimal) if !decimal.is_zero() => Ok(Self(decimal)),
            _ => Err(MiningError::invalid_threshold(name, value)),
        }
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn as_f64(&self) -> f64 {
        self.0.to_f64().unwrap_or_default()
    }

    /// `numerator / denominator >= threshold`, evaluated without division.
    pub fn admits(&self, numerator: u64, denominator: u64) -> bool {
        if denominator == 0 {
            return false;
        }
        Decimal::from(numerator) >= self.0 * Decimal::from(denominator)
    }
}
