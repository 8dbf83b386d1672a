use async_trait::async_trait;
use thiserror::Error;

use affinity_core::domain::{AssociationRule, ItemId};
use affinity_core::store::RuleSetMetadata;

pub mod memory;
pub mod order_history;
pub mod rule;

pub use memory::{InMemoryOrderHistoryRepository, InMemoryRuleRepository};
pub use order_history::{NewSaleOrder, SaleOrderState, SqlOrderHistoryRepository};
pub use rule::SqlRuleRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("value out of range: {0}")]
    OutOfRange(String),
}

/// A complete rule set as persisted by one training run.
#[derive(Clone, Debug, PartialEq)]
pub struct RuleSetRecord {
    pub metadata: RuleSetMetadata,
    pub rules: Vec<AssociationRule>,
}

#[async_trait]
pub trait RuleRepository: Send + Sync {
    /// Drops every stored rule and stores `record` in its place. Either the
    /// whole new set lands or the previous set stays.
    async fn replace_all(&self, record: RuleSetRecord) -> Result<(), RepositoryError>;

    /// The most recently stored rule set, sorted by confidence descending.
    async fn load_current(&self) -> Result<Option<RuleSetRecord>, RepositoryError>;

    async fn count(&self) -> Result<u64, RepositoryError>;
}

#[async_trait]
pub trait OrderHistoryRepository: Send + Sync {
    /// Product ids of every confirmed order, one entry per order.
    async fn confirmed_orders(&self) -> Result<Vec<Vec<ItemId>>, RepositoryError>;

    async fn record_order(&self, order: NewSaleOrder) -> Result<i64, RepositoryError>;
}

pub(crate) fn item_to_sql(item: ItemId) -> Result<i64, RepositoryError> {
    i64::try_from(item.get())
        .map_err(|_| RepositoryError::OutOfRange(format!("item id {item} exceeds SQLite INTEGER")))
}

pub(crate) fn item_from_sql(raw: i64) -> Result<ItemId, RepositoryError> {
    u64::try_from(raw)
        .map(ItemId)
        .map_err(|_| RepositoryError::Decode(format!("negative item id {raw}")))
}
