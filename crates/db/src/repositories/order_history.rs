use chrono::Utc;
use sqlx::Row;
use tracing::debug;

use affinity_core::domain::ItemId;

use super::{item_from_sql, item_to_sql, OrderHistoryRepository, RepositoryError};
use crate::DbPool;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaleOrderState {
    Draft,
    Sent,
    Sale,
    Done,
    Cancel,
}

impl SaleOrderState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::Sale => "sale",
            Self::Done => "done",
            Self::Cancel => "cancel",
        }
    }

    /// Only confirmed orders feed training.
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Sale | Self::Done)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewSaleOrder {
    pub name: String,
    pub state: SaleOrderState,
    pub products: Vec<ItemId>,
}

impl NewSaleOrder {
    pub fn confirmed(name: impl Into<String>, products: impl IntoIterator<Item = ItemId>) -> Self {
        Self { name: name.into(), state: SaleOrderState::Sale, products: products.into_iter().collect() }
    }
}

pub struct SqlOrderHistoryRepository {
    pool: DbPool,
}

impl SqlOrderHistoryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl OrderHistoryRepository for SqlOrderHistoryRepository {
    async fn confirmed_orders(&self) -> Result<Vec<Vec<ItemId>>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT line.order_id AS order_id, line.product_id AS product_id
             FROM sale_order_line AS line
             JOIN sale_order AS sale ON sale.id = line.order_id
             WHERE sale.state IN ('sale', 'done')
             ORDER BY line.order_id ASC, line.id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut orders: Vec<Vec<ItemId>> = Vec::new();
        let mut current_order: Option<i64> = None;
        for row in &rows {
            let order_id: i64 = row.try_get("order_id")?;
            let product = item_from_sql(row.try_get("product_id")?)?;
            if current_order != Some(order_id) {
                current_order = Some(order_id);
                orders.push(Vec::new());
            }
            if let Some(order) = orders.last_mut() {
                order.push(product);
            }
        }

        debug!(
            event_name = "persistence.orders.loaded",
            orders = orders.len(),
            lines = rows.len(),
            "confirmed orders loaded"
        );
        Ok(orders)
    }

    async fn record_order(&self, order: NewSaleOrder) -> Result<i64, RepositoryError> {
        let products =
            order.products.iter().copied().map(item_to_sql).collect::<Result<Vec<_>, _>>()?;
        let mut tx = self.pool.begin().await?;

        let order_id = sqlx::query(
            "INSERT INTO sale_order (name, state, created_at) VALUES (?, ?, ?)",
        )
        .bind(&order.name)
        .bind(order.state.as_str())
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for product in products {
            sqlx::query("INSERT INTO sale_order_line (order_id, product_id) VALUES (?, ?)")
                .bind(order_id)
                .bind(product)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(order_id)
    }
}
