use tokio::sync::RwLock;

use affinity_core::domain::ItemId;

use super::{
    NewSaleOrder, OrderHistoryRepository, RepositoryError, RuleRepository, RuleSetRecord,
};

#[derive(Default)]
pub struct InMemoryRuleRepository {
    current: RwLock<Option<RuleSetRecord>>,
}

#[async_trait::async_trait]
impl RuleRepository for InMemoryRuleRepository {
    async fn replace_all(&self, record: RuleSetRecord) -> Result<(), RepositoryError> {
        let mut current = self.current.write().await;
        *current = Some(record);
        Ok(())
    }

    async fn load_current(&self) -> Result<Option<RuleSetRecord>, RepositoryError> {
        let current = self.current.read().await;
        Ok(current.clone().map(|mut record| {
            record.rules.sort_by(|a, b| a.rank_cmp(b));
            record
        }))
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        let current = self.current.read().await;
        Ok(current.as_ref().map_or(0, |record| record.rules.len() as u64))
    }
}

#[derive(Default)]
pub struct InMemoryOrderHistoryRepository {
    orders: RwLock<Vec<NewSaleOrder>>,
}

#[async_trait::async_trait]
impl OrderHistoryRepository for InMemoryOrderHistoryRepository {
    async fn confirmed_orders(&self) -> Result<Vec<Vec<ItemId>>, RepositoryError> {
        let orders = self.orders.read().await;
        Ok(orders
            .iter()
            .filter(|order| order.state.is_confirmed() && !order.products.is_empty())
            .map(|order| order.products.clone())
            .collect())
    }

    async fn record_order(&self, order: NewSaleOrder) -> Result<i64, RepositoryError> {
        let mut orders = self.orders.write().await;
        orders.push(order);
        Ok(orders.len() as i64)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use affinity_core::domain::{AssociationRule, ItemId};
    use affinity_core::store::RuleSetMetadata;

    use crate::repositories::{
        InMemoryOrderHistoryRepository, InMemoryRuleRepository, NewSaleOrder,
        OrderHistoryRepository, RuleRepository, RuleSetRecord, SaleOrderState,
    };

    fn record(rules: Vec<AssociationRule>) -> RuleSetRecord {
        RuleSetRecord {
            metadata: RuleSetMetadata {
                run_id: Uuid::new_v4(),
                generated_at: Utc::now(),
                min_support: 0.01,
                min_confidence: 0.1,
                transaction_count: 10,
            },
            rules,
        }
    }

    fn rule(antecedent: u64, consequent: u64, confidence: f64) -> AssociationRule {
        AssociationRule {
            antecedent: ItemId(antecedent),
            consequent: ItemId(consequent),
            support: 0.2,
            confidence,
            lift: 1.0,
        }
    }

    #[tokio::test]
    async fn in_memory_rule_repo_replaces_whole_set() {
        let repo = InMemoryRuleRepository::default();
        assert!(repo.load_current().await.expect("load").is_none());

        repo.replace_all(record(vec![rule(1, 2, 0.3), rule(3, 4, 0.6)])).await.expect("replace");
        let second = record(vec![rule(5, 6, 0.4)]);
        repo.replace_all(second.clone()).await.expect("replace");

        let loaded = repo.load_current().await.expect("load").expect("present");
        assert_eq!(loaded, second);
        assert_eq!(repo.count().await.expect("count"), 1);
    }

    #[tokio::test]
    async fn in_memory_rule_repo_loads_by_confidence() {
        let repo = InMemoryRuleRepository::default();
        repo.replace_all(record(vec![rule(1, 2, 0.3), rule(3, 4, 0.6)])).await.expect("replace");

        let loaded = repo.load_current().await.expect("load").expect("present");
        let confidences: Vec<f64> = loaded.rules.iter().map(|rule| rule.confidence).collect();
        assert_eq!(confidences, vec![0.6, 0.3]);
    }

    #[tokio::test]
    async fn in_memory_order_repo_filters_unconfirmed() {
        let repo = InMemoryOrderHistoryRepository::default();
        repo.record_order(NewSaleOrder::confirmed("S1", [ItemId(1), ItemId(2)]))
            .await
            .expect("record");
        repo.record_order(NewSaleOrder {
            name: "S2".to_string(),
            state: SaleOrderState::Draft,
            products: vec![ItemId(3), ItemId(4)],
        })
        .await
        .expect("record");

        let confirmed = repo.confirmed_orders().await.expect("orders");
        assert_eq!(confirmed, vec![vec![ItemId(1), ItemId(2)]]);
    }
}
