use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::info;
use uuid::Uuid;

use affinity_core::domain::AssociationRule;
use affinity_core::store::RuleSetMetadata;

use super::{item_from_sql, item_to_sql, RepositoryError, RuleRepository, RuleSetRecord};
use crate::DbPool;

pub struct SqlRuleRepository {
    pool: DbPool,
}

impl SqlRuleRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl RuleRepository for SqlRuleRepository {
    async fn replace_all(&self, record: RuleSetRecord) -> Result<(), RepositoryError> {
        let RuleSetRecord { metadata, rules } = record;
        let run_id = metadata.run_id.to_string();
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM recommendation_rule").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM rule_set_run").execute(&mut *tx).await?;

        sqlx::query(
            "INSERT INTO rule_set_run
                (id, generated_at, min_support, min_confidence, transaction_count, rule_count)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&run_id)
        .bind(metadata.generated_at.to_rfc3339())
        .bind(metadata.min_support)
        .bind(metadata.min_confidence)
        .bind(i64::try_from(metadata.transaction_count).map_err(|_| {
            RepositoryError::OutOfRange(format!(
                "transaction count {} exceeds SQLite INTEGER",
                metadata.transaction_count
            ))
        })?)
        .bind(rules.len() as i64)
        .execute(&mut *tx)
        .await?;

        for rule in &rules {
            sqlx::query(
                "INSERT INTO recommendation_rule
                    (run_id, antecedent_id, consequent_id, support, confidence, lift)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&run_id)
            .bind(item_to_sql(rule.antecedent)?)
            .bind(item_to_sql(rule.consequent)?)
            .bind(rule.support)
            .bind(rule.confidence)
            .bind(rule.lift)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(
            event_name = "persistence.rules.replaced",
            correlation_id = %run_id,
            removed = removed.rows_affected(),
            inserted = rules.len(),
            "recommendation rules replaced"
        );
        Ok(())
    }

    async fn load_current(&self) -> Result<Option<RuleSetRecord>, RepositoryError> {
        let run = sqlx::query(
            "SELECT id, generated_at, min_support, min_confidence, transaction_count
             FROM rule_set_run
             ORDER BY rowid DESC
             LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        let Some(run) = run else {
            return Ok(None);
        };
        let metadata = metadata_from_row(&run)?;

        let rows = sqlx::query(
            "SELECT antecedent_id, consequent_id, support, confidence, lift
             FROM recommendation_rule
             WHERE run_id = ?
             ORDER BY confidence DESC, lift DESC, antecedent_id ASC, consequent_id ASC",
        )
        .bind(metadata.run_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let rules = rows.iter().map(rule_from_row).collect::<Result<Vec<_>, _>>()?;
        Ok(Some(RuleSetRecord { metadata, rules }))
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        let count: i64 = sqlx::query("SELECT COUNT(*) AS count FROM recommendation_rule")
            .fetch_one(&self.pool)
            .await?
            .try_get("count")?;
        u64::try_from(count).map_err(|_| RepositoryError::Decode(format!("negative count {count}")))
    }
}

fn metadata_from_row(row: &SqliteRow) -> Result<RuleSetMetadata, RepositoryError> {
    let run_id: String = row.try_get("id")?;
    let generated_at: String = row.try_get("generated_at")?;
    let transaction_count: i64 = row.try_get("transaction_count")?;

    Ok(RuleSetMetadata {
        run_id: Uuid::parse_str(&run_id)
            .map_err(|error| RepositoryError::Decode(format!("run id `{run_id}`: {error}")))?,
        generated_at: DateTime::parse_from_rfc3339(&generated_at)
            .map(|timestamp| timestamp.with_timezone(&Utc))
            .map_err(|error| {
                RepositoryError::Decode(format!("generated_at `{generated_at}`: {error}"))
            })?,
        min_support: row.try_get("min_support")?,
        min_confidence: row.try_get("min_confidence")?,
        transaction_count: u64::try_from(transaction_count).map_err(|_| {
            RepositoryError::Decode(format!("negative transaction count {transaction_count}"))
        })?,
    })
}

fn rule_from_row(row: &SqliteRow) -> Result<AssociationRule, RepositoryError> {
    Ok(AssociationRule {
        antecedent: item_from_sql(row.try_get("antecedent_id")?)?,
        consequent: item_from_sql(row.try_get("consequent_id")?)?,
        support: row.try_get("support")?,
        confidence: row.try_get("confidence")?,
        lift: row.try_get("lift")?,
    })
}
