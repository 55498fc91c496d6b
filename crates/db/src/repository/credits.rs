//! Postgres-backed `engine::credit::CreditManager`.
//!
//! `record` uses an atomic `INSERT ... ON CONFLICT ... UPDATE ... RETURNING`
//! so concurrent executions for the same organization never lose an update.

use async_trait::async_trait;
use sqlx::PgPool;

use engine::credit::CreditManager;
use engine::error::EngineError;

use crate::models::CreditUsageRow;
use crate::DbError;

fn store_err(err: DbError) -> EngineError {
    EngineError::Store(Box::new(err))
}

pub struct PgCreditManager {
    pool: PgPool,
}

impl PgCreditManager {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CreditManager for PgCreditManager {
    async fn current_usage(&self, organization_id: &str) -> Result<u64, EngineError> {
        let row = sqlx::query_as!(
            CreditUsageRow,
            r#"SELECT organization_id, current_usage FROM org_credit_usage WHERE organization_id = $1"#,
            organization_id,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from)
        .map_err(store_err)?;

        Ok(row.map(|r| r.current_usage as u64).unwrap_or(0))
    }

    async fn record(&self, organization_id: &str, usage: u64) -> Result<(), EngineError> {
        if usage == 0 {
            return Ok(());
        }

        sqlx::query!(
            r#"
            INSERT INTO org_credit_usage (organization_id, current_usage)
            VALUES ($1, $2)
            ON CONFLICT (organization_id) DO UPDATE
            SET current_usage = org_credit_usage.current_usage + EXCLUDED.current_usage
            "#,
            organization_id,
            usage as i64,
        )
        .execute(&self.pool)
        .await
        .map_err(DbError::from)
        .map_err(store_err)?;

        Ok(())
    }
}
