//! SQLite-backed position repository.

use super::store::{PositionStore, StoreError};
use crate::domain::{Decimal, NewPosition, PoolId, Position, PositionPatch, PositionStatus, TimeMs};
use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::{debug, error};
use uuid::Uuid;

const SELECT_POSITIONS: &str = r#"
    SELECT id, pool_id, symbol, project, chain,
           entry_yield, entry_tvl, current_yield, current_tvl, status,
           entry_time_ms, exit_time_ms, exit_yield, exit_tvl, exit_reason,
           created_at_ms, updated_at_ms
    FROM positions
"#;

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    /// Count positions currently farming.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn count_active(&self) -> Result<i64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM positions WHERE status = 'FARMING'")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("n"))
    }

    async fn query_positions(&self, active_only: bool) -> Result<Vec<Position>, StoreError> {
        let sql = if active_only {
            format!(
                "{} WHERE status = 'FARMING' ORDER BY entry_time_ms ASC, id ASC",
                SELECT_POSITIONS
            )
        } else {
            format!("{} ORDER BY entry_time_ms ASC, id ASC", SELECT_POSITIONS)
        };

        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(decode_position).collect()
    }
}

#[async_trait]
impl PositionStore for Repository {
    async fn list_active(&self) -> Result<Vec<Position>, StoreError> {
        self.query_positions(true).await
    }

    async fn list_all(&self) -> Result<Vec<Position>, StoreError> {
        self.query_positions(false).await
    }

    async fn get_position(&self, id: Uuid) -> Result<Option<Position>, StoreError> {
        let sql = format!("{} WHERE id = ?", SELECT_POSITIONS);
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(decode_position).transpose()
    }

    async fn apply_batch(
        &self,
        updates: &[PositionPatch],
        closures: &[PositionPatch],
        creations: &[NewPosition],
    ) -> Result<(), StoreError> {
        if updates.is_empty() && closures.is_empty() && creations.is_empty() {
            return Ok(());
        }

        let now = TimeMs::now().as_ms();
        // Dropping `tx` on an early return rolls everything back.
        let mut tx = self.pool.begin().await?;

        // Closures first so a pool freed this cycle can be re-entered without tripping
        // the one-active-position-per-pool index.
        for patch in closures {
            let exit = patch.exit.as_ref().ok_or(StoreError::MissingExit(patch.id))?;
            let result = sqlx::query(
                r#"
                UPDATE positions
                SET current_yield = ?, current_tvl = ?, status = 'UNSTAKED',
                    exit_time_ms = ?, exit_yield = ?, exit_tvl = ?, exit_reason = ?,
                    updated_at_ms = ?
                WHERE id = ? AND status = 'FARMING'
                "#,
            )
            .bind(patch.current_yield.to_canonical_string())
            .bind(patch.current_tvl.to_canonical_string())
            .bind(exit.time.as_ms())
            .bind(exit.exit_yield.to_canonical_string())
            .bind(exit.exit_tvl.to_canonical_string())
            .bind(&exit.reason)
            .bind(now)
            .bind(patch.id.to_string())
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                error!(position_id = %patch.id, "Closure targets a missing or closed position");
                return Err(StoreError::NotActive(patch.id));
            }
        }

        for patch in updates {
            if patch.is_closure() {
                return Err(StoreError::Corrupt(format!(
                    "update for {} carries an exit record",
                    patch.id
                )));
            }
            let result = sqlx::query(
                r#"
                UPDATE positions
                SET current_yield = ?, current_tvl = ?, updated_at_ms = ?
                WHERE id = ? AND status = 'FARMING'
                "#,
            )
            .bind(patch.current_yield.to_canonical_string())
            .bind(patch.current_tvl.to_canonical_string())
            .bind(now)
            .bind(patch.id.to_string())
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                error!(position_id = %patch.id, "Update targets a missing or closed position");
                return Err(StoreError::NotActive(patch.id));
            }
        }

        for new in creations {
            sqlx::query(
                r#"
                INSERT INTO positions (
                    id, pool_id, symbol, project, chain,
                    entry_yield, entry_tvl, current_yield, current_tvl, status,
                    entry_time_ms, created_at_ms, updated_at_ms
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 'FARMING', ?, ?, ?)
                "#,
            )
            .bind(new.id.to_string())
            .bind(new.pool_id.as_str())
            .bind(&new.symbol)
            .bind(&new.project)
            .bind(&new.chain)
            .bind(new.entry_yield.to_canonical_string())
            .bind(new.entry_tvl.to_canonical_string())
            .bind(new.entry_yield.to_canonical_string())
            .bind(new.entry_tvl.to_canonical_string())
            .bind(new.entry_time.as_ms())
            .bind(new.entry_time.as_ms())
            .bind(new.entry_time.as_ms())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                let duplicate = e
                    .as_database_error()
                    .map(|db| db.is_unique_violation())
                    .unwrap_or(false);
                if duplicate {
                    StoreError::DuplicateActivePool(new.pool_id.to_string())
                } else {
                    StoreError::Db(e)
                }
            })?;
        }

        tx.commit().await?;
        debug!(
            updates = updates.len(),
            closures = closures.len(),
            creations = creations.len(),
            "Position batch committed"
        );
        Ok(())
    }
}

fn decode_decimal(row: &SqliteRow, column: &str) -> Result<Decimal, StoreError> {
    let raw: String = row.try_get(column)?;
    Decimal::from_str(&raw)
        .map_err(|e| StoreError::Corrupt(format!("{}={:?}: {}", column, raw, e)))
}

fn decode_optional_decimal(row: &SqliteRow, column: &str) -> Result<Option<Decimal>, StoreError> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|s| {
        Decimal::from_str(&s).map_err(|e| StoreError::Corrupt(format!("{}={:?}: {}", column, s, e)))
    })
    .transpose()
}

fn decode_position(row: &SqliteRow) -> Result<Position, StoreError> {
    let id_str: String = row.try_get("id")?;
    let id = Uuid::parse_str(&id_str)
        .map_err(|e| StoreError::Corrupt(format!("id={:?}: {}", id_str, e)))?;
    let status_str: String = row.try_get("status")?;
    let status = PositionStatus::from_str(&status_str).map_err(StoreError::Corrupt)?;

    Ok(Position {
        id,
        pool_id: PoolId::new(row.try_get::<String, _>("pool_id")?),
        symbol: row.try_get("symbol")?,
        project: row.try_get("project")?,
        chain: row.try_get("chain")?,
        entry_yield: decode_decimal(row, "entry_yield")?,
        entry_tvl: decode_decimal(row, "entry_tvl")?,
        current_yield: decode_decimal(row, "current_yield")?,
        current_tvl: decode_decimal(row, "current_tvl")?,
        status,
        entry_time: TimeMs::new(row.try_get("entry_time_ms")?),
        exit_time: row
            .try_get::<Option<i64>, _>("exit_time_ms")?
            .map(TimeMs::new),
        exit_yield: decode_optional_decimal(row, "exit_yield")?,
        exit_tvl: decode_optional_decimal(row, "exit_tvl")?,
        exit_reason: row.try_get("exit_reason")?,
        created_at: TimeMs::new(row.try_get("created_at_ms")?),
        updated_at: TimeMs::new(row.try_get("updated_at_ms")?),
    })
}
