//! Replica store for upstream-owned entities
//!
//! The only write path for the members/concerts/rehearsals tables. Writes
//! are keyed by the upstream id: insertion is an upsert, deletion of an
//! absent row is a no-op. Both are idempotent, which is what lets the
//! bootstrap fetch and the change-event consumer interleave freely.

use sqlx::SqlitePool;

use crate::error::Result;
use crate::model::{EntityKind, Replicated};

/// Repository for the replicated tables
pub struct ReplicaStore<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ReplicaStore<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Get one entity by its upstream id
    pub async fn get<E: Replicated>(&self, id: i64) -> Result<Option<E>> {
        let sql = format!(
            "SELECT id, {label} FROM {table} WHERE id = ?",
            label = E::LABEL_COLUMN,
            table = E::KIND.table(),
        );

        let entity = sqlx::query_as::<_, E>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(entity)
    }

    /// List all rows of one kind, ordered by id
    pub async fn list<E: Replicated>(&self) -> Result<Vec<E>> {
        let sql = format!(
            "SELECT id, {label} FROM {table} ORDER BY id",
            label = E::LABEL_COLUMN,
            table = E::KIND.table(),
        );

        let entities = sqlx::query_as::<_, E>(&sql)
            .fetch_all(self.pool)
            .await?;

        Ok(entities)
    }

    /// Insert or overwrite one entity, keyed by its upstream id.
    ///
    /// An existing row has its mutable fields fully overwritten, not merged:
    /// upstream is authoritative.
    pub async fn upsert<E: Replicated>(&self, entity: &E) -> Result<()> {
        let sql = format!(
            "INSERT INTO {table} (id, {label}) VALUES (?, ?) \
             ON CONFLICT(id) DO UPDATE SET {label} = excluded.{label}",
            label = E::LABEL_COLUMN,
            table = E::KIND.table(),
        );

        sqlx::query(&sql)
            .bind(entity.id())
            .bind(entity.label())
            .execute(self.pool)
            .await?;

        Ok(())
    }

    /// Delete one entity by its upstream id.
    ///
    /// Returns whether a row was actually removed; deleting an absent row
    /// is not an error.
    pub async fn delete(&self, kind: EntityKind, id: i64) -> Result<bool> {
        let sql = format!("DELETE FROM {} WHERE id = ?", kind.table());

        let result = sqlx::query(&sql)
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Whether a row of the given kind exists
    pub async fn exists(&self, kind: EntityKind, id: i64) -> Result<bool> {
        let sql = format!("SELECT 1 FROM {} WHERE id = ?", kind.table());

        let row: Option<(i64,)> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.is_some())
    }

    /// Row count for one kind
    pub async fn count(&self, kind: EntityKind) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", kind.table());

        let count: (i64,) = sqlx::query_as(&sql).fetch_one(self.pool).await?;

        Ok(count.0)
    }
}
