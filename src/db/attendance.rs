//! Attendance database operations
//!
//! Attendance rows are the only locally-owned data: one row per
//! (event, member), created and edited through the HTTP API and never
//! touched by the synchronization engine.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::Result;
use crate::model::EntityKind;

/// The two event types attendance can be recorded against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Concert,
    Rehearsal,
}

impl EventKind {
    pub fn table(&self) -> &'static str {
        match self {
            EventKind::Concert => "concert_attendances",
            EventKind::Rehearsal => "rehearsal_attendances",
        }
    }

    /// Foreign-key column referencing the replicated event row.
    pub fn event_column(&self) -> &'static str {
        match self {
            EventKind::Concert => "concert_id",
            EventKind::Rehearsal => "rehearsal_id",
        }
    }

    /// Replicated entity kind the event id points into.
    pub fn entity_kind(&self) -> EntityKind {
        match self {
            EventKind::Concert => EntityKind::Concert,
            EventKind::Rehearsal => EntityKind::Rehearsal,
        }
    }
}

/// Attendance record
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Attendance {
    pub id: String,
    pub event_id: i64,
    pub member_id: i64,
    pub is_present: bool,
    pub reason_for_absence: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Attendance record joined with the member it belongs to
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceWithMember {
    pub id: String,
    pub event_id: i64,
    pub member_id: i64,
    pub member_name: String,
    pub is_present: bool,
    pub reason_for_absence: Option<String>,
}

/// Attendance create/edit request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceUpdate {
    pub member_id: i64,
    pub is_present: bool,
    pub reason_for_absence: Option<String>,
}

/// Attendance repository, parameterized by event kind
pub struct AttendanceRepository<'a> {
    pool: &'a SqlitePool,
    kind: EventKind,
}

impl<'a> AttendanceRepository<'a> {
    pub fn new(pool: &'a SqlitePool, kind: EventKind) -> Self {
        Self { pool, kind }
    }

    /// All attendance rows for one member
    pub async fn list_for_member(&self, member_id: i64) -> Result<Vec<Attendance>> {
        let sql = format!(
            "SELECT id, {event} AS event_id, member_id, is_present, reason_for_absence, \
                    created_at, updated_at \
             FROM {table} WHERE member_id = ? ORDER BY created_at",
            event = self.kind.event_column(),
            table = self.kind.table(),
        );

        let rows = sqlx::query_as::<_, Attendance>(&sql)
            .bind(member_id)
            .fetch_all(self.pool)
            .await?;

        Ok(rows)
    }

    /// All attendance rows for one event, joined with member names
    pub async fn list_for_event(&self, event_id: i64) -> Result<Vec<AttendanceWithMember>> {
        let sql = format!(
            "SELECT a.id, a.{event} AS event_id, a.member_id, m.name AS member_name, \
                    a.is_present, a.reason_for_absence \
             FROM {table} a \
             JOIN members m ON m.id = a.member_id \
             WHERE a.{event} = ? \
             ORDER BY m.name",
            event = self.kind.event_column(),
            table = self.kind.table(),
        );

        let rows = sqlx::query_as::<_, AttendanceWithMember>(&sql)
            .bind(event_id)
            .fetch_all(self.pool)
            .await?;

        Ok(rows)
    }

    /// Create or replace the attendance row for (event, member)
    pub async fn upsert(&self, event_id: i64, update: &AttendanceUpdate) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let id = Uuid::new_v4().to_string();

        let sql = format!(
            "INSERT INTO {table} (id, {event}, member_id, is_present, reason_for_absence, \
                                  created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT({event}, member_id) DO UPDATE SET \
                is_present = excluded.is_present, \
                reason_for_absence = excluded.reason_for_absence, \
                updated_at = excluded.updated_at",
            event = self.kind.event_column(),
            table = self.kind.table(),
        );

        sqlx::query(&sql)
            .bind(&id)
            .bind(event_id)
            .bind(update.member_id)
            .bind(update.is_present)
            .bind(&update.reason_for_absence)
            .bind(&now)
            .bind(&now)
            .execute(self.pool)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{initialize_schema, ReplicaStore};
    use crate::model::{Concert, Member};

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        initialize_schema(&pool).await.unwrap();

        let store = ReplicaStore::new(&pool);
        store
            .upsert(&Member {
                id: 1,
                name: "Ada".to_string(),
            })
            .await
            .unwrap();
        store
            .upsert(&Member {
                id: 2,
                name: "Grace".to_string(),
            })
            .await
            .unwrap();
        store
            .upsert(&Concert {
                id: 10,
                title: "Winter concert".to_string(),
            })
            .await
            .unwrap();

        pool
    }

    #[tokio::test]
    async fn upsert_replaces_existing_row() {
        let pool = setup_test_db().await;
        let repo = AttendanceRepository::new(&pool, EventKind::Concert);

        repo.upsert(
            10,
            &AttendanceUpdate {
                member_id: 1,
                is_present: false,
                reason_for_absence: Some("sick".to_string()),
            },
        )
        .await
        .unwrap();

        repo.upsert(
            10,
            &AttendanceUpdate {
                member_id: 1,
                is_present: true,
                reason_for_absence: None,
            },
        )
        .await
        .unwrap();

        let rows = repo.list_for_event(10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].is_present);
        assert_eq!(rows[0].reason_for_absence, None);
    }

    #[tokio::test]
    async fn lists_join_member_names() {
        let pool = setup_test_db().await;
        let repo = AttendanceRepository::new(&pool, EventKind::Concert);

        for member_id in [1, 2] {
            repo.upsert(
                10,
                &AttendanceUpdate {
                    member_id,
                    is_present: true,
                    reason_for_absence: None,
                },
            )
            .await
            .unwrap();
        }

        let rows = repo.list_for_event(10).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].member_name, "Ada");
        assert_eq!(rows[1].member_name, "Grace");

        let for_member = repo.list_for_member(2).await.unwrap();
        assert_eq!(for_member.len(), 1);
        assert_eq!(for_member[0].event_id, 10);
    }

    #[tokio::test]
    async fn concert_and_rehearsal_rows_are_separate() {
        let pool = setup_test_db().await;

        AttendanceRepository::new(&pool, EventKind::Concert)
            .upsert(
                10,
                &AttendanceUpdate {
                    member_id: 1,
                    is_present: true,
                    reason_for_absence: None,
                },
            )
            .await
            .unwrap();

        let rehearsals = AttendanceRepository::new(&pool, EventKind::Rehearsal)
            .list_for_member(1)
            .await
            .unwrap();
        assert!(rehearsals.is_empty());
    }
}
