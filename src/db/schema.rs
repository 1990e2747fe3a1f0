//! Database schema initialization

use sqlx::SqlitePool;

use crate::error::Result;

/// Initialize the database schema
pub async fn initialize_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(SCHEMA_SQL)
        .execute(pool)
        .await?;

    Ok(())
}

const SCHEMA_SQL: &str = r#"
-- Replicated tables. Ids come from the owning services; the replica never
-- generates its own ids for these rows.
CREATE TABLE IF NOT EXISTS members (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS concerts (
    id INTEGER PRIMARY KEY,
    title TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS rehearsals (
    id INTEGER PRIMARY KEY,
    title TEXT NOT NULL
);

-- Attendance records are owned locally, one row per (event, member).
CREATE TABLE IF NOT EXISTS concert_attendances (
    id TEXT PRIMARY KEY,
    concert_id INTEGER NOT NULL,
    member_id INTEGER NOT NULL,
    is_present INTEGER NOT NULL,
    reason_for_absence TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),

    UNIQUE(concert_id, member_id)
);

CREATE INDEX IF NOT EXISTS idx_concert_attendances_member ON concert_attendances(member_id);

CREATE TABLE IF NOT EXISTS rehearsal_attendances (
    id TEXT PRIMARY KEY,
    rehearsal_id INTEGER NOT NULL,
    member_id INTEGER NOT NULL,
    is_present INTEGER NOT NULL,
    reason_for_absence TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),

    UNIQUE(rehearsal_id, member_id)
);

CREATE INDEX IF NOT EXISTS idx_rehearsal_attendances_member ON rehearsal_attendances(member_id);
"#;
