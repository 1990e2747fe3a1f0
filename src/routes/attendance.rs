//! Attendance API routes
//!
//! Create/read/update of attendance rows against the replicated concerts
//! and rehearsals. Events referenced here must already exist in the
//! replica and unknown members are skipped, never invented: the upstream
//! services own those id spaces.

use axum::{
    extract::Path,
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use sqlx::SqlitePool;

use crate::db::{
    Attendance, AttendanceRepository, AttendanceUpdate, AttendanceWithMember, EventKind,
    ReplicaStore,
};
use crate::error::{AppError, Result};
use crate::model::EntityKind;
use crate::state::AppState;

/// Extended state with database pool and event kind
#[derive(Clone)]
pub struct AttendanceState {
    pub pool: SqlitePool,
    pub kind: EventKind,
}

/// Create the concert attendance router
pub fn concert_router(pool: SqlitePool) -> Router<AppState> {
    router(pool, EventKind::Concert)
}

/// Create the rehearsal attendance router
pub fn rehearsal_router(pool: SqlitePool) -> Router<AppState> {
    router(pool, EventKind::Rehearsal)
}

fn router(pool: SqlitePool, kind: EventKind) -> Router<AppState> {
    let state = AttendanceState { pool, kind };
    let event_path = format!("/{}/:event_id", kind.entity_kind().key_suffix());

    Router::new()
        .route("/member/:member_id", get(get_for_member))
        .route(
            &event_path,
            get(get_for_event)
                .post(create_attendances)
                .patch(edit_attendances),
        )
        .layer(Extension(state))
}

/// All attendance rows for one member
async fn get_for_member(
    Extension(state): Extension<AttendanceState>,
    Path(member_id): Path<i64>,
) -> Result<Json<Vec<Attendance>>> {
    tracing::info!(
        "Getting {} attendances for member {}",
        state.kind.entity_kind(),
        member_id
    );
    let repo = AttendanceRepository::new(&state.pool, state.kind);
    Ok(Json(repo.list_for_member(member_id).await?))
}

/// All attendance rows for one event
async fn get_for_event(
    Extension(state): Extension<AttendanceState>,
    Path(event_id): Path<i64>,
) -> Result<Json<Vec<AttendanceWithMember>>> {
    tracing::info!(
        "Getting attendances for {} {}",
        state.kind.entity_kind(),
        event_id
    );
    ensure_event_exists(&state, event_id).await?;

    let repo = AttendanceRepository::new(&state.pool, state.kind);
    Ok(Json(repo.list_for_event(event_id).await?))
}

/// Record attendance for an event
async fn create_attendances(
    Extension(state): Extension<AttendanceState>,
    Path(event_id): Path<i64>,
    Json(models): Json<Vec<AttendanceUpdate>>,
) -> Result<(StatusCode, Json<Vec<AttendanceWithMember>>)> {
    tracing::info!(
        "Adding attendance for {} {}",
        state.kind.entity_kind(),
        event_id
    );
    let rows = apply_attendances(&state, event_id, &models).await?;
    Ok((StatusCode::CREATED, Json(rows)))
}

/// Edit attendance for an event
async fn edit_attendances(
    Extension(state): Extension<AttendanceState>,
    Path(event_id): Path<i64>,
    Json(models): Json<Vec<AttendanceUpdate>>,
) -> Result<Json<Vec<AttendanceWithMember>>> {
    tracing::info!(
        "Editing attendance for {} {}",
        state.kind.entity_kind(),
        event_id
    );
    let rows = apply_attendances(&state, event_id, &models).await?;
    Ok(Json(rows))
}

async fn ensure_event_exists(state: &AttendanceState, event_id: i64) -> Result<()> {
    let store = ReplicaStore::new(&state.pool);
    if !store.exists(state.kind.entity_kind(), event_id).await? {
        return Err(AppError::NotFound(format!(
            "No {} with id {}",
            state.kind.entity_kind(),
            event_id
        )));
    }
    Ok(())
}

async fn apply_attendances(
    state: &AttendanceState,
    event_id: i64,
    models: &[AttendanceUpdate],
) -> Result<Vec<AttendanceWithMember>> {
    ensure_event_exists(state, event_id).await?;

    if let Some(model) = models.iter().find(|m| m.member_id < 1) {
        return Err(AppError::BadRequest(format!(
            "memberId must be positive, got {}",
            model.member_id
        )));
    }

    let store = ReplicaStore::new(&state.pool);
    let repo = AttendanceRepository::new(&state.pool, state.kind);

    for model in models {
        if !store.exists(EntityKind::Member, model.member_id).await? {
            tracing::warn!(
                "Skipping attendance for unknown member {} on {} {}",
                model.member_id,
                state.kind.entity_kind(),
                event_id
            );
            continue;
        }

        repo.upsert(event_id, model).await?;
    }

    repo.list_for_event(event_id).await
}
