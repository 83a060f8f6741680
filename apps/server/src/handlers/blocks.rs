use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use sqlx::SqliteConnection;
use std::sync::Arc;

use crate::error::{ApiError, AppResult};
use crate::models::{
    ApiResponse, BlockCreateResponse, BlocksQuery, ConflictInfo, CreateBlockRequest, DayBlock,
};
use crate::scheduling::blocks;
use crate::store;
use crate::{auth, clock, db, AppState};

/// GET /api/admin/blocks?from=&to= — list blocks, optionally by range
pub async fn list_blocks(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BlocksQuery>,
) -> AppResult<Json<ApiResponse<Vec<DayBlock>>>> {
    let mut conn = state.db.acquire().await?;
    auth::require_staff(&headers, &mut conn).await?;

    let blocks = if let (Some(from_raw), Some(to_raw)) = (&query.from, &query.to) {
        let from = super::parse_date(from_raw)?;
        let to = super::parse_date(to_raw)?;
        store::blocks_between(&mut conn, from, to).await?
    } else {
        store::blocks_all(&mut conn).await?
    };
    Ok(Json(ApiResponse::success(blocks)))
}

/// POST /api/admin/blocks — close days or hours; refuses to bury
/// existing appointments unless `force` is set
pub async fn create_block(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateBlockRequest>,
) -> AppResult<Json<ApiResponse<BlockCreateResponse>>> {
    let start_date = super::parse_date(&req.start_date)?;
    let end_date = match &req.end_date {
        Some(raw) => super::parse_date(raw)?,
        None => start_date,
    };
    let today = clock::salon_today(state.utc_offset_minutes);
    blocks::validate_new_block(
        start_date,
        end_date,
        &req.block_type,
        req.start_time.as_deref(),
        req.end_time.as_deref(),
        today,
    )
    .map_err(ApiError::Validation)?;

    let staff = {
        let mut conn = state.db.acquire().await?;
        auth::require_staff(&headers, &mut conn).await?
    };

    let mut conn = db::begin_immediate(&state.db).await?;
    match create_in_tx(&mut conn, &req, start_date, end_date, staff.id).await {
        Ok(resp) => {
            db::commit(&mut conn).await?;
            if let Some(block) = &resp.block {
                tracing::info!(
                    "day block {} created by {} ({} to {})",
                    block.id,
                    staff.username,
                    block.start_date,
                    block.end_date
                );
            }
            Ok(Json(ApiResponse::success(resp)))
        }
        Err(e) => {
            db::rollback(&mut conn).await;
            Err(e)
        }
    }
}

async fn create_in_tx(
    conn: &mut SqliteConnection,
    req: &CreateBlockRequest,
    start_date: chrono::NaiveDate,
    end_date: chrono::NaiveDate,
    created_by: i64,
) -> Result<BlockCreateResponse, ApiError> {
    let busy = store::busy_appointments_between(&mut *conn, start_date, end_date).await?;
    let affected = blocks::affected_appointments(
        &busy,
        start_date,
        end_date,
        &req.block_type,
        req.start_time.as_deref(),
        req.end_time.as_deref(),
    );
    let warnings: Vec<ConflictInfo> = affected.iter().map(|a| ConflictInfo::from_busy(a)).collect();

    // Without force the warnings come back and nothing is written
    if !warnings.is_empty() && !req.force {
        return Ok(BlockCreateResponse {
            block: None,
            warnings,
        });
    }

    let id = store::insert_block(&mut *conn, req, start_date, end_date, created_by).await?;
    let block = store::block_by_id(&mut *conn, id)
        .await?
        .ok_or(ApiError::NotFound("Block"))?;
    Ok(BlockCreateResponse {
        block: Some(block),
        warnings,
    })
}

/// DELETE /api/admin/blocks/:id — only the creator may remove a block
pub async fn delete_block(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<DayBlock>>> {
    let mut conn = state.db.acquire().await?;
    let staff = auth::require_staff(&headers, &mut conn).await?;

    let block = store::block_by_id(&mut conn, id)
        .await?
        .ok_or(ApiError::NotFound("Block"))?;
    if block.created_by != staff.id {
        return Err(ApiError::Forbidden);
    }
    store::delete_block(&mut conn, id).await?;
    tracing::info!("day block {} deleted by {}", id, staff.username);
    Ok(Json(ApiResponse::success(block)))
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BLOCK_PARTIAL, STATUS_CONFIRMED};
    use chrono::NaiveDate;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::SqlitePool;

    // One connection only: every acquire must see the same in-memory
    // database.
    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        db::run_migrations(&pool).await.unwrap();
        pool
    }

    async fn seed_staff_and_client(pool: &SqlitePool) {
        sqlx::query("INSERT INTO users (username, token_hash) VALUES ('owner', 't0')")
            .execute(pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO clients (name, phone) VALUES ('Dana', '+15550100')")
            .execute(pool)
            .await
            .unwrap();
    }

    async fn seed_confirmed_appointment(pool: &SqlitePool, start_at: &str, duration_min: i64) {
        sqlx::query(
            "INSERT INTO appointments (client_id, user_id, start_at, duration_min, status) \
             VALUES (1, 1, ?, ?, ?)",
        )
        .bind(start_at)
        .bind(duration_min)
        .bind(STATUS_CONFIRMED)
        .execute(pool)
        .await
        .unwrap();
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn lunch_block(force: bool) -> CreateBlockRequest {
        CreateBlockRequest {
            start_date: "2026-03-10".into(),
            end_date: None,
            block_type: BLOCK_PARTIAL.into(),
            start_time: Some("12:00".into()),
            end_time: Some("13:00".into()),
            reason: None,
            force,
        }
    }

    #[tokio::test]
    async fn test_block_over_appointment_warns_and_writes_nothing() {
        let pool = test_pool().await;
        seed_staff_and_client(&pool).await;
        seed_confirmed_appointment(&pool, "2026-03-10 12:30:00", 30).await;
        let day = date("2026-03-10");

        let mut conn = pool.acquire().await.unwrap();
        let resp = create_in_tx(&mut conn, &lunch_block(false), day, day, 1)
            .await
            .unwrap();

        assert!(resp.block.is_none());
        assert_eq!(resp.warnings.len(), 1);
        assert_eq!(resp.warnings[0].conflicting_client_name, "Dana");
        assert!(store::blocks_all(&mut conn).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_force_creates_block_and_keeps_warnings() {
        let pool = test_pool().await;
        seed_staff_and_client(&pool).await;
        seed_confirmed_appointment(&pool, "2026-03-10 12:30:00", 30).await;
        let day = date("2026-03-10");

        let mut conn = pool.acquire().await.unwrap();
        let resp = create_in_tx(&mut conn, &lunch_block(true), day, day, 1)
            .await
            .unwrap();

        let block = resp.block.expect("forced block should be created");
        assert_eq!(block.block_type, BLOCK_PARTIAL);
        assert_eq!(block.start_date, day);
        assert_eq!(resp.warnings.len(), 1);
        assert_eq!(store::blocks_all(&mut conn).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_block_on_clear_day_needs_no_force() {
        let pool = test_pool().await;
        seed_staff_and_client(&pool).await;
        let day = date("2026-03-10");

        let mut conn = pool.acquire().await.unwrap();
        let resp = create_in_tx(&mut conn, &lunch_block(false), day, day, 1)
            .await
            .unwrap();

        assert!(resp.block.is_some());
        assert!(resp.warnings.is_empty());
    }
}
