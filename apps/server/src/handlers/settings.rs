use axum::{extract::State, http::HeaderMap, Json};
use std::sync::Arc;

use crate::error::{ApiError, AppResult};
use crate::models::{ApiResponse, BusinessSettingsView, UpdateSettingsRequest};
use crate::scheduling::hours::WeekSchedule;
use crate::store;
use crate::{auth, clock, AppState};

/// GET /api/admin/settings — created with defaults on first read
pub async fn get_settings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> AppResult<Json<ApiResponse<BusinessSettingsView>>> {
    let mut conn = state.db.acquire().await?;
    auth::require_staff(&headers, &mut conn).await?;

    let row = store::settings_get_or_create(&mut conn).await?;
    Ok(Json(ApiResponse::success(row.into())))
}

/// PUT /api/admin/settings — toggle online booking, edit working hours
pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<UpdateSettingsRequest>,
) -> AppResult<Json<ApiResponse<BusinessSettingsView>>> {
    let mut conn = state.db.acquire().await?;
    let staff = auth::require_staff(&headers, &mut conn).await?;

    let current = store::settings_get_or_create(&mut conn).await?;
    let enabled = req
        .online_booking_enabled
        .unwrap_or(current.online_booking_enabled);
    let schedule = match req.working_hours {
        Some(schedule) => {
            schedule.validate().map_err(ApiError::Validation)?;
            schedule
        }
        None => WeekSchedule::from_json(&current.working_hours),
    };
    let schedule_json = serde_json::to_string(&schedule)
        .map_err(|e| ApiError::Validation(format!("Invalid working hours: {}", e)))?;
    let now = clock::salon_now(state.utc_offset_minutes)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string();

    store::save_settings(&mut conn, enabled, &schedule_json, &now).await?;
    let row = store::settings_get_or_create(&mut conn).await?;
    tracing::info!("business settings updated by {}", staff.username);
    Ok(Json(ApiResponse::success(row.into())))
}
