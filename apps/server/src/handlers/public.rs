use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use sqlx::SqliteConnection;
use std::sync::Arc;

use crate::error::{ApiError, AppResult};
use crate::models::{
    effective_duration, ApiResponse, BookingConfirmation, BookingRequest, ConflictInfo,
    ServiceView, SlotsQuery, STATUS_PENDING,
};
use crate::scheduling::hours::WeekSchedule;
use crate::scheduling::{conflict, slots};
use crate::store::{self, NewAppointment};
use crate::{clock, db, AppState};

/// GET /api/services — visible services for the booking page
pub async fn list_services(
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<ServiceView>>>> {
    let mut conn = state.db.acquire().await?;
    let services = store::visible_services(&mut conn).await?;
    Ok(Json(ApiResponse::success(
        services.into_iter().map(Into::into).collect(),
    )))
}

/// GET /api/slots?date=YYYY-MM-DD&service_id=N — bookable start times
pub async fn list_slots(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SlotsQuery>,
) -> AppResult<Json<ApiResponse<Vec<String>>>> {
    let date = super::parse_date(&query.date)?;
    let mut conn = state.db.acquire().await?;

    let settings = store::settings_get_or_create(&mut conn).await?;
    if !settings.online_booking_enabled {
        return Err(ApiError::Validation(
            "Online booking is currently disabled".into(),
        ));
    }

    // Hidden or unknown services expose no slots
    let service = match store::visible_service_by_id(&mut conn, query.service_id).await? {
        Some(service) => service,
        None => return Ok(Json(ApiResponse::success(Vec::new()))),
    };

    let schedule = WeekSchedule::from_json(&settings.working_hours);
    let slots = compute_slots(&mut conn, date, service.duration_min, &schedule).await?;
    Ok(Json(ApiResponse::success(slots)))
}

/// Run the slot generator for one day against live schedule state.
pub(crate) async fn compute_slots(
    conn: &mut SqliteConnection,
    date: NaiveDate,
    duration_min: i64,
    schedule: &WeekSchedule,
) -> Result<Vec<String>, sqlx::Error> {
    let hours = schedule.day(date.weekday());
    let busy = store::busy_appointments_for_date(&mut *conn, date).await?;
    let busy_intervals = slots::busy_minute_intervals(&busy, date);
    let blocks = store::blocks_between(&mut *conn, date, date).await?;
    Ok(slots::generate_slots(
        hours,
        duration_min,
        &busy_intervals,
        &blocks,
        date,
    ))
}

/// POST /api/bookings — online booking, creates a pending appointment
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BookingRequest>,
) -> AppResult<Json<ApiResponse<BookingConfirmation>>> {
    let name = req.client_name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::Validation("Client name is required".into()));
    }
    let phone = req.client_phone.trim().to_string();
    if phone.is_empty() {
        return Err(ApiError::Validation("Client phone is required".into()));
    }
    if req.service_ids.is_empty() {
        return Err(ApiError::Validation(
            "At least one service is required".into(),
        ));
    }
    let start_at = super::parse_start_at(&req.date, &req.start_time)?;
    if start_at <= clock::salon_now(state.utc_offset_minutes) {
        return Err(ApiError::Validation(
            "Booking time must be in the future".into(),
        ));
    }

    let mut conn = db::begin_immediate(&state.db).await?;
    match place_booking(&mut conn, &state, &name, &phone, &req.service_ids, start_at).await {
        Ok(confirmation) => {
            db::commit(&mut conn).await?;
            tracing::info!(
                "online booking {} at {}",
                confirmation.appointment_id,
                start_at
            );
            Ok(Json(ApiResponse::success(confirmation)))
        }
        Err(e) => {
            db::rollback(&mut conn).await;
            Err(e)
        }
    }
}

/// Booking body, run under the write lock so the conflict re-check
/// sees committed state.
async fn place_booking(
    conn: &mut SqliteConnection,
    state: &AppState,
    name: &str,
    phone: &str,
    service_ids: &[i64],
    start_at: NaiveDateTime,
) -> Result<BookingConfirmation, ApiError> {
    let settings = store::settings_get_or_create(&mut *conn).await?;
    if !settings.online_booking_enabled {
        return Err(ApiError::Validation(
            "Online booking is currently disabled".into(),
        ));
    }

    let services = store::services_by_ids(&mut *conn, service_ids).await?;
    if services.len() != service_ids.len() || services.iter().any(|s| !s.is_visible) {
        return Err(ApiError::Validation(
            "Unknown or unavailable service selected".into(),
        ));
    }
    let duration_min = effective_duration(None, &services);
    if duration_min <= 0 {
        return Err(ApiError::Validation(
            "Selected services have no duration".into(),
        ));
    }

    let busy = store::busy_appointments_for_date(&mut *conn, start_at.date()).await?;
    if let Some(conflicting) = conflict::find_conflict(start_at, duration_min, &busy, None) {
        return Err(ApiError::SchedulingConflict(ConflictInfo::from_busy(
            conflicting,
        )));
    }

    // The requested start must also be on the offered grid: inside
    // working hours, on a step boundary and not blocked.
    let schedule = WeekSchedule::from_json(&settings.working_hours);
    let offered = compute_slots(&mut *conn, start_at.date(), duration_min, &schedule).await?;
    let requested = start_at.format("%H:%M").to_string();
    if !offered.contains(&requested) {
        return Err(ApiError::Validation(
            "Requested time is not available".into(),
        ));
    }

    let client_id = match store::client_by_phone(&mut *conn, phone).await? {
        Some(client) => client.id,
        None => store::insert_client(&mut *conn, name, phone, None, None).await?,
    };

    let appointment_id = store::insert_appointment(
        &mut *conn,
        &NewAppointment {
            client_id,
            user_id: state.owner_user_id,
            start_at,
            duration_min: None,
            status: STATUS_PENDING.to_string(),
            notes: None,
        },
    )
    .await?;
    store::insert_appointment_services(&mut *conn, appointment_id, &services).await?;

    Ok(BookingConfirmation {
        appointment_id,
        start_at,
        duration_min,
        status: STATUS_PENDING.to_string(),
    })
}
