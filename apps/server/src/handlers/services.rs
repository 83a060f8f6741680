use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::error::{ApiError, AppResult};
use crate::models::{
    decimal_to_cents, ApiResponse, CreateServiceRequest, ServiceDeleteOutcome, ServiceView,
    UpdateServiceRequest,
};
use crate::store;
use crate::{auth, AppState};

/// GET /api/admin/services — full catalogue, hidden services included
pub async fn list_services(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> AppResult<Json<ApiResponse<Vec<ServiceView>>>> {
    let mut conn = state.db.acquire().await?;
    auth::require_staff(&headers, &mut conn).await?;

    let services = store::all_services(&mut conn).await?;
    Ok(Json(ApiResponse::success(
        services.into_iter().map(Into::into).collect(),
    )))
}

/// POST /api/admin/services — add a service to the catalogue
pub async fn create_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateServiceRequest>,
) -> AppResult<Json<ApiResponse<ServiceView>>> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::Validation("Service name is required".into()));
    }
    if req.price < Decimal::ZERO {
        return Err(ApiError::Validation("Price cannot be negative".into()));
    }
    if req.duration_min <= 0 {
        return Err(ApiError::Validation("Duration must be positive".into()));
    }

    let mut conn = state.db.acquire().await?;
    let staff = auth::require_staff(&headers, &mut conn).await?;

    let id = store::insert_service(
        &mut conn,
        name,
        req.description.as_deref().unwrap_or(""),
        decimal_to_cents(req.price),
        req.duration_min,
        req.is_visible.unwrap_or(true),
        req.sort_order.unwrap_or(0),
    )
    .await?;
    let service = store::service_by_id(&mut conn, id)
        .await?
        .ok_or(ApiError::NotFound("Service"))?;
    tracing::info!("service {} ({}) created by {}", id, name, staff.username);
    Ok(Json(ApiResponse::success(service.into())))
}

/// PUT /api/admin/services/:id — partial update
pub async fn update_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(req): Json<UpdateServiceRequest>,
) -> AppResult<Json<ApiResponse<ServiceView>>> {
    if let Some(name) = &req.name {
        if name.trim().is_empty() {
            return Err(ApiError::Validation("Service name cannot be empty".into()));
        }
    }
    if let Some(price) = req.price {
        if price < Decimal::ZERO {
            return Err(ApiError::Validation("Price cannot be negative".into()));
        }
    }
    if let Some(d) = req.duration_min {
        if d <= 0 {
            return Err(ApiError::Validation("Duration must be positive".into()));
        }
    }

    let mut conn = state.db.acquire().await?;
    auth::require_staff(&headers, &mut conn).await?;

    store::service_by_id(&mut conn, id)
        .await?
        .ok_or(ApiError::NotFound("Service"))?;
    store::update_service(&mut conn, id, &req).await?;
    let service = store::service_by_id(&mut conn, id)
        .await?
        .ok_or(ApiError::NotFound("Service"))?;
    Ok(Json(ApiResponse::success(service.into())))
}

/// DELETE /api/admin/services/:id — delete, or hide when the service
/// appears in booking history
pub async fn delete_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<ServiceDeleteOutcome>>> {
    let mut conn = state.db.acquire().await?;
    let staff = auth::require_staff(&headers, &mut conn).await?;

    store::service_by_id(&mut conn, id)
        .await?
        .ok_or(ApiError::NotFound("Service"))?;

    let outcome = if store::service_has_history(&mut conn, id).await? {
        store::hide_service(&mut conn, id).await?;
        ServiceDeleteOutcome {
            deleted: false,
            hidden: true,
        }
    } else {
        store::delete_service(&mut conn, id).await?;
        ServiceDeleteOutcome {
            deleted: true,
            hidden: false,
        }
    };
    tracing::info!(
        "service {} {} by {}",
        id,
        if outcome.deleted { "deleted" } else { "hidden" },
        staff.username
    );
    Ok(Json(ApiResponse::success(outcome)))
}
