use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use std::sync::Arc;

use crate::error::{ApiError, AppResult};
use crate::models::{
    ApiResponse, Client, ClientsQuery, CreateClientRequest, UpdateClientRequest,
};
use crate::store;
use crate::{auth, AppState};

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

fn map_phone_conflict(e: sqlx::Error) -> ApiError {
    if is_unique_violation(&e) {
        ApiError::Validation("A client with this phone already exists".into())
    } else {
        ApiError::Database(e)
    }
}

/// GET /api/admin/clients?search= — client base, name or phone match
pub async fn list_clients(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ClientsQuery>,
) -> AppResult<Json<ApiResponse<Vec<Client>>>> {
    let mut conn = state.db.acquire().await?;
    auth::require_staff(&headers, &mut conn).await?;

    let clients = store::list_clients(&mut conn, query.search.as_deref()).await?;
    Ok(Json(ApiResponse::success(clients)))
}

/// GET /api/admin/clients/:id
pub async fn get_client(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<Client>>> {
    let mut conn = state.db.acquire().await?;
    auth::require_staff(&headers, &mut conn).await?;

    let client = store::client_by_id(&mut conn, id)
        .await?
        .ok_or(ApiError::NotFound("Client"))?;
    Ok(Json(ApiResponse::success(client)))
}

/// POST /api/admin/clients — phone is the unique handle
pub async fn create_client(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateClientRequest>,
) -> AppResult<Json<ApiResponse<Client>>> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::Validation("Client name is required".into()));
    }
    let phone = req.phone.trim();
    if phone.is_empty() {
        return Err(ApiError::Validation("Client phone is required".into()));
    }

    let mut conn = state.db.acquire().await?;
    auth::require_staff(&headers, &mut conn).await?;

    let id = store::insert_client(
        &mut conn,
        name,
        phone,
        req.email.as_deref(),
        req.notes.as_deref(),
    )
    .await
    .map_err(map_phone_conflict)?;
    let client = store::client_by_id(&mut conn, id)
        .await?
        .ok_or(ApiError::NotFound("Client"))?;
    Ok(Json(ApiResponse::success(client)))
}

/// PUT /api/admin/clients/:id — partial update
pub async fn update_client(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(req): Json<UpdateClientRequest>,
) -> AppResult<Json<ApiResponse<Client>>> {
    if let Some(name) = &req.name {
        if name.trim().is_empty() {
            return Err(ApiError::Validation("Client name cannot be empty".into()));
        }
    }
    if let Some(phone) = &req.phone {
        if phone.trim().is_empty() {
            return Err(ApiError::Validation("Client phone cannot be empty".into()));
        }
    }

    let mut conn = state.db.acquire().await?;
    auth::require_staff(&headers, &mut conn).await?;

    store::client_by_id(&mut conn, id)
        .await?
        .ok_or(ApiError::NotFound("Client"))?;
    store::update_client(&mut conn, id, &req)
        .await
        .map_err(map_phone_conflict)?;
    let client = store::client_by_id(&mut conn, id)
        .await?
        .ok_or(ApiError::NotFound("Client"))?;
    Ok(Json(ApiResponse::success(client)))
}
