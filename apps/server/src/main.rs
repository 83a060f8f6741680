mod auth;
mod clock;
mod db;
mod error;
mod handlers;
mod models;
mod rate_limit;
mod reminders;
mod scheduling;
mod store;

use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use rate_limit::{
    rate_limit_booking, rate_limit_public, rate_limit_staff, RateLimiter, TIER_BOOKING,
    TIER_PUBLIC, TIER_STAFF,
};

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub db: sqlx::SqlitePool,
    /// Owner account that online bookings are attached to.
    pub owner_user_id: i64,
    /// Salon-local offset from UTC, in minutes.
    pub utc_offset_minutes: i64,
    pub started_at: Instant,
}

/// Reminder sweep interval (seconds).
const REMINDER_SWEEP_INTERVAL_SECS: u64 = 3600;
/// Rate limit cleanup interval (seconds).
const RATE_LIMIT_CLEANUP_SECS: u64 = 300;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // ── Env vars ──
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:velvet.db?mode=rwc".into());
    let admin_token = std::env::var("ADMIN_API_TOKEN").expect("ADMIN_API_TOKEN must be set");
    let utc_offset_minutes: i64 = std::env::var("SALON_UTC_OFFSET_MINUTES")
        .unwrap_or_else(|_| "0".into())
        .parse()
        .expect("SALON_UTC_OFFSET_MINUTES must be a number");
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".into());
    let cors_origin = std::env::var("CORS_ORIGIN").ok();

    // ── Tracing ──
    let env_filter = EnvFilter::from_default_env().add_directive("info".parse()?);
    let fmt_layer = tracing_subscriber::fmt::layer();
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    // ── Database ──
    let pool = db::connect(&database_url).await?;
    db::run_migrations(&pool).await?;
    let owner_user_id = db::seed_owner(&pool, &admin_token).await?;

    let state = Arc::new(AppState {
        db: pool,
        owner_user_id,
        utc_offset_minutes,
        started_at: Instant::now(),
    });

    // ── Background task: flag appointments due for a reminder ──
    let reminder_db = state.db.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(
            REMINDER_SWEEP_INTERVAL_SECS,
        ));
        loop {
            interval.tick().await;
            reminders::send_due_reminders(&reminder_db, utc_offset_minutes).await;
        }
    });

    // ── Rate limiter ──
    let rate_limiter = RateLimiter::new();
    rate_limiter.add_tier(TIER_PUBLIC, 60, Duration::from_secs(60));
    rate_limiter.add_tier(TIER_BOOKING, 5, Duration::from_secs(300));
    rate_limiter.add_tier(TIER_STAFF, 120, Duration::from_secs(60));

    // ── Background task: cleanup stale rate limit entries ──
    let cleanup_limiter = rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(tokio::time::Duration::from_secs(RATE_LIMIT_CLEANUP_SECS));
        loop {
            interval.tick().await;
            cleanup_limiter.cleanup();
        }
    });

    // ── CORS: whitelist CORS_ORIGIN when configured, otherwise allow any ──
    let cors = match cors_origin {
        Some(origin) => {
            let origins: Vec<axum::http::HeaderValue> =
                vec![origin.parse().expect("CORS_ORIGIN must be a valid origin")];
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        }
        None => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    };

    // ── Router (4 groups with per-group rate limits) ──

    // 1. No-limit: health checks
    let no_limit_routes = Router::new().route("/api/health", get(handlers::health::health));

    // 2. Public: read-only endpoints (no auth, 60 req/min)
    let public_routes = Router::new()
        .route("/api/services", get(handlers::public::list_services))
        .route("/api/slots", get(handlers::public::list_slots))
        .layer(from_fn_with_state(rate_limiter.clone(), rate_limit_public));

    // 3. Booking creation: strictest limit (5 req/5 min)
    let booking_routes = Router::new()
        .route("/api/bookings", post(handlers::public::create_booking))
        .layer(from_fn_with_state(rate_limiter.clone(), rate_limit_booking));

    // 4. Staff: all admin endpoints (token auth, 120 req/min)
    let staff_routes = Router::new()
        .route(
            "/api/admin/appointments",
            get(handlers::appointments::list_appointments),
        )
        .route(
            "/api/admin/appointments",
            post(handlers::appointments::create_appointment),
        )
        .route(
            "/api/admin/appointments/{id}",
            put(handlers::appointments::update_appointment),
        )
        .route(
            "/api/admin/appointments/{id}/cancel",
            post(handlers::appointments::cancel_appointment),
        )
        .route("/api/admin/slots", get(handlers::appointments::list_slots))
        .route("/api/admin/blocks", get(handlers::blocks::list_blocks))
        .route("/api/admin/blocks", post(handlers::blocks::create_block))
        .route(
            "/api/admin/blocks/{id}",
            delete(handlers::blocks::delete_block),
        )
        .route("/api/admin/services", get(handlers::services::list_services))
        .route(
            "/api/admin/services",
            post(handlers::services::create_service),
        )
        .route(
            "/api/admin/services/{id}",
            put(handlers::services::update_service),
        )
        .route(
            "/api/admin/services/{id}",
            delete(handlers::services::delete_service),
        )
        .route("/api/admin/clients", get(handlers::clients::list_clients))
        .route("/api/admin/clients", post(handlers::clients::create_client))
        .route("/api/admin/clients/{id}", get(handlers::clients::get_client))
        .route(
            "/api/admin/clients/{id}",
            put(handlers::clients::update_client),
        )
        .route("/api/admin/settings", get(handlers::settings::get_settings))
        .route(
            "/api/admin/settings",
            put(handlers::settings::update_settings),
        )
        .layer(from_fn_with_state(rate_limiter.clone(), rate_limit_staff));

    let app = Router::new()
        .merge(no_limit_routes)
        .merge(public_routes)
        .merge(booking_routes)
        .merge(staff_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let addr = format!("{}:{}", host, port);
    tracing::info!("Velvet Lane server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
