use chrono::{Duration, NaiveDate, NaiveDateTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::scheduling::hours::WeekSchedule;

// ── Status and type constants ──

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_CONFIRMED: &str = "confirmed";
pub const STATUS_COMPLETED: &str = "completed";
pub const STATUS_CANCELLED: &str = "cancelled";

pub const APPOINTMENT_STATUSES: [&str; 4] = [
    STATUS_PENDING,
    STATUS_CONFIRMED,
    STATUS_COMPLETED,
    STATUS_CANCELLED,
];

pub const BLOCK_FULL_DAY: &str = "full_day";
pub const BLOCK_PARTIAL: &str = "partial";

pub const PAYMENT_METHODS: [&str; 3] = ["cash", "card", "transfer"];

pub const ROLE_OWNER: &str = "owner";

// ── Money conversion ──
// Columns store integer cents; the API speaks Decimal. Amounts are
// rounded to 2 dp half-away-from-zero before scaling so the
// conversion is exact.

pub fn cents_to_decimal(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

pub fn decimal_to_cents(value: Decimal) -> i64 {
    (value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        * Decimal::ONE_HUNDRED)
        .to_i64()
        .unwrap_or_default()
}

/// Effective appointment length: the stored override when present,
/// otherwise the sum of the attached services. Mirrors the
/// `COALESCE(a.duration_min, SUM(s.duration_min), 0)` used in queries.
pub fn effective_duration(override_min: Option<i64>, services: &[Service]) -> i64 {
    match override_min {
        Some(min) => min,
        None => services.iter().map(|s| s.duration_min).sum(),
    }
}

// ── Database models ──

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Client {
    pub id: i64,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Service {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price_cents: i64,
    pub duration_min: i64,
    pub is_visible: bool,
    pub sort_order: i64,
    pub created_at: String,
}

/// Active-schedule projection of an appointment, joined with the
/// client name and the effective duration. Input to the scheduling
/// module.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BusyAppointment {
    pub id: i64,
    pub client_name: String,
    pub start_at: NaiveDateTime,
    pub duration_min: i64,
    pub status: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AppointmentRow {
    pub id: i64,
    pub client_id: i64,
    pub client_name: String,
    pub client_phone: String,
    pub start_at: NaiveDateTime,
    pub duration_min: i64,
    pub status: String,
    pub service_names: Option<String>,
    pub paid_price_cents: Option<i64>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub cancelled_at: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AppointmentServiceRow {
    pub id: i64,
    pub service_id: i64,
    pub name: String,
    pub price_snapshot_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DayBlock {
    pub id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub block_type: String,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub reason: Option<String>,
    pub created_by: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BusinessSettingsRow {
    pub online_booking_enabled: bool,
    pub working_hours: String,
    pub updated_at: String,
}

// ── API request/response types ──

#[derive(Debug, Serialize)]
pub struct ServiceView {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub duration_min: i64,
    pub is_visible: bool,
    pub sort_order: i64,
    pub created_at: String,
}

impl From<Service> for ServiceView {
    fn from(s: Service) -> Self {
        Self {
            id: s.id,
            name: s.name,
            description: s.description,
            price: cents_to_decimal(s.price_cents),
            duration_min: s.duration_min,
            is_visible: s.is_visible,
            sort_order: s.sort_order,
            created_at: s.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AppointmentView {
    pub id: i64,
    pub client_id: i64,
    pub client_name: String,
    pub client_phone: String,
    pub start_at: NaiveDateTime,
    pub duration_min: i64,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_names: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub cancelled_at: Option<String>,
}

impl From<AppointmentRow> for AppointmentView {
    fn from(row: AppointmentRow) -> Self {
        Self {
            id: row.id,
            client_id: row.client_id,
            client_name: row.client_name,
            client_phone: row.client_phone,
            start_at: row.start_at,
            duration_min: row.duration_min,
            status: row.status,
            service_names: row.service_names,
            paid_price: row.paid_price_cents.map(cents_to_decimal),
            payment_method: row.payment_method,
            notes: row.notes,
            created_at: row.created_at,
            cancelled_at: row.cancelled_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AppointmentServiceView {
    pub service_id: i64,
    pub name: String,
    pub price_snapshot: Decimal,
}

impl From<AppointmentServiceRow> for AppointmentServiceView {
    fn from(row: AppointmentServiceRow) -> Self {
        Self {
            service_id: row.service_id,
            name: row.name,
            price_snapshot: cents_to_decimal(row.price_snapshot_cents),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AppointmentDetail {
    pub appointment: AppointmentView,
    pub services: Vec<AppointmentServiceView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConflictInfo {
    pub conflicting_appointment_id: i64,
    pub conflicting_client_name: String,
    pub conflicting_time: String,
}

impl ConflictInfo {
    pub fn from_busy(appt: &BusyAppointment) -> Self {
        let end = appt.start_at + Duration::minutes(appt.duration_min);
        Self {
            conflicting_appointment_id: appt.id,
            conflicting_client_name: appt.client_name.clone(),
            conflicting_time: format!(
                "{} to {}",
                appt.start_at.format("%Y-%m-%d %H:%M"),
                end.format("%H:%M")
            ),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BookingRequest {
    pub client_name: String,
    pub client_phone: String,
    pub date: String,
    pub start_time: String,
    pub service_ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct BookingConfirmation {
    pub appointment_id: i64,
    pub start_at: NaiveDateTime,
    pub duration_min: i64,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    pub date: String,
    pub service_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct StaffSlotsQuery {
    pub date: String,
    pub service_id: Option<i64>,
    pub duration_min: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AppointmentsQuery {
    pub date: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateAppointmentRequest {
    pub client_id: i64,
    pub date: String,
    pub start_time: String,
    #[serde(default)]
    pub service_ids: Vec<i64>,
    pub duration_min: Option<i64>,
    pub status: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub client_id: Option<i64>,
    pub date: Option<String>,
    pub start_time: Option<String>,
    pub duration_min: Option<i64>,
    pub status: Option<String>,
    pub notes: Option<String>,
    pub paid_price: Option<Decimal>,
    pub payment_method: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BlocksQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBlockRequest {
    pub start_date: String,
    pub end_date: Option<String>,
    pub block_type: String,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub reason: Option<String>,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
pub struct BlockCreateResponse {
    pub block: Option<DayBlock>,
    pub warnings: Vec<ConflictInfo>,
}

#[derive(Debug, Deserialize)]
pub struct CreateServiceRequest {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub duration_min: i64,
    pub is_visible: Option<bool>,
    pub sort_order: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateServiceRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub duration_min: Option<i64>,
    pub is_visible: Option<bool>,
    pub sort_order: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ServiceDeleteOutcome {
    pub deleted: bool,
    pub hidden: bool,
}

#[derive(Debug, Deserialize)]
pub struct ClientsQuery {
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateClientRequest {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateClientRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BusinessSettingsView {
    pub online_booking_enabled: bool,
    pub working_hours: WeekSchedule,
    pub updated_at: String,
}

impl From<BusinessSettingsRow> for BusinessSettingsView {
    fn from(row: BusinessSettingsRow) -> Self {
        Self {
            online_booking_enabled: row.online_booking_enabled,
            working_hours: WeekSchedule::from_json(&row.working_hours),
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    pub online_booking_enabled: Option<bool>,
    pub working_hours: Option<WeekSchedule>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub ok: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn service(duration_min: i64) -> Service {
        Service {
            id: 1,
            name: "Classic manicure".into(),
            description: String::new(),
            price_cents: 4000,
            duration_min,
            is_visible: true,
            sort_order: 0,
            created_at: String::new(),
        }
    }

    #[test]
    fn test_cents_to_decimal_scales_by_hundred() {
        assert_eq!(cents_to_decimal(4050), d("40.50"));
        assert_eq!(cents_to_decimal(0), d("0"));
        assert_eq!(cents_to_decimal(5), d("0.05"));
    }

    #[test]
    fn test_decimal_to_cents_exact_amounts() {
        assert_eq!(decimal_to_cents(d("40.50")), 4050);
        assert_eq!(decimal_to_cents(d("90")), 9000);
    }

    #[test]
    fn test_decimal_to_cents_rounds_half_away_from_zero() {
        assert_eq!(decimal_to_cents(d("40.505")), 4051);
        assert_eq!(decimal_to_cents(d("40.504")), 4050);
        assert_eq!(decimal_to_cents(d("-1.005")), -101);
    }

    #[test]
    fn test_service_view_carries_price_and_created_at() {
        let mut s = service(30);
        s.created_at = "2026-01-05 09:00:00".into();
        let view = ServiceView::from(s);
        assert_eq!(view.price, d("40.00"));
        assert_eq!(view.created_at, "2026-01-05 09:00:00");
    }

    #[test]
    fn test_effective_duration_prefers_override() {
        let services = vec![service(30), service(60)];
        assert_eq!(effective_duration(Some(45), &services), 45);
    }

    #[test]
    fn test_effective_duration_sums_services() {
        let services = vec![service(30), service(60)];
        assert_eq!(effective_duration(None, &services), 90);
    }

    #[test]
    fn test_effective_duration_without_anything_is_zero() {
        assert_eq!(effective_duration(None, &[]), 0);
    }

    #[test]
    fn test_conflict_info_formats_interval() {
        let busy = BusyAppointment {
            id: 7,
            client_name: "Dana".into(),
            start_at: NaiveDateTime::parse_from_str("2026-03-02 10:00", "%Y-%m-%d %H:%M")
                .unwrap(),
            duration_min: 30,
            status: STATUS_CONFIRMED.into(),
        };
        let info = ConflictInfo::from_busy(&busy);
        assert_eq!(info.conflicting_appointment_id, 7);
        assert_eq!(info.conflicting_client_name, "Dana");
        assert_eq!(info.conflicting_time, "2026-03-02 10:00 to 10:30");
    }
}
