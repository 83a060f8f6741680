use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::SqliteConnection;

use crate::models::{
    decimal_to_cents, AppointmentDetail, AppointmentRow, AppointmentServiceRow,
    BusinessSettingsRow, BusyAppointment, Client, CreateBlockRequest, DayBlock, Service,
    UpdateClientRequest, UpdateServiceRequest, STATUS_CANCELLED,
};
use crate::scheduling::hours::WeekSchedule;

// Datetimes are bound as "YYYY-MM-DD HH:MM:SS" TEXT so that string
// comparison in SQL matches chronological order.

fn dt_param(dt: NaiveDateTime) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn date_param(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn day_window(date: NaiveDate) -> (String, String) {
    let start = date.and_time(NaiveTime::MIN);
    let end = (date + Duration::days(1)).and_time(NaiveTime::MIN);
    (dt_param(start), dt_param(end))
}

const APPOINTMENT_SELECT: &str = "SELECT a.id, a.client_id, c.name AS client_name, \
     c.phone AS client_phone, a.start_at, \
     COALESCE(a.duration_min, SUM(s.duration_min), 0) AS duration_min, a.status, \
     GROUP_CONCAT(s.name, ', ') AS service_names, a.paid_price_cents, a.payment_method, \
     a.notes, a.created_at, a.cancelled_at \
     FROM appointments a \
     JOIN clients c ON c.id = a.client_id \
     LEFT JOIN appointment_services aps ON aps.appointment_id = a.id \
     LEFT JOIN services s ON s.id = aps.service_id";

const BUSY_SELECT: &str = "SELECT a.id, c.name AS client_name, a.start_at, \
     COALESCE(a.duration_min, SUM(s.duration_min), 0) AS duration_min, a.status \
     FROM appointments a \
     JOIN clients c ON c.id = a.client_id \
     LEFT JOIN appointment_services aps ON aps.appointment_id = a.id \
     LEFT JOIN services s ON s.id = aps.service_id";

// ── Services ──

pub async fn visible_services(conn: &mut SqliteConnection) -> Result<Vec<Service>, sqlx::Error> {
    sqlx::query_as::<_, Service>(
        "SELECT * FROM services WHERE is_visible = 1 ORDER BY sort_order, id",
    )
    .fetch_all(&mut *conn)
    .await
}

pub async fn all_services(conn: &mut SqliteConnection) -> Result<Vec<Service>, sqlx::Error> {
    sqlx::query_as::<_, Service>("SELECT * FROM services ORDER BY sort_order, id")
        .fetch_all(&mut *conn)
        .await
}

pub async fn service_by_id(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<Service>, sqlx::Error> {
    sqlx::query_as::<_, Service>("SELECT * FROM services WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn visible_service_by_id(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<Service>, sqlx::Error> {
    sqlx::query_as::<_, Service>("SELECT * FROM services WHERE id = ? AND is_visible = 1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn services_by_ids(
    conn: &mut SqliteConnection,
    ids: &[i64],
) -> Result<Vec<Service>, sqlx::Error> {
    // IN () is not valid SQL
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!(
        "SELECT * FROM services WHERE id IN ({}) ORDER BY id",
        placeholders
    );
    let mut query = sqlx::query_as::<_, Service>(&sql);
    for id in ids {
        query = query.bind(id);
    }
    query.fetch_all(&mut *conn).await
}

pub async fn insert_service(
    conn: &mut SqliteConnection,
    name: &str,
    description: &str,
    price_cents: i64,
    duration_min: i64,
    is_visible: bool,
    sort_order: i64,
) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO services (name, description, price_cents, duration_min, is_visible, sort_order) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(name)
    .bind(description)
    .bind(price_cents)
    .bind(duration_min)
    .bind(is_visible)
    .bind(sort_order)
    .execute(&mut *conn)
    .await?;
    Ok(result.last_insert_rowid())
}

pub async fn update_service(
    conn: &mut SqliteConnection,
    id: i64,
    req: &UpdateServiceRequest,
) -> Result<(), sqlx::Error> {
    if let Some(name) = &req.name {
        sqlx::query("UPDATE services SET name = ? WHERE id = ?")
            .bind(name)
            .bind(id)
            .execute(&mut *conn)
            .await?;
    }
    if let Some(description) = &req.description {
        sqlx::query("UPDATE services SET description = ? WHERE id = ?")
            .bind(description)
            .bind(id)
            .execute(&mut *conn)
            .await?;
    }
    if let Some(price) = req.price {
        sqlx::query("UPDATE services SET price_cents = ? WHERE id = ?")
            .bind(decimal_to_cents(price))
            .bind(id)
            .execute(&mut *conn)
            .await?;
    }
    if let Some(duration_min) = req.duration_min {
        sqlx::query("UPDATE services SET duration_min = ? WHERE id = ?")
            .bind(duration_min)
            .bind(id)
            .execute(&mut *conn)
            .await?;
    }
    if let Some(is_visible) = req.is_visible {
        sqlx::query("UPDATE services SET is_visible = ? WHERE id = ?")
            .bind(is_visible)
            .bind(id)
            .execute(&mut *conn)
            .await?;
    }
    if let Some(sort_order) = req.sort_order {
        sqlx::query("UPDATE services SET sort_order = ? WHERE id = ?")
            .bind(sort_order)
            .bind(id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

pub async fn service_has_history(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) > 0 FROM appointment_services WHERE service_id = ?")
        .bind(id)
        .fetch_one(&mut *conn)
        .await
}

pub async fn delete_service(conn: &mut SqliteConnection, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM services WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn hide_service(conn: &mut SqliteConnection, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE services SET is_visible = 0 WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// ── Clients ──

pub async fn client_by_id(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<Client>, sqlx::Error> {
    sqlx::query_as::<_, Client>("SELECT * FROM clients WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn client_by_phone(
    conn: &mut SqliteConnection,
    phone: &str,
) -> Result<Option<Client>, sqlx::Error> {
    sqlx::query_as::<_, Client>("SELECT * FROM clients WHERE phone = ?")
        .bind(phone)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn list_clients(
    conn: &mut SqliteConnection,
    search: Option<&str>,
) -> Result<Vec<Client>, sqlx::Error> {
    match search.map(str::trim).filter(|s| !s.is_empty()) {
        Some(term) => {
            let pattern = format!("%{}%", term);
            sqlx::query_as::<_, Client>(
                "SELECT * FROM clients WHERE name LIKE ? OR phone LIKE ? ORDER BY name",
            )
            .bind(&pattern)
            .bind(&pattern)
            .fetch_all(&mut *conn)
            .await
        }
        None => {
            sqlx::query_as::<_, Client>("SELECT * FROM clients ORDER BY name")
                .fetch_all(&mut *conn)
                .await
        }
    }
}

pub async fn insert_client(
    conn: &mut SqliteConnection,
    name: &str,
    phone: &str,
    email: Option<&str>,
    notes: Option<&str>,
) -> Result<i64, sqlx::Error> {
    let result =
        sqlx::query("INSERT INTO clients (name, phone, email, notes) VALUES (?, ?, ?, ?)")
            .bind(name)
            .bind(phone)
            .bind(email)
            .bind(notes)
            .execute(&mut *conn)
            .await?;
    Ok(result.last_insert_rowid())
}

pub async fn update_client(
    conn: &mut SqliteConnection,
    id: i64,
    req: &UpdateClientRequest,
) -> Result<(), sqlx::Error> {
    if let Some(name) = &req.name {
        sqlx::query("UPDATE clients SET name = ? WHERE id = ?")
            .bind(name)
            .bind(id)
            .execute(&mut *conn)
            .await?;
    }
    if let Some(phone) = &req.phone {
        sqlx::query("UPDATE clients SET phone = ? WHERE id = ?")
            .bind(phone)
            .bind(id)
            .execute(&mut *conn)
            .await?;
    }
    if let Some(email) = &req.email {
        sqlx::query("UPDATE clients SET email = ? WHERE id = ?")
            .bind(email)
            .bind(id)
            .execute(&mut *conn)
            .await?;
    }
    if let Some(notes) = &req.notes {
        sqlx::query("UPDATE clients SET notes = ? WHERE id = ?")
            .bind(notes)
            .bind(id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

// ── Appointments ──

#[derive(Debug)]
pub struct NewAppointment {
    pub client_id: i64,
    pub user_id: i64,
    pub start_at: NaiveDateTime,
    pub duration_min: Option<i64>,
    pub status: String,
    pub notes: Option<String>,
}

/// Active appointments whose start falls on `date`, start ascending.
pub async fn busy_appointments_for_date(
    conn: &mut SqliteConnection,
    date: NaiveDate,
) -> Result<Vec<BusyAppointment>, sqlx::Error> {
    let (from, to) = day_window(date);
    let sql = format!(
        "{} WHERE a.status != ? AND a.start_at >= ? AND a.start_at < ? \
         GROUP BY a.id ORDER BY a.start_at",
        BUSY_SELECT
    );
    sqlx::query_as::<_, BusyAppointment>(&sql)
        .bind(STATUS_CANCELLED)
        .bind(&from)
        .bind(&to)
        .fetch_all(&mut *conn)
        .await
}

/// Active appointments across an inclusive date range, start ascending.
pub async fn busy_appointments_between(
    conn: &mut SqliteConnection,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<BusyAppointment>, sqlx::Error> {
    let start = dt_param(from.and_time(NaiveTime::MIN));
    let end = dt_param((to + Duration::days(1)).and_time(NaiveTime::MIN));
    let sql = format!(
        "{} WHERE a.status != ? AND a.start_at >= ? AND a.start_at < ? \
         GROUP BY a.id ORDER BY a.start_at",
        BUSY_SELECT
    );
    sqlx::query_as::<_, BusyAppointment>(&sql)
        .bind(STATUS_CANCELLED)
        .bind(&start)
        .bind(&end)
        .fetch_all(&mut *conn)
        .await
}

pub async fn appointments_between(
    conn: &mut SqliteConnection,
    from: NaiveDateTime,
    to: NaiveDateTime,
) -> Result<Vec<AppointmentRow>, sqlx::Error> {
    let sql = format!(
        "{} WHERE a.start_at >= ? AND a.start_at < ? GROUP BY a.id ORDER BY a.start_at",
        APPOINTMENT_SELECT
    );
    sqlx::query_as::<_, AppointmentRow>(&sql)
        .bind(dt_param(from))
        .bind(dt_param(to))
        .fetch_all(&mut *conn)
        .await
}

pub async fn appointments_from(
    conn: &mut SqliteConnection,
    from: NaiveDateTime,
) -> Result<Vec<AppointmentRow>, sqlx::Error> {
    let sql = format!(
        "{} WHERE a.start_at >= ? GROUP BY a.id ORDER BY a.start_at",
        APPOINTMENT_SELECT
    );
    sqlx::query_as::<_, AppointmentRow>(&sql)
        .bind(dt_param(from))
        .fetch_all(&mut *conn)
        .await
}

pub async fn appointment_row(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<AppointmentRow>, sqlx::Error> {
    let sql = format!("{} WHERE a.id = ? GROUP BY a.id", APPOINTMENT_SELECT);
    sqlx::query_as::<_, AppointmentRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

/// The raw `duration_min` column, as opposed to the COALESCEd
/// effective duration the row queries report.
pub async fn appointment_duration_override(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<i64>, sqlx::Error> {
    sqlx::query_scalar::<_, Option<i64>>("SELECT duration_min FROM appointments WHERE id = ?")
        .bind(id)
        .fetch_one(&mut *conn)
        .await
}

pub async fn appointment_detail(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<AppointmentDetail>, sqlx::Error> {
    let row = match appointment_row(&mut *conn, id).await? {
        Some(row) => row,
        None => return Ok(None),
    };
    let services = appointment_service_rows(&mut *conn, id).await?;
    Ok(Some(AppointmentDetail {
        appointment: row.into(),
        services: services.into_iter().map(Into::into).collect(),
    }))
}

pub async fn insert_appointment(
    conn: &mut SqliteConnection,
    appt: &NewAppointment,
) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO appointments (client_id, user_id, start_at, duration_min, status, notes) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(appt.client_id)
    .bind(appt.user_id)
    .bind(dt_param(appt.start_at))
    .bind(appt.duration_min)
    .bind(&appt.status)
    .bind(&appt.notes)
    .execute(&mut *conn)
    .await?;
    Ok(result.last_insert_rowid())
}

/// Snapshot the current service prices onto the appointment.
pub async fn insert_appointment_services(
    conn: &mut SqliteConnection,
    appointment_id: i64,
    services: &[Service],
) -> Result<(), sqlx::Error> {
    for service in services {
        sqlx::query(
            "INSERT INTO appointment_services (appointment_id, service_id, price_snapshot_cents) \
             VALUES (?, ?, ?)",
        )
        .bind(appointment_id)
        .bind(service.id)
        .bind(service.price_cents)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

pub async fn update_appointment_core(
    conn: &mut SqliteConnection,
    id: i64,
    client_id: i64,
    start_at: NaiveDateTime,
    duration_min: Option<i64>,
    status: &str,
    notes: Option<&str>,
    cancelled_at: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE appointments SET client_id = ?, start_at = ?, duration_min = ?, status = ?, \
         notes = ?, cancelled_at = ? WHERE id = ?",
    )
    .bind(client_id)
    .bind(dt_param(start_at))
    .bind(duration_min)
    .bind(status)
    .bind(notes)
    .bind(cancelled_at)
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn cancel_appointment(
    conn: &mut SqliteConnection,
    id: i64,
    now: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE appointments SET status = ?, cancelled_at = COALESCE(cancelled_at, ?) \
         WHERE id = ?",
    )
    .bind(STATUS_CANCELLED)
    .bind(now)
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Join rows in insertion order, the order payment distribution uses.
pub async fn appointment_service_rows(
    conn: &mut SqliteConnection,
    appointment_id: i64,
) -> Result<Vec<AppointmentServiceRow>, sqlx::Error> {
    sqlx::query_as::<_, AppointmentServiceRow>(
        "SELECT aps.id, aps.service_id, s.name, aps.price_snapshot_cents \
         FROM appointment_services aps \
         JOIN services s ON s.id = aps.service_id \
         WHERE aps.appointment_id = ? ORDER BY aps.id",
    )
    .bind(appointment_id)
    .fetch_all(&mut *conn)
    .await
}

pub async fn set_snapshot_cents(
    conn: &mut SqliteConnection,
    row_id: i64,
    cents: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE appointment_services SET price_snapshot_cents = ? WHERE id = ?")
        .bind(cents)
        .bind(row_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn set_appointment_payment(
    conn: &mut SqliteConnection,
    id: i64,
    paid_price_cents: i64,
    payment_method: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE appointments SET paid_price_cents = ?, payment_method = ? WHERE id = ?")
        .bind(paid_price_cents)
        .bind(payment_method)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// ── Day blocks ──

pub async fn blocks_all(conn: &mut SqliteConnection) -> Result<Vec<DayBlock>, sqlx::Error> {
    sqlx::query_as::<_, DayBlock>("SELECT * FROM day_blocks ORDER BY start_date, id")
        .fetch_all(&mut *conn)
        .await
}

/// Blocks whose inclusive date range touches `[from, to]`.
pub async fn blocks_between(
    conn: &mut SqliteConnection,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<DayBlock>, sqlx::Error> {
    sqlx::query_as::<_, DayBlock>(
        "SELECT * FROM day_blocks WHERE end_date >= ? AND start_date <= ? \
         ORDER BY start_date, id",
    )
    .bind(date_param(from))
    .bind(date_param(to))
    .fetch_all(&mut *conn)
    .await
}

pub async fn block_by_id(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<DayBlock>, sqlx::Error> {
    sqlx::query_as::<_, DayBlock>("SELECT * FROM day_blocks WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn insert_block(
    conn: &mut SqliteConnection,
    req: &CreateBlockRequest,
    start_date: NaiveDate,
    end_date: NaiveDate,
    created_by: i64,
) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO day_blocks (start_date, end_date, block_type, start_time, end_time, reason, created_by) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(date_param(start_date))
    .bind(date_param(end_date))
    .bind(&req.block_type)
    .bind(req.start_time.as_deref())
    .bind(req.end_time.as_deref())
    .bind(req.reason.as_deref())
    .bind(created_by)
    .execute(&mut *conn)
    .await?;
    Ok(result.last_insert_rowid())
}

pub async fn delete_block(conn: &mut SqliteConnection, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM day_blocks WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// ── Business settings ──

pub async fn settings_get_or_create(
    conn: &mut SqliteConnection,
) -> Result<BusinessSettingsRow, sqlx::Error> {
    let defaults = serde_json::to_string(&WeekSchedule::default()).unwrap_or_default();
    sqlx::query(
        "INSERT OR IGNORE INTO business_settings (id, online_booking_enabled, working_hours) \
         VALUES (1, 1, ?)",
    )
    .bind(&defaults)
    .execute(&mut *conn)
    .await?;
    sqlx::query_as::<_, BusinessSettingsRow>("SELECT * FROM business_settings WHERE id = 1")
        .fetch_one(&mut *conn)
        .await
}

pub async fn save_settings(
    conn: &mut SqliteConnection,
    online_booking_enabled: bool,
    working_hours_json: &str,
    updated_at: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE business_settings SET online_booking_enabled = ?, working_hours = ?, \
         updated_at = ? WHERE id = 1",
    )
    .bind(online_booking_enabled)
    .bind(working_hours_json)
    .bind(updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
