//! Hourly sweep that flags appointments due for a reminder.
//!
//! The sweep only marks rows and logs; actual delivery (SMS, email)
//! is handled outside this service. `reminder_sent` is flipped with a
//! guarded UPDATE so concurrent sweeps never log the same appointment
//! twice.

use chrono::Duration;

use crate::clock;
use crate::models::STATUS_CONFIRMED;

/// Mark confirmed appointments starting tomorrow (salon-local) as reminded.
pub async fn send_due_reminders(db: &sqlx::SqlitePool, utc_offset_minutes: i64) {
    let today = clock::salon_today(utc_offset_minutes);
    let window_start = format!("{} 00:00:00", today + Duration::days(1));
    let window_end = format!("{} 00:00:00", today + Duration::days(2));

    let due: Vec<(i64, String, String)> = sqlx::query_as(
        "SELECT a.id, c.name, a.start_at
         FROM appointments a
         JOIN clients c ON c.id = a.client_id
         WHERE a.status = ? AND a.reminder_sent = 0
           AND a.start_at >= ? AND a.start_at < ?
         ORDER BY a.start_at",
    )
    .bind(STATUS_CONFIRMED)
    .bind(&window_start)
    .bind(&window_end)
    .fetch_all(db)
    .await
    .unwrap_or_default();

    for (id, client_name, start_at) in due {
        let marked = sqlx::query(
            "UPDATE appointments SET reminder_sent = 1 WHERE id = ? AND reminder_sent = 0",
        )
        .bind(id)
        .execute(db)
        .await;

        match marked {
            Ok(res) if res.rows_affected() > 0 => {
                tracing::info!(
                    "Reminder due: appointment {} for {} at {}",
                    id,
                    client_name,
                    start_at
                );
            }
            Ok(_) => {} // another sweep got there first
            Err(e) => {
                tracing::error!("Failed to mark reminder for appointment {}: {}", id, e);
            }
        }
    }
}
