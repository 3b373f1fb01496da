use std::collections::{HashMap, HashSet};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::PgPool;
use uuid::Uuid;

use crate::dto::admin_dto::AppointmentListQuery;
use crate::error::{Error, Result};
use crate::models::appointment::{
    Appointment, APPOINTMENT_STATUS_CANCELLED, APPOINTMENT_STATUS_COMPLETED,
    APPOINTMENT_STATUS_SCHEDULED,
};
use crate::utils::time::is_weekend;

const APPOINTMENT_COLUMNS: &str = "id, application_id, applicant_name, applicant_email, scheduled_on, slot_time, status, notes, created_at, updated_at";

/// Why a catalog slot cannot be booked right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotBlock {
    Booked,
    Past,
}

impl SlotBlock {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotBlock::Booked => "booked",
            SlotBlock::Past => "past",
        }
    }
}

/// Interviews are offered at half-hour starts from 09:00 through 17:00
/// inclusive, the same 17 slots every business day.
pub fn slot_catalog() -> Vec<NaiveTime> {
    let mut slots = Vec::with_capacity(17);
    let mut minutes = 9 * 60;
    while minutes <= 17 * 60 {
        slots.push(
            NaiveTime::from_hms_opt(minutes / 60, minutes % 60, 0)
                .expect("catalog times are valid"),
        );
        minutes += 30;
    }
    slots
}

/// Marks each catalog slot against the taken set for the day and, when the
/// requested date is today, against the wall clock. Booked wins over past
/// when both apply. Read-only; exclusivity is enforced at insert time, not
/// here.
pub fn availability(
    date: NaiveDate,
    taken: &HashSet<NaiveTime>,
    now: NaiveDateTime,
) -> Vec<(NaiveTime, Option<SlotBlock>)> {
    slot_catalog()
        .into_iter()
        .map(|slot| {
            let block = if taken.contains(&slot) {
                Some(SlotBlock::Booked)
            } else if date == now.date() && slot <= now.time() {
                Some(SlotBlock::Past)
            } else {
                None
            };
            (slot, block)
        })
        .collect()
}

/// Weekends and past dates are not bookable; the calendar disables them
/// client-side but the server re-checks.
pub fn ensure_bookable_date(date: NaiveDate, today: NaiveDate) -> Result<()> {
    if date < today {
        return Err(Error::BadRequest("Cannot book a date in the past".into()));
    }
    if is_weekend(date) {
        return Err(Error::BadRequest(
            "Appointments are only offered on business days".into(),
        ));
    }
    Ok(())
}

#[derive(Clone)]
pub struct BookingService {
    pool: PgPool,
}

pub struct AppointmentList {
    pub items: Vec<Appointment>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl BookingService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Slot times already held for a date. Cancelled appointments release
    /// their slot and are excluded.
    pub async fn taken_slots(&self, date: NaiveDate) -> Result<HashSet<NaiveTime>> {
        let times = sqlx::query_scalar::<_, NaiveTime>(
            "SELECT slot_time FROM appointments WHERE scheduled_on = $1 AND status <> $2",
        )
        .bind(date)
        .bind(APPOINTMENT_STATUS_CANCELLED)
        .fetch_all(&self.pool)
        .await?;
        Ok(times.into_iter().collect())
    }

    /// Creates the appointment row. Slot exclusivity rests on the partial
    /// unique index over (scheduled_on, slot_time) for non-cancelled rows;
    /// losing the race surfaces as `Error::SlotTaken` rather than a generic
    /// database failure.
    pub async fn book_slot(
        &self,
        application_id: Uuid,
        applicant_name: &str,
        applicant_email: &str,
        date: NaiveDate,
        slot: NaiveTime,
    ) -> Result<Appointment> {
        let insert = sqlx::query_as::<_, Appointment>(&format!(
            "INSERT INTO appointments (application_id, applicant_name, applicant_email, scheduled_on, slot_time, status)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {}",
            APPOINTMENT_COLUMNS
        ))
        .bind(application_id)
        .bind(applicant_name)
        .bind(applicant_email)
        .bind(date)
        .bind(slot)
        .bind(APPOINTMENT_STATUS_SCHEDULED)
        .fetch_one(&self.pool)
        .await;

        match insert {
            Ok(appointment) => Ok(appointment),
            Err(err) => {
                if let sqlx::Error::Database(db) = &err {
                    if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation) {
                        if db.constraint() == Some("appointments_slot_taken_idx") {
                            return Err(Error::SlotTaken {
                                scheduled_on: date,
                                slot_time: slot,
                            });
                        }
                        if db.constraint() == Some("appointments_application_active_idx") {
                            return Err(Error::Conflict(
                                "An appointment is already booked for this application".into(),
                            ));
                        }
                    }
                }
                Err(err.into())
            }
        }
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Appointment> {
        let appointment = sqlx::query_as::<_, Appointment>(&format!(
            "SELECT {} FROM appointments WHERE id = $1",
            APPOINTMENT_COLUMNS
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(appointment)
    }

    /// The live (scheduled or completed) appointment for an application, if
    /// one exists. Used by the booking page to show an existing booking
    /// instead of the slot picker.
    pub async fn get_active_for_application(
        &self,
        application_id: Uuid,
    ) -> Result<Option<Appointment>> {
        let appointment = sqlx::query_as::<_, Appointment>(&format!(
            "SELECT {} FROM appointments WHERE application_id = $1 AND status <> $2",
            APPOINTMENT_COLUMNS
        ))
        .bind(application_id)
        .bind(APPOINTMENT_STATUS_CANCELLED)
        .fetch_optional(&self.pool)
        .await?;
        Ok(appointment)
    }

    pub async fn complete(&self, id: Uuid) -> Result<Appointment> {
        self.transition(id, APPOINTMENT_STATUS_SCHEDULED, APPOINTMENT_STATUS_COMPLETED)
            .await
    }

    pub async fn cancel(&self, id: Uuid) -> Result<Appointment> {
        self.transition(id, APPOINTMENT_STATUS_SCHEDULED, APPOINTMENT_STATUS_CANCELLED)
            .await
    }

    /// Single-row conditional update. Zero rows means the appointment is
    /// missing or in a different status; the re-fetch distinguishes the two.
    async fn transition(&self, id: Uuid, from: &str, to: &str) -> Result<Appointment> {
        let updated = sqlx::query_as::<_, Appointment>(&format!(
            "UPDATE appointments SET status = $3, updated_at = NOW()
             WHERE id = $1 AND status = $2
             RETURNING {}",
            APPOINTMENT_COLUMNS
        ))
        .bind(id)
        .bind(from)
        .bind(to)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(appointment) => Ok(appointment),
            None => {
                let current = self.get_by_id(id).await?;
                Err(Error::Conflict(format!(
                    "Appointment is {} and cannot move to {}",
                    current.status, to
                )))
            }
        }
    }

    pub async fn update_notes(&self, id: Uuid, notes: Option<String>) -> Result<Appointment> {
        let appointment = sqlx::query_as::<_, Appointment>(&format!(
            "UPDATE appointments SET notes = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            APPOINTMENT_COLUMNS
        ))
        .bind(id)
        .bind(notes)
        .fetch_one(&self.pool)
        .await?;
        Ok(appointment)
    }

    pub async fn list(&self, query: AppointmentListQuery) -> Result<AppointmentList> {
        let page = query.page.unwrap_or(1).max(1);
        let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * per_page;

        let mut filters = Vec::new();
        let mut args: Vec<String> = Vec::new();

        if let Some(status) = query.status {
            filters.push(format!("status = ${}", args.len() + 1));
            args.push(status);
        }
        if let Some(raw) = query.date {
            let parsed = NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|_| {
                Error::BadRequest("Invalid date filter, expected YYYY-MM-DD".into())
            })?;
            filters.push(format!("scheduled_on = ${}::date", args.len() + 1));
            args.push(parsed.to_string());
        }

        let where_clause = if filters.is_empty() {
            "".to_string()
        } else {
            format!("WHERE {}", filters.join(" AND "))
        };

        let items_query = format!(
            "SELECT {} FROM appointments {} ORDER BY scheduled_on ASC, slot_time ASC LIMIT ${} OFFSET ${}",
            APPOINTMENT_COLUMNS,
            where_clause,
            args.len() + 1,
            args.len() + 2
        );
        let total_query = format!("SELECT COUNT(*) FROM appointments {}", where_clause);

        let mut items_statement = sqlx::query_as::<_, Appointment>(&items_query);
        for value in &args {
            items_statement = items_statement.bind(value);
        }
        items_statement = items_statement.bind(per_page).bind(offset);
        let items = items_statement.fetch_all(&self.pool).await?;

        let mut total_statement = sqlx::query_scalar::<_, i64>(&total_query);
        for value in &args {
            total_statement = total_statement.bind(value);
        }
        let total = total_statement.fetch_one(&self.pool).await?;

        let total_pages = ((total as f64) / (per_page as f64)).ceil() as i64;

        Ok(AppointmentList {
            items,
            total,
            page,
            per_page,
            total_pages,
        })
    }

    pub async fn status_counts(&self) -> Result<HashMap<String, i64>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*) FROM appointments GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }

    pub async fn count_for_date(&self, date: NaiveDate) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM appointments WHERE scheduled_on = $1 AND status <> $2",
        )
        .bind(date)
        .bind(APPOINTMENT_STATUS_CANCELLED)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
