use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const APPOINTMENT_STATUS_SCHEDULED: &str = "scheduled";
pub const APPOINTMENT_STATUS_COMPLETED: &str = "completed";
pub const APPOINTMENT_STATUS_CANCELLED: &str = "cancelled";

/// One booked interview slot. Name and email are snapshotted from the
/// application at booking time so later profile edits do not rewrite
/// the calendar.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Appointment {
    pub id: Uuid,
    pub application_id: Uuid,
    pub applicant_name: String,
    pub applicant_email: String,
    pub scheduled_on: NaiveDate,
    pub slot_time: NaiveTime,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
