use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::appointment::Appointment;

/// One entry per catalog slot, in catalog order. `reason` is `booked` or
/// `past` when the slot is unavailable, absent otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotStatus {
    pub time: String,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayAvailabilityResponse {
    pub date: NaiveDate,
    pub slots: Vec<SlotStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AvailabilityQuery {
    pub date: Option<String>,
}

/// What the booking page needs to render: who is booking, and whether an
/// appointment already exists for this application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingContextResponse {
    pub application_id: uuid::Uuid,
    pub name: String,
    pub position_title: String,
    pub appointment: Option<AppointmentResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BookSlotPayload {
    #[validate(length(min = 1))]
    pub date: String,
    #[validate(length(min = 1))]
    pub time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentResponse {
    pub id: uuid::Uuid,
    pub application_id: uuid::Uuid,
    pub applicant_name: String,
    pub applicant_email: String,
    pub scheduled_on: NaiveDate,
    pub slot_time: NaiveTime,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Appointment> for AppointmentResponse {
    fn from(value: Appointment) -> Self {
        Self {
            id: value.id,
            application_id: value.application_id,
            applicant_name: value.applicant_name,
            applicant_email: value.applicant_email,
            scheduled_on: value.scheduled_on,
            slot_time: value.slot_time,
            status: value.status,
            notes: value.notes,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}
