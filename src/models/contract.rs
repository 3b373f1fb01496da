use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const CONTRACT_STATUS_SUBMITTED: &str = "submitted";
pub const CONTRACT_STATUS_APPROVED: &str = "approved";
pub const CONTRACT_STATUS_REJECTED: &str = "rejected";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EmploymentContract {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub legal_name: String,
    pub date_of_birth: NaiveDate,
    pub address: String,
    pub nationality: Option<String>,
    pub tax_id: String,
    pub iban: String,
    pub bank_name: Option<String>,
    pub id_document_path: Option<String>,
    pub status: String,
    pub review_note: Option<String>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
