use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::contract::EmploymentContract;
use crate::services::contract_service::ContractList;

/// What the contract page needs before the form is shown: whose appointment
/// the link belongs to and whether a contract was already submitted for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractContextResponse {
    pub appointment_id: uuid::Uuid,
    pub applicant_name: String,
    pub scheduled_on: NaiveDate,
    pub slot_time: NaiveTime,
    pub contract_status: Option<String>,
}

/// Form fields of the contract submission. The ID document arrives as a
/// separate multipart file part.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmitContractPayload {
    #[validate(length(min = 1, max = 200))]
    pub legal_name: String,
    #[validate(length(min = 1))]
    pub date_of_birth: String,
    #[validate(length(min = 1, max = 500))]
    pub address: String,
    #[validate(length(min = 1, max = 100))]
    pub nationality: String,
    #[validate(length(min = 1, max = 64))]
    pub tax_id: String,
    #[validate(length(min = 10, max = 42))]
    pub iban: String,
    #[validate(length(min = 1, max = 200))]
    pub bank_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractResponse {
    pub id: uuid::Uuid,
    pub appointment_id: uuid::Uuid,
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
    pub reviewed_by: Option<uuid::Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractListResponse {
    pub items: Vec<ContractResponse>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ContractListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub status: Option<String>,
}

impl From<EmploymentContract> for ContractResponse {
    fn from(value: EmploymentContract) -> Self {
        Self {
            id: value.id,
            appointment_id: value.appointment_id,
            legal_name: value.legal_name,
            date_of_birth: value.date_of_birth,
            address: value.address,
            nationality: value.nationality,
            tax_id: value.tax_id,
            iban: value.iban,
            bank_name: value.bank_name,
            id_document_path: value.id_document_path,
            status: value.status,
            review_note: value.review_note,
            reviewed_by: value.reviewed_by,
            reviewed_at: value.reviewed_at,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

impl From<ContractList> for ContractListResponse {
    fn from(value: ContractList) -> Self {
        Self {
            items: value.items.into_iter().map(Into::into).collect(),
            total: value.total,
            page: value.page,
            per_page: value.per_page,
            total_pages: value.total_pages,
        }
    }
}
