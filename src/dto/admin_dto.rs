use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::dto::booking_dto::AppointmentResponse;
use crate::models::email_outbox::OutboxEmail;
use crate::models::email_settings::EmailSettings;
use crate::models::user::User;
use crate::services::booking_service::AppointmentList;
use crate::services::email_service::OutboxList;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoginPayload {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: uuid::Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppointmentListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub status: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentListResponse {
    pub items: Vec<AppointmentResponse>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateNotesPayload {
    #[validate(length(max = 4000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReviewContractPayload {
    #[validate(length(max = 2000))]
    pub review_note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EmailSettingsPayload {
    #[validate(length(min = 1, max = 200))]
    pub sender_name: String,
    #[validate(email)]
    pub sender_email: String,
    #[validate(email)]
    pub reply_to: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailSettingsResponse {
    pub sender_name: String,
    pub sender_email: String,
    pub reply_to: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct OutboxListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEmailResponse {
    pub id: uuid::Uuid,
    pub message_type: String,
    pub recipient: String,
    pub subject: String,
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxListResponse {
    pub items: Vec<OutboxEmailResponse>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardStats {
    pub applications_by_status: HashMap<String, i64>,
    pub appointments_by_status: HashMap<String, i64>,
    pub contracts_by_status: HashMap<String, i64>,
    pub appointments_today: i64,
    pub outbox_pending: i64,
}

impl From<User> for UserResponse {
    fn from(value: User) -> Self {
        Self {
            id: value.id,
            name: value.name,
            email: value.email,
            role: value.role,
        }
    }
}

impl From<AppointmentList> for AppointmentListResponse {
    fn from(value: AppointmentList) -> Self {
        Self {
            items: value.items.into_iter().map(Into::into).collect(),
            total: value.total,
            page: value.page,
            per_page: value.per_page,
            total_pages: value.total_pages,
        }
    }
}

impl From<EmailSettings> for EmailSettingsResponse {
    fn from(value: EmailSettings) -> Self {
        Self {
            sender_name: value.sender_name,
            sender_email: value.sender_email,
            reply_to: value.reply_to,
            updated_at: value.updated_at,
        }
    }
}

impl From<OutboxEmail> for OutboxEmailResponse {
    fn from(value: OutboxEmail) -> Self {
        Self {
            id: value.id,
            message_type: value.message_type,
            recipient: value.recipient,
            subject: value.subject,
            status: value.status,
            attempts: value.attempts,
            max_attempts: value.max_attempts,
            next_retry_at: value.next_retry_at,
            last_error: value.last_error,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

impl From<OutboxList> for OutboxListResponse {
    fn from(value: OutboxList) -> Self {
        Self {
            items: value.items.into_iter().map(Into::into).collect(),
            total: value.total,
            page: value.page,
            per_page: value.per_page,
            total_pages: value.total_pages,
        }
    }
}
