use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const OUTBOX_STATUS_PENDING: &str = "pending";
pub const OUTBOX_STATUS_SENT: &str = "sent";
pub const OUTBOX_STATUS_FAILED: &str = "failed";

/// A queued transactional email. Rows stay `pending` (with a growing
/// `next_retry_at` backoff) until delivery succeeds or `attempts`
/// reaches `max_attempts`, at which point they park as `failed`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OutboxEmail {
    pub id: Uuid,
    pub message_type: String,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
