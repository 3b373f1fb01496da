use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Singleton sender-identity record (row id is always 1). Delivery reads
/// this per send instead of hard-coding a From header.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EmailSettings {
    pub id: i16,
    pub sender_name: String,
    pub sender_email: String,
    pub reply_to: Option<String>,
    pub updated_at: DateTime<Utc>,
}
