use chrono::Duration;
use reqwest::Client;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::config::get_config;
use crate::dto::admin_dto::{EmailSettingsPayload, OutboxListQuery};
use crate::error::{Error, Result};
use crate::models::application::Application;
use crate::models::appointment::Appointment;
use crate::models::email_outbox::{
    OutboxEmail, OUTBOX_STATUS_FAILED, OUTBOX_STATUS_PENDING,
};
use crate::models::email_settings::EmailSettings;
use crate::utils::signing;
use crate::utils::time;

const OUTBOX_COLUMNS: &str = "id, message_type, recipient, subject, body, status, attempts, max_attempts, next_retry_at, last_error, created_at, updated_at";
const SETTINGS_COLUMNS: &str = "id, sender_name, sender_email, reply_to, updated_at";

pub const EMAIL_APPLICATION_RECEIVED: &str = "application_received";
pub const EMAIL_APPLICATION_ACCEPTED: &str = "application_accepted";
pub const EMAIL_BOOKING_CONFIRMED: &str = "booking_confirmed";
pub const EMAIL_CONTRACT_INVITE: &str = "contract_invite";

/// Transactional email goes through the outbox table: state transitions
/// enqueue a row and commit, the background worker delivers with retry and
/// backoff. A dead email never blocks or rolls back the transition that
/// produced it.
#[derive(Clone)]
pub struct EmailService {
    pool: PgPool,
    client: Client,
}

pub struct OutboxList {
    pub items: Vec<OutboxEmail>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl EmailService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            client: Client::new(),
        }
    }

    pub async fn enqueue(
        &self,
        message_type: &str,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<OutboxEmail> {
        let row = sqlx::query_as::<_, OutboxEmail>(&format!(
            "INSERT INTO email_outbox (message_type, recipient, subject, body, status)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {}",
            OUTBOX_COLUMNS
        ))
        .bind(message_type)
        .bind(recipient)
        .bind(subject)
        .bind(body)
        .bind(OUTBOX_STATUS_PENDING)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn enqueue_application_received(
        &self,
        application: &Application,
    ) -> Result<OutboxEmail> {
        let body = format!(
            "Hi {},\n\nThanks for applying for the {} position. Our team will review your application and get back to you soon.\n",
            application.name, application.position_title
        );
        self.enqueue(
            EMAIL_APPLICATION_RECEIVED,
            &application.email,
            "We received your application",
            &body,
        )
        .await
    }

    /// Acceptance mail carries the signed booking link.
    pub async fn enqueue_application_accepted(
        &self,
        application: &Application,
    ) -> Result<OutboxEmail> {
        let config = get_config();
        let expires_at = time::now() + Duration::hours(config.booking_token_ttl_hours);
        let token = signing::mint(
            signing::PURPOSE_BOOKING,
            application.id,
            expires_at,
            &config.link_token_secret,
        );
        let link = format!("{}/appointment-booking?token={}", config.public_base_url, token);
        let body = format!(
            "Hi {},\n\nGood news: your application for the {} position has been accepted.\n\nPick an interview slot here:\n{}\n\nThe link is valid until {}.\n",
            application.name,
            application.position_title,
            link,
            expires_at.format("%Y-%m-%d %H:%M UTC")
        );
        self.enqueue(
            EMAIL_APPLICATION_ACCEPTED,
            &application.email,
            "Your application was accepted",
            &body,
        )
        .await
    }

    pub async fn enqueue_booking_confirmed(&self, appointment: &Appointment) -> Result<OutboxEmail> {
        let body = format!(
            "Hi {},\n\nYour interview is confirmed for {} at {}.\n\nSee you then!\n",
            appointment.applicant_name,
            appointment.scheduled_on,
            appointment.slot_time.format("%H:%M")
        );
        self.enqueue(
            EMAIL_BOOKING_CONFIRMED,
            &appointment.applicant_email,
            "Your interview is booked",
            &body,
        )
        .await
    }

    /// Sent when staff marks the interview completed; carries the signed
    /// employment-contract link.
    pub async fn enqueue_contract_invite(&self, appointment: &Appointment) -> Result<OutboxEmail> {
        let config = get_config();
        let expires_at = time::now() + Duration::hours(config.contract_token_ttl_hours);
        let token = signing::mint(
            signing::PURPOSE_CONTRACT,
            appointment.id,
            expires_at,
            &config.link_token_secret,
        );
        let link = format!("{}/employment-contract?token={}", config.public_base_url, token);
        let body = format!(
            "Hi {},\n\nThanks for coming in on {}. To continue your onboarding, please fill in your employment details here:\n{}\n\nThe link is valid until {}.\n",
            appointment.applicant_name,
            appointment.scheduled_on,
            link,
            expires_at.format("%Y-%m-%d %H:%M UTC")
        );
        self.enqueue(
            EMAIL_CONTRACT_INVITE,
            &appointment.applicant_email,
            "Next step: your employment details",
            &body,
        )
        .await
    }

    /// Claims the oldest due pending email and attempts delivery. Returns
    /// Ok(false) when the queue is empty so the worker can sleep.
    pub async fn run_once(&self) -> Result<bool> {
        let row_opt = sqlx::query(
            "SELECT id FROM email_outbox
             WHERE status = $1 AND (next_retry_at IS NULL OR next_retry_at <= NOW())
             ORDER BY created_at ASC
             FOR UPDATE SKIP LOCKED
             LIMIT 1",
        )
        .bind(OUTBOX_STATUS_PENDING)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row_opt else { return Ok(false) };
        let id: Uuid = row.try_get("id")?;

        if let Err(e) = self.deliver_once(id).await {
            tracing::error!(error = ?e, "Outbox delivery bookkeeping failed");
        }
        Ok(true)
    }

    pub async fn deliver_once(&self, id: Uuid) -> Result<()> {
        let email = sqlx::query_as::<_, OutboxEmail>(&format!(
            "SELECT {} FROM email_outbox WHERE id = $1",
            OUTBOX_COLUMNS
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        let Some(settings) = self.get_settings().await? else {
            self.record_failure(id, "Email sender is not configured")
                .await?;
            return Ok(());
        };

        let config = get_config();
        let mut payload = serde_json::json!({
            "from": format!("{} <{}>", settings.sender_name, settings.sender_email),
            "to": [email.recipient],
            "subject": email.subject,
            "text": email.body,
        });
        if let Some(reply_to) = &settings.reply_to {
            payload["reply_to"] = serde_json::Value::String(reply_to.clone());
        }

        let res = self
            .client
            .post(&config.email_api_url)
            .bearer_auth(&config.email_api_key)
            .json(&payload)
            .send()
            .await;

        match res {
            Ok(resp) if resp.status().is_success() => {
                sqlx::query(
                    "UPDATE email_outbox
                     SET status = 'sent', attempts = attempts + 1, last_error = NULL, next_retry_at = NULL, updated_at = NOW()
                     WHERE id = $1",
                )
                .bind(id)
                .execute(&self.pool)
                .await?;
            }
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                self.record_failure(id, &format!("Provider returned {}: {}", status, body))
                    .await?;
            }
            Err(err) => {
                self.record_failure(id, &format!("{}", err)).await?;
            }
        }
        Ok(())
    }

    /// Failures stay `pending` with an exponential backoff until the attempt
    /// budget is spent, then the row is parked as `failed` for staff to
    /// inspect and requeue.
    async fn record_failure(&self, id: Uuid, error: &str) -> Result<()> {
        sqlx::query(
            "UPDATE email_outbox
             SET attempts = attempts + 1,
                 last_error = $2,
                 status = CASE WHEN attempts + 1 >= max_attempts THEN 'failed' ELSE 'pending' END,
                 next_retry_at = CASE WHEN attempts + 1 >= max_attempts THEN NULL
                      ELSE NOW() + make_interval(secs => LEAST(3600, 30 * power(2::float, GREATEST(0, attempts))::int)) END,
                 updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_settings(&self) -> Result<Option<EmailSettings>> {
        let settings = sqlx::query_as::<_, EmailSettings>(&format!(
            "SELECT {} FROM email_settings WHERE id = 1",
            SETTINGS_COLUMNS
        ))
        .fetch_optional(&self.pool)
        .await?;
        Ok(settings)
    }

    pub async fn upsert_settings(&self, payload: &EmailSettingsPayload) -> Result<EmailSettings> {
        let settings = sqlx::query_as::<_, EmailSettings>(&format!(
            "INSERT INTO email_settings (id, sender_name, sender_email, reply_to, updated_at)
             VALUES (1, $1, $2, $3, NOW())
             ON CONFLICT (id) DO UPDATE
             SET sender_name = EXCLUDED.sender_name, sender_email = EXCLUDED.sender_email, reply_to = EXCLUDED.reply_to, updated_at = NOW()
             RETURNING {}",
            SETTINGS_COLUMNS
        ))
        .bind(&payload.sender_name)
        .bind(&payload.sender_email)
        .bind(&payload.reply_to)
        .fetch_one(&self.pool)
        .await?;
        Ok(settings)
    }

    pub async fn list(&self, query: OutboxListQuery) -> Result<OutboxList> {
        let page = query.page.unwrap_or(1).max(1);
        let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * per_page;

        let mut filters = Vec::new();
        let mut args: Vec<String> = Vec::new();

        if let Some(status) = query.status {
            filters.push(format!("status = ${}", args.len() + 1));
            args.push(status);
        }

        let where_clause = if filters.is_empty() {
            "".to_string()
        } else {
            format!("WHERE {}", filters.join(" AND "))
        };

        let items_query = format!(
            "SELECT {} FROM email_outbox {} ORDER BY created_at DESC LIMIT ${} OFFSET ${}",
            OUTBOX_COLUMNS,
            where_clause,
            args.len() + 1,
            args.len() + 2
        );
        let total_query = format!("SELECT COUNT(*) FROM email_outbox {}", where_clause);

        let mut items_statement = sqlx::query_as::<_, OutboxEmail>(&items_query);
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

        Ok(OutboxList {
            items,
            total,
            page,
            per_page,
            total_pages,
        })
    }

    /// Staff requeue of a parked email with a fresh attempt budget.
    pub async fn retry(&self, id: Uuid) -> Result<OutboxEmail> {
        let updated = sqlx::query_as::<_, OutboxEmail>(&format!(
            "UPDATE email_outbox
             SET status = $2, attempts = 0, next_retry_at = NULL, updated_at = NOW()
             WHERE id = $1 AND status = $3
             RETURNING {}",
            OUTBOX_COLUMNS
        ))
        .bind(id)
        .bind(OUTBOX_STATUS_PENDING)
        .bind(OUTBOX_STATUS_FAILED)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(email) => Ok(email),
            None => {
                let current = sqlx::query_as::<_, OutboxEmail>(&format!(
                    "SELECT {} FROM email_outbox WHERE id = $1",
                    OUTBOX_COLUMNS
                ))
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
                Err(Error::Conflict(format!(
                    "Only failed emails can be retried, this one is {}",
                    current.status
                )))
            }
        }
    }

    pub async fn count_pending(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM email_outbox WHERE status = $1",
        )
        .bind(OUTBOX_STATUS_PENDING)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
