use std::collections::HashMap;

use sqlx::PgPool;
use uuid::Uuid;

use crate::dto::application_dto::{ApplicationListQuery, SubmitApplicationPayload};
use crate::error::{Error, Result};
use crate::models::application::{
    Application, APPLICATION_STATUS_ACCEPTED, APPLICATION_STATUS_NEW, APPLICATION_STATUS_REJECTED,
};

const APPLICATION_COLUMNS: &str = "id, name, email, phone, position_title, message, resume_path, status, accepted_at, rejected_at, created_at, updated_at";

#[derive(Clone)]
pub struct ApplicationService {
    pool: PgPool,
}

pub struct ApplicationList {
    pub items: Vec<Application>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl ApplicationService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        payload: &SubmitApplicationPayload,
        resume_path: Option<String>,
    ) -> Result<Application> {
        let application = sqlx::query_as::<_, Application>(&format!(
            "INSERT INTO applications (name, email, phone, position_title, message, resume_path, status)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {}",
            APPLICATION_COLUMNS
        ))
        .bind(&payload.name)
        .bind(&payload.email)
        .bind(&payload.phone)
        .bind(&payload.position_title)
        .bind(&payload.message)
        .bind(resume_path)
        .bind(APPLICATION_STATUS_NEW)
        .fetch_one(&self.pool)
        .await?;
        Ok(application)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Application> {
        let application = sqlx::query_as::<_, Application>(&format!(
            "SELECT {} FROM applications WHERE id = $1",
            APPLICATION_COLUMNS
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(application)
    }

    /// Booking links only work for accepted applications.
    pub async fn get_accepted(&self, id: Uuid) -> Result<Application> {
        let application = self.get_by_id(id).await?;
        if application.status != APPLICATION_STATUS_ACCEPTED {
            return Err(Error::Forbidden(
                "This application is not cleared for booking".into(),
            ));
        }
        Ok(application)
    }

    pub async fn accept(&self, id: Uuid) -> Result<Application> {
        self.transition(id, APPLICATION_STATUS_ACCEPTED, "accepted_at").await
    }

    pub async fn reject(&self, id: Uuid) -> Result<Application> {
        self.transition(id, APPLICATION_STATUS_REJECTED, "rejected_at").await
    }

    /// Applications only move out of `new`, once. The conditional update is
    /// the guard; a second click finds zero rows and reports the conflict.
    async fn transition(&self, id: Uuid, to: &str, stamp_column: &str) -> Result<Application> {
        let updated = sqlx::query_as::<_, Application>(&format!(
            "UPDATE applications SET status = $2, {} = NOW(), updated_at = NOW()
             WHERE id = $1 AND status = $3
             RETURNING {}",
            stamp_column, APPLICATION_COLUMNS
        ))
        .bind(id)
        .bind(to)
        .bind(APPLICATION_STATUS_NEW)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(application) => Ok(application),
            None => {
                let current = self.get_by_id(id).await?;
                Err(Error::Conflict(format!(
                    "Application is {} and cannot move to {}",
                    current.status, to
                )))
            }
        }
    }

    pub async fn list(&self, query: ApplicationListQuery) -> Result<ApplicationList> {
        let page = query.page.unwrap_or(1).max(1);
        let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * per_page;

        let mut filters = Vec::new();
        let mut args: Vec<String> = Vec::new();

        if let Some(status) = query.status {
            filters.push(format!("status = ${}", args.len() + 1));
            args.push(status);
        }
        if let Some(search) = query.search {
            let first = args.len() + 1;
            let second = first + 1;
            filters.push(format!(
                "(name ILIKE ${} OR email ILIKE ${})",
                first, second
            ));
            args.push(format!("%{}%", search));
            args.push(format!("%{}%", search));
        }

        let where_clause = if filters.is_empty() {
            "".to_string()
        } else {
            format!("WHERE {}", filters.join(" AND "))
        };

        let items_query = format!(
            "SELECT {} FROM applications {} ORDER BY created_at DESC LIMIT ${} OFFSET ${}",
            APPLICATION_COLUMNS,
            where_clause,
            args.len() + 1,
            args.len() + 2
        );
        let total_query = format!("SELECT COUNT(*) FROM applications {}", where_clause);

        let mut items_statement = sqlx::query_as::<_, Application>(&items_query);
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

        Ok(ApplicationList {
            items,
            total,
            page,
            per_page,
            total_pages,
        })
    }

    pub async fn status_counts(&self) -> Result<HashMap<String, i64>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*) FROM applications GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }
}
