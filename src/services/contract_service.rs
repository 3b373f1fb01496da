use std::collections::HashMap;

use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::dto::contract_dto::{ContractListQuery, SubmitContractPayload};
use crate::error::{Error, Result};
use crate::models::contract::{
    EmploymentContract, CONTRACT_STATUS_APPROVED, CONTRACT_STATUS_REJECTED,
    CONTRACT_STATUS_SUBMITTED,
};

const CONTRACT_COLUMNS: &str = "id, appointment_id, legal_name, date_of_birth, address, nationality, tax_id, iban, bank_name, id_document_path, status, review_note, reviewed_by, reviewed_at, created_at, updated_at";

#[derive(Clone)]
pub struct ContractService {
    pool: PgPool,
}

pub struct ContractList {
    pub items: Vec<EmploymentContract>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl ContractService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// One contract per appointment, enforced by the unique key on
    /// `appointment_id`. A duplicate submission loses at the insert and is
    /// reported as a conflict instead of creating a second row.
    pub async fn create(
        &self,
        appointment_id: Uuid,
        payload: &SubmitContractPayload,
        id_document_path: Option<String>,
    ) -> Result<EmploymentContract> {
        let date_of_birth = NaiveDate::parse_from_str(&payload.date_of_birth, "%Y-%m-%d")
            .map_err(|_| Error::BadRequest("Invalid date of birth, expected YYYY-MM-DD".into()))?;

        let insert = sqlx::query_as::<_, EmploymentContract>(&format!(
            "INSERT INTO employment_contracts (appointment_id, legal_name, date_of_birth, address, nationality, tax_id, iban, bank_name, id_document_path, status)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING {}",
            CONTRACT_COLUMNS
        ))
        .bind(appointment_id)
        .bind(&payload.legal_name)
        .bind(date_of_birth)
        .bind(&payload.address)
        .bind(&payload.nationality)
        .bind(&payload.tax_id)
        .bind(&payload.iban)
        .bind(&payload.bank_name)
        .bind(id_document_path)
        .bind(CONTRACT_STATUS_SUBMITTED)
        .fetch_one(&self.pool)
        .await;

        match insert {
            Ok(contract) => Ok(contract),
            Err(err) => {
                if let sqlx::Error::Database(db) = &err {
                    if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation)
                        && db.constraint() == Some("employment_contracts_appointment_key")
                    {
                        return Err(Error::Conflict(
                            "A contract has already been submitted for this appointment".into(),
                        ));
                    }
                }
                Err(err.into())
            }
        }
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<EmploymentContract> {
        let contract = sqlx::query_as::<_, EmploymentContract>(&format!(
            "SELECT {} FROM employment_contracts WHERE id = $1",
            CONTRACT_COLUMNS
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(contract)
    }

    pub async fn get_by_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<EmploymentContract>> {
        let contract = sqlx::query_as::<_, EmploymentContract>(&format!(
            "SELECT {} FROM employment_contracts WHERE appointment_id = $1",
            CONTRACT_COLUMNS
        ))
        .bind(appointment_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(contract)
    }

    pub async fn approve(
        &self,
        id: Uuid,
        reviewer: Uuid,
        review_note: Option<String>,
    ) -> Result<EmploymentContract> {
        self.review(id, CONTRACT_STATUS_APPROVED, reviewer, review_note)
            .await
    }

    pub async fn reject(
        &self,
        id: Uuid,
        reviewer: Uuid,
        review_note: Option<String>,
    ) -> Result<EmploymentContract> {
        self.review(id, CONTRACT_STATUS_REJECTED, reviewer, review_note)
            .await
    }

    async fn review(
        &self,
        id: Uuid,
        to: &str,
        reviewer: Uuid,
        review_note: Option<String>,
    ) -> Result<EmploymentContract> {
        let updated = sqlx::query_as::<_, EmploymentContract>(&format!(
            "UPDATE employment_contracts
             SET status = $2, review_note = $3, reviewed_by = $4, reviewed_at = NOW(), updated_at = NOW()
             WHERE id = $1 AND status = $5
             RETURNING {}",
            CONTRACT_COLUMNS
        ))
        .bind(id)
        .bind(to)
        .bind(review_note)
        .bind(reviewer)
        .bind(CONTRACT_STATUS_SUBMITTED)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(contract) => Ok(contract),
            None => {
                let current = self.get_by_id(id).await?;
                Err(Error::Conflict(format!(
                    "Contract is {} and cannot move to {}",
                    current.status, to
                )))
            }
        }
    }

    pub async fn list(&self, query: ContractListQuery) -> Result<ContractList> {
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
            "SELECT {} FROM employment_contracts {} ORDER BY created_at DESC LIMIT ${} OFFSET ${}",
            CONTRACT_COLUMNS,
            where_clause,
            args.len() + 1,
            args.len() + 2
        );
        let total_query = format!("SELECT COUNT(*) FROM employment_contracts {}", where_clause);

        let mut items_statement = sqlx::query_as::<_, EmploymentContract>(&items_query);
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

        Ok(ContractList {
            items,
            total,
            page,
            per_page,
            total_pages,
        })
    }

    pub async fn status_counts(&self) -> Result<HashMap<String, i64>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*) FROM employment_contracts GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }
}
