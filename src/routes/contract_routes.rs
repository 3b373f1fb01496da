use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use validator::Validate;

use crate::dto::contract_dto::{ContractContextResponse, ContractResponse, SubmitContractPayload};
use crate::models::appointment::APPOINTMENT_STATUS_COMPLETED;
use crate::utils::signing::{self, LinkTokenError};
use crate::utils::time;
use crate::utils::uploads;
use crate::AppState;

fn token_rejection(err: LinkTokenError) -> Response {
    match err {
        LinkTokenError::Expired => (
            StatusCode::FORBIDDEN,
            Json(json!({
                "error": "token_expired",
                "message": "This contract link has expired"
            })),
        )
            .into_response(),
        LinkTokenError::Invalid => (
            StatusCode::FORBIDDEN,
            Json(json!({
                "error": "invalid_token",
                "message": "This contract link is not valid"
            })),
        )
            .into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/public/contract/{token}",
    params(
        ("token" = String, Path, description = "Signed contract token")
    ),
    responses(
        (status = 200, description = "Contract context for the appointment"),
        (status = 403, description = "Invalid or expired token")
    )
)]
#[axum::debug_handler]
pub async fn get_contract_context(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> crate::error::Result<Response> {
    let config = crate::config::get_config();
    let appointment_id = match signing::verify(
        signing::PURPOSE_CONTRACT,
        &token,
        time::now(),
        &config.link_token_secret,
    ) {
        Ok(id) => id,
        Err(e) => return Ok(token_rejection(e)),
    };

    let appointment = state.booking_service.get_by_id(appointment_id).await?;
    if appointment.status != APPOINTMENT_STATUS_COMPLETED {
        return Ok((
            StatusCode::FORBIDDEN,
            Json(json!({
                "error": "not_completed",
                "message": "Contract details can only be submitted after the interview"
            })),
        )
            .into_response());
    }

    let contract = state
        .contract_service
        .get_by_appointment(appointment.id)
        .await?;

    let response = ContractContextResponse {
        appointment_id: appointment.id,
        applicant_name: appointment.applicant_name,
        scheduled_on: appointment.scheduled_on,
        slot_time: appointment.slot_time,
        contract_status: contract.map(|c| c.status),
    };
    Ok(Json(response).into_response())
}

/// Multipart submission: the form fields plus an optional `id_document` scan.
#[utoipa::path(
    post,
    path = "/api/public/contract/{token}",
    params(
        ("token" = String, Path, description = "Signed contract token")
    ),
    responses(
        (status = 201, description = "Contract submitted"),
        (status = 400, description = "Invalid payload or file"),
        (status = 403, description = "Invalid or expired token"),
        (status = 409, description = "Contract already submitted")
    )
)]
#[axum::debug_handler]
pub async fn submit_contract(
    State(state): State<AppState>,
    Path(token): Path<String>,
    mut multipart: Multipart,
) -> crate::error::Result<Response> {
    let config = crate::config::get_config();
    let appointment_id = match signing::verify(
        signing::PURPOSE_CONTRACT,
        &token,
        time::now(),
        &config.link_token_secret,
    ) {
        Ok(id) => id,
        Err(e) => return Ok(token_rejection(e)),
    };

    let appointment = state.booking_service.get_by_id(appointment_id).await?;
    if appointment.status != APPOINTMENT_STATUS_COMPLETED {
        return Ok((
            StatusCode::FORBIDDEN,
            Json(json!({
                "error": "not_completed",
                "message": "Contract details can only be submitted after the interview"
            })),
        )
            .into_response());
    }

    let mut legal_name = String::new();
    let mut date_of_birth = String::new();
    let mut address = String::new();
    let mut nationality = String::new();
    let mut tax_id = String::new();
    let mut iban = String::new();
    let mut bank_name = String::new();
    let mut id_document: Option<(String, bytes::Bytes)> = None;

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "legal_name" => legal_name = field.text().await?,
            "date_of_birth" => date_of_birth = field.text().await?,
            "address" => address = field.text().await?,
            "nationality" => nationality = field.text().await?,
            "tax_id" => tax_id = field.text().await?,
            "iban" => iban = field.text().await?,
            "bank_name" => bank_name = field.text().await?,
            "id_document" => {
                let filename = field.file_name().unwrap_or("document.bin").to_string();
                let data = field.bytes().await?;
                if !data.is_empty() {
                    id_document = Some((filename, data));
                }
            }
            _ => {}
        }
    }

    let payload = SubmitContractPayload {
        legal_name,
        date_of_birth,
        address,
        nationality,
        tax_id,
        iban,
        bank_name,
    };
    payload.validate()?;

    let id_document_path = match &id_document {
        Some((filename, data)) => Some(uploads::save_upload("contracts", filename, data).await?),
        None => None,
    };

    let contract = state
        .contract_service
        .create(appointment.id, &payload, id_document_path)
        .await?;
    tracing::info!(contract_id = %contract.id, appointment_id = %appointment.id, "Contract submitted");

    let audit = crate::services::audit_service::AuditService::new(state.pool.clone());
    let _ = audit
        .log(
            None,
            "submit_contract",
            "employment_contract",
            contract.id,
            None,
            None,
            None,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(ContractResponse::from(contract))).into_response())
}
