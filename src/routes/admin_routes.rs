use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::dto::admin_dto::{
    AppointmentListQuery, AppointmentListResponse, DashboardStats, EmailSettingsPayload,
    EmailSettingsResponse, LoginPayload, LoginResponse, OutboxEmailResponse, OutboxListQuery,
    OutboxListResponse, ReviewContractPayload, UpdateNotesPayload,
};
use crate::dto::application_dto::{ApplicationListQuery, ApplicationListResponse, ApplicationResponse};
use crate::dto::booking_dto::AppointmentResponse;
use crate::dto::contract_dto::{ContractListQuery, ContractListResponse, ContractResponse};
use crate::error::Error;
use crate::middleware::auth::Claims;
use crate::models::user::User;
use crate::services::audit_service::AuditService;
use crate::utils::time;
use crate::AppState;

const USER_COLUMNS: &str = "id, name, email, role, password_hash, is_active, created_at, updated_at";

fn claims_user_id(claims: &Claims) -> crate::error::Result<Uuid> {
    Uuid::parse_str(&claims.sub).map_err(|_| Error::Unauthorized("Invalid token subject".into()))
}

fn invalid_credentials() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "error": "invalid_credentials",
            "message": "Email or password is incorrect"
        })),
    )
        .into_response()
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginPayload>,
) -> crate::error::Result<Response> {
    payload.validate()?;

    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE email = $1 AND is_active = TRUE",
        USER_COLUMNS
    ))
    .bind(&payload.email)
    .fetch_optional(&state.pool)
    .await?;

    let Some(user) = user else {
        return Ok(invalid_credentials());
    };
    if !crate::utils::crypto::verify_password(&payload.password, &user.password_hash)? {
        return Ok(invalid_credentials());
    }

    let config = crate::config::get_config();
    let exp = (time::now() + chrono::Duration::hours(12)).timestamp() as usize;
    let claims = Claims {
        sub: user.id.to_string(),
        exp,
        role: Some(user.role.clone()),
    };
    let token = jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| Error::Internal(format!("Failed to sign token: {}", e)))?;

    tracing::info!(user_id = %user.id, "Staff login");
    Ok(Json(LoginResponse {
        token,
        user: user.into(),
    })
    .into_response())
}

#[axum::debug_handler]
pub async fn list_applications(
    State(state): State<AppState>,
    Query(query): Query<ApplicationListQuery>,
) -> crate::error::Result<impl IntoResponse> {
    let result = state.application_service.list(query).await?;
    Ok(Json(ApplicationListResponse::from(result)))
}

#[axum::debug_handler]
pub async fn get_application(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> crate::error::Result<impl IntoResponse> {
    let application = state.application_service.get_by_id(id).await?;
    Ok(Json(ApplicationResponse::from(application)))
}

#[axum::debug_handler]
pub async fn accept_application(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> crate::error::Result<impl IntoResponse> {
    let application = state.application_service.accept(id).await?;
    tracing::info!(application_id = %application.id, "Application accepted");

    if let Err(e) = state
        .email_service
        .enqueue_application_accepted(&application)
        .await
    {
        tracing::error!("Failed to enqueue acceptance email: {:?}", e);
    }

    let audit = AuditService::new(state.pool.clone());
    let _ = audit
        .log(
            claims_user_id(&claims).ok(),
            "accept_application",
            "application",
            application.id,
            None,
            None,
            None,
        )
        .await?;

    Ok(Json(ApplicationResponse::from(application)))
}

#[axum::debug_handler]
pub async fn reject_application(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> crate::error::Result<impl IntoResponse> {
    let application = state.application_service.reject(id).await?;
    tracing::info!(application_id = %application.id, "Application rejected");

    let audit = AuditService::new(state.pool.clone());
    let _ = audit
        .log(
            claims_user_id(&claims).ok(),
            "reject_application",
            "application",
            application.id,
            None,
            None,
            None,
        )
        .await?;

    Ok(Json(ApplicationResponse::from(application)))
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<AppState>,
    Query(query): Query<AppointmentListQuery>,
) -> crate::error::Result<impl IntoResponse> {
    let result = state.booking_service.list(query).await?;
    Ok(Json(AppointmentListResponse::from(result)))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> crate::error::Result<impl IntoResponse> {
    let appointment = state.booking_service.complete(id).await?;
    tracing::info!(appointment_id = %appointment.id, "Appointment completed");

    if let Err(e) = state
        .email_service
        .enqueue_contract_invite(&appointment)
        .await
    {
        tracing::error!("Failed to enqueue contract invite: {:?}", e);
    }

    let audit = AuditService::new(state.pool.clone());
    let _ = audit
        .log(
            claims_user_id(&claims).ok(),
            "complete_appointment",
            "appointment",
            appointment.id,
            None,
            None,
            None,
        )
        .await?;

    Ok(Json(AppointmentResponse::from(appointment)))
}

/// Cancelling releases the (date, time) slot for new bookings.
#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> crate::error::Result<impl IntoResponse> {
    let appointment = state.booking_service.cancel(id).await?;
    tracing::info!(appointment_id = %appointment.id, "Appointment cancelled");

    let audit = AuditService::new(state.pool.clone());
    let _ = audit
        .log(
            claims_user_id(&claims).ok(),
            "cancel_appointment",
            "appointment",
            appointment.id,
            None,
            None,
            None,
        )
        .await?;

    Ok(Json(AppointmentResponse::from(appointment)))
}

#[axum::debug_handler]
pub async fn update_appointment_notes(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateNotesPayload>,
) -> crate::error::Result<impl IntoResponse> {
    payload.validate()?;
    let appointment = state.booking_service.update_notes(id, payload.notes).await?;
    Ok(Json(AppointmentResponse::from(appointment)))
}

#[axum::debug_handler]
pub async fn list_contracts(
    State(state): State<AppState>,
    Query(query): Query<ContractListQuery>,
) -> crate::error::Result<impl IntoResponse> {
    let result = state.contract_service.list(query).await?;
    Ok(Json(ContractListResponse::from(result)))
}

#[axum::debug_handler]
pub async fn get_contract(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> crate::error::Result<impl IntoResponse> {
    let contract = state.contract_service.get_by_id(id).await?;
    Ok(Json(ContractResponse::from(contract)))
}

#[axum::debug_handler]
pub async fn approve_contract(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReviewContractPayload>,
) -> crate::error::Result<impl IntoResponse> {
    payload.validate()?;
    let reviewer = claims_user_id(&claims)?;
    let contract = state
        .contract_service
        .approve(id, reviewer, payload.review_note)
        .await?;
    tracing::info!(contract_id = %contract.id, "Contract approved");

    let audit = AuditService::new(state.pool.clone());
    let _ = audit
        .log(
            Some(reviewer),
            "approve_contract",
            "employment_contract",
            contract.id,
            None,
            None,
            None,
        )
        .await?;

    Ok(Json(ContractResponse::from(contract)))
}

#[axum::debug_handler]
pub async fn reject_contract(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReviewContractPayload>,
) -> crate::error::Result<impl IntoResponse> {
    payload.validate()?;
    let reviewer = claims_user_id(&claims)?;
    let contract = state
        .contract_service
        .reject(id, reviewer, payload.review_note)
        .await?;
    tracing::info!(contract_id = %contract.id, "Contract rejected");

    let audit = AuditService::new(state.pool.clone());
    let _ = audit
        .log(
            Some(reviewer),
            "reject_contract",
            "employment_contract",
            contract.id,
            None,
            None,
            None,
        )
        .await?;

    Ok(Json(ContractResponse::from(contract)))
}

#[axum::debug_handler]
pub async fn get_email_settings(
    State(state): State<AppState>,
) -> crate::error::Result<impl IntoResponse> {
    match state.email_service.get_settings().await? {
        Some(settings) => Ok(Json(EmailSettingsResponse::from(settings))),
        None => Err(Error::NotFound("Email sender is not configured".into())),
    }
}

#[axum::debug_handler]
pub async fn update_email_settings(
    State(state): State<AppState>,
    Json(payload): Json<EmailSettingsPayload>,
) -> crate::error::Result<impl IntoResponse> {
    payload.validate()?;
    let settings = state.email_service.upsert_settings(&payload).await?;
    tracing::info!(sender = %settings.sender_email, "Email sender updated");
    Ok(Json(EmailSettingsResponse::from(settings)))
}

#[axum::debug_handler]
pub async fn list_outbox(
    State(state): State<AppState>,
    Query(query): Query<OutboxListQuery>,
) -> crate::error::Result<impl IntoResponse> {
    let result = state.email_service.list(query).await?;
    Ok(Json(OutboxListResponse::from(result)))
}

#[axum::debug_handler]
pub async fn retry_outbox_email(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> crate::error::Result<impl IntoResponse> {
    let email = state.email_service.retry(id).await?;
    tracing::info!(email_id = %email.id, "Outbox email requeued");

    let audit = AuditService::new(state.pool.clone());
    let _ = audit
        .log(
            claims_user_id(&claims).ok(),
            "retry_email",
            "email_outbox",
            email.id,
            None,
            None,
            None,
        )
        .await?;

    Ok(Json(OutboxEmailResponse::from(email)))
}

#[axum::debug_handler]
pub async fn get_dashboard_stats(
    State(state): State<AppState>,
) -> crate::error::Result<impl IntoResponse> {
    let applications_by_status = state.application_service.status_counts().await?;
    let appointments_by_status = state.booking_service.status_counts().await?;
    let contracts_by_status = state.contract_service.status_counts().await?;
    let appointments_today = state
        .booking_service
        .count_for_date(time::business_now().date())
        .await?;
    let outbox_pending = state.email_service.count_pending().await?;

    Ok(Json(DashboardStats {
        applications_by_status,
        appointments_by_status,
        contracts_by_status,
        appointments_today,
        outbox_pending,
    }))
}
