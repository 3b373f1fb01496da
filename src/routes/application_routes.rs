use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use validator::Validate;

use crate::dto::application_dto::{SubmitApplicationPayload, SubmitApplicationResponse};
use crate::utils::uploads;
use crate::AppState;

/// Public application form. Multipart so the résumé can ride along with the
/// text fields.
#[utoipa::path(
    post,
    path = "/api/public/applications",
    responses(
        (status = 201, description = "Application submitted"),
        (status = 400, description = "Invalid payload or file")
    )
)]
#[axum::debug_handler]
pub async fn submit_application(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> crate::error::Result<Response> {
    let mut name = String::new();
    let mut email = String::new();
    let mut phone = None;
    let mut position_title = String::new();
    let mut message = None;
    let mut resume: Option<(String, bytes::Bytes)> = None;

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "name" => name = field.text().await?,
            "email" => email = field.text().await?,
            "phone" => phone = Some(field.text().await?),
            "position_title" => position_title = field.text().await?,
            "message" => message = Some(field.text().await?),
            "resume" => {
                let filename = field.file_name().unwrap_or("resume.bin").to_string();
                let data = field.bytes().await?;
                if !data.is_empty() {
                    resume = Some((filename, data));
                }
            }
            _ => {}
        }
    }

    let payload = SubmitApplicationPayload {
        name,
        email,
        phone: phone.filter(|p| !p.is_empty()),
        position_title,
        message: message.filter(|m| !m.is_empty()),
    };
    payload.validate()?;

    let resume_path = match &resume {
        Some((filename, data)) => Some(uploads::save_upload("resumes", filename, data).await?),
        None => None,
    };

    let application = state.application_service.create(&payload, resume_path).await?;
    tracing::info!(application_id = %application.id, "Application submitted");

    if let Err(e) = state
        .email_service
        .enqueue_application_received(&application)
        .await
    {
        tracing::error!("Failed to enqueue application-received email: {:?}", e);
    }

    let audit = crate::services::audit_service::AuditService::new(state.pool.clone());
    let _ = audit
        .log(
            None,
            "submit_application",
            "application",
            application.id,
            Some(serde_json::json!({"position_title": application.position_title})),
            None,
            None,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SubmitApplicationResponse {
            id: application.id,
            status: application.status,
        }),
    )
        .into_response())
}
