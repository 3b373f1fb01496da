use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{NaiveDate, NaiveTime};
use serde_json::json;
use validator::Validate;

use crate::dto::booking_dto::{
    AppointmentResponse, AvailabilityQuery, BookSlotPayload, BookingContextResponse,
    DayAvailabilityResponse, SlotStatus,
};
use crate::error::Error;
use crate::services::booking_service::{availability, ensure_bookable_date, slot_catalog};
use crate::utils::signing::{self, LinkTokenError};
use crate::utils::time;
use crate::AppState;

fn token_rejection(err: LinkTokenError) -> Response {
    match err {
        LinkTokenError::Expired => (
            StatusCode::FORBIDDEN,
            Json(json!({
                "error": "token_expired",
                "message": "This booking link has expired"
            })),
        )
            .into_response(),
        LinkTokenError::Invalid => (
            StatusCode::FORBIDDEN,
            Json(json!({
                "error": "invalid_token",
                "message": "This booking link is not valid"
            })),
        )
            .into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/public/booking/{token}",
    params(
        ("token" = String, Path, description = "Signed booking token")
    ),
    responses(
        (status = 200, description = "Booking context for the application"),
        (status = 403, description = "Invalid or expired token")
    )
)]
#[axum::debug_handler]
pub async fn get_booking_context(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> crate::error::Result<Response> {
    let config = crate::config::get_config();
    let application_id = match signing::verify(
        signing::PURPOSE_BOOKING,
        &token,
        time::now(),
        &config.link_token_secret,
    ) {
        Ok(id) => id,
        Err(e) => return Ok(token_rejection(e)),
    };

    let application = state.application_service.get_accepted(application_id).await?;
    let appointment = state
        .booking_service
        .get_active_for_application(application.id)
        .await?;

    let response = BookingContextResponse {
        application_id: application.id,
        name: application.name,
        position_title: application.position_title,
        appointment: appointment.map(Into::into),
    };
    Ok(Json(response).into_response())
}

#[utoipa::path(
    get,
    path = "/api/public/booking/{token}/slots",
    params(
        ("token" = String, Path, description = "Signed booking token"),
        ("date" = String, Query, description = "Requested day, YYYY-MM-DD")
    ),
    responses(
        (status = 200, description = "Catalog slots with availability flags"),
        (status = 400, description = "Missing, malformed or unbookable date"),
        (status = 403, description = "Invalid or expired token")
    )
)]
#[axum::debug_handler]
pub async fn get_day_availability(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Query(query): Query<AvailabilityQuery>,
) -> crate::error::Result<Response> {
    let config = crate::config::get_config();
    let application_id = match signing::verify(
        signing::PURPOSE_BOOKING,
        &token,
        time::now(),
        &config.link_token_secret,
    ) {
        Ok(id) => id,
        Err(e) => return Ok(token_rejection(e)),
    };
    state.application_service.get_accepted(application_id).await?;

    let Some(raw_date) = query.date else {
        return Err(Error::BadRequest("Missing date query parameter".into()));
    };
    let date = NaiveDate::parse_from_str(&raw_date, "%Y-%m-%d")
        .map_err(|_| Error::BadRequest("Invalid date, expected YYYY-MM-DD".into()))?;

    let now_local = time::business_now();
    ensure_bookable_date(date, now_local.date())?;

    let taken = state.booking_service.taken_slots(date).await?;
    let slots: Vec<SlotStatus> = availability(date, &taken, now_local)
        .into_iter()
        .map(|(slot, block)| SlotStatus {
            time: slot.format("%H:%M").to_string(),
            available: block.is_none(),
            reason: block.map(|b| b.as_str().to_string()),
        })
        .collect();

    Ok(Json(DayAvailabilityResponse { date, slots }).into_response())
}

#[utoipa::path(
    post,
    path = "/api/public/booking/{token}",
    request_body = BookSlotPayload,
    params(
        ("token" = String, Path, description = "Signed booking token")
    ),
    responses(
        (status = 201, description = "Appointment booked"),
        (status = 400, description = "Invalid date or time"),
        (status = 403, description = "Invalid or expired token"),
        (status = 409, description = "Slot already taken")
    )
)]
#[axum::debug_handler]
pub async fn book_slot(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(payload): Json<BookSlotPayload>,
) -> crate::error::Result<Response> {
    payload.validate()?;
    let config = crate::config::get_config();
    let application_id = match signing::verify(
        signing::PURPOSE_BOOKING,
        &token,
        time::now(),
        &config.link_token_secret,
    ) {
        Ok(id) => id,
        Err(e) => return Ok(token_rejection(e)),
    };
    let application = state.application_service.get_accepted(application_id).await?;

    let date = NaiveDate::parse_from_str(&payload.date, "%Y-%m-%d")
        .map_err(|_| Error::BadRequest("Invalid date, expected YYYY-MM-DD".into()))?;
    let slot = NaiveTime::parse_from_str(&payload.time, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(&payload.time, "%H:%M:%S"))
        .map_err(|_| Error::BadRequest("Invalid time, expected HH:MM".into()))?;

    let now_local = time::business_now();
    ensure_bookable_date(date, now_local.date())?;
    if !slot_catalog().contains(&slot) {
        return Err(Error::BadRequest(
            "Requested time is not an offered slot".into(),
        ));
    }
    if date == now_local.date() && slot <= now_local.time() {
        return Err(Error::BadRequest("Requested slot has already passed".into()));
    }

    let appointment = state
        .booking_service
        .book_slot(
            application.id,
            &application.name,
            &application.email,
            date,
            slot,
        )
        .await?;
    tracing::info!(appointment_id = %appointment.id, date = %date, slot = %slot, "Appointment booked");

    if let Err(e) = state
        .email_service
        .enqueue_booking_confirmed(&appointment)
        .await
    {
        tracing::error!("Failed to enqueue booking confirmation: {:?}", e);
    }

    Ok((
        StatusCode::CREATED,
        Json(AppointmentResponse::from(appointment)),
    )
        .into_response())
}
