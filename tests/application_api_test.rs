use std::env;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    routing::{get, patch, post},
    Router,
};
use chrono::{Datelike, Duration as ChronoDuration, NaiveDate, Utc, Weekday};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value as JsonValue};
use tower::ServiceExt;
use uuid::Uuid;

use onboarding_backend::services::email_service::{
    EMAIL_APPLICATION_ACCEPTED, EMAIL_CONTRACT_INVITE,
};
use onboarding_backend::utils::signing;

const BOUNDARY: &str = "------------------------funnel4eba1a9f";

fn next_weekday(days_ahead: i64) -> NaiveDate {
    let mut date = Utc::now().date_naive() + ChronoDuration::days(days_ahead);
    while matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
        date += ChronoDuration::days(1);
    }
    date
}

fn multipart_body(
    fields: &[(&str, &str)],
    file: Option<(&str, &str, &str, &[u8])>,
) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    if let Some((name, filename, content_type, data)) = file {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, name, filename, content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn token_from_email(body: &str) -> String {
    body.split("token=")
        .nth(1)
        .and_then(|rest| rest.split_whitespace().next())
        .expect("deep link token in email body")
        .to_string()
}

async fn body_json(resp: axum::response::Response) -> JsonValue {
    let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn application_funnel_end_to_end() {
    dotenvy::dotenv().ok();
    let Ok(_) = env::var("DATABASE_URL") else {
        eprintln!("skipping application_funnel_end_to_end: DATABASE_URL is not set");
        return;
    };
    env::set_var("SERVER_ADDRESS", "127.0.0.1:0");
    env::set_var("JWT_SECRET", "test_secret_key");
    env::set_var("LINK_TOKEN_SECRET", "test_link_secret");
    env::set_var("EMAIL_API_URL", "http://localhost:9/v1/send");
    env::set_var("EMAIL_API_KEY", "test-email-key");
    env::set_var("PUBLIC_BASE_URL", "http://localhost:5173");
    env::set_var("PUBLIC_RPS", "100");
    env::set_var("ADMIN_RPS", "100");
    env::set_var("BOOKING_TOKEN_TTL_HOURS", "168");
    env::set_var("CONTRACT_TOKEN_TTL_HOURS", "168");
    env::set_var("BUSINESS_UTC_OFFSET_MINUTES", "0");
    env::set_var(
        "UPLOADS_DIR",
        std::env::temp_dir().join("onboarding_test_uploads"),
    );

    onboarding_backend::config::init_config().expect("init config");
    let config = onboarding_backend::config::get_config();

    let pool = onboarding_backend::database::pool::create_pool()
        .await
        .expect("pool");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");

    let admin_id = Uuid::new_v4();
    let password_hash =
        onboarding_backend::utils::crypto::hash_password("funnel-pass").expect("hash");
    sqlx::query(
        "INSERT INTO users (id, name, email, role, password_hash, is_active)
         VALUES ($1, $2, $3, 'admin', $4, TRUE)",
    )
    .bind(admin_id)
    .bind("Funnel Admin")
    .bind(format!("admin_{}@example.com", admin_id))
    .bind(&password_hash)
    .execute(&pool)
    .await
    .expect("seed admin");

    let app_state = onboarding_backend::AppState::new(pool.clone());
    let public_api = Router::new()
        .route(
            "/api/public/applications",
            post(onboarding_backend::routes::application_routes::submit_application),
        )
        .route(
            "/api/public/booking/:token",
            get(onboarding_backend::routes::booking_routes::get_booking_context)
                .post(onboarding_backend::routes::booking_routes::book_slot),
        )
        .route(
            "/api/public/booking/:token/slots",
            get(onboarding_backend::routes::booking_routes::get_day_availability),
        )
        .route(
            "/api/public/contract/:token",
            get(onboarding_backend::routes::contract_routes::get_contract_context)
                .post(onboarding_backend::routes::contract_routes::submit_contract),
        );
    let admin_api = Router::new()
        .route(
            "/api/admin/applications",
            get(onboarding_backend::routes::admin_routes::list_applications),
        )
        .route(
            "/api/admin/applications/:id",
            get(onboarding_backend::routes::admin_routes::get_application),
        )
        .route(
            "/api/admin/applications/:id/accept",
            post(onboarding_backend::routes::admin_routes::accept_application),
        )
        .route(
            "/api/admin/appointments",
            get(onboarding_backend::routes::admin_routes::list_appointments),
        )
        .route(
            "/api/admin/appointments/:id/complete",
            post(onboarding_backend::routes::admin_routes::complete_appointment),
        )
        .route(
            "/api/admin/appointments/:id/notes",
            patch(onboarding_backend::routes::admin_routes::update_appointment_notes),
        )
        .route(
            "/api/admin/contracts/:id/approve",
            post(onboarding_backend::routes::admin_routes::approve_contract),
        )
        .layer(axum::middleware::from_fn(
            onboarding_backend::middleware::auth::require_staff,
        ));
    let app = public_api.merge(admin_api).with_state(app_state.clone());

    let auth = {
        let claims = onboarding_backend::middleware::auth::Claims {
            sub: admin_id.to_string(),
            exp: (Utc::now() + ChronoDuration::hours(1)).timestamp() as usize,
            role: Some("admin".to_string()),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
        )
        .expect("sign token");
        format!("Bearer {}", token)
    };

    let funnel_date = next_weekday(10);
    sqlx::query(
        "DELETE FROM employment_contracts WHERE appointment_id IN
             (SELECT id FROM appointments WHERE scheduled_on = $1)",
    )
    .bind(funnel_date)
    .execute(&pool)
    .await
    .expect("clear contracts");
    sqlx::query("DELETE FROM appointments WHERE scheduled_on = $1")
        .bind(funnel_date)
        .execute(&pool)
        .await
        .expect("clear appointments");

    // Applicant submits the public form with a resume attached.
    let applicant_email = format!("jordan_{}@example.com", Uuid::new_v4());
    let submit = multipart_body(
        &[
            ("name", "Jordan Pell"),
            ("email", applicant_email.as_str()),
            ("phone", "+49 151 5550 199"),
            ("position_title", "Platform Engineer"),
            ("message", "Looking forward to hearing from you."),
        ],
        Some((
            "resume",
            "resume.pdf",
            "application/pdf",
            b"%PDF-1.4 jordan pell resume",
        )),
    );
    let req = Request::builder()
        .method("POST")
        .uri("/api/public/applications")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(submit))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = body_json(resp).await;
    assert_eq!(body["status"], "new");
    let application_id = Uuid::parse_str(body["id"].as_str().unwrap()).unwrap();

    // Staff routes are closed without a bearer token.
    let req = Request::builder()
        .method("POST")
        .uri(format!("/api/admin/applications/{}/accept", application_id))
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // The unique email makes the search filter deterministic.
    let req = Request::builder()
        .method("GET")
        .uri(format!(
            "/api/admin/applications?search={}",
            applicant_email
        ))
        .header("authorization", auth.clone())
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["id"], json!(application_id.to_string()));

    // Accepting queues the booking invitation.
    let req = Request::builder()
        .method("POST")
        .uri(format!("/api/admin/applications/{}/accept", application_id))
        .header("authorization", auth.clone())
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["status"], "accepted");
    assert!(!body["accepted_at"].is_null());

    let email_body: String = sqlx::query_scalar(
        "SELECT body FROM email_outbox
         WHERE message_type = $1 AND recipient = $2
         ORDER BY created_at DESC LIMIT 1",
    )
    .bind(EMAIL_APPLICATION_ACCEPTED)
    .bind(&applicant_email)
    .fetch_one(&pool)
    .await
    .expect("acceptance email queued");
    let booking_token = token_from_email(&email_body);

    // The emailed link opens the booking flow.
    let req = Request::builder()
        .method("GET")
        .uri(format!("/api/public/booking/{}", booking_token))
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["name"], "Jordan Pell");
    assert!(body["appointment"].is_null());

    let req = Request::builder()
        .method("GET")
        .uri(format!(
            "/api/public/booking/{}/slots?date={}",
            booking_token, funnel_date
        ))
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    let first_open = body["slots"][0]["time"].as_str().unwrap().to_string();
    assert_eq!(first_open, "09:00");

    let req = Request::builder()
        .method("POST")
        .uri(format!("/api/public/booking/{}", booking_token))
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"date": funnel_date.to_string(), "time": first_open}).to_string(),
        ))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = body_json(resp).await;
    assert_eq!(body["status"], "scheduled");
    let appointment_id = Uuid::parse_str(body["id"].as_str().unwrap()).unwrap();

    // The booking shows up in the staff schedule for that day.
    let req = Request::builder()
        .method("GET")
        .uri(format!("/api/admin/appointments?date={}", funnel_date))
        .header("authorization", auth.clone())
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["id"], json!(appointment_id.to_string()));

    // Contract details stay closed until the interview actually happened.
    let early_token = signing::mint(
        signing::PURPOSE_CONTRACT,
        appointment_id,
        Utc::now() + ChronoDuration::hours(2),
        &config.link_token_secret,
    );
    let req = Request::builder()
        .method("GET")
        .uri(format!("/api/public/contract/{}", early_token))
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body = body_json(resp).await;
    assert_eq!(body["error"], "not_completed");

    // Completing the interview queues the contract invitation.
    let req = Request::builder()
        .method("POST")
        .uri(format!("/api/admin/appointments/{}/complete", appointment_id))
        .header("authorization", auth.clone())
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["status"], "completed");

    // The complete button only works once.
    let req = Request::builder()
        .method("POST")
        .uri(format!("/api/admin/appointments/{}/complete", appointment_id))
        .header("authorization", auth.clone())
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body = body_json(resp).await;
    assert!(body["error"]
        .as_str()
        .unwrap_or_default()
        .contains("completed"));

    let req = Request::builder()
        .method("PATCH")
        .uri(format!("/api/admin/appointments/{}/notes", appointment_id))
        .header("authorization", auth.clone())
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"notes": "Strong systems background."}).to_string(),
        ))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["notes"], "Strong systems background.");

    let email_body: String = sqlx::query_scalar(
        "SELECT body FROM email_outbox
         WHERE message_type = $1 AND recipient = $2
         ORDER BY created_at DESC LIMIT 1",
    )
    .bind(EMAIL_CONTRACT_INVITE)
    .bind(&applicant_email)
    .fetch_one(&pool)
    .await
    .expect("contract invite queued");
    let contract_token = token_from_email(&email_body);

    let req = Request::builder()
        .method("GET")
        .uri(format!("/api/public/contract/{}", contract_token))
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["applicant_name"], "Jordan Pell");
    assert_eq!(body["appointment_id"], json!(appointment_id.to_string()));
    assert!(body["contract_status"].is_null());

    // New hire files their employment details with an ID document.
    let contract_fields = [
        ("legal_name", "Jordan Maximilian Pell"),
        ("date_of_birth", "1994-06-15"),
        ("address", "Kastanienallee 12, 10435 Berlin"),
        ("nationality", "German"),
        ("tax_id", "12345678901"),
        ("iban", "DE89370400440532013000"),
        ("bank_name", "Commerzbank"),
    ];
    let submit_contract = multipart_body(
        &contract_fields,
        Some((
            "id_document",
            "passport.pdf",
            "application/pdf",
            b"%PDF-1.4 jordan pell passport",
        )),
    );
    let req = Request::builder()
        .method("POST")
        .uri(format!("/api/public/contract/{}", contract_token))
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(submit_contract))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = body_json(resp).await;
    assert_eq!(body["status"], "submitted");
    assert_eq!(body["legal_name"], "Jordan Maximilian Pell");
    let contract_id = Uuid::parse_str(body["id"].as_str().unwrap()).unwrap();

    // One contract per appointment.
    let duplicate = multipart_body(&contract_fields, None);
    let req = Request::builder()
        .method("POST")
        .uri(format!("/api/public/contract/{}", contract_token))
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(duplicate))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let req = Request::builder()
        .method("GET")
        .uri(format!("/api/public/contract/{}", contract_token))
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    let body = body_json(resp).await;
    assert_eq!(body["contract_status"], "submitted");

    // Staff reviews and approves.
    let req = Request::builder()
        .method("POST")
        .uri(format!("/api/admin/contracts/{}/approve", contract_id))
        .header("authorization", auth.clone())
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"review_note": "All documents verified."}).to_string(),
        ))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["status"], "approved");
    assert_eq!(body["review_note"], "All documents verified.");
    assert_eq!(body["reviewed_by"], json!(admin_id.to_string()));
    assert!(!body["reviewed_at"].is_null());
}
