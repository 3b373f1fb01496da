use std::env;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    routing::get,
    Router,
};
use chrono::{Datelike, Duration as ChronoDuration, NaiveDate, Utc, Weekday};
use serde_json::{json, Value as JsonValue};
use tower::ServiceExt;
use uuid::Uuid;

use onboarding_backend::utils::signing::{self, PURPOSE_BOOKING, PURPOSE_CONTRACT};

fn next_weekday(days_ahead: i64) -> NaiveDate {
    let mut date = Utc::now().date_naive() + ChronoDuration::days(days_ahead);
    while matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
        date += ChronoDuration::days(1);
    }
    date
}

async fn seed_application(pool: &sqlx::PgPool, name: &str, status: &str) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO applications (id, name, email, phone, position_title, status, accepted_at)
         VALUES ($1, $2, $3, $4, $5, $6, CASE WHEN $6 = 'accepted' THEN NOW() END)",
    )
    .bind(id)
    .bind(name)
    .bind(format!("applicant_{}@example.com", id))
    .bind("+49 30 555 0101")
    .bind("Backend Engineer")
    .bind(status)
    .execute(pool)
    .await
    .expect("seed application");
    id
}

async fn clear_date(pool: &sqlx::PgPool, date: NaiveDate) {
    sqlx::query(
        "DELETE FROM employment_contracts WHERE appointment_id IN
             (SELECT id FROM appointments WHERE scheduled_on = $1)",
    )
    .bind(date)
    .execute(pool)
    .await
    .expect("clear contracts");
    sqlx::query("DELETE FROM appointments WHERE scheduled_on = $1")
        .bind(date)
        .execute(pool)
        .await
        .expect("clear appointments");
}

async fn body_json(resp: axum::response::Response) -> JsonValue {
    let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn booking_api_end_to_end() {
    dotenvy::dotenv().ok();
    let Ok(_) = env::var("DATABASE_URL") else {
        eprintln!("skipping booking_api_end_to_end: DATABASE_URL is not set");
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

    onboarding_backend::config::init_config().expect("init config");
    let config = onboarding_backend::config::get_config();

    let pool = onboarding_backend::database::pool::create_pool()
        .await
        .expect("pool");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");

    let app_state = onboarding_backend::AppState::new(pool.clone());
    let app = Router::new()
        .route(
            "/api/public/booking/:token",
            get(onboarding_backend::routes::booking_routes::get_booking_context)
                .post(onboarding_backend::routes::booking_routes::book_slot),
        )
        .route(
            "/api/public/booking/:token/slots",
            get(onboarding_backend::routes::booking_routes::get_day_availability),
        )
        .layer(axum::middleware::from_fn_with_state(
            onboarding_backend::middleware::rate_limit::new_rps_state(100),
            onboarding_backend::middleware::rate_limit::rps_middleware,
        ))
        .with_state(app_state.clone());

    let first_date = next_weekday(7);
    let second_date = next_weekday(14);
    clear_date(&pool, first_date).await;
    clear_date(&pool, second_date).await;

    let application_id = seed_application(&pool, "Avery Blake", "accepted").await;
    let token = signing::mint(
        PURPOSE_BOOKING,
        application_id,
        Utc::now() + ChronoDuration::hours(2),
        &config.link_token_secret,
    );

    // Garbage tokens never reach application data.
    let req = Request::builder()
        .method("GET")
        .uri(format!("/api/public/booking/not-a-token/slots?date={}", first_date))
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body = body_json(resp).await;
    assert_eq!(body["error"], "invalid_token");

    // An expired signature is rejected with its own code so the client can
    // offer to request a fresh link.
    let expired = signing::mint(
        PURPOSE_BOOKING,
        application_id,
        Utc::now() - ChronoDuration::hours(1),
        &config.link_token_secret,
    );
    let req = Request::builder()
        .method("GET")
        .uri(format!("/api/public/booking/{}", expired))
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body = body_json(resp).await;
    assert_eq!(body["error"], "token_expired");

    // A contract-purpose token must not open the booking flow.
    let wrong_purpose = signing::mint(
        PURPOSE_CONTRACT,
        application_id,
        Utc::now() + ChronoDuration::hours(2),
        &config.link_token_secret,
    );
    let req = Request::builder()
        .method("GET")
        .uri(format!("/api/public/booking/{}", wrong_purpose))
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body = body_json(resp).await;
    assert_eq!(body["error"], "invalid_token");

    // A valid token for a not-yet-accepted application is forbidden.
    let new_application_id = seed_application(&pool, "Pending Person", "new").await;
    let new_token = signing::mint(
        PURPOSE_BOOKING,
        new_application_id,
        Utc::now() + ChronoDuration::hours(2),
        &config.link_token_secret,
    );
    let req = Request::builder()
        .method("GET")
        .uri(format!("/api/public/booking/{}", new_token))
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    // Booking context before any booking.
    let req = Request::builder()
        .method("GET")
        .uri(format!("/api/public/booking/{}", token))
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["name"], "Avery Blake");
    assert_eq!(body["position_title"], "Backend Engineer");
    assert!(body["appointment"].is_null());

    // Availability requires an explicit date.
    let req = Request::builder()
        .method("GET")
        .uri(format!("/api/public/booking/{}/slots", token))
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // Weekends and past days are not offered.
    let mut saturday = Utc::now().date_naive() + ChronoDuration::days(1);
    while saturday.weekday() != Weekday::Sat {
        saturday += ChronoDuration::days(1);
    }
    let req = Request::builder()
        .method("GET")
        .uri(format!("/api/public/booking/{}/slots?date={}", token, saturday))
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let yesterday = Utc::now().date_naive() - ChronoDuration::days(1);
    let req = Request::builder()
        .method("GET")
        .uri(format!("/api/public/booking/{}/slots?date={}", token, yesterday))
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // A clean future weekday offers the whole catalog.
    let req = Request::builder()
        .method("GET")
        .uri(format!("/api/public/booking/{}/slots?date={}", token, first_date))
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["date"], json!(first_date.to_string()));
    let slots = body["slots"].as_array().unwrap();
    assert_eq!(slots.len(), 17);
    assert_eq!(slots[0]["time"], "09:00");
    assert_eq!(slots[16]["time"], "17:00");
    assert!(slots.iter().all(|s| s["available"] == json!(true)));
    assert!(slots.iter().all(|s| s.get("reason").is_none()));

    // Off-grid times are rejected before touching the database.
    let req = Request::builder()
        .method("POST")
        .uri(format!("/api/public/booking/{}", token))
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"date": first_date.to_string(), "time": "10:15"}).to_string(),
        ))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // Book a real slot.
    let req = Request::builder()
        .method("POST")
        .uri(format!("/api/public/booking/{}", token))
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"date": first_date.to_string(), "time": "10:00"}).to_string(),
        ))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = body_json(resp).await;
    assert_eq!(body["scheduled_on"], json!(first_date.to_string()));
    assert_eq!(body["slot_time"], "10:00:00");
    assert_eq!(body["status"], "scheduled");
    assert_eq!(
        body["application_id"],
        json!(application_id.to_string())
    );

    // The context now carries the live appointment.
    let req = Request::builder()
        .method("GET")
        .uri(format!("/api/public/booking/{}", token))
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["appointment"]["slot_time"], "10:00:00");

    // One live booking per application.
    let req = Request::builder()
        .method("POST")
        .uri(format!("/api/public/booking/{}", token))
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"date": first_date.to_string(), "time": "11:00"}).to_string(),
        ))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    // The taken slot shows up as booked, its neighbors stay open.
    let req = Request::builder()
        .method("GET")
        .uri(format!("/api/public/booking/{}/slots?date={}", token, first_date))
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    let body = body_json(resp).await;
    let slots = body["slots"].as_array().unwrap();
    let ten = slots.iter().find(|s| s["time"] == "10:00").unwrap();
    assert_eq!(ten["available"], json!(false));
    assert_eq!(ten["reason"], "booked");
    let ten_thirty = slots.iter().find(|s| s["time"] == "10:30").unwrap();
    assert_eq!(ten_thirty["available"], json!(true));

    // Two applicants race for the same slot. Exactly one wins, the loser
    // gets a machine-readable slot_taken conflict.
    let racer_a = seed_application(&pool, "Racer A", "accepted").await;
    let racer_b = seed_application(&pool, "Racer B", "accepted").await;
    let token_a = signing::mint(
        PURPOSE_BOOKING,
        racer_a,
        Utc::now() + ChronoDuration::hours(2),
        &config.link_token_secret,
    );
    let token_b = signing::mint(
        PURPOSE_BOOKING,
        racer_b,
        Utc::now() + ChronoDuration::hours(2),
        &config.link_token_secret,
    );
    let race_body = json!({"date": second_date.to_string(), "time": "10:00"}).to_string();
    let req_a = Request::builder()
        .method("POST")
        .uri(format!("/api/public/booking/{}", token_a))
        .header("content-type", "application/json")
        .body(Body::from(race_body.clone()))
        .unwrap();
    let req_b = Request::builder()
        .method("POST")
        .uri(format!("/api/public/booking/{}", token_b))
        .header("content-type", "application/json")
        .body(Body::from(race_body))
        .unwrap();
    let (resp_a, resp_b) = tokio::join!(app.clone().oneshot(req_a), app.clone().oneshot(req_b));
    let resp_a = resp_a.unwrap();
    let resp_b = resp_b.unwrap();
    let statuses = [resp_a.status(), resp_b.status()];
    assert!(statuses.contains(&StatusCode::CREATED), "statuses: {:?}", statuses);
    assert!(statuses.contains(&StatusCode::CONFLICT), "statuses: {:?}", statuses);
    let (winner, loser) = if resp_a.status() == StatusCode::CREATED {
        (resp_a, resp_b)
    } else {
        (resp_b, resp_a)
    };
    let loser_body = body_json(loser).await;
    assert_eq!(loser_body["error"], "slot_taken");
    let winner_body = body_json(winner).await;
    let winner_appointment =
        Uuid::parse_str(winner_body["id"].as_str().unwrap()).unwrap();
    let winner_application =
        Uuid::parse_str(winner_body["application_id"].as_str().unwrap()).unwrap();
    let loser_token = if winner_application == racer_a {
        &token_b
    } else {
        &token_a
    };

    // Cancelling releases the slot for rebooking, and only works once.
    app_state
        .booking_service
        .cancel(winner_appointment)
        .await
        .expect("cancel");
    let second_cancel = app_state.booking_service.cancel(winner_appointment).await;
    assert!(matches!(
        second_cancel,
        Err(onboarding_backend::error::Error::Conflict(_))
    ));
    let req = Request::builder()
        .method("GET")
        .uri(format!(
            "/api/public/booking/{}/slots?date={}",
            loser_token, second_date
        ))
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    let body = body_json(resp).await;
    let slots = body["slots"].as_array().unwrap();
    let ten = slots.iter().find(|s| s["time"] == "10:00").unwrap();
    assert_eq!(ten["available"], json!(true));

    let req = Request::builder()
        .method("POST")
        .uri(format!("/api/public/booking/{}", loser_token))
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"date": second_date.to_string(), "time": "10:00"}).to_string(),
        ))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
}
