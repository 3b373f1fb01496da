use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
    Router,
};
use onboarding_backend::{
    config::{get_config, init_config},
    database::pool::create_pool,
    routes, AppState,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    init_config()?;
    let config = get_config();

    let pool = create_pool().await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let app_state = AppState::new(pool);

    seed_admin_user(&app_state).await?;

    {
        let state = app_state.clone();
        tokio::spawn(async move {
            loop {
                match state.email_service.run_once().await {
                    Ok(true) => {}
                    Ok(false) => {
                        tokio::time::sleep(Duration::from_millis(1000)).await;
                    }
                    Err(e) => {
                        tracing::error!(error = ?e, "Email outbox worker error");
                        tokio::time::sleep(Duration::from_secs(2)).await;
                    }
                }
            }
        });
    }

    let base_routes = Router::new().route("/health", get(routes::health::health));

    let public_api = Router::new()
        .route(
            "/api/public/applications",
            post(routes::application_routes::submit_application),
        )
        .route(
            "/api/public/booking/:token",
            get(routes::booking_routes::get_booking_context)
                .post(routes::booking_routes::book_slot),
        )
        .route(
            "/api/public/booking/:token/slots",
            get(routes::booking_routes::get_day_availability),
        )
        .route(
            "/api/public/contract/:token",
            get(routes::contract_routes::get_contract_context)
                .post(routes::contract_routes::submit_contract),
        )
        .layer(axum::middleware::from_fn_with_state(
            onboarding_backend::middleware::rate_limit::new_rps_state(config.public_rps),
            onboarding_backend::middleware::rate_limit::rps_middleware,
        ));

    let admin_auth_api = Router::new()
        .route(
            "/api/admin/auth/login",
            post(routes::admin_routes::login),
        )
        .layer(axum::middleware::from_fn_with_state(
            onboarding_backend::middleware::rate_limit::new_rps_state(config.admin_rps),
            onboarding_backend::middleware::rate_limit::rps_middleware,
        ));

    let admin_api = Router::new()
        .route(
            "/api/admin/applications",
            get(routes::admin_routes::list_applications),
        )
        .route(
            "/api/admin/applications/:id",
            get(routes::admin_routes::get_application),
        )
        .route(
            "/api/admin/applications/:id/accept",
            post(routes::admin_routes::accept_application),
        )
        .route(
            "/api/admin/applications/:id/reject",
            post(routes::admin_routes::reject_application),
        )
        .route(
            "/api/admin/appointments",
            get(routes::admin_routes::list_appointments),
        )
        .route(
            "/api/admin/appointments/:id/complete",
            post(routes::admin_routes::complete_appointment),
        )
        .route(
            "/api/admin/appointments/:id/cancel",
            post(routes::admin_routes::cancel_appointment),
        )
        .route(
            "/api/admin/appointments/:id/notes",
            patch(routes::admin_routes::update_appointment_notes),
        )
        .route(
            "/api/admin/contracts",
            get(routes::admin_routes::list_contracts),
        )
        .route(
            "/api/admin/contracts/:id",
            get(routes::admin_routes::get_contract),
        )
        .route(
            "/api/admin/contracts/:id/approve",
            post(routes::admin_routes::approve_contract),
        )
        .route(
            "/api/admin/contracts/:id/reject",
            post(routes::admin_routes::reject_contract),
        )
        .route(
            "/api/admin/outbox",
            get(routes::admin_routes::list_outbox),
        )
        .route(
            "/api/admin/outbox/:id/retry",
            post(routes::admin_routes::retry_outbox_email),
        )
        .route(
            "/api/admin/dashboard/stats",
            get(routes::admin_routes::get_dashboard_stats),
        )
        .layer(axum::middleware::from_fn(
            onboarding_backend::middleware::auth::require_staff,
        ))
        .layer(axum::middleware::from_fn_with_state(
            onboarding_backend::middleware::rate_limit::new_rps_state(config.admin_rps),
            onboarding_backend::middleware::rate_limit::rps_middleware,
        ));

    // Sender identity is admin-only; regular staff never touch it.
    let admin_settings_api = Router::new()
        .route(
            "/api/admin/email-settings",
            get(routes::admin_routes::get_email_settings)
                .put(routes::admin_routes::update_email_settings),
        )
        .layer(axum::middleware::from_fn(
            onboarding_backend::middleware::auth::require_admin,
        ))
        .layer(axum::middleware::from_fn_with_state(
            onboarding_backend::middleware::rate_limit::new_rps_state(config.admin_rps),
            onboarding_backend::middleware::rate_limit::rps_middleware,
        ));

    let upload_path = std::env::var("UPLOADS_DIR").unwrap_or_else(|_| "./uploads".to_string());
    info!("Serving uploads from: {}", upload_path);

    let app = base_routes
        .merge(public_api)
        .merge(admin_auth_api)
        .merge(admin_api)
        .merge(admin_settings_api)
        .nest_service("/uploads", tower_http::services::ServeDir::new(upload_path))
        .with_state(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024));

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Creates the bootstrap admin account when SEED_ADMIN_EMAIL and
/// SEED_ADMIN_PASSWORD are set. Re-running is a no-op.
async fn seed_admin_user(state: &AppState) -> anyhow::Result<()> {
    let config = get_config();
    let (Some(email), Some(password)) = (
        config.seed_admin_email.clone(),
        config.seed_admin_password.clone(),
    ) else {
        return Ok(());
    };

    let password_hash = onboarding_backend::utils::crypto::hash_password(&password)?;
    sqlx::query(
        "INSERT INTO users (name, email, role, password_hash, is_active)
         VALUES ($1, $2, $3, $4, TRUE)
         ON CONFLICT (email) DO NOTHING",
    )
    .bind("Administrator")
    .bind(&email)
    .bind(onboarding_backend::models::user::ROLE_ADMIN)
    .bind(&password_hash)
    .execute(&state.pool)
    .await?;
    info!("Ensured admin account for {}", email);
    Ok(())
}
