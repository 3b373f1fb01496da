pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use crate::services::{
    application_service::ApplicationService, booking_service::BookingService,
    contract_service::ContractService, email_service::EmailService,
};
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub application_service: ApplicationService,
    pub booking_service: BookingService,
    pub contract_service: ContractService,
    pub email_service: EmailService,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        let application_service = ApplicationService::new(pool.clone());
        let booking_service = BookingService::new(pool.clone());
        let contract_service = ContractService::new(pool.clone());
        let email_service = EmailService::new(pool.clone());

        Self {
            pool,
            application_service,
            booking_service,
            contract_service,
            email_service,
        }
    }
}
