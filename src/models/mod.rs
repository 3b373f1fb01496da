pub mod application;
pub mod appointment;
pub mod audit_log;
pub mod contract;
pub mod email_outbox;
pub mod email_settings;
pub mod user;
