pub mod application_service;
pub mod audit_service;
pub mod booking_service;
pub mod contract_service;
pub mod email_service;
