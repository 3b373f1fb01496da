pub mod admin_dto;
pub mod application_dto;
pub mod booking_dto;
pub mod contract_dto;
