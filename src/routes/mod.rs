pub mod admin_routes;
pub mod application_routes;
pub mod booking_routes;
pub mod contract_routes;
pub mod health;
