pub mod crypto;
pub mod signing;
pub mod time;
pub mod uploads;
