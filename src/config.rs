use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;
use url::Url;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    pub jwt_secret: String,
    pub link_token_secret: String,
    pub email_api_url: String,
    pub email_api_key: String,
    pub public_base_url: String,
    pub public_rps: u32,
    pub admin_rps: u32,
    pub booking_token_ttl_hours: i64,
    pub contract_token_ttl_hours: i64,
    pub business_utc_offset_minutes: i32,
    pub seed_admin_email: Option<String>,
    pub seed_admin_password: Option<String>,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let config = Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: get_env("DATABASE_URL")?,
            jwt_secret: get_env("JWT_SECRET")?,
            link_token_secret: get_env("LINK_TOKEN_SECRET")?,
            email_api_url: get_env("EMAIL_API_URL")?,
            email_api_key: get_env("EMAIL_API_KEY")?,
            public_base_url: get_env("PUBLIC_BASE_URL")?,
            public_rps: get_env_parse("PUBLIC_RPS")?,
            admin_rps: get_env_parse("ADMIN_RPS")?,
            booking_token_ttl_hours: get_env_parse("BOOKING_TOKEN_TTL_HOURS")?,
            contract_token_ttl_hours: get_env_parse("CONTRACT_TOKEN_TTL_HOURS")?,
            business_utc_offset_minutes: get_env_parse("BUSINESS_UTC_OFFSET_MINUTES")?,
            seed_admin_email: env::var("SEED_ADMIN_EMAIL").ok(),
            seed_admin_password: env::var("SEED_ADMIN_PASSWORD").ok(),
        };

        // Fail at startup, not at first send, when the outbound endpoints are
        // malformed.
        Url::parse(&config.email_api_url)
            .map_err(|e| Error::Config(format!("Invalid EMAIL_API_URL: {}", e)))?;
        Url::parse(&config.public_base_url)
            .map_err(|e| Error::Config(format!("Invalid PUBLIC_BASE_URL: {}", e)))?;

        Ok(config)
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_parse<T>(name: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get_env(name)?;
    raw.parse()
        .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e)))
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}
