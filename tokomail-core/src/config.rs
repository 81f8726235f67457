use std::env;

use crate::error::AppError;

/// Runtime configuration loaded from environment variables.
///
/// Required variables fail startup with a descriptive `Config` error; the
/// optional ones fall back to development defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub database_url: String,

    /// Public base URL of this application, used for payment redirects.
    pub app_base_url: String,

    /// Hosted payment gateway.
    pub payment_base_url: String,
    pub payment_project: String,
    pub payment_api_key: String,
    /// Restrict the hosted payment page to QRIS when set.
    pub payment_qris_only: bool,

    /// WhatsApp messaging provider.
    pub whatsapp_api_url: String,
    pub whatsapp_api_key: String,

    /// Admin surface credentials.
    pub admin_password_hash: String,
    pub jwt_secret: String,
}

fn required(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Config(format!("missing environment variable '{}'", name)))
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| AppError::Config("invalid SERVER_PORT".to_string()))?;

        let database_url = required("DATABASE_URL")?;
        let app_base_url = env::var("APP_BASE_URL")
            .unwrap_or_else(|_| format!("http://{}:{}", server_host, server_port));

        let payment_base_url = required("PAYMENT_BASE_URL")?;
        let payment_project = required("PAYMENT_PROJECT")?;
        let payment_api_key = required("PAYMENT_API_KEY")?;
        let payment_qris_only = env::var("PAYMENT_QRIS_ONLY")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let whatsapp_api_url = required("WHATSAPP_API_URL")?;
        let whatsapp_api_key = required("WHATSAPP_API_KEY")?;

        let admin_password_hash = required("ADMIN_PASSWORD_HASH")?;
        let jwt_secret = required("JWT_SECRET")?;

        Ok(Self {
            server_host,
            server_port,
            database_url,
            app_base_url,
            payment_base_url,
            payment_project,
            payment_api_key,
            payment_qris_only,
            whatsapp_api_url,
            whatsapp_api_key,
            admin_password_hash,
            jwt_secret,
        })
    }
}
