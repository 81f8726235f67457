//! TokoMail core: a digital-goods storefront backend selling
//! pre-provisioned Gmail credentials and e-books, with hosted-gateway
//! payments and WhatsApp delivery.

use std::sync::Arc;

use sqlx::PgPool;

pub mod admin;
pub mod auth;
pub mod checkout;
pub mod config;
pub mod db;
pub mod error;
pub mod fulfillment;
pub mod models;
pub mod orders;
pub mod payment;
pub mod stock;
pub mod webhooks;
pub mod whatsapp;

pub use config::Config;
pub use error::AppError;
pub use fulfillment::FulfillmentEngine;

/// Shared state handed to every route handler.
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL connection pool
    pub db: PgPool,
    pub config: Arc<Config>,
    pub engine: Arc<FulfillmentEngine>,
    pub gateway: payment::PaymentGateway,
}
