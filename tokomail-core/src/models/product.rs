use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// What kind of digital good a product is.
///
/// Gmail products consume credential records from the stock ledger; ebooks
/// carry a static download link. Other types are delivered manually and
/// pass through fulfillment without dedicated handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar")]
pub enum ProductType {
    #[sqlx(rename = "gmail")]
    Gmail,

    #[sqlx(rename = "ebook")]
    Ebook,

    #[sqlx(rename = "app")]
    App,

    #[sqlx(rename = "template")]
    Template,
}

/// Catalog product row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,

    /// Inventory units delivered per package sold.
    pub unit_count: i32,

    pub is_active: bool,
    pub product_type: ProductType,

    /// Download link for ebook-type products.
    pub file_url: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
