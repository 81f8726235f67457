//! Composition of the delivery messages sent to buyers over WhatsApp.
//!
//! Pure string building so every message shape is unit-testable without a
//! database or provider.

use tracing::warn;
use uuid::Uuid;

use crate::models::{AccountStock, OrderItemWithProduct};

/// Fallback line for ebooks whose download link was never uploaded.
const EBOOK_LINK_FALLBACK: &str = "The download link will be sent to your email shortly.";

/// Compose the delivery message for a fulfilled order: header, credential
/// blocks per Gmail item, a security reminder when any credentials were
/// delivered, and one section per ebook item.
pub fn compose_delivery_message(
    order_id: Uuid,
    gmail: &[(&OrderItemWithProduct, Vec<AccountStock>)],
    ebooks: &[&OrderItemWithProduct],
) -> String {
    let mut message = String::new();
    message.push_str("Thank you for your purchase!\n");
    message.push_str(&format!("Order ID: {}\n", order_id));

    for (item, accounts) in gmail {
        message.push_str(&format!(
            "\n{} x{} ({} account(s)):\n",
            item.product_name, item.quantity, item.effective_unit_count
        ));
        for account in accounts {
            message.push_str(&format!("{} | {}\n", account.username, account.password));
        }
    }

    if !gmail.is_empty() {
        message.push_str(
            "\nIMPORTANT: sign in as soon as possible and change each password. \
             Accounts are delivered once and are not replaced after the password changes hands.\n",
        );
    }

    for item in ebooks {
        message.push_str(&format!("\n{} x{}\n", item.product_name, item.quantity));
        match item.file_url.as_deref() {
            Some(url) => message.push_str(&format!("Download: {}\n", url)),
            None => {
                warn!(
                    "ebook item {} ({}) has no file_url, sending fallback notice",
                    item.id, item.product_name
                );
                message.push_str(EBOOK_LINK_FALLBACK);
                message.push('\n');
            }
        }
    }

    message
}

/// Message sent when payment arrived but stock ran out before allocation.
pub fn compose_out_of_stock_message(order_id: Uuid) -> String {
    format!(
        "We are sorry: your payment for order {} was received, but the item \
         is currently out of stock. Please contact the admin for a refund or \
         replacement.",
        order_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProductType;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn item(name: &str, product_type: ProductType, file_url: Option<&str>) -> OrderItemWithProduct {
        OrderItemWithProduct {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            quantity: 2,
            effective_unit_count: 2,
            unit_price: Decimal::from(10_000),
            total_price: Decimal::from(20_000),
            product_name: name.to_string(),
            product_type,
            file_url: file_url.map(String::from),
        }
    }

    fn account(username: &str) -> AccountStock {
        AccountStock {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password: "hunter2".to_string(),
            is_used: true,
            assigned_order_item_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn includes_credentials_and_security_reminder() {
        let gmail_item = item("Gmail Fresh", ProductType::Gmail, None);
        let accounts = vec![account("a@gmail.com"), account("b@gmail.com")];
        let order_id = Uuid::new_v4();

        let message = compose_delivery_message(order_id, &[(&gmail_item, accounts)], &[]);

        assert!(message.contains(&format!("Order ID: {}", order_id)));
        assert!(message.contains("a@gmail.com | hunter2"));
        assert!(message.contains("b@gmail.com | hunter2"));
        assert!(message.contains("IMPORTANT"));
    }

    #[test]
    fn ebook_with_link_gets_download_line() {
        let ebook = item("Rust Book", ProductType::Ebook, Some("https://cdn.example.com/rust.pdf"));
        let message = compose_delivery_message(Uuid::new_v4(), &[], &[&ebook]);

        assert!(message.contains("Rust Book x2"));
        assert!(message.contains("Download: https://cdn.example.com/rust.pdf"));
        // No credentials were delivered, so no reminder block.
        assert!(!message.contains("IMPORTANT"));
    }

    #[test]
    fn ebook_without_link_gets_fallback_notice() {
        let ebook = item("Lost Book", ProductType::Ebook, None);
        let message = compose_delivery_message(Uuid::new_v4(), &[], &[&ebook]);
        assert!(message.contains(EBOOK_LINK_FALLBACK));
    }

    #[test]
    fn out_of_stock_message_names_the_order() {
        let order_id = Uuid::new_v4();
        let message = compose_out_of_stock_message(order_id);
        assert!(message.contains(&order_id.to_string()));
        assert!(message.contains("out of stock"));
    }
}
