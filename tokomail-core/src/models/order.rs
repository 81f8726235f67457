use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

/// Order lifecycle status.
///
/// Transitions are monotonic forward: `pending -> paid -> completed`, with
/// an error branch from `pending` or `paid` to `cancelled`. `completed` and
/// `cancelled` are terminal; an order is never re-fulfilled once it has left
/// `pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar")]
pub enum OrderStatus {
    #[sqlx(rename = "pending")]
    Pending,

    #[sqlx(rename = "paid")]
    Paid,

    #[sqlx(rename = "completed")]
    Completed,

    #[sqlx(rename = "cancelled")]
    Cancelled,
}

impl OrderStatus {
    /// Whether the order can still change state.
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Whether a transition to `next` is allowed by the lifecycle.
    pub fn can_transition(self, next: OrderStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Paid)
                | (OrderStatus::Pending, OrderStatus::Cancelled)
                | (OrderStatus::Paid, OrderStatus::Completed)
                | (OrderStatus::Paid, OrderStatus::Cancelled)
        )
    }

    /// The statuses allowed to transition into `next`. Storage-layer updates
    /// use this as a guard so an illegal transition never reaches a row.
    pub fn sources_of(next: OrderStatus) -> Vec<OrderStatus> {
        [
            OrderStatus::Pending,
            OrderStatus::Paid,
            OrderStatus::Completed,
            OrderStatus::Cancelled,
        ]
        .into_iter()
        .filter(|s| s.can_transition(next))
        .collect()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "pending"),
            OrderStatus::Paid => write!(f, "paid"),
            OrderStatus::Completed => write!(f, "completed"),
            OrderStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Order row: one purchase by one buyer.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub buyer_email: String,
    pub buyer_phone: String,
    pub status: OrderStatus,

    /// Payment method or gateway reference, stamped at fulfillment.
    pub payment_reference: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One line of an order, with price and quantity snapshotted at order time
/// so later catalog price changes never affect past orders.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,

    /// Number of packages purchased.
    pub quantity: i32,

    /// quantity x the product's units-per-package; the actual number of
    /// inventory records this line consumes.
    pub effective_unit_count: i32,

    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Order item joined with the product columns the fulfillment engine
/// branches on. Keeping the join strongly typed avoids poking at untyped
/// nested rows at the data-access boundary.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderItemWithProduct {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub effective_unit_count: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub product_name: String,
    pub product_type: super::product::ProductType,
    pub file_url: Option<String>,
}

/// One requested line in an order-create call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// Order creation request body. The storefront speaks camelCase.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub buyer_email: String,
    pub buyer_phone: String,
    pub items: Vec<OrderLineRequest>,
}

/// Order creation response: the new order plus the hosted payment redirect.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub success: bool,
    pub order_id: Uuid,
    pub total_units: i64,
    pub grand_total: Decimal,
    pub payment_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_can_be_paid_or_cancelled() {
        assert!(OrderStatus::Pending.can_transition(OrderStatus::Paid));
        assert!(OrderStatus::Pending.can_transition(OrderStatus::Cancelled));
        assert!(!OrderStatus::Pending.can_transition(OrderStatus::Completed));
    }

    #[test]
    fn paid_can_complete_or_cancel() {
        assert!(OrderStatus::Paid.can_transition(OrderStatus::Completed));
        assert!(OrderStatus::Paid.can_transition(OrderStatus::Cancelled));
        assert!(!OrderStatus::Paid.can_transition(OrderStatus::Pending));
    }

    #[test]
    fn terminal_states_accept_nothing() {
        for next in [
            OrderStatus::Pending,
            OrderStatus::Paid,
            OrderStatus::Completed,
            OrderStatus::Cancelled,
        ] {
            assert!(!OrderStatus::Completed.can_transition(next));
            assert!(!OrderStatus::Cancelled.can_transition(next));
        }
        assert!(OrderStatus::Completed.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(!OrderStatus::Paid.is_terminal());
    }
}
