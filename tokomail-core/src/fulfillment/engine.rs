//! The fulfillment engine: allocates stock to a paid order exactly once and
//! drives the buyer notification with an auditable log trail.

use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::fulfillment::message;
use crate::models::{
    AccountStock, NotificationStatus, Order, OrderItemWithProduct, OrderStatus, ProductType,
};
use crate::whatsapp::{self, WhatsappClient};
use crate::{orders, stock};

/// Payment metadata forwarded from a webhook payload.
#[derive(Debug, Clone, Default)]
pub struct PaymentInfo {
    pub payment_method: Option<String>,
    pub amount: Option<Decimal>,
}

/// How a fulfillment run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FulfillmentOutcome {
    /// Stock allocated, buyer notified, order completed.
    Fulfilled { units_allocated: i64 },

    /// The order had already been claimed or completed; nothing was done.
    /// Duplicate webhook deliveries land here.
    AlreadyFulfilled,

    /// Payment arrived but stock ran out. The buyer was notified and the
    /// order cancelled; a retry cannot fix this, only the admin can.
    OutOfStock { required: i64, available: i64 },
}

/// Orchestrates fulfillment for one order at a time.
pub struct FulfillmentEngine {
    pool: PgPool,
    whatsapp: WhatsappClient,
}

impl FulfillmentEngine {
    pub fn new(pool: PgPool, whatsapp: WhatsappClient) -> Self {
        Self { pool, whatsapp }
    }

    /// Fulfill a paid order.
    ///
    /// The `pending -> paid` claim is a conditional update performed before
    /// any inventory work, so concurrent deliveries for the same order
    /// cannot double-spend stock or double-send messages: every claimant
    /// but one sees `AlreadyFulfilled`.
    ///
    /// A notification failure after allocation is reported as an error but
    /// the allocation stays committed; the credentials are reserved for
    /// this order and manual reconciliation re-sends the message.
    pub async fn fulfill(
        &self,
        order_id: Uuid,
        payment: Option<PaymentInfo>,
    ) -> Result<FulfillmentOutcome, AppError> {
        let order = orders::get_order(&self.pool, order_id).await?;

        if !orders::claim_for_fulfillment(&self.pool, order_id).await? {
            let current = orders::get_order(&self.pool, order_id).await?;
            return match current.status {
                OrderStatus::Paid | OrderStatus::Completed => {
                    info!("Order {} already fulfilled, skipping", order_id);
                    Ok(FulfillmentOutcome::AlreadyFulfilled)
                }
                OrderStatus::Cancelled => Err(AppError::Validation(format!(
                    "order {} is cancelled and cannot be fulfilled",
                    order_id
                ))),
                OrderStatus::Pending => Err(AppError::Internal(format!(
                    "order {} claim failed while still pending",
                    order_id
                ))),
            };
        }
        info!("Claimed order {} for fulfillment", order_id);

        let items = orders::get_items_with_product(&self.pool, order_id).await?;
        if items.is_empty() {
            return Err(AppError::Validation(format!(
                "order {} has no items",
                order_id
            )));
        }

        let mut gmail_items: Vec<&OrderItemWithProduct> = Vec::new();
        let mut ebook_items: Vec<&OrderItemWithProduct> = Vec::new();
        for item in &items {
            match item.product_type {
                ProductType::Gmail => gmail_items.push(item),
                ProductType::Ebook => ebook_items.push(item),
                other => {
                    debug!(
                        "order {} item {} has type {:?}, delivered manually",
                        order_id, item.id, other
                    );
                }
            }
        }

        let mut sections: Vec<(&OrderItemWithProduct, Vec<AccountStock>)> = Vec::new();
        let mut units_allocated: i64 = 0;

        if !gmail_items.is_empty() {
            let required: i64 = gmail_items
                .iter()
                .map(|i| i.effective_unit_count as i64)
                .sum();
            let available = stock::count_available(&self.pool).await?;
            if available < required {
                return self.cancel_out_of_stock(&order, required, available).await;
            }

            match self.allocate_all(&gmail_items).await {
                Ok(allocated) => {
                    units_allocated = allocated
                        .iter()
                        .map(|(_, accounts)| accounts.len() as i64)
                        .sum();
                    sections = allocated;
                }
                // The pre-check passed but a concurrent allocator won the
                // rows in between; same policy as a plain shortfall.
                Err(AppError::InsufficientStock {
                    required,
                    available,
                }) => {
                    return self.cancel_out_of_stock(&order, required, available).await;
                }
                Err(e) => return Err(e),
            }
        }

        let text = message::compose_delivery_message(order_id, &sections, &ebook_items);

        let report = self.notify(&order, &text).await?;
        if !report.success {
            // Allocation stays committed: the credentials belong to this
            // order now, only the message needs a manual re-send.
            return Err(AppError::NotificationDelivery(format!(
                "order {}: provider rejected message: {}",
                order_id, report.raw_response
            )));
        }

        let payment_reference = payment.and_then(|p| p.payment_method);
        if let Err(e) = orders::update_status(
            &self.pool,
            order_id,
            OrderStatus::Completed,
            payment_reference.as_deref(),
        )
        .await
        {
            // The buyer already holds the goods; report success and leave
            // the status for manual reconciliation.
            error!(
                "order {} delivered but status update failed: {}",
                order_id, e
            );
        }

        info!(
            "Fulfilled order {} ({} unit(s) allocated)",
            order_id, units_allocated
        );
        Ok(FulfillmentOutcome::Fulfilled { units_allocated })
    }

    /// Allocate contiguous chunks of unused stock to each Gmail item inside
    /// one transaction. Any shortfall rolls the whole allocation back.
    async fn allocate_all<'a>(
        &self,
        gmail_items: &[&'a OrderItemWithProduct],
    ) -> Result<Vec<(&'a OrderItemWithProduct, Vec<AccountStock>)>, AppError> {
        let mut tx = self.pool.begin().await?;
        let mut sections = Vec::with_capacity(gmail_items.len());

        for item in gmail_items {
            match stock::allocate_for_item(&mut tx, item.id, item.effective_unit_count as i64).await
            {
                Ok(accounts) => sections.push((*item, accounts)),
                Err(e) => {
                    tx.rollback().await.ok();
                    return Err(e);
                }
            }
        }

        tx.commit().await?;
        Ok(sections)
    }

    /// Shortfall policy: tell the buyer, cancel the order. Money already
    /// changed hands, so silent failure is not an option.
    async fn cancel_out_of_stock(
        &self,
        order: &Order,
        required: i64,
        available: i64,
    ) -> Result<FulfillmentOutcome, AppError> {
        warn!(
            "order {} needs {} unit(s) but only {} available, cancelling",
            order.id, required, available
        );

        let text = message::compose_out_of_stock_message(order.id);
        if let Err(e) = self.notify(order, &text).await {
            // The cancel must still happen even if the notice cannot be
            // logged or sent.
            error!("order {}: shortfall notice failed: {}", order.id, e);
        }

        orders::update_status(&self.pool, order.id, OrderStatus::Cancelled, None).await?;
        Ok(FulfillmentOutcome::OutOfStock {
            required,
            available,
        })
    }

    /// Log, send, and resolve the log entry for one outbound message.
    async fn notify(&self, order: &Order, text: &str) -> Result<whatsapp::SendReport, AppError> {
        let to_number = whatsapp::normalize_phone(&order.buyer_phone);
        let log_id = whatsapp::insert_log(&self.pool, order.id, &to_number, text).await?;

        let report = self.whatsapp.send(&order.buyer_phone, text).await;

        let status = if report.success {
            NotificationStatus::Sent
        } else {
            NotificationStatus::Failed
        };
        whatsapp::finish_log(&self.pool, log_id, status, &report.raw_response).await?;

        Ok(report)
    }
}
