//! Hosted payment gateway integration: redirect URL construction and the
//! transaction-detail status query.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use url::Url;
use uuid::Uuid;

use crate::config::Config;
use crate::error::AppError;

/// Build the hosted payment page URL for an order.
///
/// Shape: `{base}/pay/{project}/{amount}?order_id=..&redirect=..[&qris_only=1]`
/// where the redirect points back at this app's thank-you page. The gateway
/// only accepts integer amounts, so the grand total is rounded.
pub fn build_payment_url(
    config: &Config,
    order_id: Uuid,
    amount: Decimal,
) -> Result<String, AppError> {
    let amount_int = amount
        .round()
        .to_i64()
        .ok_or_else(|| AppError::Gateway(format!("amount {} not representable", amount)))?;

    let mut redirect = Url::parse(&config.app_base_url)
        .map_err(|e| AppError::Config(format!("invalid APP_BASE_URL: {}", e)))?;
    redirect.set_path("/thank-you");
    redirect
        .query_pairs_mut()
        .append_pair("order_id", &order_id.to_string())
        .append_pair("amount", &amount_int.to_string());

    let mut pay_url = Url::parse(&format!(
        "{}/pay/{}/{}",
        config.payment_base_url.trim_end_matches('/'),
        config.payment_project,
        amount_int
    ))
    .map_err(|e| AppError::Config(format!("invalid PAYMENT_BASE_URL: {}", e)))?;
    pay_url
        .query_pairs_mut()
        .append_pair("order_id", &order_id.to_string())
        .append_pair("redirect", redirect.as_str());
    if config.payment_qris_only {
        pay_url.query_pairs_mut().append_pair("qris_only", "1");
    }

    Ok(pay_url.into())
}

/// Client for the gateway's transaction-detail endpoint.
#[derive(Clone)]
pub struct PaymentGateway {
    http: reqwest::Client,
    base_url: String,
    project: String,
    api_key: String,
}

impl PaymentGateway {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.payment_base_url.trim_end_matches('/').to_string(),
            project: config.payment_project.clone(),
            api_key: config.payment_api_key.clone(),
        }
    }

    /// Query the gateway for the current state of an order's transaction.
    ///
    /// The thank-you page polls this; the response is passed through as-is
    /// since the gateway owns its own schema.
    pub async fn transaction_detail(
        &self,
        order_id: Uuid,
        amount: Decimal,
    ) -> Result<serde_json::Value, AppError> {
        let amount_int = amount
            .round()
            .to_i64()
            .ok_or_else(|| AppError::Gateway(format!("amount {} not representable", amount)))?;

        let response = self
            .http
            .get(format!("{}/api/transaction-detail", self.base_url))
            .query(&[
                ("project", self.project.clone()),
                ("amount", amount_int.to_string()),
                ("order_id", order_id.to_string()),
                ("api_key", self.api_key.clone()),
            ])
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("transaction-detail request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Gateway(format!(
                "transaction-detail returned {}",
                response.status()
            )));
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| AppError::Gateway(format!("invalid transaction-detail body: {}", e)))
    }
}
