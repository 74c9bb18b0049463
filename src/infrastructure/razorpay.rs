//! Razorpay orders API client.
//!
//! Only `POST /v1/orders` is used: it mints the provider order the checkout
//! widget pays against. Responses are decoded into tagged success/error shapes
//! and validated before anything leaves this module.

use std::collections::HashMap;

use async_trait::async_trait;
use log::{debug, error, warn};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::config::GatewayConfig;
use crate::domain::gateway::{GatewayError, GatewayOrder, GatewayOrderRequest, PaymentGateway};
use crate::secret::Secret;

#[derive(Debug, Serialize)]
struct CreateOrderBody<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
    notes: &'a HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ProviderOrder {
    id: String,
    amount: i64,
    currency: String,
}

#[derive(Debug, Default, Deserialize)]
struct ProviderErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorEnvelope {
    #[serde(default)]
    error: ProviderErrorBody,
}

#[derive(Clone)]
pub struct RazorpayGateway {
    http: Client,
    api_url: String,
    key_id: String,
    key_secret: Secret<String>,
}

impl RazorpayGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Configuration(format!("could not build HTTP client: {e}")))?;
        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
        })
    }

    fn classify_failure(status: StatusCode, body: ProviderErrorBody) -> GatewayError {
        let code = body.code.unwrap_or_else(|| status.as_u16().to_string());
        let message = body
            .description
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                error!("💳️ Gateway refused our credentials: {message}");
                GatewayError::Configuration(message)
            }
            StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => GatewayError::Transient(message),
            s if s.is_server_error() => GatewayError::Transient(message),
            _ => GatewayError::Rejected { code, message },
        }
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    fn key_id(&self) -> &str {
        &self.key_id
    }

    async fn create_order(&self, request: &GatewayOrderRequest) -> Result<GatewayOrder, GatewayError> {
        let url = format!("{}/v1/orders", self.api_url);
        debug!("💳️ Creating gateway order for {} {} ({})", request.amount, request.currency, request.receipt);

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.key_id, Some(self.key_secret.reveal()))
            .json(&CreateOrderBody {
                amount: request.amount,
                currency: &request.currency,
                receipt: &request.receipt,
                notes: &request.notes,
            })
            .send()
            .await
            .map_err(|e| {
                warn!("💳️ Gateway unreachable: {e}");
                GatewayError::Transient(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .json::<ProviderErrorEnvelope>()
                .await
                .map(|envelope| envelope.error)
                .unwrap_or_default();
            return Err(Self::classify_failure(status, body));
        }

        let order = response
            .json::<ProviderOrder>()
            .await
            .map_err(|e| GatewayError::Transient(format!("unreadable gateway response: {e}")))?;

        if order.id.trim().is_empty() {
            return Err(GatewayError::Transient("gateway returned an order without an id".to_string()));
        }
        if order.amount != request.amount || !order.currency.eq_ignore_ascii_case(&request.currency) {
            return Err(GatewayError::Rejected {
                code: "AMOUNT_MISMATCH".to_string(),
                message: format!(
                    "gateway order {} is for {} {}, expected {} {}",
                    order.id, order.amount, order.currency, request.amount, request.currency
                ),
            });
        }

        Ok(GatewayOrder {
            gateway_order_id: order.id,
            amount: order.amount,
            currency: order.currency,
            key_id: self.key_id.clone(),
        })
    }
}
