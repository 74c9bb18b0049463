use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

/// Request to mint a provider-side order for a checkout.
#[derive(Debug, Clone)]
pub struct GatewayOrderRequest {
    /// Amount in minor units (paise).
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
    pub notes: HashMap<String, String>,
}

/// A provider order that passed boundary validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayOrder {
    pub gateway_order_id: String,
    pub amount: i64,
    pub currency: String,
    pub key_id: String,
}

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Credentials are missing or were refused by the provider.
    #[error("Payment gateway configuration error: {0}")]
    Configuration(String),
    /// The provider understood the request and declined it.
    #[error("Payment gateway rejected the request ({code}): {message}")]
    Rejected { code: String, message: String },
    /// Network failure, timeout or provider outage. Safe to retry with the same receipt.
    #[error("Payment gateway unavailable: {0}")]
    Transient(String),
}

/// Outbound port to the payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync + 'static {
    fn key_id(&self) -> &str;

    /// Calls the provider exactly once; retries are the caller's decision.
    async fn create_order(&self, request: &GatewayOrderRequest) -> Result<GatewayOrder, GatewayError>;
}
