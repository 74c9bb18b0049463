use std::sync::Arc;

use log::{error, info, warn};

use crate::config::PaymentPolicy;
use crate::domain::errors::DomainError;
use crate::domain::gateway::{GatewayError, GatewayOrder, GatewayOrderRequest, PaymentGateway};

/// Mints provider orders for the checkout widget. Never touches local orders.
#[derive(Clone)]
pub struct GatewayOrderService {
    gateway: Arc<dyn PaymentGateway>,
    policy: PaymentPolicy,
}

impl GatewayOrderService {
    pub fn new(gateway: Arc<dyn PaymentGateway>, policy: PaymentPolicy) -> Self {
        Self { gateway, policy }
    }

    pub async fn create_gateway_order(
        &self,
        mut request: GatewayOrderRequest,
    ) -> Result<GatewayOrder, DomainError> {
        request.currency = request.currency.trim().to_ascii_uppercase();
        request.receipt = request.receipt.trim().to_string();

        let mut missing = Vec::new();
        if request.amount == 0 {
            missing.push("amount");
        }
        if request.currency.is_empty() {
            missing.push("currency");
        }
        if request.receipt.is_empty() {
            missing.push("receipt");
        }
        if !missing.is_empty() {
            return Err(DomainError::MissingFields(missing));
        }
        if request.amount < self.policy.min_amount {
            return Err(DomainError::InvalidInput(format!(
                "amount must be at least {} minor units",
                self.policy.min_amount
            )));
        }
        if request.currency != self.policy.currency {
            return Err(DomainError::InvalidInput(format!(
                "currency {} is not accepted, expected {}",
                request.currency, self.policy.currency
            )));
        }

        match self.gateway.create_order(&request).await {
            Ok(order) => {
                info!(
                    "💳️ Gateway order {} created for receipt {} ({} {})",
                    order.gateway_order_id, request.receipt, order.amount, order.currency
                );
                Ok(order)
            }
            Err(e) => {
                match &e {
                    GatewayError::Configuration(_) => error!("💳️ Gateway order for {} failed: {e}", request.receipt),
                    _ => warn!("💳️ Gateway order for {} failed: {e}", request.receipt),
                }
                Err(e.into())
            }
        }
    }
}
