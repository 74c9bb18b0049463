//! Payment reconciliation: turning a client-submitted gateway confirmation
//! into a durable order transition plus ledger entry.
//!
//! Steps run strictly in this order and every one of them must pass before
//! the next starts:
//!
//! 1. all fields present and well formed
//! 2. gateway signature verified against the server-held secret
//! 3. order exists and belongs to the submitting user
//! 4. a completed ledger entry for the gateway payment short-circuits: on
//!    this order it is a replay of the earlier result, on any other order the
//!    confirmation is refused
//! 5. the confirmation agrees with the order (method, currency, amount due)
//! 6. order transition, ledger append and outbox event in one store call
//!
//! Nothing is written before step 6, so a forged confirmation can never
//! mutate an order.

use std::sync::Arc;

use chrono::Utc;
use log::{info, warn};
use serde_json::json;
use uuid::Uuid;

use crate::config::PaymentPolicy;
use crate::domain::errors::DomainError;
use crate::domain::order::{OrderView, PaymentMethod, PaymentStatus};
use crate::domain::ports::PaymentStore;
use crate::domain::pricing::{payment_schedule, to_minor_units};
use crate::domain::signature::SignatureVerifier;
use crate::domain::transaction::{
    PaymentFailure, PaymentSettlement, SettlementOutcome, TransactionRecord, TransactionStatus,
};

pub const SECURITY_LOG_TARGET: &str = "storefront_payments::security";

/// A confirmation exactly as submitted. Every field is required.
#[derive(Debug, Clone, Default)]
pub struct ConfirmationInput {
    pub gateway_payment_id: Option<String>,
    pub gateway_order_id: Option<String>,
    pub signature: Option<String>,
    pub order_id: Option<String>,
    pub user_id: Option<String>,
    pub amount: Option<i64>,
    pub currency: Option<String>,
    pub payment_method: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PaymentConfirmation {
    pub gateway_payment_id: String,
    pub gateway_order_id: String,
    pub signature: String,
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub amount: i64,
    pub currency: String,
    pub payment_method: PaymentMethod,
}

/// A client report that a gateway payment attempt failed.
#[derive(Debug, Clone, Default)]
pub struct FailureInput {
    pub gateway_payment_id: Option<String>,
    pub gateway_order_id: Option<String>,
    pub order_id: Option<String>,
    pub user_id: Option<String>,
    pub code: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationReceipt {
    pub order_id: Uuid,
    pub gateway_payment_id: String,
    pub status: TransactionStatus,
    /// `true` when an earlier call already recorded this payment.
    pub replayed: bool,
}

fn present(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_id(name: &str, raw: &str) -> Result<Uuid, DomainError> {
    Uuid::parse_str(raw).map_err(|_| DomainError::InvalidInput(format!("{name} '{raw}' is not a valid id")))
}

impl ConfirmationInput {
    pub fn validate(self) -> Result<PaymentConfirmation, DomainError> {
        let gateway_payment_id = present(self.gateway_payment_id);
        let gateway_order_id = present(self.gateway_order_id);
        let signature = present(self.signature);
        let order_id = present(self.order_id);
        let user_id = present(self.user_id);
        let currency = present(self.currency);
        let payment_method = present(self.payment_method);

        let mut missing = Vec::new();
        if gateway_payment_id.is_none() {
            missing.push("gateway_payment_id");
        }
        if gateway_order_id.is_none() {
            missing.push("gateway_order_id");
        }
        if signature.is_none() {
            missing.push("signature");
        }
        if order_id.is_none() {
            missing.push("order_id");
        }
        if user_id.is_none() {
            missing.push("user_id");
        }
        if self.amount.is_none() {
            missing.push("amount");
        }
        if currency.is_none() {
            missing.push("currency");
        }
        if payment_method.is_none() {
            missing.push("payment_method");
        }

        match (
            gateway_payment_id,
            gateway_order_id,
            signature,
            order_id,
            user_id,
            self.amount,
            currency,
            payment_method,
        ) {
            (Some(payment_id), Some(gw_order_id), Some(signature), Some(order_id), Some(user_id), Some(amount), Some(currency), Some(method)) => {
                if amount <= 0 {
                    return Err(DomainError::InvalidInput("amount must be positive".to_string()));
                }
                Ok(PaymentConfirmation {
                    gateway_payment_id: payment_id,
                    gateway_order_id: gw_order_id,
                    signature,
                    order_id: parse_id("order_id", &order_id)?,
                    user_id: parse_id("user_id", &user_id)?,
                    amount,
                    currency: currency.to_ascii_uppercase(),
                    payment_method: method.parse()?,
                })
            }
            _ => Err(DomainError::MissingFields(missing)),
        }
    }
}

#[derive(Clone)]
pub struct ReconciliationService {
    store: Arc<dyn PaymentStore>,
    verifier: SignatureVerifier,
    policy: PaymentPolicy,
}

impl ReconciliationService {
    pub fn new(store: Arc<dyn PaymentStore>, verifier: SignatureVerifier, policy: PaymentPolicy) -> Self {
        Self { store, verifier, policy }
    }

    /// Minor units already collected for the order.
    fn collected(&self, order_id: Uuid) -> Result<i64, DomainError> {
        Ok(self
            .store
            .list_for_order(order_id)
            .map_err(DomainError::into_write_failure)?
            .iter()
            .filter(|r| r.status == TransactionStatus::Completed)
            .map(|r| r.amount)
            .sum())
    }

    /// Amount, in minor units, the next gateway payment for this order must
    /// carry once `collected` has been paid.
    ///
    /// `ONLINE` orders always owe their full total. Cash-on-delivery orders
    /// owe the advance first and the remaining balance after it.
    pub fn amount_due(&self, order: &OrderView, collected: i64) -> Result<i64, DomainError> {
        let (first, balance) =
            payment_schedule(&order.total_amount, order.payment_method, self.policy.cod_advance_percent)?;
        match order.payment_method {
            PaymentMethod::Online => Ok(first),
            PaymentMethod::CashOnDelivery if collected == 0 => Ok(first),
            PaymentMethod::CashOnDelivery => Ok(first + balance - collected),
        }
    }

    fn load_owned_order(&self, order_id: Uuid, user_id: Uuid) -> Result<OrderView, DomainError> {
        let order = self
            .store
            .find_by_id(order_id)
            .map_err(DomainError::into_write_failure)?
            .ok_or_else(|| DomainError::NotFound(format!("Order {order_id}")))?;
        if let Err(e) = order.ensure_owned_by(user_id) {
            warn!(
                target: SECURITY_LOG_TARGET,
                "🔐️ User {user_id} submitted a payment for order {order_id} they do not own"
            );
            return Err(e);
        }
        Ok(order)
    }

    fn check_agreement(&self, c: &PaymentConfirmation, order: &OrderView, due: i64) -> Result<(), DomainError> {
        if c.payment_method != order.payment_method {
            return Err(DomainError::InvalidInput(format!(
                "payment method {} does not match order method {}",
                c.payment_method, order.payment_method
            )));
        }
        if c.currency != self.policy.currency {
            return Err(DomainError::InvalidInput(format!(
                "currency {} is not accepted, expected {}",
                c.currency, self.policy.currency
            )));
        }
        if due <= 0 {
            return Err(DomainError::OrderClosed(format!("order {} has nothing left to pay", order.id)));
        }
        if c.amount != due {
            return Err(DomainError::InvalidInput(format!(
                "amount {} does not match the {} due for order {}",
                c.amount, due, order.id
            )));
        }
        Ok(())
    }

    /// A replayed confirmation must describe the payment that was recorded.
    fn check_replay(c: &PaymentConfirmation, prior: &TransactionRecord) -> Result<(), DomainError> {
        if c.amount != prior.amount || c.currency != prior.currency || c.payment_method != prior.payment_method {
            return Err(DomainError::InvalidInput(format!(
                "confirmation does not match recorded payment {}",
                prior.gateway_payment_id
            )));
        }
        Ok(())
    }

    pub fn reconcile(&self, input: ConfirmationInput) -> Result<ReconciliationReceipt, DomainError> {
        let c = input.validate()?;

        if !self.verifier.verify(&c.gateway_order_id, &c.gateway_payment_id, &c.signature) {
            warn!(
                target: SECURITY_LOG_TARGET,
                "🔐️ Invalid signature for order {} (gateway order {}, payment {}). Rejecting.",
                c.order_id, c.gateway_order_id, c.gateway_payment_id
            );
            return Err(DomainError::InvalidSignature);
        }

        let order = self.load_owned_order(c.order_id, c.user_id)?;

        if let Some(prior) = self
            .store
            .find_completed_payment(&c.gateway_payment_id)
            .map_err(DomainError::into_write_failure)?
        {
            if prior.order_id != order.id {
                warn!(
                    target: SECURITY_LOG_TARGET,
                    "🔐️ Payment {} already completed order {} was submitted for order {}",
                    c.gateway_payment_id, prior.order_id, order.id
                );
                return Err(DomainError::PaymentAlreadyApplied(c.gateway_payment_id));
            }
            Self::check_replay(&c, &prior)?;
            info!("Payment {} for order {} was already reconciled", c.gateway_payment_id, c.order_id);
            return Ok(ReconciliationReceipt {
                order_id: c.order_id,
                gateway_payment_id: c.gateway_payment_id,
                status: prior.status,
                replayed: true,
            });
        }

        if order.payment_status == PaymentStatus::Failed {
            return Err(DomainError::OrderClosed("payment for this order has already failed".to_string()));
        }
        let collected = self.collected(order.id)?;
        let due = self.amount_due(&order, collected)?;
        self.check_agreement(&c, &order, due)?;
        let target = if collected + c.amount >= to_minor_units(&order.total_amount)? {
            PaymentStatus::Paid
        } else {
            PaymentStatus::PartiallyPaid
        };

        let settlement = PaymentSettlement {
            order_id: c.order_id,
            user_id: c.user_id,
            gateway_order_id: c.gateway_order_id.clone(),
            gateway_payment_id: c.gateway_payment_id.clone(),
            payment_method: c.payment_method,
            amount: c.amount,
            currency: c.currency.clone(),
            target,
            gateway_response: json!({
                "gateway_payment_id": c.gateway_payment_id,
                "gateway_order_id": c.gateway_order_id,
                "signature": c.signature,
                "verification_timestamp": Utc::now().to_rfc3339(),
            }),
        };
        let outcome = self.store.settle_payment(settlement).map_err(DomainError::into_write_failure)?;

        if let SettlementOutcome::Recorded(record) = &outcome {
            info!(
                "💳️ Payment {} reconciled for order {} ({} {})",
                record.gateway_payment_id, record.order_id, record.amount, record.currency
            );
        }
        Ok(ReconciliationReceipt {
            order_id: c.order_id,
            gateway_payment_id: c.gateway_payment_id,
            status: outcome.record().status,
            replayed: outcome.is_replay(),
        })
    }

    /// Closes a non-terminal order as failed and records the failed attempt.
    pub fn fail(&self, input: FailureInput) -> Result<ReconciliationReceipt, DomainError> {
        let gateway_payment_id = present(input.gateway_payment_id);
        let gateway_order_id = present(input.gateway_order_id);
        let order_id = present(input.order_id);
        let user_id = present(input.user_id);

        let mut missing = Vec::new();
        if gateway_payment_id.is_none() {
            missing.push("gateway_payment_id");
        }
        if gateway_order_id.is_none() {
            missing.push("gateway_order_id");
        }
        if order_id.is_none() {
            missing.push("order_id");
        }
        if user_id.is_none() {
            missing.push("user_id");
        }
        let (Some(gateway_payment_id), Some(gateway_order_id), Some(order_id), Some(user_id)) =
            (gateway_payment_id, gateway_order_id, order_id, user_id)
        else {
            return Err(DomainError::MissingFields(missing));
        };
        let order_id = parse_id("order_id", &order_id)?;
        let user_id = parse_id("user_id", &user_id)?;

        let order = self.load_owned_order(order_id, user_id)?;
        let failure = PaymentFailure {
            order_id,
            user_id,
            gateway_order_id,
            gateway_payment_id: gateway_payment_id.clone(),
            payment_method: order.payment_method,
            amount: self.amount_due(&order, self.collected(order.id)?)?,
            currency: self.policy.currency.clone(),
            gateway_response: json!({
                "code": input.code,
                "reason": input.reason,
                "reported_at": Utc::now().to_rfc3339(),
            }),
        };
        let outcome = self.store.fail_payment(failure)?;
        info!("Payment {gateway_payment_id} for order {order_id} reported as failed");

        Ok(ReconciliationReceipt {
            order_id,
            gateway_payment_id,
            status: outcome.record().status,
            replayed: outcome.is_replay(),
        })
    }
}
