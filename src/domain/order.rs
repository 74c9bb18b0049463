use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::errors::DomainError;
use super::pricing::PricedLine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaymentMethod {
    CashOnDelivery,
    Online,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CashOnDelivery => "CASH_ON_DELIVERY",
            PaymentMethod::Online => "ONLINE",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CASH_ON_DELIVERY" | "COD" => Ok(PaymentMethod::CashOnDelivery),
            "ONLINE" => Ok(PaymentMethod::Online),
            other => Err(DomainError::InvalidInput(format!("unknown payment method '{other}'"))),
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Pending,
    PartiallyPaid,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::PartiallyPaid => "PARTIALLY_PAID",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Failed => "FAILED",
        }
    }

    /// Status after a verified payment aiming at `target` is applied.
    ///
    /// A `PAID` order stays `PAID`: a later attempt is recorded in the ledger
    /// but never reopens the order. `FAILED` orders accept no payments.
    pub fn settle(self, target: PaymentStatus) -> Result<PaymentStatus, DomainError> {
        match (self, target) {
            (PaymentStatus::Paid, _) => Ok(PaymentStatus::Paid),
            (PaymentStatus::Failed, _) => Err(DomainError::OrderClosed(
                "payment for this order has already failed".to_string(),
            )),
            (_, PaymentStatus::Paid) => Ok(PaymentStatus::Paid),
            (PaymentStatus::Pending | PaymentStatus::PartiallyPaid, PaymentStatus::PartiallyPaid) => {
                Ok(PaymentStatus::PartiallyPaid)
            }
            (_, target) => Err(DomainError::Internal(format!(
                "{} is not a settlement target",
                target.as_str()
            ))),
        }
    }

    /// Status after an explicit failure report.
    pub fn fail(self) -> Result<PaymentStatus, DomainError> {
        match self {
            PaymentStatus::Paid => Err(DomainError::OrderClosed("order is already paid".to_string())),
            _ => Ok(PaymentStatus::Failed),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(PaymentStatus::Pending),
            "PARTIALLY_PAID" => Ok(PaymentStatus::PartiallyPaid),
            "PAID" => Ok(PaymentStatus::Paid),
            "FAILED" => Ok(PaymentStatus::Failed),
            other => Err(DomainError::Internal(format!("unknown payment status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FulfillmentStatus {
    Pending,
    Confirmed,
}

impl FulfillmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FulfillmentStatus::Pending => "PENDING",
            FulfillmentStatus::Confirmed => "CONFIRMED",
        }
    }
}

impl FromStr for FulfillmentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(FulfillmentStatus::Pending),
            "CONFIRMED" => Ok(FulfillmentStatus::Confirmed),
            other => Err(DomainError::Internal(format!("unknown fulfillment status '{other}'"))),
        }
    }
}

/// A cart line as submitted at checkout, priced with the catalog's
/// price-per-area at that moment.
#[derive(Debug, Clone)]
pub struct OrderItemInput {
    pub product_id: Uuid,
    pub quantity: i32,
    pub width_cm: Option<BigDecimal>,
    pub height_cm: Option<BigDecimal>,
    pub price_per_sqft: BigDecimal,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: Uuid,
    pub address_id: Uuid,
    pub payment_method: PaymentMethod,
    pub total_amount: BigDecimal,
    pub lines: Vec<PricedLine>,
}

#[derive(Debug, Clone)]
pub struct OrderItemView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub width_cm: Option<BigDecimal>,
    pub height_cm: Option<BigDecimal>,
    pub unit_area_sqft: BigDecimal,
    pub price_per_sqft: BigDecimal,
    pub line_total: BigDecimal,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OrderView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub address_id: Uuid,
    pub total_amount: BigDecimal,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub fulfillment_status: FulfillmentStatus,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderItemView>,
}

impl OrderView {
    pub fn ensure_owned_by(&self, user_id: Uuid) -> Result<(), DomainError> {
        if self.user_id == user_id {
            Ok(())
        } else {
            Err(DomainError::Unauthorized(format!("order {} does not belong to this user", self.id)))
        }
    }
}
