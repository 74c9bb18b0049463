use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use super::errors::DomainError;
use super::order::{PaymentMethod, PaymentStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Failed => "FAILED",
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TransactionStatus::Pending),
            "COMPLETED" => Ok(TransactionStatus::Completed),
            "FAILED" => Ok(TransactionStatus::Failed),
            other => Err(DomainError::Internal(format!("unknown transaction status '{other}'"))),
        }
    }
}

/// One immutable ledger entry.
#[derive(Debug, Clone)]
pub struct TransactionRecord {
    pub id: Uuid,
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub gateway_payment_id: String,
    pub gateway_order_id: String,
    pub payment_method: PaymentMethod,
    /// Minor units.
    pub amount: i64,
    pub currency: String,
    pub status: TransactionStatus,
    pub gateway_response: Value,
    pub created_at: DateTime<Utc>,
}

/// A verified payment ready to be applied to its order.
#[derive(Debug, Clone)]
pub struct PaymentSettlement {
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub gateway_order_id: String,
    pub gateway_payment_id: String,
    pub payment_method: PaymentMethod,
    pub amount: i64,
    pub currency: String,
    pub target: PaymentStatus,
    pub gateway_response: Value,
}

/// An explicit failure report for a payment attempt.
#[derive(Debug, Clone)]
pub struct PaymentFailure {
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub gateway_order_id: String,
    pub gateway_payment_id: String,
    pub payment_method: PaymentMethod,
    pub amount: i64,
    pub currency: String,
    pub gateway_response: Value,
}

#[derive(Debug, Clone)]
pub enum SettlementOutcome {
    /// The ledger entry was written by this call.
    Recorded(TransactionRecord),
    /// An entry for the same `(order, gateway payment)` already existed.
    AlreadyRecorded(TransactionRecord),
}

impl SettlementOutcome {
    pub fn record(&self) -> &TransactionRecord {
        match self {
            SettlementOutcome::Recorded(r) | SettlementOutcome::AlreadyRecorded(r) => r,
        }
    }

    pub fn is_replay(&self) -> bool {
        matches!(self, SettlementOutcome::AlreadyRecorded(_))
    }
}
