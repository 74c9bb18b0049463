use uuid::Uuid;

use super::errors::DomainError;
use super::order::{NewOrder, OrderView};
use super::transaction::{PaymentFailure, PaymentSettlement, SettlementOutcome, TransactionRecord};

pub trait OrderRepository: Send + Sync + 'static {
    /// Inserts the order and all of its lines atomically.
    fn create(&self, order: NewOrder) -> Result<OrderView, DomainError>;
    fn find_by_id(&self, id: Uuid) -> Result<Option<OrderView>, DomainError>;
}

pub trait TransactionLedger: Send + Sync + 'static {
    /// The `COMPLETED` record for a gateway payment, whichever order holds it.
    fn find_completed_payment(&self, gateway_payment_id: &str) -> Result<Option<TransactionRecord>, DomainError>;
    fn list_for_order(&self, order_id: Uuid) -> Result<Vec<TransactionRecord>, DomainError>;
    /// Newest first.
    fn list_for_user(&self, user_id: Uuid) -> Result<Vec<TransactionRecord>, DomainError>;
}

/// Order state changes that must land together with their ledger entry.
///
/// Implementations apply the order transition, the ledger append and any
/// outbox event in one unit: either all are visible or none are. A second
/// call for the same `(order_id, gateway_payment_id)` must return
/// `SettlementOutcome::AlreadyRecorded` without touching the order, and a
/// gateway payment already completed on another order must be refused with
/// `DomainError::PaymentAlreadyApplied`.
pub trait PaymentStore: OrderRepository + TransactionLedger {
    fn settle_payment(&self, settlement: PaymentSettlement) -> Result<SettlementOutcome, DomainError>;
    fn fail_payment(&self, failure: PaymentFailure) -> Result<SettlementOutcome, DomainError>;
}
