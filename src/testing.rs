//! In-process doubles for the store and gateway ports, used by service and
//! handler tests that do not need Postgres.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::Utc;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::gateway::{GatewayError, GatewayOrder, GatewayOrderRequest, PaymentGateway};
use crate::domain::order::{
    FulfillmentStatus, NewOrder, OrderItemView, OrderView, PaymentMethod, PaymentStatus,
};
use crate::domain::ports::{OrderRepository, PaymentStore, TransactionLedger};
use crate::domain::pricing::PricedLine;
use crate::domain::transaction::{
    PaymentFailure, PaymentSettlement, SettlementOutcome, TransactionRecord, TransactionStatus,
};

/// A single-line order for `user_id` whose total is `total`.
pub fn new_order(user_id: Uuid, method: PaymentMethod, total: BigDecimal) -> NewOrder {
    NewOrder {
        user_id,
        address_id: Uuid::new_v4(),
        payment_method: method,
        total_amount: total.clone(),
        lines: vec![PricedLine {
            product_id: Uuid::new_v4(),
            quantity: 1,
            width_cm: None,
            height_cm: None,
            unit_area_sqft: BigDecimal::from(0),
            price_per_sqft: total.clone(),
            line_total: total,
            notes: None,
        }],
    }
}

#[derive(Default)]
struct State {
    orders: HashMap<Uuid, OrderView>,
    ledger: Vec<TransactionRecord>,
}

/// Mirrors the transactional semantics of the Postgres store: every write
/// happens under one lock, so it is all-or-nothing.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
    fail_next_write: AtomicBool,
    settle_calls: AtomicUsize,
}

impl InMemoryStore {
    /// Makes the next write return a storage error without changing anything.
    pub fn fail_next_write(&self) {
        self.fail_next_write.store(true, Ordering::SeqCst);
    }

    pub fn settle_calls(&self) -> usize {
        self.settle_calls.load(Ordering::SeqCst)
    }

    fn check_write(&self) -> Result<(), DomainError> {
        if self.fail_next_write.swap(false, Ordering::SeqCst) {
            return Err(DomainError::Store("connection reset by peer".to_string()));
        }
        Ok(())
    }

    fn state(&self) -> Result<std::sync::MutexGuard<'_, State>, DomainError> {
        self.state.lock().map_err(|_| DomainError::Internal("store lock poisoned".to_string()))
    }
}

fn record(
    order_id: Uuid,
    user_id: Uuid,
    gateway_order_id: &str,
    gateway_payment_id: &str,
    payment_method: PaymentMethod,
    amount: i64,
    currency: &str,
    status: TransactionStatus,
    gateway_response: &serde_json::Value,
) -> TransactionRecord {
    TransactionRecord {
        id: Uuid::new_v4(),
        order_id,
        user_id,
        gateway_payment_id: gateway_payment_id.to_string(),
        gateway_order_id: gateway_order_id.to_string(),
        payment_method,
        amount,
        currency: currency.to_string(),
        status,
        gateway_response: gateway_response.clone(),
        created_at: Utc::now(),
    }
}

impl OrderRepository for InMemoryStore {
    fn create(&self, order: NewOrder) -> Result<OrderView, DomainError> {
        self.check_write()?;
        let now = Utc::now();
        let view = OrderView {
            id: Uuid::new_v4(),
            user_id: order.user_id,
            address_id: order.address_id,
            total_amount: order.total_amount,
            payment_method: order.payment_method,
            payment_status: PaymentStatus::Pending,
            fulfillment_status: FulfillmentStatus::Pending,
            gateway_order_id: None,
            gateway_payment_id: None,
            created_at: now,
            updated_at: now,
            items: order
                .lines
                .into_iter()
                .map(|l| OrderItemView {
                    id: Uuid::new_v4(),
                    product_id: l.product_id,
                    quantity: l.quantity,
                    width_cm: l.width_cm,
                    height_cm: l.height_cm,
                    unit_area_sqft: l.unit_area_sqft,
                    price_per_sqft: l.price_per_sqft,
                    line_total: l.line_total,
                    notes: l.notes,
                })
                .collect(),
        };
        self.state()?.orders.insert(view.id, view.clone());
        Ok(view)
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<OrderView>, DomainError> {
        Ok(self.state()?.orders.get(&id).cloned())
    }
}

impl TransactionLedger for InMemoryStore {
    fn find_completed_payment(&self, gateway_payment_id: &str) -> Result<Option<TransactionRecord>, DomainError> {
        Ok(self
            .state()?
            .ledger
            .iter()
            .find(|r| r.gateway_payment_id == gateway_payment_id && r.status == TransactionStatus::Completed)
            .cloned())
    }

    fn list_for_order(&self, order_id: Uuid) -> Result<Vec<TransactionRecord>, DomainError> {
        Ok(self.state()?.ledger.iter().filter(|r| r.order_id == order_id).cloned().collect())
    }

    fn list_for_user(&self, user_id: Uuid) -> Result<Vec<TransactionRecord>, DomainError> {
        Ok(self
            .state()?
            .ledger
            .iter()
            .rev()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }
}

impl PaymentStore for InMemoryStore {
    fn settle_payment(&self, s: PaymentSettlement) -> Result<SettlementOutcome, DomainError> {
        self.settle_calls.fetch_add(1, Ordering::SeqCst);
        self.check_write()?;
        let mut state = self.state()?;

        if let Some(existing) = state
            .ledger
            .iter()
            .find(|r| r.gateway_payment_id == s.gateway_payment_id && r.status == TransactionStatus::Completed)
        {
            if existing.order_id != s.order_id {
                return Err(DomainError::PaymentAlreadyApplied(s.gateway_payment_id.clone()));
            }
        }
        if let Some(existing) = state
            .ledger
            .iter()
            .find(|r| r.order_id == s.order_id && r.gateway_payment_id == s.gateway_payment_id)
        {
            return match existing.status {
                TransactionStatus::Completed => Ok(SettlementOutcome::AlreadyRecorded(existing.clone())),
                _ => Err(DomainError::OrderClosed(format!(
                    "payment {} was already recorded as failed",
                    s.gateway_payment_id
                ))),
            };
        }

        let order = state
            .orders
            .get_mut(&s.order_id)
            .ok_or_else(|| DomainError::NotFound(format!("Order {}", s.order_id)))?;
        let next = order.payment_status.settle(s.target)?;
        if next != order.payment_status {
            order.payment_status = next;
            order.fulfillment_status = FulfillmentStatus::Confirmed;
            order.gateway_order_id = Some(s.gateway_order_id.clone());
            order.gateway_payment_id = Some(s.gateway_payment_id.clone());
            order.updated_at = Utc::now();
        }

        let entry = record(
            s.order_id,
            s.user_id,
            &s.gateway_order_id,
            &s.gateway_payment_id,
            s.payment_method,
            s.amount,
            &s.currency,
            TransactionStatus::Completed,
            &s.gateway_response,
        );
        state.ledger.push(entry.clone());
        Ok(SettlementOutcome::Recorded(entry))
    }

    fn fail_payment(&self, f: PaymentFailure) -> Result<SettlementOutcome, DomainError> {
        self.check_write()?;
        let mut state = self.state()?;

        if let Some(existing) = state
            .ledger
            .iter()
            .find(|r| r.order_id == f.order_id && r.gateway_payment_id == f.gateway_payment_id)
        {
            return match existing.status {
                TransactionStatus::Completed => Err(DomainError::OrderClosed(format!(
                    "payment {} has already completed",
                    f.gateway_payment_id
                ))),
                _ => Ok(SettlementOutcome::AlreadyRecorded(existing.clone())),
            };
        }

        let order = state
            .orders
            .get_mut(&f.order_id)
            .ok_or_else(|| DomainError::NotFound(format!("Order {}", f.order_id)))?;
        let next = order.payment_status.fail()?;
        order.payment_status = next;
        order.gateway_order_id = Some(f.gateway_order_id.clone());
        order.gateway_payment_id = Some(f.gateway_payment_id.clone());
        order.updated_at = Utc::now();

        let entry = record(
            f.order_id,
            f.user_id,
            &f.gateway_order_id,
            &f.gateway_payment_id,
            f.payment_method,
            f.amount,
            &f.currency,
            TransactionStatus::Failed,
            &f.gateway_response,
        );
        state.ledger.push(entry.clone());
        Ok(SettlementOutcome::Recorded(entry))
    }
}

/// Answers every order request with a fixed result and counts the calls.
pub struct StubGateway {
    failure: Option<GatewayError>,
    calls: AtomicUsize,
}

impl StubGateway {
    pub fn succeeding() -> Self {
        Self { failure: None, calls: AtomicUsize::new(0) }
    }

    pub fn failing(error: GatewayError) -> Self {
        Self { failure: Some(error), calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    fn key_id(&self) -> &str {
        "rzp_test_stub"
    }

    async fn create_order(&self, request: &GatewayOrderRequest) -> Result<GatewayOrder, GatewayError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(e) = &self.failure {
            return Err(e.clone());
        }
        Ok(GatewayOrder {
            gateway_order_id: format!("order_stub{n}"),
            amount: request.amount,
            currency: request.currency.clone(),
            key_id: self.key_id().to_string(),
        })
    }
}
