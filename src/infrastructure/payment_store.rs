use chrono::Utc;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use log::{info, warn};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::db::DbPool;
use crate::domain::errors::DomainError;
use crate::domain::order::{FulfillmentStatus, NewOrder, OrderView, PaymentStatus};
use crate::domain::ports::{OrderRepository, PaymentStore, TransactionLedger};
use crate::domain::transaction::{
    PaymentFailure, PaymentSettlement, SettlementOutcome, TransactionRecord, TransactionStatus,
};
use crate::schema::{order_items, orders, storefront_order_outbox, transaction_history};

use super::models::{
    NewOrderItemRow, NewOrderRow, NewOutboxEventRow, NewTransactionRow, OrderItemRow,
    OrderPaymentChangeset, OrderRow, TransactionRow,
};

const COMPLETED_PAYMENT_KEY: &str = "transaction_history_completed_payment_key";

// ── Error conversions (infrastructure concern only) ──────────────────────────

impl From<diesel::result::Error> for DomainError {
    fn from(e: diesel::result::Error) -> Self {
        DomainError::Store(e.to_string())
    }
}

impl From<r2d2::Error> for DomainError {
    fn from(e: r2d2::Error) -> Self {
        DomainError::Store(e.to_string())
    }
}

// ── Query helpers ────────────────────────────────────────────────────────────

fn load_items(conn: &mut PgConnection, order_id: Uuid) -> Result<Vec<OrderItemRow>, DomainError> {
    Ok(order_items::table
        .filter(order_items::order_id.eq(order_id))
        .select(OrderItemRow::as_select())
        .order(order_items::created_at.asc())
        .load(conn)?)
}

/// Fetches the order row and holds a row lock until the transaction ends, so
/// concurrent settlements of the same order run one after the other.
fn lock_order(conn: &mut PgConnection, order_id: Uuid) -> Result<OrderRow, DomainError> {
    orders::table
        .filter(orders::id.eq(order_id))
        .select(OrderRow::as_select())
        .for_update()
        .first(conn)
        .optional()?
        .ok_or_else(|| DomainError::NotFound(format!("Order {order_id}")))
}

fn find_payment(
    conn: &mut PgConnection,
    order_id: Uuid,
    gateway_payment_id: &str,
) -> Result<Option<TransactionRecord>, DomainError> {
    transaction_history::table
        .filter(transaction_history::order_id.eq(order_id))
        .filter(transaction_history::gateway_payment_id.eq(gateway_payment_id))
        .select(TransactionRow::as_select())
        .first(conn)
        .optional()?
        .map(TransactionRecord::try_from)
        .transpose()
}

fn find_completed(conn: &mut PgConnection, gateway_payment_id: &str) -> Result<Option<TransactionRecord>, DomainError> {
    transaction_history::table
        .filter(transaction_history::gateway_payment_id.eq(gateway_payment_id))
        .filter(transaction_history::status.eq(TransactionStatus::Completed.as_str()))
        .select(TransactionRow::as_select())
        .first(conn)
        .optional()?
        .map(TransactionRecord::try_from)
        .transpose()
}

/// Appends a ledger row. Returns `false` when the `(order_id,
/// gateway_payment_id)` pair was already present.
///
/// A completed payment id is unique across orders. Two orders racing for the
/// same payment both pass their row locks, so the partial index settles it.
fn append_ledger(conn: &mut PgConnection, row: &NewTransactionRow) -> Result<bool, DomainError> {
    let inserted = diesel::insert_into(transaction_history::table)
        .values(row)
        .on_conflict((transaction_history::order_id, transaction_history::gateway_payment_id))
        .do_nothing()
        .execute(conn);
    match inserted {
        Ok(n) => Ok(n == 1),
        Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info))
            if info.constraint_name() == Some(COMPLETED_PAYMENT_KEY) =>
        {
            Err(DomainError::PaymentAlreadyApplied(row.gateway_payment_id.clone()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Debezium's EventRouter SMT derives the Kafka topic from `aggregate_type`.
fn write_outbox_event(
    conn: &mut PgConnection,
    order_id: Uuid,
    event_type: &str,
    payload: Value,
) -> Result<(), DomainError> {
    diesel::insert_into(storefront_order_outbox::table)
        .values(&NewOutboxEventRow {
            id: Uuid::new_v4(),
            aggregate_type: "Order".to_string(),
            aggregate_id: order_id.to_string(),
            event_type: event_type.to_string(),
            payload,
        })
        .execute(conn)?;
    Ok(())
}

// ── Store ────────────────────────────────────────────────────────────────────

pub struct DieselPaymentStore {
    pool: DbPool,
}

impl DieselPaymentStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl OrderRepository for DieselPaymentStore {
    fn create(&self, order: NewOrder) -> Result<OrderView, DomainError> {
        let mut conn = self.pool.get()?;

        conn.transaction::<_, DomainError, _>(|conn| {
            // 1. Insert the order
            let order_id = Uuid::new_v4();
            diesel::insert_into(orders::table)
                .values(&NewOrderRow {
                    id: order_id,
                    user_id: order.user_id,
                    address_id: order.address_id,
                    total_amount: order.total_amount.clone(),
                    payment_method: order.payment_method.as_str().to_string(),
                    payment_status: PaymentStatus::Pending.as_str().to_string(),
                    fulfillment_status: FulfillmentStatus::Pending.as_str().to_string(),
                })
                .execute(conn)?;

            // 2. Insert the priced lines
            let new_items: Vec<NewOrderItemRow> = order
                .lines
                .iter()
                .map(|l| NewOrderItemRow {
                    id: Uuid::new_v4(),
                    order_id,
                    product_id: l.product_id,
                    quantity: l.quantity,
                    width_cm: l.width_cm.clone(),
                    height_cm: l.height_cm.clone(),
                    unit_area_sqft: l.unit_area_sqft.clone(),
                    price_per_sqft: l.price_per_sqft.clone(),
                    line_total: l.line_total.clone(),
                    notes: l.notes.clone(),
                })
                .collect();
            diesel::insert_into(order_items::table)
                .values(&new_items)
                .execute(conn)?;

            // 3. Outbox event in the same transaction
            let line_payloads: Vec<Value> = order
                .lines
                .iter()
                .map(|l| {
                    json!({
                        "product_id": l.product_id,
                        "quantity": l.quantity,
                        "line_total": l.line_total.to_string()
                    })
                })
                .collect();
            write_outbox_event(
                conn,
                order_id,
                "OrderPlaced",
                json!({
                    "order_id": order_id,
                    "user_id": order.user_id,
                    "payment_method": order.payment_method.as_str(),
                    "total_amount": order.total_amount.to_string(),
                    "lines": line_payloads
                }),
            )?;

            let row = orders::table
                .filter(orders::id.eq(order_id))
                .select(OrderRow::as_select())
                .first(conn)?;
            let items = load_items(conn, order_id)?;
            row.into_view(items)
        })
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<OrderView>, DomainError> {
        let mut conn = self.pool.get()?;

        let order = orders::table
            .filter(orders::id.eq(id))
            .select(OrderRow::as_select())
            .first(&mut conn)
            .optional()?;

        let Some(order) = order else {
            return Ok(None);
        };

        let items = load_items(&mut conn, order.id)?;
        order.into_view(items).map(Some)
    }
}

impl TransactionLedger for DieselPaymentStore {
    fn find_completed_payment(&self, gateway_payment_id: &str) -> Result<Option<TransactionRecord>, DomainError> {
        let mut conn = self.pool.get()?;
        find_completed(&mut conn, gateway_payment_id)
    }

    fn list_for_order(&self, order_id: Uuid) -> Result<Vec<TransactionRecord>, DomainError> {
        let mut conn = self.pool.get()?;
        transaction_history::table
            .filter(transaction_history::order_id.eq(order_id))
            .select(TransactionRow::as_select())
            .order(transaction_history::created_at.asc())
            .load(&mut conn)?
            .into_iter()
            .map(TransactionRecord::try_from)
            .collect()
    }

    fn list_for_user(&self, user_id: Uuid) -> Result<Vec<TransactionRecord>, DomainError> {
        let mut conn = self.pool.get()?;
        transaction_history::table
            .filter(transaction_history::user_id.eq(user_id))
            .select(TransactionRow::as_select())
            .order(transaction_history::created_at.desc())
            .load(&mut conn)?
            .into_iter()
            .map(TransactionRecord::try_from)
            .collect()
    }
}

impl PaymentStore for DieselPaymentStore {
    fn settle_payment(&self, s: PaymentSettlement) -> Result<SettlementOutcome, DomainError> {
        let mut conn = self.pool.get()?;

        conn.transaction::<_, DomainError, _>(|conn| {
            let order = lock_order(conn, s.order_id)?;

            if let Some(existing) = find_completed(conn, &s.gateway_payment_id)? {
                if existing.order_id != s.order_id {
                    return Err(DomainError::PaymentAlreadyApplied(s.gateway_payment_id.clone()));
                }
                return Ok(SettlementOutcome::AlreadyRecorded(existing));
            }

            let current: PaymentStatus = order.payment_status.parse()?;
            let next = current.settle(s.target)?;
            if next != current {
                diesel::update(orders::table.filter(orders::id.eq(order.id)))
                    .set(&OrderPaymentChangeset {
                        payment_status: next.as_str().to_string(),
                        fulfillment_status: FulfillmentStatus::Confirmed.as_str().to_string(),
                        gateway_order_id: Some(s.gateway_order_id.clone()),
                        gateway_payment_id: Some(s.gateway_payment_id.clone()),
                        updated_at: Utc::now(),
                    })
                    .execute(conn)?;
            } else {
                warn!(
                    "Order {} is already {}; recording payment {} without reopening it",
                    order.id,
                    current.as_str(),
                    s.gateway_payment_id
                );
            }

            let appended = append_ledger(
                conn,
                &NewTransactionRow {
                    id: Uuid::new_v4(),
                    order_id: s.order_id,
                    user_id: s.user_id,
                    gateway_payment_id: s.gateway_payment_id.clone(),
                    gateway_order_id: s.gateway_order_id.clone(),
                    payment_method: s.payment_method.as_str().to_string(),
                    amount: s.amount,
                    currency: s.currency.clone(),
                    status: TransactionStatus::Completed.as_str().to_string(),
                    gateway_response: s.gateway_response.clone(),
                },
            )?;
            if !appended {
                // Only a non-completed entry can occupy the pair at this point.
                return Err(DomainError::OrderClosed(format!(
                    "payment {} was already recorded as failed",
                    s.gateway_payment_id
                )));
            }

            write_outbox_event(
                conn,
                s.order_id,
                "PaymentReconciled",
                json!({
                    "order_id": s.order_id,
                    "user_id": s.user_id,
                    "gateway_order_id": s.gateway_order_id,
                    "gateway_payment_id": s.gateway_payment_id,
                    "amount": s.amount,
                    "currency": s.currency,
                    "payment_status": next.as_str()
                }),
            )?;

            let record = find_payment(conn, s.order_id, &s.gateway_payment_id)?
                .ok_or_else(|| DomainError::Internal("ledger entry vanished after insert".to_string()))?;
            info!(
                "Order {} {} -> {} with payment {}",
                s.order_id,
                current.as_str(),
                next.as_str(),
                s.gateway_payment_id
            );
            Ok(SettlementOutcome::Recorded(record))
        })
    }

    fn fail_payment(&self, f: PaymentFailure) -> Result<SettlementOutcome, DomainError> {
        let mut conn = self.pool.get()?;

        conn.transaction::<_, DomainError, _>(|conn| {
            let order = lock_order(conn, f.order_id)?;

            if let Some(existing) = find_payment(conn, f.order_id, &f.gateway_payment_id)? {
                return match existing.status {
                    TransactionStatus::Completed => Err(DomainError::OrderClosed(format!(
                        "payment {} has already completed",
                        f.gateway_payment_id
                    ))),
                    _ => Ok(SettlementOutcome::AlreadyRecorded(existing)),
                };
            }

            let current: PaymentStatus = order.payment_status.parse()?;
            let next = current.fail()?;
            if next != current {
                diesel::update(orders::table.filter(orders::id.eq(order.id)))
                    .set(&OrderPaymentChangeset {
                        payment_status: next.as_str().to_string(),
                        fulfillment_status: order.fulfillment_status.clone(),
                        gateway_order_id: Some(f.gateway_order_id.clone()),
                        gateway_payment_id: Some(f.gateway_payment_id.clone()),
                        updated_at: Utc::now(),
                    })
                    .execute(conn)?;
            }

            append_ledger(
                conn,
                &NewTransactionRow {
                    id: Uuid::new_v4(),
                    order_id: f.order_id,
                    user_id: f.user_id,
                    gateway_payment_id: f.gateway_payment_id.clone(),
                    gateway_order_id: f.gateway_order_id.clone(),
                    payment_method: f.payment_method.as_str().to_string(),
                    amount: f.amount,
                    currency: f.currency.clone(),
                    status: TransactionStatus::Failed.as_str().to_string(),
                    gateway_response: f.gateway_response.clone(),
                },
            )?;

            write_outbox_event(
                conn,
                f.order_id,
                "PaymentFailed",
                json!({
                    "order_id": f.order_id,
                    "user_id": f.user_id,
                    "gateway_order_id": f.gateway_order_id,
                    "gateway_payment_id": f.gateway_payment_id
                }),
            )?;

            let record = find_payment(conn, f.order_id, &f.gateway_payment_id)?
                .ok_or_else(|| DomainError::Internal("ledger entry vanished after insert".to_string()))?;
            Ok(SettlementOutcome::Recorded(record))
        })
    }
}
