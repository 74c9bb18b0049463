use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::order::{OrderItemView, OrderView};
use crate::domain::transaction::TransactionRecord;
use crate::schema::{order_items, orders, storefront_order_outbox, transaction_history};

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub address_id: Uuid,
    pub total_amount: BigDecimal,
    pub payment_method: String,
    pub payment_status: String,
    pub fulfillment_status: String,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = orders)]
pub struct NewOrderRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub address_id: Uuid,
    pub total_amount: BigDecimal,
    pub payment_method: String,
    pub payment_status: String,
    pub fulfillment_status: String,
}

#[derive(Debug, AsChangeset)]
#[diesel(table_name = orders)]
pub struct OrderPaymentChangeset {
    pub payment_status: String,
    pub fulfillment_status: String,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(
    Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable, Associations,
)]
#[diesel(table_name = order_items)]
#[diesel(belongs_to(OrderRow, foreign_key = order_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderItemRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub width_cm: Option<BigDecimal>,
    pub height_cm: Option<BigDecimal>,
    pub unit_area_sqft: BigDecimal,
    pub price_per_sqft: BigDecimal,
    pub line_total: BigDecimal,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = order_items)]
pub struct NewOrderItemRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub width_cm: Option<BigDecimal>,
    pub height_cm: Option<BigDecimal>,
    pub unit_area_sqft: BigDecimal,
    pub price_per_sqft: BigDecimal,
    pub line_total: BigDecimal,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = transaction_history)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TransactionRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub gateway_payment_id: String,
    pub gateway_order_id: String,
    pub payment_method: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub gateway_response: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = transaction_history)]
pub struct NewTransactionRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub gateway_payment_id: String,
    pub gateway_order_id: String,
    pub payment_method: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub gateway_response: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = storefront_order_outbox)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OutboxEventRow {
    pub id: Uuid,
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub event_type: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = storefront_order_outbox)]
pub struct NewOutboxEventRow {
    pub id: Uuid,
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub event_type: String,
    pub payload: Value,
}

// ── Row → domain conversions ─────────────────────────────────────────────────

impl From<OrderItemRow> for OrderItemView {
    fn from(row: OrderItemRow) -> Self {
        OrderItemView {
            id: row.id,
            product_id: row.product_id,
            quantity: row.quantity,
            width_cm: row.width_cm,
            height_cm: row.height_cm,
            unit_area_sqft: row.unit_area_sqft,
            price_per_sqft: row.price_per_sqft,
            line_total: row.line_total,
            notes: row.notes,
        }
    }
}

impl OrderRow {
    pub fn into_view(self, items: Vec<OrderItemRow>) -> Result<OrderView, DomainError> {
        Ok(OrderView {
            id: self.id,
            user_id: self.user_id,
            address_id: self.address_id,
            total_amount: self.total_amount,
            payment_method: self.payment_method.parse()?,
            payment_status: self.payment_status.parse()?,
            fulfillment_status: self.fulfillment_status.parse()?,
            gateway_order_id: self.gateway_order_id,
            gateway_payment_id: self.gateway_payment_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
            items: items.into_iter().map(OrderItemView::from).collect(),
        })
    }
}

impl TryFrom<TransactionRow> for TransactionRecord {
    type Error = DomainError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        Ok(TransactionRecord {
            id: row.id,
            order_id: row.order_id,
            user_id: row.user_id,
            gateway_payment_id: row.gateway_payment_id,
            gateway_order_id: row.gateway_order_id,
            payment_method: row.payment_method.parse()?,
            amount: row.amount,
            currency: row.currency,
            status: row.status.parse()?,
            gateway_response: row.gateway_response,
            created_at: row.created_at,
        })
    }
}
