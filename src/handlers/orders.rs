use std::str::FromStr;

use actix_web::{web, HttpResponse};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::application::order_service::{CheckoutRequest, OrderService};
use crate::domain::errors::DomainError;
use crate::domain::order::{OrderItemInput, OrderItemView, OrderView};
use crate::errors::AppError;
use crate::handlers::ApiResponse;

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderItemRequest {
    pub product_id: Uuid,
    pub quantity: i32,
    /// Decimal centimetres as a string, e.g. "120.5". Omit for unsized items.
    pub width_cm: Option<String>,
    pub height_cm: Option<String>,
    /// Catalog price per square foot at order time, e.g. "35.00"
    pub price_per_sqft: String,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub user_id: Uuid,
    pub address_id: Uuid,
    /// `ONLINE` or `CASH_ON_DELIVERY`
    pub payment_method: String,
    pub items: Vec<CreateOrderItemRequest>,
    /// Total shown in the cart. Rejected if it differs from the server price.
    pub cart_total: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
    pub user_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub width_cm: Option<String>,
    pub height_cm: Option<String>,
    pub unit_area_sqft: String,
    pub price_per_sqft: String,
    pub line_total: String,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub address_id: Uuid,
    pub total_amount: String,
    pub payment_method: String,
    pub payment_status: String,
    pub fulfillment_status: String,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub items: Vec<OrderItemResponse>,
}

impl From<OrderItemView> for OrderItemResponse {
    fn from(i: OrderItemView) -> Self {
        OrderItemResponse {
            id: i.id,
            product_id: i.product_id,
            quantity: i.quantity,
            width_cm: i.width_cm.map(|w| w.to_string()),
            height_cm: i.height_cm.map(|h| h.to_string()),
            unit_area_sqft: i.unit_area_sqft.to_string(),
            price_per_sqft: i.price_per_sqft.to_string(),
            line_total: i.line_total.to_string(),
            notes: i.notes,
        }
    }
}

impl From<OrderView> for OrderResponse {
    fn from(o: OrderView) -> Self {
        OrderResponse {
            id: o.id,
            user_id: o.user_id,
            address_id: o.address_id,
            total_amount: o.total_amount.to_string(),
            payment_method: o.payment_method.as_str().to_string(),
            payment_status: o.payment_status.as_str().to_string(),
            fulfillment_status: o.fulfillment_status.as_str().to_string(),
            gateway_order_id: o.gateway_order_id,
            gateway_payment_id: o.gateway_payment_id,
            created_at: o.created_at.to_rfc3339(),
            updated_at: o.updated_at.to_rfc3339(),
            items: o.items.into_iter().map(OrderItemResponse::from).collect(),
        }
    }
}

fn decimal(field: &str, raw: &str) -> Result<BigDecimal, DomainError> {
    BigDecimal::from_str(raw.trim()).map_err(|e| DomainError::InvalidInput(format!("Invalid {field} '{raw}': {e}")))
}

impl TryFrom<CreateOrderRequest> for CheckoutRequest {
    type Error = DomainError;

    fn try_from(body: CreateOrderRequest) -> Result<Self, Self::Error> {
        let items = body
            .items
            .into_iter()
            .map(|i| -> Result<OrderItemInput, DomainError> {
                Ok(OrderItemInput {
                    product_id: i.product_id,
                    quantity: i.quantity,
                    width_cm: i.width_cm.as_deref().map(|w| decimal("width_cm", w)).transpose()?,
                    height_cm: i.height_cm.as_deref().map(|h| decimal("height_cm", h)).transpose()?,
                    price_per_sqft: decimal("price_per_sqft", &i.price_per_sqft)?,
                    notes: i.notes,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CheckoutRequest {
            user_id: body.user_id,
            address_id: body.address_id,
            payment_method: body.payment_method.parse()?,
            items,
            cart_total: body.cart_total.as_deref().map(|t| decimal("cart_total", t)).transpose()?,
        })
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST /orders
///
/// Prices the cart and creates a PENDING order with its items. The order,
/// its items and an `OrderPlaced` outbox event are written in one
/// transaction.
#[utoipa::path(
    post,
    path = "/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = OrderResponse),
        (status = 400, description = "Invalid cart"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn create_order(
    service: web::Data<OrderService>,
    body: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse, AppError> {
    let request = CheckoutRequest::try_from(body.into_inner())?;

    let order = web::block(move || service.create_order(request)).await??;

    Ok(ApiResponse::created(OrderResponse::from(order)))
}

/// GET /orders/{id}?user_id=
///
/// Returns the order with its items, to its owner only.
#[utoipa::path(
    get,
    path = "/orders/{id}",
    params(
        ("id" = Uuid, Path, description = "Order UUID"),
        ("user_id" = Uuid, Query, description = "Requesting user"),
    ),
    responses(
        (status = 200, description = "Order found", body = OrderResponse),
        (status = 403, description = "Order belongs to another user"),
        (status = 404, description = "Order not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn get_order(
    service: web::Data<OrderService>,
    path: web::Path<Uuid>,
    query: web::Query<OwnerQuery>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();
    let user_id = query.into_inner().user_id;

    let order = web::block(move || service.get_order(order_id, user_id)).await??;

    Ok(ApiResponse::ok(OrderResponse::from(order)))
}
