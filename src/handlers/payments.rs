use std::collections::HashMap;

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::application::gateway_orders::GatewayOrderService;
use crate::application::reconciliation::{ConfirmationInput, FailureInput, ReconciliationService};
use crate::domain::gateway::GatewayOrderRequest;
use crate::errors::AppError;
use crate::handlers::ApiResponse;

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateGatewayOrderRequest {
    /// Amount in minor units, e.g. 50000 for ₹500.00
    pub amount: Option<i64>,
    pub currency: Option<String>,
    /// Merchant-side reference, echoed back by the provider.
    pub receipt: Option<String>,
    #[serde(default)]
    pub notes: HashMap<String, String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GatewayOrderResponse {
    /// Provider order id to hand to the checkout widget.
    pub order_id: String,
    pub amount: i64,
    pub currency: String,
    /// Public key id for the checkout widget.
    pub key_id: String,
}

/// Fields are optional so that every missing one can be reported at once.
#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyPaymentRequest {
    pub gateway_payment_id: Option<String>,
    pub gateway_order_id: Option<String>,
    /// Hex HMAC-SHA256 issued by the provider.
    pub signature: Option<String>,
    pub order_id: Option<String>,
    pub user_id: Option<String>,
    /// Minor units.
    pub amount: Option<i64>,
    pub currency: Option<String>,
    /// `ONLINE` or `CASH_ON_DELIVERY`
    pub payment_method: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PaymentFailureRequest {
    pub gateway_payment_id: Option<String>,
    pub gateway_order_id: Option<String>,
    pub order_id: Option<String>,
    pub user_id: Option<String>,
    /// Provider error code, if the widget reported one.
    pub code: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentResultResponse {
    pub order_id: Uuid,
    pub payment_id: String,
    /// `completed` or `failed`
    pub status: String,
    pub message: String,
    pub replayed: bool,
}

impl From<VerifyPaymentRequest> for ConfirmationInput {
    fn from(r: VerifyPaymentRequest) -> Self {
        ConfirmationInput {
            gateway_payment_id: r.gateway_payment_id,
            gateway_order_id: r.gateway_order_id,
            signature: r.signature,
            order_id: r.order_id,
            user_id: r.user_id,
            amount: r.amount,
            currency: r.currency,
            payment_method: r.payment_method,
        }
    }
}

impl From<PaymentFailureRequest> for FailureInput {
    fn from(r: PaymentFailureRequest) -> Self {
        FailureInput {
            gateway_payment_id: r.gateway_payment_id,
            gateway_order_id: r.gateway_order_id,
            order_id: r.order_id,
            user_id: r.user_id,
            code: r.code,
            reason: r.reason,
        }
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST /payments/gateway-orders
///
/// Creates a provider order for the checkout widget. No local order is
/// touched.
#[utoipa::path(
    post,
    path = "/payments/gateway-orders",
    request_body = CreateGatewayOrderRequest,
    responses(
        (status = 200, description = "Provider order created", body = GatewayOrderResponse),
        (status = 400, description = "Invalid request or provider rejection"),
        (status = 500, description = "Gateway credentials misconfigured"),
        (status = 503, description = "Provider unreachable, safe to retry"),
    ),
    tag = "payments"
)]
pub async fn create_gateway_order(
    service: web::Data<GatewayOrderService>,
    body: web::Json<CreateGatewayOrderRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let order = service
        .create_gateway_order(GatewayOrderRequest {
            amount: body.amount.unwrap_or_default(),
            currency: body.currency.unwrap_or_default(),
            receipt: body.receipt.unwrap_or_default(),
            notes: body.notes,
        })
        .await?;

    Ok(ApiResponse::ok(GatewayOrderResponse {
        order_id: order.gateway_order_id,
        amount: order.amount,
        currency: order.currency,
        key_id: order.key_id,
    }))
}

/// POST /payments/verify
///
/// Verifies a signed payment confirmation and records it against the order.
/// Submitting the same confirmation again returns the earlier result.
#[utoipa::path(
    post,
    path = "/payments/verify",
    request_body = VerifyPaymentRequest,
    responses(
        (status = 200, description = "Payment recorded", body = PaymentResultResponse),
        (status = 400, description = "Missing fields, invalid signature or mismatched amount"),
        (status = 403, description = "Order belongs to another user"),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order is closed, or the payment already settled another order"),
        (status = 500, description = "Payment succeeded but could not be recorded, retry"),
    ),
    tag = "payments"
)]
pub async fn verify_payment(
    service: web::Data<ReconciliationService>,
    body: web::Json<VerifyPaymentRequest>,
) -> Result<HttpResponse, AppError> {
    let input = ConfirmationInput::from(body.into_inner());

    let receipt = web::block(move || service.reconcile(input)).await??;

    let message = if receipt.replayed {
        "Payment was already verified"
    } else {
        "Payment verified successfully"
    };
    Ok(ApiResponse::ok(PaymentResultResponse {
        order_id: receipt.order_id,
        payment_id: receipt.gateway_payment_id,
        status: receipt.status.as_str().to_ascii_lowercase(),
        message: message.to_string(),
        replayed: receipt.replayed,
    }))
}

/// POST /payments/failures
///
/// Records a failed payment attempt and closes the order as FAILED.
#[utoipa::path(
    post,
    path = "/payments/failures",
    request_body = PaymentFailureRequest,
    responses(
        (status = 200, description = "Failure recorded", body = PaymentResultResponse),
        (status = 400, description = "Missing fields"),
        (status = 403, description = "Order belongs to another user"),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order is already paid"),
    ),
    tag = "payments"
)]
pub async fn report_payment_failure(
    service: web::Data<ReconciliationService>,
    body: web::Json<PaymentFailureRequest>,
) -> Result<HttpResponse, AppError> {
    let input = FailureInput::from(body.into_inner());

    let receipt = web::block(move || service.fail(input)).await??;

    Ok(ApiResponse::ok(PaymentResultResponse {
        order_id: receipt.order_id,
        payment_id: receipt.gateway_payment_id,
        status: receipt.status.as_str().to_ascii_lowercase(),
        message: "Payment failure recorded".to_string(),
        replayed: receipt.replayed,
    }))
}
