use actix_web::{web, HttpResponse};
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::application::order_service::OrderService;
use crate::domain::transaction::TransactionRecord;
use crate::errors::AppError;
use crate::handlers::ApiResponse;

#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionResponse {
    pub id: Uuid,
    pub order_id: Uuid,
    pub gateway_payment_id: String,
    pub gateway_order_id: String,
    pub payment_method: String,
    /// Minor units.
    pub amount: i64,
    pub currency: String,
    pub status: String,
    #[schema(value_type = Object)]
    pub gateway_response: Value,
    pub created_at: String,
}

impl From<TransactionRecord> for TransactionResponse {
    fn from(r: TransactionRecord) -> Self {
        TransactionResponse {
            id: r.id,
            order_id: r.order_id,
            gateway_payment_id: r.gateway_payment_id,
            gateway_order_id: r.gateway_order_id,
            payment_method: r.payment_method.as_str().to_string(),
            amount: r.amount,
            currency: r.currency,
            status: r.status.as_str().to_string(),
            gateway_response: r.gateway_response,
            created_at: r.created_at.to_rfc3339(),
        }
    }
}

/// GET /users/{user_id}/transactions
///
/// The user's payment ledger, newest first.
#[utoipa::path(
    get,
    path = "/users/{user_id}/transactions",
    params(
        ("user_id" = Uuid, Path, description = "User UUID"),
    ),
    responses(
        (status = 200, description = "Transaction history", body = Vec<TransactionResponse>),
        (status = 500, description = "Internal server error"),
    ),
    tag = "transactions"
)]
pub async fn list_transactions(
    service: web::Data<OrderService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let user_id = path.into_inner();

    let records = web::block(move || service.list_transactions(user_id)).await??;

    let data: Vec<TransactionResponse> = records.into_iter().map(TransactionResponse::from).collect();
    Ok(ApiResponse::ok(data))
}
