use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use log::error;
use serde_json::{json, Value};
use thiserror::Error;

use crate::domain::errors::DomainError;
use crate::domain::gateway::GatewayError;

pub const CONFIRMATION_FAILED_MESSAGE: &str =
    "Payment succeeded but confirmation failed, please contact support with your payment id";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{message}")]
    BadRequest { message: String, details: Option<String> },

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Payment gateway is temporarily unavailable, please retry")]
    Unavailable,

    #[error("Payment service is not configured correctly")]
    Configuration,

    #[error("{}", CONFIRMATION_FAILED_MESSAGE)]
    ConfirmationFailed,

    #[error("Internal server error")]
    Internal(String),
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest { message: message.into(), details: None }
    }
}

impl From<DomainError> for AppError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::InvalidInput(_) | DomainError::InvalidSignature => AppError::bad_request(e.to_string()),
            DomainError::MissingFields(ref names) => AppError::BadRequest {
                details: Some(format!("Required parameters not provided: {}", names.join(", "))),
                message: e.to_string(),
            },
            DomainError::Unauthorized(_) => AppError::Forbidden(e.to_string()),
            DomainError::NotFound(_) => AppError::NotFound(e.to_string()),
            DomainError::OrderClosed(_) | DomainError::PaymentAlreadyApplied(_) => AppError::Conflict(e.to_string()),
            DomainError::Gateway(GatewayError::Rejected { ref code, .. }) => AppError::BadRequest {
                details: Some(code.clone()),
                message: e.to_string(),
            },
            DomainError::Gateway(GatewayError::Transient(_)) => AppError::Unavailable,
            DomainError::Gateway(GatewayError::Configuration(ref msg)) | DomainError::Configuration(ref msg) => {
                error!("Configuration error: {msg}");
                AppError::Configuration
            }
            DomainError::ReconciliationWrite(ref msg) => {
                error!("Verified payment could not be recorded: {msg}");
                AppError::ConfirmationFailed
            }
            DomainError::Store(msg) | DomainError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl From<actix_web::error::BlockingError> for AppError {
    fn from(e: actix_web::error::BlockingError) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl actix_web::ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Configuration | AppError::ConfirmationFailed | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let AppError::Internal(detail) = self {
            error!("Internal error: {detail}");
        }
        let mut body = json!({
            "success": false,
            "error": self.to_string()
        });
        if let AppError::BadRequest { details: Some(details), .. } = self {
            body["details"] = Value::String(details.clone());
        }
        HttpResponse::build(self.status_code()).json(body)
    }
}
