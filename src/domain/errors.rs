use thiserror::Error;

use super::gateway::GatewayError;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Missing required parameters: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    #[error("Invalid payment signature")]
    InvalidSignature,
    #[error("Not authorized: {0}")]
    Unauthorized(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("Order is closed: {0}")]
    OrderClosed(String),
    #[error("Payment {0} has already been applied to another order")]
    PaymentAlreadyApplied(String),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Payment confirmation could not be recorded: {0}")]
    ReconciliationWrite(String),
    #[error("Storage error: {0}")]
    Store(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    /// Store failures hit after a signature has been verified must be reported
    /// as retryable reconciliation failures rather than generic storage errors.
    pub fn into_write_failure(self) -> Self {
        match self {
            DomainError::Store(msg) | DomainError::Internal(msg) => DomainError::ReconciliationWrite(msg),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_lists_every_name() {
        let err = DomainError::MissingFields(vec!["order_id", "signature"]);
        assert_eq!(err.to_string(), "Missing required parameters: order_id, signature");
    }

    #[test]
    fn store_errors_become_write_failures() {
        let err = DomainError::Store("connection reset".to_string()).into_write_failure();
        assert!(matches!(err, DomainError::ReconciliationWrite(msg) if msg == "connection reset"));
    }

    #[test]
    fn business_errors_are_not_rewritten() {
        let err = DomainError::NotFound("Order".to_string()).into_write_failure();
        assert!(matches!(err, DomainError::NotFound(_)));
    }
}
