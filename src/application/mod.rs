pub mod gateway_orders;
pub mod order_service;
pub mod reconciliation;
