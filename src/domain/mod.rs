pub mod errors;
pub mod gateway;
pub mod order;
pub mod ports;
pub mod pricing;
pub mod signature;
pub mod transaction;
