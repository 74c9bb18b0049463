pub mod models;
pub mod payment_store;
pub mod razorpay;
