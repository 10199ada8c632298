//! Payment gateway client trait with HTTP and in-memory implementations.

pub mod gateway;

pub use gateway::{GatewayStatus, HttpGateway, InMemoryGateway, PaymentGateway, StatusQuery};
