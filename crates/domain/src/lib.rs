//! Storefront domain layer.
//!
//! This crate sits between persistence and the checkout flow:
//! - `InventoryAdjuster` reserves and releases catalog stock
//! - `CartService` pairs every cart mutation with its reservation
//! - `QuoteService` prices a checkout under one of two tax policies
//! - `ReservationSweeper` returns stock held by abandoned carts

pub mod cart;
pub mod error;
pub mod inventory;
pub mod pricing;
pub mod sweeper;

pub use cart::{CartService, CartView};
pub use error::DomainError;
pub use inventory::InventoryAdjuster;
pub use pricing::{CheckoutMode, Quote, QuoteService, TaxPolicy};
pub use sweeper::ReservationSweeper;
