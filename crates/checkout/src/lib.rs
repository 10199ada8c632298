//! Storefront checkout and payment reconciliation.
//!
//! A checkout runs through these steps:
//! 1. Price the cart or a single item and sign the handoff form
//! 2. Hand control to the payment gateway
//! 3. Verify and settle the success redirect, or look up the authoritative
//!    status behind a failure redirect
//!
//! Every callback leaves one ledger row. A verified COMPLETE payment clears
//! the cart (or takes the bought item's stock) in the same atomic unit.

pub mod error;
pub mod messages;
pub mod orchestrator;
pub mod payload;
pub mod reference;
pub mod services;
pub mod signature;
pub mod state;

pub use error::{CheckoutError, Result};
pub use messages::{DUPLICATE_NOTICE, status_message};
pub use orchestrator::{CheckoutOrchestrator, CheckoutOutcome, GatewaySettings, PaymentInitiation};
pub use payload::{FailureParams, FailureQuery, SuccessPayload};
pub use reference::CheckoutReference;
pub use services::{GatewayStatus, HttpGateway, InMemoryGateway, PaymentGateway, StatusQuery};
pub use signature::{SIGNED_FIELD_NAMES, SecretKey, SignatureVerifier, SignedFields};
pub use state::CheckoutState;
