//! Checkout state machine.

use serde::{Deserialize, Serialize};
use store::TransactionStatus;

/// The state of one checkout attempt.
///
/// State transitions:
/// ```text
/// Initiated ──► AwaitingGateway ──┬──► Confirmed
///                                 ├──► Declined
///                                 ├──► Ambiguous
///                                 └──► Error
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckoutState {
    /// Amount and identifier computed; nothing persisted.
    #[default]
    Initiated,

    /// Control has passed to the gateway.
    AwaitingGateway,

    /// Payment verified and settled (terminal state).
    Confirmed,

    /// The gateway reported the payment did not go through (terminal state).
    Declined,

    /// The outcome needs manual follow-up (terminal state).
    Ambiguous,

    /// The callback could not be trusted or applied (terminal state).
    Error,
}

impl CheckoutState {
    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CheckoutState::Confirmed
                | CheckoutState::Declined
                | CheckoutState::Ambiguous
                | CheckoutState::Error
        )
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutState::Initiated => "INITIATED",
            CheckoutState::AwaitingGateway => "AWAITING_GATEWAY",
            CheckoutState::Confirmed => "CONFIRMED",
            CheckoutState::Declined => "DECLINED",
            CheckoutState::Ambiguous => "AMBIGUOUS",
            CheckoutState::Error => "ERROR",
        }
    }

    /// Terminal state for a status learned through the failure redirect.
    ///
    /// `Complete` maps to `Ambiguous`: the shopper came back through the
    /// failure path, so the payment is not settled automatically.
    pub fn after_failure_redirect(status: TransactionStatus) -> Self {
        match status {
            TransactionStatus::Complete | TransactionStatus::Ambiguous => CheckoutState::Ambiguous,
            TransactionStatus::Pending
            | TransactionStatus::FullRefund
            | TransactionStatus::PartialRefund
            | TransactionStatus::NotFound
            | TransactionStatus::Canceled
            | TransactionStatus::Failed => CheckoutState::Declined,
        }
    }
}

impl std::fmt::Display for CheckoutState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_outcomes_are_terminal() {
        assert!(!CheckoutState::Initiated.is_terminal());
        assert!(!CheckoutState::AwaitingGateway.is_terminal());
        assert!(CheckoutState::Confirmed.is_terminal());
        assert!(CheckoutState::Error.is_terminal());
    }

    #[test]
    fn failure_redirect_never_confirms() {
        for status in TransactionStatus::ALL {
            assert_ne!(
                CheckoutState::after_failure_redirect(status),
                CheckoutState::Confirmed
            );
        }
        assert_eq!(
            CheckoutState::after_failure_redirect(TransactionStatus::Pending),
            CheckoutState::Declined
        );
    }

    #[test]
    fn serializes_in_upper_case() {
        let json = serde_json::to_string(&CheckoutState::AwaitingGateway).unwrap();
        assert_eq!(json, "\"AWAITING_GATEWAY\"");
    }
}
