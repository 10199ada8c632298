//! Shopper-facing text for gateway statuses.

use store::TransactionStatus;

pub const DUPLICATE_NOTICE: &str =
    "This payment has already been processed. Please try again later.";

/// Returns the fixed explanation shown for a gateway status.
pub fn status_message(status: TransactionStatus) -> &'static str {
    match status {
        TransactionStatus::Complete => "Payment completed successfully.",
        TransactionStatus::Pending => "Your payment has not been completed yet. Please retry later.",
        TransactionStatus::FullRefund => "This payment has been fully refunded to you.",
        TransactionStatus::PartialRefund => "This payment has been partially refunded to you.",
        TransactionStatus::Ambiguous => {
            "Your payment is in an ambiguous state. Please contact support before paying again."
        }
        TransactionStatus::NotFound => "Your payment session has expired or could not be found.",
        TransactionStatus::Canceled => "Your payment was canceled.",
        TransactionStatus::Failed => "Your payment failed. No money has been taken.",
    }
}
