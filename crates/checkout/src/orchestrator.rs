//! Checkout orchestration from payment initiation to settlement.

use std::str::FromStr;

use common::{ItemId, Money, ShopperId};
use domain::{CheckoutMode, Quote, QuoteService};
use serde::Serialize;
use store::{Settlement, Storefront, TransactionRecord, TransactionStatus};

use crate::error::{CheckoutError, Result};
use crate::messages::status_message;
use crate::payload::{FailureParams, SuccessPayload};
use crate::reference::CheckoutReference;
use crate::services::gateway::{PaymentGateway, StatusQuery};
use crate::signature::{SIGNED_FIELD_NAMES, SignatureVerifier, SignedFields};
use crate::state::CheckoutState;

/// Merchant-side gateway settings.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// Merchant product code registered with the gateway.
    pub product_code: String,
    /// Where the shopper's browser posts the initiation form.
    pub form_url: String,
    /// Callback for successful payments.
    pub success_url: String,
    /// Callback for failed or abandoned payments.
    pub failure_url: String,
}

/// Everything the shopper's browser needs to hand off to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentInitiation {
    pub mode: CheckoutMode,
    pub amount: Money,
    pub tax_amount: Money,
    pub total_amount: Money,
    pub transaction_uuid: String,
    pub product_code: String,
    pub product_service_charge: Money,
    pub product_delivery_charge: Money,
    pub success_url: String,
    pub failure_url: String,
    pub signed_field_names: String,
    pub signature: String,
    pub form_url: String,
}

/// Result of a handled gateway callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutOutcome {
    pub state: CheckoutState,
    pub transaction_id: String,
    /// Status text reported by the gateway.
    pub status: String,
    pub message: String,
}

/// Drives a checkout from initiation through the gateway callbacks.
///
/// Initiation only prices and signs; nothing is persisted until a callback
/// arrives. Each callback writes exactly one ledger row, and a verified
/// COMPLETE payment is settled in the same atomic unit as its row.
pub struct CheckoutOrchestrator<S, G> {
    store: S,
    gateway: G,
    verifier: SignatureVerifier,
    settings: GatewaySettings,
    quotes: QuoteService<S>,
}

impl<S, G> CheckoutOrchestrator<S, G>
where
    S: Storefront + Clone,
    G: PaymentGateway,
{
    /// Creates a new orchestrator.
    pub fn new(
        store: S,
        gateway: G,
        verifier: SignatureVerifier,
        settings: GatewaySettings,
    ) -> Self {
        Self {
            quotes: QuoteService::new(store.clone()),
            store,
            gateway,
            verifier,
            settings,
        }
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    /// Starts a whole-cart checkout.
    #[tracing::instrument(skip(self))]
    pub async fn initiate_cart(&self, shopper: ShopperId) -> Result<PaymentInitiation> {
        let quote = self.quotes.quote_cart(shopper).await?;
        Ok(self.initiation(quote, CheckoutReference::cart(shopper)))
    }

    /// Starts a single-item checkout.
    #[tracing::instrument(skip(self))]
    pub async fn initiate_buy_now(&self, item_id: ItemId) -> Result<PaymentInitiation> {
        let quote = self.quotes.quote_buy_now(item_id).await?;
        Ok(self.initiation(quote, CheckoutReference::item(item_id)))
    }

    fn initiation(&self, quote: Quote, reference: CheckoutReference) -> PaymentInitiation {
        let transaction_uuid = reference.to_string();
        let total_text = quote.total.to_string();
        let signature = self.verifier.sign(&SignedFields {
            total_amount: &total_text,
            transaction_uuid: &transaction_uuid,
            product_code: &self.settings.product_code,
        });

        metrics::counter!("checkout_initiated_total", "mode" => quote.mode.as_str()).increment(1);
        tracing::info!(
            %transaction_uuid,
            mode = %quote.mode,
            total = %quote.total,
            state = %CheckoutState::AwaitingGateway,
            "checkout initiated"
        );

        PaymentInitiation {
            mode: quote.mode,
            amount: quote.amount,
            tax_amount: quote.tax,
            total_amount: quote.total,
            transaction_uuid,
            product_code: self.settings.product_code.clone(),
            product_service_charge: Money::zero(),
            product_delivery_charge: Money::zero(),
            success_url: self.settings.success_url.clone(),
            failure_url: self.settings.failure_url.clone(),
            signed_field_names: SIGNED_FIELD_NAMES.to_string(),
            signature,
            form_url: self.settings.form_url.clone(),
        }
    }

    fn check_product_code(&self, product_code: &str) -> Result<()> {
        if product_code != self.settings.product_code {
            return Err(CheckoutError::Validation(format!(
                "unexpected product code '{product_code}'"
            )));
        }
        Ok(())
    }

    /// Handles the gateway's success redirect.
    ///
    /// The signature is checked before anything else is trusted. A verified
    /// COMPLETE payment is recorded and settled atomically; any other known
    /// status is recorded and reported as declined.
    #[tracing::instrument(skip(self, data))]
    pub async fn handle_success(
        &self,
        shopper: ShopperId,
        data: Option<&str>,
    ) -> Result<CheckoutOutcome> {
        let result = self.process_success(shopper, data).await;
        record_callback(&result);
        result
    }

    async fn process_success(
        &self,
        shopper: ShopperId,
        data: Option<&str>,
    ) -> Result<CheckoutOutcome> {
        let data = data
            .filter(|d| !d.trim().is_empty())
            .ok_or(CheckoutError::MissingPayload)?;
        let payload = SuccessPayload::decode(data)?;

        self.check_product_code(&payload.product_code)?;
        if payload.transaction_code.trim().is_empty() {
            return Err(CheckoutError::Validation("missing transaction_code".into()));
        }

        let fields = SignedFields {
            total_amount: &payload.total_amount,
            transaction_uuid: &payload.transaction_uuid,
            product_code: &payload.product_code,
        };
        if !self.verifier.verify(&fields, &payload.signature) {
            metrics::counter!("signature_mismatch_total").increment(1);
            tracing::warn!(
                transaction_code = %payload.transaction_code,
                transaction_uuid = %payload.transaction_uuid,
                "payment signature mismatch, rejecting callback"
            );
            return Err(CheckoutError::SignatureMismatch);
        }

        let Ok(status) = TransactionStatus::from_str(&payload.status) else {
            tracing::warn!(status = %payload.status, "unrecognized gateway status");
            return Err(CheckoutError::PaymentDeclined {
                message: format!("Unrecognized payment status '{}'", payload.status),
                status: payload.status,
            });
        };

        let amount = Money::from_str(&payload.total_amount)
            .map_err(|e| CheckoutError::Validation(e.to_string()))?;

        let record = TransactionRecord::builder()
            .transaction_id(payload.transaction_code.clone())
            .product_code(payload.product_code.clone())
            .total_amount(amount)
            .status(status)
            .ref_id(payload.ref_id.clone())
            .build();

        if !status.is_complete() {
            self.record(record).await?;
            return Err(CheckoutError::PaymentDeclined {
                status: status.to_string(),
                message: status_message(status).to_string(),
            });
        }

        let reference = CheckoutReference::from_str(&payload.transaction_uuid)
            .map_err(CheckoutError::Validation)?;
        let settlement = self.settlement_for(shopper, reference, amount).await?;

        match self.store.settle(record, settlement).await {
            Ok(_) => {
                tracing::info!(
                    transaction_code = %payload.transaction_code,
                    mode = %reference.mode(),
                    %amount,
                    "payment confirmed and settled"
                );
                Ok(CheckoutOutcome {
                    state: CheckoutState::Confirmed,
                    transaction_id: payload.transaction_code,
                    status: status.to_string(),
                    message: status_message(status).to_string(),
                })
            }
            Err(e) => Err(self.ledger_failed(&payload.transaction_code, e.into())),
        }
    }

    /// Builds the atomic unit for a verified COMPLETE payment.
    async fn settlement_for(
        &self,
        shopper: ShopperId,
        reference: CheckoutReference,
        paid: Money,
    ) -> Result<Settlement> {
        match reference {
            CheckoutReference::Cart { shopper: payer, .. } => {
                if payer != shopper {
                    metrics::counter!("shopper_mismatch_total").increment(1);
                    tracing::warn!(
                        %payer,
                        caller = %shopper,
                        "cart payment relayed by another shopper"
                    );
                    return Err(CheckoutError::Validation(
                        "payment was started by a different shopper".into(),
                    ));
                }
                let expected_subtotal = CheckoutMode::Cart
                    .tax_policy()
                    .untaxed(paid)
                    .ok_or_else(|| CheckoutError::Reconciliation("cannot untax total".into()))?;
                Ok(Settlement::ClearCart {
                    shopper,
                    expected_subtotal,
                })
            }
            CheckoutReference::Item { item_id, .. } => {
                let item = self
                    .store
                    .get_item(item_id)
                    .await?
                    .ok_or_else(|| {
                        CheckoutError::Reconciliation(format!("item {item_id} no longer exists"))
                    })?;
                let expected = Quote::new(CheckoutMode::BuyNow, item.price).total;
                if expected != paid {
                    tracing::error!(%item_id, %expected, %paid, "buy-now amount mismatch");
                    return Err(CheckoutError::Reconciliation(format!(
                        "paid {paid} but item {item_id} costs {expected}"
                    )));
                }
                Ok(Settlement::ConsumeItem {
                    item_id,
                    quantity: 1,
                })
            }
        }
    }

    fn ledger_failed(&self, transaction_code: &str, err: CheckoutError) -> CheckoutError {
        match &err {
            CheckoutError::DuplicateTransaction(_) => {
                metrics::counter!("ledger_duplicate_total").increment(1);
                tracing::warn!(%transaction_code, "duplicate payment callback, nothing applied");
            }
            _ => {
                tracing::error!(
                    %transaction_code,
                    error = %err,
                    "ledger write failed, nothing committed"
                );
            }
        }
        err
    }

    async fn record(&self, record: TransactionRecord) -> Result<()> {
        let transaction_id = record.transaction_id.clone();
        self.store
            .record(record)
            .await
            .map_err(|e| self.ledger_failed(&transaction_id, e.into()))
    }

    /// Handles the gateway's failure redirect.
    ///
    /// The redirect parameters are unsigned, so the authoritative status is
    /// fetched from the gateway. Known statuses are recorded and never
    /// settle anything; unknown ones are passed through without a ledger
    /// row.
    #[tracing::instrument(skip(self))]
    pub async fn handle_failure(&self, params: FailureParams) -> Result<CheckoutOutcome> {
        let result = self.process_failure(params).await;
        record_callback(&result);
        result
    }

    async fn process_failure(&self, params: FailureParams) -> Result<CheckoutOutcome> {
        let query = params.validate()?;
        self.check_product_code(&query.product_code)?;
        let amount = Money::from_str(&query.total_amount)
            .map_err(|e| CheckoutError::Validation(e.to_string()))?;

        let response = self
            .gateway
            .transaction_status(StatusQuery {
                product_code: &query.product_code,
                total_amount: &query.total_amount,
                transaction_uuid: &query.transaction_uuid,
            })
            .await
            .inspect_err(|e| {
                tracing::error!(
                    transaction_uuid = %query.transaction_uuid,
                    error = %e,
                    "status check failed"
                );
            })?;

        let raw_status = response.status.clone().unwrap_or_default();
        let Ok(status) = TransactionStatus::from_str(&raw_status) else {
            tracing::warn!(status = %raw_status, "unrecognized gateway status");
            let message = response
                .error_message
                .or_else(|| response.status.clone())
                .unwrap_or_else(|| "Unknown payment status".to_string());
            return Ok(CheckoutOutcome {
                state: CheckoutState::Error,
                transaction_id: query.transaction_uuid,
                status: raw_status,
                message,
            });
        };

        let record = TransactionRecord::builder()
            .transaction_id(query.transaction_uuid.clone())
            .product_code(query.product_code)
            .total_amount(amount)
            .status(status)
            .ref_id(response.ref_id)
            .build();
        self.record(record).await?;

        let state = CheckoutState::after_failure_redirect(status);
        let message = if status.is_complete() {
            // Paid, but nothing was settled: the row needs manual reconciliation.
            metrics::counter!("unsettled_complete_total").increment(1);
            tracing::warn!(
                transaction_uuid = %query.transaction_uuid,
                %amount,
                "COMPLETE reported on the failure redirect, left unsettled"
            );
            status_message(TransactionStatus::Ambiguous)
        } else {
            status_message(status)
        };
        tracing::info!(
            transaction_uuid = %query.transaction_uuid,
            %status,
            %state,
            "failure redirect handled"
        );
        Ok(CheckoutOutcome {
            state,
            transaction_id: query.transaction_uuid,
            status: status.to_string(),
            message: message.to_string(),
        })
    }
}

fn record_callback(result: &Result<CheckoutOutcome>) {
    let outcome = match result {
        Ok(outcome) => match outcome.state {
            CheckoutState::Confirmed => "confirmed",
            CheckoutState::Declined => "declined",
            CheckoutState::Ambiguous => "ambiguous",
            _ => "error",
        },
        Err(e) => e.outcome_label(),
    };
    metrics::counter!("payment_callbacks_total", "outcome" => outcome).increment(1);
}
