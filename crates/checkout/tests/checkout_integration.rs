//! Integration tests for the checkout flow.
//!
//! These drive the orchestrator end to end against the in-memory store and
//! gateway, from initiation through both callback paths.

use base64::{Engine, engine::general_purpose::STANDARD};
use checkout::{
    CheckoutError, CheckoutOrchestrator, CheckoutState, FailureParams, GatewaySettings,
    GatewayStatus, InMemoryGateway, SecretKey, SignatureVerifier, SignedFields, status_message,
};
use common::{ItemId, Money, ShopperId};
use domain::{CartService, CheckoutMode};
use store::{Cart, Catalog, CatalogItem, Category, InMemoryStore, Ledger, TransactionStatus};

const SECRET: &str = "sandbox-secret";
const PRODUCT_CODE: &str = "EPAYTEST";

struct TestHarness {
    orchestrator: CheckoutOrchestrator<InMemoryStore, InMemoryGateway>,
    cart: CartService<InMemoryStore>,
    store: InMemoryStore,
    gateway: InMemoryGateway,
    signer: SignatureVerifier,
    shopper: ShopperId,
}

impl TestHarness {
    async fn new() -> Self {
        let store = InMemoryStore::new();
        store
            .put_item(CatalogItem::new(
                1,
                "Denim Jacket",
                Money::from_units(100),
                Category::Men,
                5,
            ))
            .await
            .unwrap();

        let gateway = InMemoryGateway::new();
        let settings = GatewaySettings {
            product_code: PRODUCT_CODE.to_string(),
            form_url: "https://gateway.test/form".to_string(),
            success_url: "http://shop.test/payment/success".to_string(),
            failure_url: "http://shop.test/payment/failure".to_string(),
        };
        let orchestrator = CheckoutOrchestrator::new(
            store.clone(),
            gateway.clone(),
            SignatureVerifier::new(SecretKey::new(SECRET)),
            settings,
        );

        Self {
            orchestrator,
            cart: CartService::new(store.clone()),
            store,
            gateway,
            signer: SignatureVerifier::new(SecretKey::new(SECRET)),
            shopper: ShopperId::new(),
        }
    }

    async fn fill_cart(&self, units: usize) {
        for _ in 0..units {
            self.cart.add(self.shopper, ItemId::new(1)).await.unwrap();
        }
    }

    async fn available(&self) -> u32 {
        self.store
            .get_item(ItemId::new(1))
            .await
            .unwrap()
            .unwrap()
            .available
    }

    async fn cart_units(&self) -> u32 {
        self.store
            .lines_for(self.shopper)
            .await
            .unwrap()
            .iter()
            .map(|l| l.quantity)
            .sum()
    }

    /// Builds the base64 success payload the gateway would send.
    fn success_data(&self, code: &str, status: &str, total: &str, uuid: &str) -> String {
        let signature = self.signer.sign(&SignedFields {
            total_amount: total,
            transaction_uuid: uuid,
            product_code: PRODUCT_CODE,
        });
        payload(code, status, total, uuid, &signature)
    }
}

fn payload(code: &str, status: &str, total: &str, uuid: &str, signature: &str) -> String {
    let json = serde_json::json!({
        "transaction_code": code,
        "status": status,
        "total_amount": total,
        "transaction_uuid": uuid,
        "product_code": PRODUCT_CODE,
        "signed_field_names": "total_amount,transaction_uuid,product_code",
        "signature": signature,
    });
    STANDARD.encode(json.to_string())
}

fn failure_params(uuid: &str, total: &str) -> FailureParams {
    FailureParams {
        transaction_uuid: Some(uuid.to_string()),
        total_amount: Some(total.to_string()),
        product_code: Some(PRODUCT_CODE.to_string()),
    }
}

mod initiation {
    use super::*;

    #[tokio::test]
    async fn cart_checkout_adds_flat_tax() {
        let h = TestHarness::new().await;
        h.fill_cart(2).await;

        let init = h.orchestrator.initiate_cart(h.shopper).await.unwrap();

        assert_eq!(init.mode, CheckoutMode::Cart);
        assert_eq!(init.amount, Money::from_units(200));
        assert_eq!(init.tax_amount, Money::from_units(10));
        assert_eq!(init.total_amount, Money::from_units(210));
        assert!(init.transaction_uuid.starts_with("cart-"));
        assert_eq!(init.signed_field_names, "total_amount,transaction_uuid,product_code");
        assert!(h.signer.verify(
            &SignedFields {
                total_amount: "210.00",
                transaction_uuid: &init.transaction_uuid,
                product_code: PRODUCT_CODE,
            },
            &init.signature
        ));
        assert_eq!(h.store.transaction_count().await, 0);
    }

    #[tokio::test]
    async fn buy_now_adds_proportional_tax() {
        let h = TestHarness::new().await;

        let init = h.orchestrator.initiate_buy_now(ItemId::new(1)).await.unwrap();

        assert_eq!(init.mode, CheckoutMode::BuyNow);
        assert_eq!(init.tax_amount, Money::from_units(10));
        assert_eq!(init.total_amount, Money::from_units(110));
        assert!(init.transaction_uuid.starts_with("item-1-"));
        assert_eq!(h.available().await, 5);
    }

    #[tokio::test]
    async fn empty_cart_cannot_check_out() {
        let h = TestHarness::new().await;
        let result = h.orchestrator.initiate_cart(h.shopper).await;
        assert!(matches!(result, Err(CheckoutError::EmptyCart)));
    }

    #[tokio::test]
    async fn sold_out_item_cannot_be_bought() {
        let h = TestHarness::new().await;
        h.store.reserve(ItemId::new(1), 5).await.unwrap();

        let result = h.orchestrator.initiate_buy_now(ItemId::new(1)).await;
        assert!(matches!(result, Err(CheckoutError::OutOfStock { .. })));
    }

    #[tokio::test]
    async fn each_initiation_gets_a_fresh_identifier() {
        let h = TestHarness::new().await;
        h.fill_cart(1).await;

        let a = h.orchestrator.initiate_cart(h.shopper).await.unwrap();
        let b = h.orchestrator.initiate_cart(h.shopper).await.unwrap();
        assert_ne!(a.transaction_uuid, b.transaction_uuid);
    }
}

mod success_callback {
    use super::*;

    #[tokio::test]
    async fn verified_complete_clears_cart_without_touching_stock() {
        let h = TestHarness::new().await;
        h.fill_cart(2).await;
        let init = h.orchestrator.initiate_cart(h.shopper).await.unwrap();
        assert_eq!(h.available().await, 3);

        let data = h.success_data("000AE01", "COMPLETE", "210.0", &init.transaction_uuid);
        let outcome = h
            .orchestrator
            .handle_success(h.shopper, Some(&data))
            .await
            .unwrap();

        assert_eq!(outcome.state, CheckoutState::Confirmed);
        assert_eq!(outcome.transaction_id, "000AE01");
        assert_eq!(h.cart_units().await, 0);
        // reserved when the cart was built, not again here
        assert_eq!(h.available().await, 3);

        let record = h.store.get_transaction("000AE01").await.unwrap().unwrap();
        assert_eq!(record.status, TransactionStatus::Complete);
        assert_eq!(record.total_amount, Money::from_units(210));
        assert_eq!(h.store.transaction_count().await, 1);
    }

    #[tokio::test]
    async fn tampered_signature_is_rejected_without_side_effects() {
        let h = TestHarness::new().await;
        h.fill_cart(2).await;
        let init = h.orchestrator.initiate_cart(h.shopper).await.unwrap();

        // signed for 210 but claims 21
        let signature = h.signer.sign(&SignedFields {
            total_amount: "210.00",
            transaction_uuid: &init.transaction_uuid,
            product_code: PRODUCT_CODE,
        });
        let data = payload("000AE01", "COMPLETE", "21.00", &init.transaction_uuid, &signature);

        let result = h.orchestrator.handle_success(h.shopper, Some(&data)).await;

        assert!(matches!(result, Err(CheckoutError::SignatureMismatch)));
        assert_eq!(h.cart_units().await, 2);
        assert_eq!(h.store.transaction_count().await, 0);
    }

    #[tokio::test]
    async fn missing_payload_is_rejected() {
        let h = TestHarness::new().await;
        for data in [None, Some(""), Some("   ")] {
            let result = h.orchestrator.handle_success(h.shopper, data).await;
            assert!(matches!(result, Err(CheckoutError::MissingPayload)));
        }
    }

    #[tokio::test]
    async fn garbage_payload_is_a_validation_error() {
        let h = TestHarness::new().await;
        let result = h
            .orchestrator
            .handle_success(h.shopper, Some("bm90IGpzb24="))
            .await;
        assert!(matches!(result, Err(CheckoutError::Validation(_))));
    }

    #[tokio::test]
    async fn non_complete_status_is_recorded_but_not_settled() {
        let h = TestHarness::new().await;
        h.fill_cart(1).await;
        let init = h.orchestrator.initiate_cart(h.shopper).await.unwrap();

        let data = h.success_data("000AE02", "CANCELED", "110.00", &init.transaction_uuid);
        let result = h.orchestrator.handle_success(h.shopper, Some(&data)).await;

        assert!(matches!(
            result,
            Err(CheckoutError::PaymentDeclined { ref status, .. }) if status == "CANCELED"
        ));
        assert_eq!(h.cart_units().await, 1);
        let record = h.store.get_transaction("000AE02").await.unwrap().unwrap();
        assert_eq!(record.status, TransactionStatus::Canceled);
    }

    #[tokio::test]
    async fn unrecognized_status_is_not_recorded() {
        let h = TestHarness::new().await;
        h.fill_cart(1).await;
        let init = h.orchestrator.initiate_cart(h.shopper).await.unwrap();

        let data = h.success_data("000AE03", "ON_HOLD", "110.00", &init.transaction_uuid);
        let result = h.orchestrator.handle_success(h.shopper, Some(&data)).await;

        assert!(matches!(result, Err(CheckoutError::PaymentDeclined { .. })));
        assert_eq!(h.store.transaction_count().await, 0);
    }

    #[tokio::test]
    async fn cart_changed_after_initiation_is_not_settled() {
        let h = TestHarness::new().await;
        h.fill_cart(1).await;
        let init = h.orchestrator.initiate_cart(h.shopper).await.unwrap();
        h.fill_cart(1).await;

        let data = h.success_data("000AE04", "COMPLETE", "110.00", &init.transaction_uuid);
        let result = h.orchestrator.handle_success(h.shopper, Some(&data)).await;

        assert!(matches!(result, Err(CheckoutError::Reconciliation(_))));
        assert_eq!(h.cart_units().await, 2);
        assert_eq!(h.store.transaction_count().await, 0);
    }

    #[tokio::test]
    async fn cart_payment_cannot_settle_another_shoppers_cart() {
        let h = TestHarness::new().await;
        let other = ShopperId::new();
        h.fill_cart(1).await;
        h.cart.add(other, ItemId::new(1)).await.unwrap();
        let init = h.orchestrator.initiate_cart(h.shopper).await.unwrap();

        let data = h.success_data("000AE11", "COMPLETE", "110.00", &init.transaction_uuid);
        let relayed = h.orchestrator.handle_success(other, Some(&data)).await;

        assert!(matches!(relayed, Err(CheckoutError::Validation(_))));
        assert_eq!(h.store.lines_for(other).await.unwrap().len(), 1);
        assert_eq!(h.cart_units().await, 1);
        assert_eq!(h.store.transaction_count().await, 0);

        // the payer's own callback still settles
        let outcome = h
            .orchestrator
            .handle_success(h.shopper, Some(&data))
            .await
            .unwrap();
        assert_eq!(outcome.state, CheckoutState::Confirmed);
        assert_eq!(h.cart_units().await, 0);
        assert_eq!(h.store.lines_for(other).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn buy_now_complete_takes_stock_and_keeps_cart() {
        let h = TestHarness::new().await;
        h.fill_cart(1).await;
        let init = h.orchestrator.initiate_buy_now(ItemId::new(1)).await.unwrap();

        let data = h.success_data("000AE05", "COMPLETE", "110.00", &init.transaction_uuid);
        let outcome = h
            .orchestrator
            .handle_success(h.shopper, Some(&data))
            .await
            .unwrap();

        assert_eq!(outcome.state, CheckoutState::Confirmed);
        assert_eq!(h.available().await, 3);
        assert_eq!(h.cart_units().await, 1);
    }

    #[tokio::test]
    async fn buy_now_with_wrong_amount_is_not_settled() {
        let h = TestHarness::new().await;
        let init = h.orchestrator.initiate_buy_now(ItemId::new(1)).await.unwrap();

        let data = h.success_data("000AE06", "COMPLETE", "1.10", &init.transaction_uuid);
        let result = h.orchestrator.handle_success(h.shopper, Some(&data)).await;

        assert!(matches!(result, Err(CheckoutError::Reconciliation(_))));
        assert_eq!(h.available().await, 5);
        assert_eq!(h.store.transaction_count().await, 0);
    }

    #[tokio::test]
    async fn unparseable_reference_is_rejected() {
        let h = TestHarness::new().await;
        let data = h.success_data("000AE07", "COMPLETE", "110.00", "11-201-13");
        let result = h.orchestrator.handle_success(h.shopper, Some(&data)).await;
        assert!(matches!(result, Err(CheckoutError::Validation(_))));
    }

    #[tokio::test]
    async fn concurrent_duplicate_callbacks_settle_once() {
        let h = TestHarness::new().await;
        h.fill_cart(2).await;
        let init = h.orchestrator.initiate_cart(h.shopper).await.unwrap();
        let data = h.success_data("000AE08", "COMPLETE", "210.00", &init.transaction_uuid);

        let (a, b) = tokio::join!(
            h.orchestrator.handle_success(h.shopper, Some(&data)),
            h.orchestrator.handle_success(h.shopper, Some(&data)),
        );
        let results = [a, b];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            results
                .iter()
                .any(|r| matches!(r, Err(CheckoutError::DuplicateTransaction(_))))
        );
        assert_eq!(h.store.transaction_count().await, 1);
        assert_eq!(h.cart_units().await, 0);
        assert_eq!(h.available().await, 3);
    }

    #[tokio::test]
    async fn replayed_callback_is_a_duplicate() {
        let h = TestHarness::new().await;
        h.fill_cart(1).await;
        let init = h.orchestrator.initiate_cart(h.shopper).await.unwrap();
        let data = h.success_data("000AE09", "COMPLETE", "110.00", &init.transaction_uuid);

        h.orchestrator
            .handle_success(h.shopper, Some(&data))
            .await
            .unwrap();
        // shopper refills the cart; the replay must not clear it
        h.fill_cart(1).await;
        let result = h.orchestrator.handle_success(h.shopper, Some(&data)).await;

        assert!(matches!(result, Err(CheckoutError::DuplicateTransaction(_))));
        assert_eq!(h.cart_units().await, 1);
    }
}

mod failure_callback {
    use super::*;

    #[tokio::test]
    async fn pending_is_recorded_and_declined() {
        let h = TestHarness::new().await;
        h.fill_cart(2).await;
        let init = h.orchestrator.initiate_cart(h.shopper).await.unwrap();
        h.gateway.set_status(
            init.transaction_uuid.clone(),
            GatewayStatus::with_status("PENDING"),
        );

        let outcome = h
            .orchestrator
            .handle_failure(failure_params(&init.transaction_uuid, "210.00"))
            .await
            .unwrap();

        assert_eq!(outcome.state, CheckoutState::Declined);
        assert!(outcome.message.contains("not been completed yet"));
        let record = h
            .store
            .get_transaction(&init.transaction_uuid)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, TransactionStatus::Pending);
        assert_eq!(h.cart_units().await, 2);
        assert_eq!(h.available().await, 3);
    }

    #[tokio::test]
    async fn complete_seen_on_failure_path_is_ambiguous() {
        let h = TestHarness::new().await;
        h.fill_cart(1).await;
        let init = h.orchestrator.initiate_cart(h.shopper).await.unwrap();
        h.gateway.set_status(
            init.transaction_uuid.clone(),
            GatewayStatus {
                status: Some("COMPLETE".into()),
                ref_id: Some("000AE10".into()),
                error_message: None,
            },
        );

        let outcome = h
            .orchestrator
            .handle_failure(failure_params(&init.transaction_uuid, "110.00"))
            .await
            .unwrap();

        assert_eq!(outcome.state, CheckoutState::Ambiguous);
        assert_eq!(outcome.status, "COMPLETE");
        assert_eq!(
            outcome.message,
            status_message(TransactionStatus::Ambiguous)
        );
        assert_eq!(h.cart_units().await, 1);
        let record = h
            .store
            .get_transaction(&init.transaction_uuid)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.ref_id.as_deref(), Some("000AE10"));
    }

    #[tokio::test]
    async fn buy_now_complete_on_failure_path_keeps_stock_and_asks_for_support() {
        let h = TestHarness::new().await;
        let init = h.orchestrator.initiate_buy_now(ItemId::new(1)).await.unwrap();
        h.gateway.set_status(
            init.transaction_uuid.clone(),
            GatewayStatus {
                status: Some("COMPLETE".into()),
                ref_id: Some("000AE12".into()),
                error_message: None,
            },
        );

        let outcome = h
            .orchestrator
            .handle_failure(failure_params(&init.transaction_uuid, "110.00"))
            .await
            .unwrap();

        // recorded as the gateway reported it, but left for manual reconciliation
        assert_eq!(outcome.state, CheckoutState::Ambiguous);
        assert_ne!(outcome.message, status_message(TransactionStatus::Complete));
        assert_eq!(h.available().await, 5);
        let record = h
            .store
            .get_transaction(&init.transaction_uuid)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, TransactionStatus::Complete);
    }

    #[tokio::test]
    async fn unrecognized_status_passes_gateway_text_through() {
        let h = TestHarness::new().await;
        h.gateway.set_status(
            "cart-x",
            GatewayStatus {
                status: None,
                ref_id: None,
                error_message: Some("Invalid payload signature.".into()),
            },
        );

        let outcome = h
            .orchestrator
            .handle_failure(failure_params("cart-x", "110.00"))
            .await
            .unwrap();

        assert_eq!(outcome.state, CheckoutState::Error);
        assert_eq!(outcome.message, "Invalid payload signature.");
        assert_eq!(h.store.transaction_count().await, 0);
    }

    #[tokio::test]
    async fn unknown_transaction_is_declined_as_not_found() {
        let h = TestHarness::new().await;
        let outcome = h
            .orchestrator
            .handle_failure(failure_params("cart-unknown", "110.00"))
            .await
            .unwrap();

        assert_eq!(outcome.state, CheckoutState::Declined);
        assert_eq!(outcome.status, "NOT_FOUND");
    }

    #[tokio::test]
    async fn gateway_outage_is_retryable_and_records_nothing() {
        let h = TestHarness::new().await;
        h.gateway.set_unavailable(true);

        let result = h
            .orchestrator
            .handle_failure(failure_params("cart-x", "110.00"))
            .await;

        assert!(matches!(result, Err(CheckoutError::GatewayUnavailable(_))));
        assert_eq!(h.store.transaction_count().await, 0);

        h.gateway.set_unavailable(false);
        let retry = h
            .orchestrator
            .handle_failure(failure_params("cart-x", "110.00"))
            .await;
        assert!(retry.is_ok());
    }

    #[tokio::test]
    async fn missing_parameters_never_reach_the_gateway() {
        let h = TestHarness::new().await;
        let params = FailureParams {
            transaction_uuid: Some("cart-x".into()),
            total_amount: None,
            product_code: Some(PRODUCT_CODE.into()),
        };

        let result = h.orchestrator.handle_failure(params).await;
        assert!(matches!(result, Err(CheckoutError::Validation(_))));
        assert_eq!(h.gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn foreign_product_code_is_rejected() {
        let h = TestHarness::new().await;
        let params = FailureParams {
            product_code: Some("OTHERSHOP".into()),
            ..failure_params("cart-x", "110.00")
        };

        let result = h.orchestrator.handle_failure(params).await;
        assert!(matches!(result, Err(CheckoutError::Validation(_))));
    }

    #[tokio::test]
    async fn second_lookup_for_same_transaction_is_a_duplicate() {
        let h = TestHarness::new().await;
        h.gateway
            .set_status("cart-y", GatewayStatus::with_status("CANCELED"));

        h.orchestrator
            .handle_failure(failure_params("cart-y", "110.00"))
            .await
            .unwrap();
        let result = h
            .orchestrator
            .handle_failure(failure_params("cart-y", "110.00"))
            .await;

        assert!(matches!(result, Err(CheckoutError::DuplicateTransaction(_))));
        assert_eq!(h.store.transaction_count().await, 1);
    }
}
