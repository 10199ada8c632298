//! Transaction identifiers that name what is being paid for.

use std::str::FromStr;

use common::{ItemId, ShopperId};
use domain::CheckoutMode;
use uuid::Uuid;

/// The `transaction_uuid` sent to the gateway.
///
/// Encodes the checkout target so the signed callback is self-describing:
/// `cart-<shopper hex>-<32 hex>` for a whole cart, `item-<item id>-<32 hex>`
/// for a single item. The identifier is covered by the signature, so neither
/// the target nor the paying shopper can be swapped by whoever relays the
/// callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckoutReference {
    Cart { shopper: ShopperId, nonce: Uuid },
    Item { item_id: ItemId, nonce: Uuid },
}

impl CheckoutReference {
    /// A fresh whole-cart reference for `shopper`'s cart.
    pub fn cart(shopper: ShopperId) -> Self {
        CheckoutReference::Cart {
            shopper,
            nonce: Uuid::new_v4(),
        }
    }

    /// A fresh buy-now reference for `item_id`.
    pub fn item(item_id: ItemId) -> Self {
        CheckoutReference::Item {
            item_id,
            nonce: Uuid::new_v4(),
        }
    }

    pub fn mode(&self) -> CheckoutMode {
        match self {
            CheckoutReference::Cart { .. } => CheckoutMode::Cart,
            CheckoutReference::Item { .. } => CheckoutMode::BuyNow,
        }
    }
}

impl std::fmt::Display for CheckoutReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckoutReference::Cart { shopper, nonce } => {
                write!(f, "cart-{}-{}", shopper.as_uuid().simple(), nonce.simple())
            }
            CheckoutReference::Item { item_id, nonce } => {
                write!(f, "item-{}-{}", item_id, nonce.simple())
            }
        }
    }
}

fn parse_simple_uuid(s: &str) -> Option<Uuid> {
    if s.len() != 32 {
        return None;
    }
    Uuid::try_parse(s).ok()
}

impl FromStr for CheckoutReference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("unrecognized transaction reference '{s}'");

        if let Some(rest) = s.strip_prefix("cart-")
            && let Some((shopper, nonce)) = rest.split_once('-')
            && let Some(shopper) = parse_simple_uuid(shopper)
            && let Some(nonce) = parse_simple_uuid(nonce)
        {
            return Ok(CheckoutReference::Cart {
                shopper: ShopperId::from_uuid(shopper),
                nonce,
            });
        }

        if let Some(rest) = s.strip_prefix("item-")
            && let Some((id, nonce)) = rest.split_once('-')
            && let Ok(id) = id.parse::<i64>()
            && id > 0
            && let Some(nonce) = parse_simple_uuid(nonce)
        {
            return Ok(CheckoutReference::Item {
                item_id: ItemId::new(id),
                nonce,
            });
        }

        Err(invalid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cart_reference_round_trips() {
        let shopper = ShopperId::new();
        let reference = CheckoutReference::cart(shopper);
        let text = reference.to_string();
        assert!(text.starts_with(&format!("cart-{}-", shopper.as_uuid().simple())));
        assert_eq!(text.len(), 5 + 32 + 1 + 32);

        let parsed = text.parse::<CheckoutReference>().unwrap();
        assert_eq!(parsed, reference);
        assert!(matches!(parsed, CheckoutReference::Cart { shopper: s, .. } if s == shopper));
    }

    #[test]
    fn item_reference_round_trips() {
        let reference = CheckoutReference::item(ItemId::new(42));
        let text = reference.to_string();
        assert!(text.starts_with("item-42-"));
        assert_eq!(text.parse::<CheckoutReference>().unwrap(), reference);
        assert_eq!(reference.mode(), CheckoutMode::BuyNow);
    }

    #[test]
    fn references_are_unique() {
        let shopper = ShopperId::new();
        assert_ne!(
            CheckoutReference::cart(shopper),
            CheckoutReference::cart(shopper)
        );
    }

    #[test]
    fn malformed_references_are_rejected() {
        for text in [
            "",
            "11-201-13",
            "cart-",
            "cart-xyz",
            "cart-0b5d8a3c1f7e4a1b9c3d2e4f6a8b0c1d",
            "cart-0b5d8a3c1f7e4a1b9c3d2e4f6a8b0c1d-",
            "cart-0b5d8a3c-1f7e-4a1b-9c3d-2e4f6a8b0c1d",
            "item-0-0b5d8a3c1f7e4a1b9c3d2e4f6a8b0c1d",
            "item-abc-0b5d8a3c1f7e4a1b9c3d2e4f6a8b0c1d",
            "item-7",
        ] {
            assert!(text.parse::<CheckoutReference>().is_err(), "{text}");
        }
    }
}
