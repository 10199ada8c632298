//! Keyed signatures over the fields the gateway signs.

use base64::{Engine, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Field names covered by the signature, in signing order.
pub const SIGNED_FIELD_NAMES: &str = "total_amount,transaction_uuid,product_code";

/// The merchant's shared secret with the gateway.
///
/// Never printed: `Debug` shows `[REDACTED]` and there is no `Display`.
#[derive(Clone)]
pub struct SecretKey(String);

impl SecretKey {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey([REDACTED])")
    }
}

/// The three signed values, exactly as they appear on the wire.
///
/// `total_amount` is kept as text: the gateway signs the string it sends,
/// so `"210.0"` and `"210.00"` produce different signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignedFields<'a> {
    pub total_amount: &'a str,
    pub transaction_uuid: &'a str,
    pub product_code: &'a str,
}

impl SignedFields<'_> {
    /// Returns the message the signature is computed over.
    pub fn message(&self) -> String {
        format!(
            "total_amount={},transaction_uuid={},product_code={}",
            self.total_amount, self.transaction_uuid, self.product_code
        )
    }
}

/// Signs and verifies gateway messages with HMAC-SHA256.
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    secret: SecretKey,
}

impl SignatureVerifier {
    pub fn new(secret: SecretKey) -> Self {
        Self { secret }
    }

    fn mac(&self, fields: &SignedFields<'_>) -> HmacSha256 {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(fields.message().as_bytes());
        mac
    }

    /// Returns the standard base64 encoding of the HMAC-SHA256 tag.
    pub fn sign(&self, fields: &SignedFields<'_>) -> String {
        STANDARD.encode(self.mac(fields).finalize().into_bytes())
    }

    /// Returns true if `signature` is the tag for `fields`.
    ///
    /// The comparison is constant time. Malformed base64 never verifies.
    pub fn verify(&self, fields: &SignedFields<'_>, signature: &str) -> bool {
        let Ok(tag) = STANDARD.decode(signature.trim()) else {
            return false;
        };
        self.mac(fields).verify_slice(&tag).is_ok()
    }
}
