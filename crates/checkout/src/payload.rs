//! Decoding of gateway callback parameters.

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Deserializer};

use crate::error::CheckoutError;

/// The JSON record carried base64-encoded in the success redirect.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SuccessPayload {
    pub transaction_code: String,
    /// Raw status text; may be outside the known set.
    pub status: String,
    /// Amount exactly as sent, since the signature covers this text.
    #[serde(deserialize_with = "amount_text")]
    pub total_amount: String,
    pub transaction_uuid: String,
    pub product_code: String,
    pub signature: String,
    #[serde(default)]
    pub ref_id: Option<String>,
}

/// Accepts the amount as either a JSON string or a JSON number.
fn amount_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Amount {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Amount::deserialize(deserializer)? {
        Amount::Text(text) => text,
        Amount::Number(n) => n.to_string(),
    })
}

impl SuccessPayload {
    /// Decodes base64 text into UTF-8 JSON and parses it.
    pub fn decode(data: &str) -> Result<Self, CheckoutError> {
        // Query decoding turns an unescaped '+' into a space.
        let data = data.trim().replace(' ', "+");
        let bytes = STANDARD
            .decode(data.as_bytes())
            .map_err(|_| CheckoutError::Validation("payment data is not valid base64".into()))?;
        let text = String::from_utf8(bytes)
            .map_err(|_| CheckoutError::Validation("payment data is not valid UTF-8".into()))?;
        serde_json::from_str(&text)
            .map_err(|e| CheckoutError::Validation(format!("malformed payment data: {e}")))
    }
}

/// Plain query parameters of the failure redirect. None of them are signed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FailureParams {
    pub transaction_uuid: Option<String>,
    pub total_amount: Option<String>,
    pub product_code: Option<String>,
}

/// Validated failure parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureQuery {
    pub transaction_uuid: String,
    pub total_amount: String,
    pub product_code: String,
}

impl FailureParams {
    /// Requires every parameter to be present and non-blank.
    pub fn validate(self) -> Result<FailureQuery, CheckoutError> {
        fn required(value: Option<String>, name: &str) -> Result<String, CheckoutError> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| CheckoutError::Validation(format!("missing {name}")))
        }

        Ok(FailureQuery {
            transaction_uuid: required(self.transaction_uuid, "transaction_uuid")?,
            total_amount: required(self.total_amount, "total_amount")?,
            product_code: required(self.product_code, "product_code")?,
        })
    }
}
