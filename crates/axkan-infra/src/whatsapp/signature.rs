//! Webhook signature verification.
//!
//! Meta signs each delivery with `X-Hub-Signature-256: sha256=<hex>`, an
//! HMAC-SHA256 of the raw request body keyed by the app secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Errors from signature verification.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("signature header missing")]
    Missing,

    #[error("signature is not valid hex")]
    Malformed,

    #[error("signature does not match the body")]
    Mismatch,

    #[error("invalid HMAC key: {0}")]
    InvalidKey(String),
}

/// Verify a `sha256=<hex>` (or bare hex) signature over `body`.
///
/// Uses the hmac crate's constant-time comparison.
pub fn verify_signature(secret: &[u8], body: &[u8], header: Option<&str>) -> Result<(), SignatureError> {
    let header = header.map(str::trim).filter(|h| !h.is_empty()).ok_or(SignatureError::Missing)?;
    let hex_sig = header.strip_prefix("sha256=").unwrap_or(header);
    let expected = hex_decode(hex_sig).ok_or(SignatureError::Malformed)?;

    let mut mac =
        HmacSha256::new_from_slice(secret).map_err(|e| SignatureError::InvalidKey(e.to_string()))?;
    mac.update(body);
    mac.verify_slice(&expected).map_err(|_| SignatureError::Mismatch)
}

/// Compute the `sha256=<hex>` header value for `body`.
pub fn sign(secret: &[u8], body: &[u8]) -> Result<String, SignatureError> {
    let mut mac =
        HmacSha256::new_from_slice(secret).map_err(|e| SignatureError::InvalidKey(e.to_string()))?;
    mac.update(body);
    Ok(format!("sha256={}", hex_encode(&mac.finalize().into_bytes())))
}

/// Decode a hex string to bytes.
fn hex_decode(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 || !hex.is_ascii() {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}

/// Encode bytes to a lowercase hex string.
pub fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"app-secret";
    const BODY: &[u8] = br#"{"object":"whatsapp_business_account","entry":[]}"#;

    #[test]
    fn test_valid_signature() {
        let header = sign(SECRET, BODY).unwrap();
        assert!(header.starts_with("sha256="));
        assert!(verify_signature(SECRET, BODY, Some(&header)).is_ok());
        // Bare hex is accepted too.
        let bare = header.trim_start_matches("sha256=");
        assert!(verify_signature(SECRET, BODY, Some(bare)).is_ok());
    }

    #[test]
    fn test_tampered_body_rejected() {
        let header = sign(SECRET, BODY).unwrap();
        let result = verify_signature(SECRET, b"{\"object\":\"other\"}", Some(&header));
        assert!(matches!(result, Err(SignatureError::Mismatch)));
    }

    #[test]
    fn test_missing_and_malformed() {
        assert!(matches!(verify_signature(SECRET, BODY, None), Err(SignatureError::Missing)));
        assert!(matches!(
            verify_signature(SECRET, BODY, Some("sha256=zz")),
            Err(SignatureError::Malformed)
        ));
        assert!(matches!(
            verify_signature(SECRET, BODY, Some("sha256=ñá")),
            Err(SignatureError::Malformed)
        ));
    }

    #[test]
    fn test_hex_encode() {
        assert_eq!(hex_encode(&[0x00, 0xab, 0xff]), "00abff");
        assert_eq!(hex_decode("00abff"), Some(vec![0x00, 0xab, 0xff]));
    }
}
