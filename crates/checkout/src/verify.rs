//! Payment confirmation verification.
//!
//! The gateway signs `"{gateway_order_id}|{gateway_payment_id}"` with
//! HMAC-SHA256 over a shared secret and sends the hex digest along with
//! the confirmation. Verification recomputes the digest and compares in
//! constant time.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::CheckoutError;

type HmacSha256 = Hmac<Sha256>;

/// An inbound payment confirmation from the gateway callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    pub gateway_payment_id: String,
    pub gateway_order_id: String,
    /// Hex-encoded HMAC-SHA256 signature.
    pub signature: String,
}

/// Verifies that a payment confirmation really came from the gateway.
pub trait PaymentVerifier: Send + Sync {
    /// Returns `Ok(())` when the signature is authentic.
    fn verify(&self, confirmation: &PaymentConfirmation) -> Result<(), CheckoutError>;
}

/// HMAC-SHA256 verifier holding the gateway webhook secret.
#[derive(Clone)]
pub struct HmacVerifier {
    secret: SecretString,
}

impl std::fmt::Debug for HmacVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacVerifier")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl HmacVerifier {
    /// Creates a verifier for the given shared secret.
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    fn mac(&self, gateway_order_id: &str, gateway_payment_id: &str) -> HmacSha256 {
        // HMAC-SHA256 accepts keys of any length, so construction cannot
        // fail.
        let Ok(mut mac) = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
        else {
            unreachable!("HMAC accepts keys of any length")
        };
        mac.update(gateway_order_id.as_bytes());
        mac.update(b"|");
        mac.update(gateway_payment_id.as_bytes());
        mac
    }

    /// Computes the expected hex signature for a confirmation. Exposed
    /// so tests can produce valid confirmations.
    pub fn sign(&self, gateway_order_id: &str, gateway_payment_id: &str) -> String {
        let mac = self.mac(gateway_order_id, gateway_payment_id);
        hex::encode(mac.finalize().into_bytes())
    }
}

impl PaymentVerifier for HmacVerifier {
    fn verify(&self, confirmation: &PaymentConfirmation) -> Result<(), CheckoutError> {
        let supplied = hex::decode(&confirmation.signature)
            .map_err(|_| CheckoutError::InvalidSignature)?;

        let mac = self.mac(
            &confirmation.gateway_order_id,
            &confirmation.gateway_payment_id,
        );

        // Constant-time comparison.
        mac.verify_slice(&supplied).map_err(|_| {
            tracing::warn!(
                gateway_order_id = %confirmation.gateway_order_id,
                gateway_payment_id = %confirmation.gateway_payment_id,
                "payment signature mismatch"
            );
            metrics::counter!("payment_signature_failures_total").increment(1);
            CheckoutError::InvalidSignature
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> HmacVerifier {
        HmacVerifier::new(SecretString::from("test-webhook-secret"))
    }

    #[test]
    fn valid_signature_passes() {
        let v = verifier();
        let confirmation = PaymentConfirmation {
            gateway_order_id: "order_abc".to_string(),
            gateway_payment_id: "pay_xyz".to_string(),
            signature: v.sign("order_abc", "pay_xyz"),
        };
        assert!(v.verify(&confirmation).is_ok());
    }

    #[test]
    fn tampered_payment_id_fails() {
        let v = verifier();
        let confirmation = PaymentConfirmation {
            gateway_order_id: "order_abc".to_string(),
            gateway_payment_id: "pay_tampered".to_string(),
            signature: v.sign("order_abc", "pay_xyz"),
        };
        assert!(matches!(
            v.verify(&confirmation),
            Err(CheckoutError::InvalidSignature)
        ));
    }

    #[test]
    fn wrong_secret_fails() {
        let signer = HmacVerifier::new(SecretString::from("other-secret"));
        let v = verifier();
        let confirmation = PaymentConfirmation {
            gateway_order_id: "order_abc".to_string(),
            gateway_payment_id: "pay_xyz".to_string(),
            signature: signer.sign("order_abc", "pay_xyz"),
        };
        assert!(v.verify(&confirmation).is_err());
    }

    #[test]
    fn non_hex_signature_fails() {
        let v = verifier();
        let confirmation = PaymentConfirmation {
            gateway_order_id: "order_abc".to_string(),
            gateway_payment_id: "pay_xyz".to_string(),
            signature: "not-hex!".to_string(),
        };
        assert!(v.verify(&confirmation).is_err());
    }

    #[test]
    fn debug_redacts_secret() {
        let formatted = format!("{:?}", verifier());
        assert!(!formatted.contains("test-webhook-secret"));
        assert!(formatted.contains("REDACTED"));
    }
}
