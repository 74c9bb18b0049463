//! Verification of gateway payment confirmations.
//!
//! The gateway signs `"{gateway_order_id}|{gateway_payment_id}"` with
//! HMAC-SHA256 keyed by the merchant's API secret and hands the lowercase hex
//! digest to the client. The client cannot forge it without the secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::errors::DomainError;
use crate::secret::Secret;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_LEN: usize = 32;

fn signing_mac(gateway_order_id: &str, gateway_payment_id: &str, secret: &[u8]) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(gateway_order_id.as_bytes());
    mac.update(b"|");
    mac.update(gateway_payment_id.as_bytes());
    Some(mac)
}

/// Returns `true` only if `claimed_signature` is the gateway's signature for
/// this order/payment pair. Any malformed input, or an empty secret, yields
/// `false`.
pub fn verify_payment_signature(
    gateway_order_id: &str,
    gateway_payment_id: &str,
    claimed_signature: &str,
    secret: &[u8],
) -> bool {
    if secret.is_empty() || gateway_order_id.is_empty() || gateway_payment_id.is_empty() {
        return false;
    }
    let Ok(claimed) = hex::decode(claimed_signature) else {
        return false;
    };
    if claimed.len() != SIGNATURE_LEN {
        return false;
    }
    match signing_mac(gateway_order_id, gateway_payment_id, secret) {
        // verify_slice compares in constant time
        Some(mac) => mac.verify_slice(&claimed).is_ok(),
        None => false,
    }
}

/// Verifier bound to the server-held gateway secret.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: Secret<String>,
}

impl SignatureVerifier {
    /// Refuses to exist without a secret, so verification can never default to trust.
    pub fn new(secret: Secret<String>) -> Result<Self, DomainError> {
        if secret.reveal().trim().is_empty() {
            return Err(DomainError::Configuration("gateway key secret is not set".to_string()));
        }
        Ok(Self { secret })
    }

    pub fn verify(&self, gateway_order_id: &str, gateway_payment_id: &str, claimed_signature: &str) -> bool {
        verify_payment_signature(
            gateway_order_id,
            gateway_payment_id,
            claimed_signature,
            self.secret.reveal().as_bytes(),
        )
    }

    /// The signature the gateway would issue for this pair.
    pub fn sign(&self, gateway_order_id: &str, gateway_payment_id: &str) -> String {
        signing_mac(gateway_order_id, gateway_payment_id, self.secret.reveal().as_bytes())
            .map(|mac| hex::encode(mac.finalize().into_bytes()))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test_key_secret";

    fn compute_signature(order_id: &str, payment_id: &str, secret: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
        mac.update(format!("{order_id}|{payment_id}").as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn accepts_gateway_signature() {
        let signature = compute_signature("order_N1", "pay_P1", SECRET);
        assert!(verify_payment_signature("order_N1", "pay_P1", &signature, SECRET.as_bytes()));
    }

    #[test]
    fn accepts_uppercase_hex() {
        let signature = compute_signature("order_N1", "pay_P1", SECRET).to_uppercase();
        assert!(verify_payment_signature("order_N1", "pay_P1", &signature, SECRET.as_bytes()));
    }

    #[test]
    fn rejects_signature_made_with_another_secret() {
        let signature = compute_signature("order_N1", "pay_P1", "wrong_secret");
        assert!(!verify_payment_signature("order_N1", "pay_P1", &signature, SECRET.as_bytes()));
    }

    #[test]
    fn rejects_signature_for_another_payment() {
        let signature = compute_signature("order_N1", "pay_P1", SECRET);
        assert!(!verify_payment_signature("order_N1", "pay_P2", &signature, SECRET.as_bytes()));
        assert!(!verify_payment_signature("order_N2", "pay_P1", &signature, SECRET.as_bytes()));
    }

    #[test]
    fn separator_is_part_of_the_signed_text() {
        let signature = compute_signature("order_N1", "pay_P1", SECRET);
        assert!(!verify_payment_signature("order_N1|", "pay_P1", &signature, SECRET.as_bytes()));
    }

    #[test]
    fn rejects_malformed_input() {
        let signature = compute_signature("order_N1", "pay_P1", SECRET);
        assert!(!verify_payment_signature("order_N1", "pay_P1", "not-hex", SECRET.as_bytes()));
        assert!(!verify_payment_signature("order_N1", "pay_P1", &signature[..32], SECRET.as_bytes()));
        assert!(!verify_payment_signature("order_N1", "pay_P1", "", SECRET.as_bytes()));
        assert!(!verify_payment_signature("", "pay_P1", &signature, SECRET.as_bytes()));
        assert!(!verify_payment_signature("order_N1", "", &signature, SECRET.as_bytes()));
    }

    #[test]
    fn empty_secret_never_verifies() {
        let signature = compute_signature("order_N1", "pay_P1", "");
        assert!(!verify_payment_signature("order_N1", "pay_P1", &signature, b""));
    }

    #[test]
    fn verifier_requires_a_secret() {
        assert!(matches!(
            SignatureVerifier::new(Secret::new(String::new())),
            Err(DomainError::Configuration(_))
        ));
        assert!(SignatureVerifier::new(Secret::new("  ".to_string())).is_err());
    }

    #[test]
    fn verifier_signs_what_it_accepts() {
        let verifier = SignatureVerifier::new(Secret::new(SECRET.to_string())).unwrap();
        let signature = verifier.sign("order_N1", "pay_P1");
        assert_eq!(signature, compute_signature("order_N1", "pay_P1", SECRET));
        assert!(verifier.verify("order_N1", "pay_P1", &signature));
    }
}
