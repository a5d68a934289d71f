//! Payment provider seam and webhook signature verification.

use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

pub const TIMESTAMP_HEADER: &str = "x-timestamp";
pub const SIGNATURE_HEADER: &str = "x-signature";

/// Provider used to take online payments.
///
/// Calls that reach the network must happen outside the checkout transaction;
/// `provider_order_id` is deterministic per order so a retried checkout maps to
/// the same idempotency key.
pub trait PaymentGateway: Send + Sync {
    fn provider(&self) -> &str;
    fn provider_order_id(&self, order_id: Uuid) -> String;
}

/// Gateway that never leaves the process
#[derive(Debug, Default, Clone)]
pub struct StubPaymentGateway;

impl PaymentGateway for StubPaymentGateway {
    fn provider(&self) -> &str {
        "stub"
    }

    fn provider_order_id(&self, order_id: Uuid) -> String {
        format!("stub_{}", order_id.simple())
    }
}

/// HMAC-SHA256 check over `"{timestamp}.{body}"`, hex encoded in `x-signature`.
/// With no secret configured every request is accepted.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: Option<String>,
    tolerance: Duration,
}

impl WebhookVerifier {
    pub fn new(secret: Option<String>, tolerance: Duration) -> Self {
        let secret = secret.filter(|s| !s.trim().is_empty());
        Self { secret, tolerance }
    }

    pub fn disabled() -> Self {
        Self {
            secret: None,
            tolerance: Duration::from_secs(300),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.secret.is_some()
    }

    pub fn verify(&self, headers: &HeaderMap, body: &[u8]) -> bool {
        self.verify_at(headers, body, chrono::Utc::now().timestamp())
    }

    fn verify_at(&self, headers: &HeaderMap, body: &[u8], now: i64) -> bool {
        let Some(secret) = self.secret.as_deref() else {
            return true;
        };

        let ts = headers.get(TIMESTAMP_HEADER).and_then(|v| v.to_str().ok());
        let sig = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
        let (Some(ts), Some(sig)) = (ts, sig) else {
            warn!("webhook missing signature headers");
            return false;
        };

        let Ok(ts_i) = ts.trim().parse::<i64>() else {
            return false;
        };
        if (now - ts_i).unsigned_abs() > self.tolerance.as_secs() {
            warn!(timestamp = ts_i, "webhook timestamp outside tolerance");
            return false;
        }

        match sign(secret, ts.trim(), body) {
            Some(expected) => constant_time_eq(&expected, sig.trim()),
            None => false,
        }
    }
}

/// Hex HMAC of `"{timestamp}.{body}"`; `None` only if the key is rejected.
pub fn sign(secret: &str, timestamp: &str, body: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(body);
    Some(hex::encode(mac.finalize().into_bytes()))
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const SECRET: &str = "whsec_test";

    fn headers(ts: &str, sig: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(TIMESTAMP_HEADER, HeaderValue::from_str(ts).unwrap());
        h.insert(SIGNATURE_HEADER, HeaderValue::from_str(sig).unwrap());
        h
    }

    #[test]
    fn stub_gateway_key_is_deterministic() {
        let id = Uuid::new_v4();
        let gw = StubPaymentGateway;
        assert_eq!(gw.provider_order_id(id), gw.provider_order_id(id));
        assert_eq!(gw.provider_order_id(id), format!("stub_{}", id.simple()));
        assert_eq!(gw.provider(), "stub");
    }

    #[test]
    fn accepts_valid_signature_within_tolerance() {
        let verifier = WebhookVerifier::new(Some(SECRET.into()), Duration::from_secs(300));
        let body = br#"{"provider_order_id":"stub_1","status":"PAID"}"#;
        let sig = sign(SECRET, "1700000000", body).unwrap();
        assert!(verifier.verify_at(&headers("1700000000", &sig), body, 1_700_000_100));
    }

    #[test]
    fn rejects_tampered_body_and_stale_timestamp() {
        let verifier = WebhookVerifier::new(Some(SECRET.into()), Duration::from_secs(300));
        let body = br#"{"status":"PAID"}"#;
        let sig = sign(SECRET, "1700000000", body).unwrap();

        assert!(!verifier.verify_at(&headers("1700000000", &sig), br#"{"status":"FAILED"}"#, 1_700_000_000));
        assert!(!verifier.verify_at(&headers("1700000000", &sig), body, 1_700_001_000));
    }

    #[test]
    fn missing_headers_are_rejected_when_enabled() {
        let verifier = WebhookVerifier::new(Some(SECRET.into()), Duration::from_secs(300));
        assert!(!verifier.verify_at(&HeaderMap::new(), b"{}", 0));
    }

    #[test]
    fn disabled_verifier_accepts_everything() {
        let verifier = WebhookVerifier::new(Some("   ".into()), Duration::from_secs(1));
        assert!(!verifier.is_enabled());
        assert!(verifier.verify(&HeaderMap::new(), b"anything"));
    }
}
