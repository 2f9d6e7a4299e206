//! Stripe webhook signature verification.
//!
//! The `Stripe-Signature` header has the form `t=<unix>,v1=<hex>[,v1=<hex>…]`.
//! The expected signature is HMAC-SHA256 over `"{t}.{raw body}"` with the
//! endpoint's signing secret. Verification happens before any payload parsing
//! and a failure must produce no state change.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Maximum accepted clock skew between the header timestamp and now.
pub const TOLERANCE_SECS: i64 = 300;

pub fn verify(secret: &str, header: &str, payload: &[u8], now_unix: i64) -> bool {
    let mut timestamp: Option<i64> = None;
    let mut candidates: Vec<&str> = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse().ok(),
            "v1" => candidates.push(value),
            _ => {}
        }
    }

    let Some(t) = timestamp else {
        return false;
    };
    if (now_unix - t).abs() > TOLERANCE_SECS {
        return false;
    }
    if candidates.is_empty() {
        return false;
    }

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(t.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);

    candidates.iter().any(|candidate| {
        hex::decode(candidate)
            .is_ok_and(|sig| mac.clone().verify_slice(&sig).is_ok())
    })
}

/// Produce a header value the way Stripe would sign `payload` at `now_unix`.
pub fn sign(secret: &str, payload: &[u8], now_unix: i64) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts any key length");
    mac.update(now_unix.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    format!("t={},v1={}", now_unix, hex::encode(mac.finalize().into_bytes()))
}
