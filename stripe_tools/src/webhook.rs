//! `Stripe-Signature` verification.
//!
//! Stripe signs the raw request body with HMAC-SHA256 and sends the result in a header of the form
//! `t=<unix ts>,v1=<hex mac>[,v1=<hex mac>...]`. The signed payload is `"{t}.{body}"`, so verification must run
//! against the raw bytes before any JSON parsing. A stale timestamp outside the tolerance window is rejected to
//! stop replays of captured deliveries.
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_SIGNATURE_TOLERANCE: Duration = Duration::minutes(5);

#[derive(Debug, Clone, Error)]
pub enum SignatureError {
    #[error("Signature header is missing a timestamp")]
    MissingTimestamp,
    #[error("Signature header is missing a v1 signature")]
    MissingSignature,
    #[error("Signature header is malformed: {0}")]
    Malformed(String),
}

/// Verify a `Stripe-Signature` header against the raw request body.
///
/// Returns `Ok(false)` for a well-formed header that does not match (wrong secret, tampered body, stale
/// timestamp) and `Err` only when the header itself cannot be interpreted.
pub fn verify_signature(
    payload: &[u8],
    signature_header: &str,
    secret: &str,
    tolerance: Duration,
    now: DateTime<Utc>,
) -> Result<bool, SignatureError> {
    let mut timestamp: Option<i64> = None;
    let mut candidates: Vec<String> = Vec::new();
    for part in signature_header.split(',') {
        let (key, value) = part
            .split_once('=')
            .ok_or_else(|| SignatureError::Malformed(format!("unparseable element '{part}'")))?;
        match key.trim() {
            "t" => {
                let ts = value
                    .trim()
                    .parse::<i64>()
                    .map_err(|e| SignatureError::Malformed(format!("bad timestamp: {e}")))?;
                timestamp = Some(ts);
            },
            "v1" => candidates.push(value.trim().to_string()),
            // v0 (and anything else Stripe may add) is ignored
            _ => {},
        }
    }
    let timestamp = timestamp.ok_or(SignatureError::MissingTimestamp)?;
    if candidates.is_empty() {
        return Err(SignatureError::MissingSignature);
    }
    if (now.timestamp() - timestamp).abs() > tolerance.num_seconds() {
        return Ok(false);
    }
    let expected = compute_signature(secret, timestamp, payload);
    Ok(candidates.iter().any(|candidate| constant_time_eq(candidate.as_bytes(), expected.as_bytes())))
}

fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod test {
    use super::*;

    const SECRET: &str = "whsec_test123secret456";

    fn header_for(payload: &[u8], secret: &str, now: DateTime<Utc>) -> String {
        let ts = now.timestamp();
        format!("t={ts},v1={}", compute_signature(secret, ts, payload))
    }

    #[test]
    fn valid_signature_accepted() {
        let now = Utc::now();
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let header = header_for(payload, SECRET, now);
        assert!(verify_signature(payload, &header, SECRET, DEFAULT_SIGNATURE_TOLERANCE, now).unwrap());
    }

    #[test]
    fn wrong_secret_rejected() {
        let now = Utc::now();
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let header = header_for(payload, "whsec_other", now);
        assert!(!verify_signature(payload, &header, SECRET, DEFAULT_SIGNATURE_TOLERANCE, now).unwrap());
    }

    #[test]
    fn tampered_body_rejected() {
        let now = Utc::now();
        let header = header_for(br#"{"a":1}"#, SECRET, now);
        assert!(!verify_signature(br#"{"a":2}"#, &header, SECRET, DEFAULT_SIGNATURE_TOLERANCE, now).unwrap());
    }

    #[test]
    fn stale_timestamp_rejected() {
        let now = Utc::now();
        let payload = b"{}";
        let header = header_for(payload, SECRET, now - Duration::minutes(10));
        assert!(!verify_signature(payload, &header, SECRET, DEFAULT_SIGNATURE_TOLERANCE, now).unwrap());
    }

    #[test]
    fn second_v1_candidate_is_enough() {
        // During secret rotation Stripe sends one v1 entry per active secret
        let now = Utc::now();
        let payload = b"{}";
        let ts = now.timestamp();
        let good = compute_signature(SECRET, ts, payload);
        let header = format!("t={ts},v1=deadbeef,v1={good}");
        assert!(verify_signature(payload, &header, SECRET, DEFAULT_SIGNATURE_TOLERANCE, now).unwrap());
    }

    #[test]
    fn missing_parts_are_errors() {
        let now = Utc::now();
        assert!(matches!(
            verify_signature(b"{}", "v1=abc", SECRET, DEFAULT_SIGNATURE_TOLERANCE, now),
            Err(SignatureError::MissingTimestamp)
        ));
        assert!(matches!(
            verify_signature(b"{}", "t=12345", SECRET, DEFAULT_SIGNATURE_TOLERANCE, now),
            Err(SignatureError::MissingSignature)
        ));
        assert!(matches!(
            verify_signature(b"{}", "garbage", SECRET, DEFAULT_SIGNATURE_TOLERANCE, now),
            Err(SignatureError::Malformed(_))
        ));
    }
}
