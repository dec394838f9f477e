//! Short-lived signed download references.
//!
//! A grant is `base64url(object_key|order_id|user_id|expiry_ts) . base64url(hmac-sha256(payload))`. It names the
//! object, who it was issued to and when it dies; it is never the object itself and never durable. The blob
//! gateway holds the same signing key and calls [`verify_download_token`] before serving bytes.
use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const FIELD_SEPARATOR: char = '|';

#[derive(Debug, Clone, Error)]
pub enum DownloadTokenError {
    #[error("The download token is malformed")]
    Malformed,
    #[error("The download token signature does not verify")]
    BadSignature,
    #[error("The download token expired at {0}")]
    Expired(DateTime<Utc>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadClaim {
    pub object_key: String,
    pub order_id: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}

pub fn sign_download_token(
    signing_key: &str,
    object_key: &str,
    order_id: &str,
    user_id: &str,
    expires_at: DateTime<Utc>,
) -> String {
    let payload = format!(
        "{object_key}{FIELD_SEPARATOR}{order_id}{FIELD_SEPARATOR}{user_id}{FIELD_SEPARATOR}{}",
        expires_at.timestamp()
    );
    let mac = compute_mac(signing_key, payload.as_bytes());
    format!(
        "{}.{}",
        base64::encode_config(payload.as_bytes(), base64::URL_SAFE_NO_PAD),
        base64::encode_config(mac, base64::URL_SAFE_NO_PAD)
    )
}

pub fn verify_download_token(
    signing_key: &str,
    token: &str,
    now: DateTime<Utc>,
) -> Result<DownloadClaim, DownloadTokenError> {
    let (payload_b64, mac_b64) = token.split_once('.').ok_or(DownloadTokenError::Malformed)?;
    let payload =
        base64::decode_config(payload_b64, base64::URL_SAFE_NO_PAD).map_err(|_| DownloadTokenError::Malformed)?;
    let mac = base64::decode_config(mac_b64, base64::URL_SAFE_NO_PAD).map_err(|_| DownloadTokenError::Malformed)?;
    let mut verifier = HmacSha256::new_from_slice(signing_key.as_bytes()).expect("HMAC accepts keys of any length");
    verifier.update(&payload);
    verifier.verify_slice(&mac).map_err(|_| DownloadTokenError::BadSignature)?;
    let payload = String::from_utf8(payload).map_err(|_| DownloadTokenError::Malformed)?;
    let mut parts = payload.split(FIELD_SEPARATOR);
    let object_key = parts.next().ok_or(DownloadTokenError::Malformed)?.to_string();
    let order_id = parts.next().ok_or(DownloadTokenError::Malformed)?.to_string();
    let user_id = parts.next().ok_or(DownloadTokenError::Malformed)?.to_string();
    let expiry_ts: i64 =
        parts.next().ok_or(DownloadTokenError::Malformed)?.parse().map_err(|_| DownloadTokenError::Malformed)?;
    let expires_at = Utc.timestamp_opt(expiry_ts, 0).single().ok_or(DownloadTokenError::Malformed)?;
    if now >= expires_at {
        return Err(DownloadTokenError::Expired(expires_at));
    }
    Ok(DownloadClaim { object_key, order_id, user_id, expires_at })
}

fn compute_mac(signing_key: &str, payload: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(signing_key.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}
