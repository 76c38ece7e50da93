use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tokio::sync::watch;
use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Get current timestamp in milliseconds since epoch
pub fn current_timestamp_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

pub fn current_timestamp_secs() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

/// Completes once shutdown is signalled or the signalling side is gone.
pub async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Signature for the `op: login` websocket dialect:
/// base64(HMAC-SHA256(secret, timestamp + "GET" + path)).
pub fn login_signature(secret: &str, timestamp: &str, path: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| Error::AuthenticationError(e.to_string()))?;
    mac.update(timestamp.as_bytes());
    mac.update(b"GET");
    mac.update(path.as_bytes());
    let bytes = mac.finalize().into_bytes();
    Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
}
