//! Settlement event signatures.
//!
//! The payment processor signs each settlement event with a shared
//! secret: HMAC-SHA256 over `event_id|account_id|coins`, hex encoded.
//! Verification runs in constant time via the mac's own comparison.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::Coins;
use crate::model::AccountId;

type HmacSha256 = Hmac<Sha256>;

fn mac(secret: &[u8], event_id: &str, account_id: &AccountId, coins: Coins) -> HmacSha256 {
    // HMAC accepts keys of any length.
    let mut mac = HmacSha256::new_from_slice(secret).expect("hmac key of any length");
    mac.update(event_id.as_bytes());
    mac.update(b"|");
    mac.update(account_id.as_str().as_bytes());
    mac.update(b"|");
    mac.update(coins.get().to_string().as_bytes());
    mac
}

/// Sign an event the way the processor does. Used by tests and the
/// processor simulator; the service itself only verifies.
pub fn sign(secret: &[u8], event_id: &str, account_id: &AccountId, coins: Coins) -> String {
    hex::encode(mac(secret, event_id, account_id, coins).finalize().into_bytes())
}

/// Check a hex-encoded signature against the shared secret.
pub fn verify(
    secret: &[u8],
    event_id: &str,
    account_id: &AccountId,
    coins: Coins,
    signature: &str,
) -> bool {
    let Ok(bytes) = hex::decode(signature) else {
        return false;
    };
    mac(secret, event_id, account_id, coins)
        .verify_slice(&bytes)
        .is_ok()
}
