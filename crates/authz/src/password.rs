//! Salted password digests stored as `{salt}${hex(hmac_sha256(salt, password))}`,
//! plus constant-time secret comparison.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

pub fn hash_password(password: &str) -> String {
    let salt = Uuid::new_v4().simple().to_string();
    let digest = digest(&salt, password)
        .map(|mac| hex::encode(mac.finalize().into_bytes()))
        .unwrap_or_default();
    format!("{salt}${digest}")
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt, expected)) = stored.split_once('$') else {
        return false;
    };
    let Ok(expected) = hex::decode(expected) else {
        return false;
    };
    match digest(salt, password) {
        Some(mac) => mac.verify_slice(&expected).is_ok(),
        None => false,
    }
}

/// Constant-time comparison of a presented secret with the expected one.
/// Both sides are reduced to an HMAC keyed by `expected`, so neither the
/// content nor the length of `presented` leaks through timing.
pub fn secrets_match(expected: &str, presented: &str) -> bool {
    let (Some(reference), Some(candidate)) = (digest(expected, expected), digest(expected, presented)) else {
        return false;
    };
    candidate.verify_slice(&reference.finalize().into_bytes()).is_ok()
}

fn digest(salt: &str, password: &str) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(salt.as_bytes()).ok()?;
    mac.update(password.as_bytes());
    Some(mac)
}
