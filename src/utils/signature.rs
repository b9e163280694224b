//! Webhook signature verification.
//!
//! ShotGrid signs every delivery with HMAC-SHA1 over the raw request body and
//! sends the result in the `x-sg-signature` header as `sha1=<hex digest>`.

use hmac::{Hmac, Mac};
use sha1::Sha1;
use tracing::debug;

type HmacSha1 = Hmac<Sha1>;

/// Header carrying the delivery signature.
pub const SIGNATURE_HEADER: &str = "x-sg-signature";

const SIGNATURE_PREFIX: &str = "sha1=";
const DIGEST_HEX_LEN: usize = 40;

/// Compute the signature header value a sender would attach to `body`.
pub fn compute_signature(body: &[u8], secret: &[u8]) -> String {
    // HMAC accepts keys of any length
    let mut mac = HmacSha1::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(body);
    format!("{}{}", SIGNATURE_PREFIX, hex::encode(mac.finalize().into_bytes()))
}

/// Verify `received` against the HMAC-SHA1 of `body` under `secret`.
///
/// Only the canonical form `sha1=<40 lowercase hex digits>` can match, so any
/// other spelling of the same digest is a mismatch. The digest comparison is
/// constant-time.
pub fn verify_signature(body: &[u8], received: &str, secret: &[u8]) -> bool {
    let Some(hex_digest) = received.strip_prefix(SIGNATURE_PREFIX) else {
        debug!("Signature is missing the sha1= prefix");
        return false;
    };

    if !is_canonical_digest(hex_digest) {
        debug!("Signature is not a lowercase hex SHA-1 digest");
        return false;
    }

    let expected = match hex::decode(hex_digest) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    let mut mac = match HmacSha1::new_from_slice(secret) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(body);

    mac.verify_slice(&expected).is_ok()
}

/// The exact shape `hex::encode` produces for a SHA-1 digest.
fn is_canonical_digest(digest: &str) -> bool {
    digest.len() == DIGEST_HEX_LEN
        && digest
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
