// SPDX-FileCopyrightText: 2026 Snapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook signature verification.
//!
//! LINE signs every webhook delivery with HMAC-SHA256 over the raw request
//! body using the channel secret, base64-encoded into the
//! `x-line-signature` header. Verification must run on the raw bytes before
//! any JSON parsing, and the comparison is constant time via `Mac::verify_slice`.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Verify an `x-line-signature` header value against the raw request body.
///
/// Returns `false` for malformed base64 or a mismatched digest; never panics.
pub fn verify_signature(channel_secret: &str, body: &[u8], signature_b64: &str) -> bool {
    let Ok(expected) = BASE64.decode(signature_b64) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(channel_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Compute the signature LINE would send for `body`. Test helper for the
/// webhook handler and integration fixtures.
pub fn sign(channel_secret: &str, body: &[u8]) -> String {
    // new_from_slice only fails for unusable key lengths, which HMAC does not have.
    let mut mac = HmacSha256::new_from_slice(channel_secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC accepts any key length"));
    mac.update(body);
    BASE64.encode(mac.finalize().into_bytes())
}
