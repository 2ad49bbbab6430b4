//! Keyed digest (C2) and secret generation (C7). See spec.md §4.2, §4.7.

use base32::Alphabet;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha224;

type HmacSha224 = Hmac<Sha224>;

/// `secret_hash(name, secret) -> string`
///
/// Computes HMAC-SHA224(secret, name), base32-encodes the 28-byte
/// digest, strips `=` padding and lowercases it. The result is a
/// 45-character token using only `a-z2-7`, safe to use as an address
/// localpart.
///
/// Because this is an HMAC, it doubles as a MAC over `name`: anyone
/// holding `secret` can re-derive the token for a claimed `name` and
/// compare, which is what defends the store against poisoned entries
/// (spec.md §4.2, §4.4).
pub fn secret_hash(name: &[u8], secret: &[u8]) -> String {
    let mut mac = HmacSha224::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(name);
    let digest = mac.finalize().into_bytes();
    base32::encode(Alphabet::Rfc4648 { padding: false }, &digest).to_lowercase()
}

/// Produce a fresh 32-byte master secret from the OS's secure random
/// source, base64-encoded. This is the only shape `S_hash` and
/// `S_store` accept in configuration (spec.md §4.7).
pub fn new_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    base64::Engine::encode(&base64::engine::general_purpose::STANDARD, bytes)
}

/// Decode a base64-encoded master secret into its raw bytes, as stored
/// in configuration for `S_hash` / `S_store`.
pub fn decode_secret(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    base64::Engine::decode(&base64::engine::general_purpose::STANDARD, encoded)
}
