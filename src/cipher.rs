//! The encryption half of the non-enumerable store (C4). See spec.md §4.4.
//!
//! `K_kv = HMAC-SHA256(S_store, k)`, truncated to 16 bytes for AES-128-CBC
//! (spec.md §9's resolution of the HMAC/cipher key-size mismatch).
//! Physical value layout is `IV || ciphertext`, IV is one cipher block
//! (16 bytes).

use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;
type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

const BLOCK_SIZE: usize = 16;

/// `K_kv = HMAC-SHA256(secret, salt)`, truncated to the AES-128 key width.
fn combine_key(secret: &[u8], salt: &[u8]) -> [u8; BLOCK_SIZE] {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(salt);
    let digest = mac.finalize().into_bytes();
    let mut key = [0u8; BLOCK_SIZE];
    key.copy_from_slice(&digest[..BLOCK_SIZE]);
    key
}

/// Encrypt `plaintext` under a key derived from `secret` and `salt`
/// (the logical store key). Returns `IV || ciphertext`.
pub fn encrypt(secret: &[u8], salt: &[u8], plaintext: &[u8]) -> Vec<u8> {
    let key = combine_key(secret, salt);
    let mut iv = [0u8; BLOCK_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut iv);

    let ciphertext = Aes128CbcEnc::new(&key.into(), &iv.into())
        .encrypt_padded_vec_mut::<aes::cipher::block_padding::Pkcs7>(plaintext);

    let mut out = Vec::with_capacity(BLOCK_SIZE + ciphertext.len());
    out.extend_from_slice(&iv);
    out.extend_from_slice(&ciphertext);
    out
}

/// Decrypt a physical value of the form `IV || ciphertext`, validating
/// PKCS7 padding in full (every trailing byte must equal the padding
/// length, not merely the last one — spec.md §9's hardening note).
/// Any structural problem surfaces as `Error::CorruptEntry`, never as
/// "absent" (spec.md §4.4, §7).
pub fn decrypt(secret: &[u8], salt: &[u8], physical: &[u8]) -> Result<Vec<u8>> {
    if physical.len() < BLOCK_SIZE || (physical.len() - BLOCK_SIZE) % BLOCK_SIZE != 0 {
        return Err(Error::CorruptEntry("truncated ciphertext".into()));
    }

    let key = combine_key(secret, salt);
    let (iv, ciphertext) = physical.split_at(BLOCK_SIZE);

    let mut buf = ciphertext.to_vec();
    Aes128CbcDec::new(&key.into(), iv.into())
        .decrypt_padded_mut::<aes::cipher::block_padding::Pkcs7>(&mut buf)
        .map(|pt| pt.to_vec())
        .map_err(|_| Error::CorruptEntry("invalid padding or ciphertext".into()))
}
