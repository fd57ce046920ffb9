//! Key derivation and content hashing shared by the envelope pipeline.

use sha3::{Digest, Sha3_256};

use crate::error::{CoreError, Result};

/// `SHA3-256(min(e1,e2) || max(e1,e2)).hex` — canonicalized over the
/// unordered pair so both endpoints derive the same key.
pub fn pairwise_key(e1: &str, e2: &str) -> String {
    let (a, b) = if e1 <= e2 { (e1, e2) } else { (e2, e1) };
    let mut hasher = Sha3_256::new();
    hasher.update(a.as_bytes());
    hasher.update(b.as_bytes());
    hex::encode(hasher.finalize())
}

/// `SHA3-256(plaintext).hex`.
pub fn content_hash(plaintext: &[u8]) -> String {
    let mut hasher = Sha3_256::new();
    hasher.update(plaintext);
    hex::encode(hasher.finalize())
}

/// `pairwise[0..16] || AES_SECRET_KEY[0..16]`, the 32-byte key used for
/// at-rest re-encryption of a stored file.
pub fn storage_aes_key(pairwise_hex: &str, aes_secret_key: &[u8]) -> Result<[u8; 32]> {
    let pairwise_bytes = pairwise_hex.as_bytes();
    if pairwise_bytes.len() < 16 || aes_secret_key.len() < 16 {
        return Err(CoreError::KeyMaterialTooShort);
    }
    let mut key = [0u8; 32];
    key[..16].copy_from_slice(&pairwise_bytes[..16]);
    key[16..].copy_from_slice(&aes_secret_key[..16]);
    Ok(key)
}

/// Pack the first `n_bytes * 8` entries of a `{0,1}` bit sequence into bytes,
/// big-endian within each byte (bit 0 is the MSB).
pub fn bits_to_key_bytes(bits: &[u8], n_bytes: usize) -> Vec<u8> {
    (0..n_bytes)
        .map(|byte_idx| {
            let mut byte = 0u8;
            for bit_idx in 0..8 {
                byte = (byte << 1) | (bits[byte_idx * 8 + bit_idx] & 1);
            }
            byte
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairwise_key_is_order_independent() {
        assert_eq!(pairwise_key("alice@x.com", "bob@x.com"), pairwise_key("bob@x.com", "alice@x.com"));
    }

    #[test]
    fn storage_key_rejects_short_material() {
        assert!(storage_aes_key("short", b"0123456789abcdef").is_err());
        assert!(storage_aes_key(&"a".repeat(32), b"short").is_err());
    }

    #[test]
    fn bits_to_key_bytes_packs_big_endian() {
        let bits = [0u8, 0, 0, 0, 0, 0, 0, 1, 1, 0, 0, 0, 0, 0, 0, 0];
        let bytes = bits_to_key_bytes(&bits, 2);
        assert_eq!(bytes, vec![0x01, 0x80]);
    }
}
