//! AES-CBC with PKCS#7 padding, whole-buffer (not streaming, not an AEAD
//! mode). Integrity for both layers this module serves comes from a
//! Dilithium-style signature check elsewhere in the pipeline, not from a
//! MAC here — matching the source, which never authenticates the
//! ciphertext itself.

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes::{Aes192, Aes256};
use rand::RngCore;

use crate::error::{PipelineError, Result};

const BLOCK_SIZE: usize = 16;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;
type Aes192CbcEnc = cbc::Encryptor<Aes192>;
type Aes192CbcDec = cbc::Decryptor<Aes192>;

/// Random 16-byte IV, one per encryption call.
pub fn random_iv() -> [u8; BLOCK_SIZE] {
    let mut iv = [0u8; BLOCK_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut iv);
    iv
}

/// Encrypt with a 32-byte key (the at-rest storage layer).
pub fn encrypt_256(key: &[u8; 32], iv: &[u8; BLOCK_SIZE], plaintext: &[u8]) -> Vec<u8> {
    Aes256CbcEnc::new(key.into(), iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

/// Decrypt with a 32-byte key.
pub fn decrypt_256(key: &[u8; 32], iv: &[u8; BLOCK_SIZE], ciphertext: &[u8]) -> Result<Vec<u8>> {
    if ciphertext.len() % BLOCK_SIZE != 0 || ciphertext.is_empty() {
        return Err(PipelineError::BadCiphertextLength);
    }
    Aes256CbcDec::new(key.into(), iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| PipelineError::BadPadding)
}

/// Encrypt with a 24-byte key (the peer-session layer, derived from the
/// first 192 bits of the Kyber-decapsulated 256-bit shared secret).
pub fn encrypt_192(key: &[u8; 24], iv: &[u8; BLOCK_SIZE], plaintext: &[u8]) -> Vec<u8> {
    Aes192CbcEnc::new(key.into(), iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

/// Decrypt with a 24-byte key.
pub fn decrypt_192(key: &[u8; 24], iv: &[u8; BLOCK_SIZE], ciphertext: &[u8]) -> Result<Vec<u8>> {
    if ciphertext.len() % BLOCK_SIZE != 0 || ciphertext.is_empty() {
        return Err(PipelineError::BadCiphertextLength);
    }
    Aes192CbcDec::new(key.into(), iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| PipelineError::BadPadding)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_256() {
        let key = [7u8; 32];
        let iv = random_iv();
        let pt = b"the quick brown fox jumps over the lazy dog, repeatedly";
        let ct = encrypt_256(&key, &iv, pt);
        assert_eq!(decrypt_256(&key, &iv, &ct).unwrap(), pt);
    }

    #[test]
    fn round_trip_192() {
        let key = [3u8; 24];
        let iv = random_iv();
        let pt = b"";
        let ct = encrypt_192(&key, &iv, pt);
        assert_eq!(decrypt_192(&key, &iv, &ct).unwrap(), pt);
    }

    #[test]
    fn rejects_truncated_ciphertext() {
        let key = [1u8; 32];
        let iv = [0u8; BLOCK_SIZE];
        assert!(decrypt_256(&key, &iv, &[1, 2, 3]).is_err());
    }
}
