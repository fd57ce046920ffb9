//! A signer for `qsfs upload` to call, since `qsfs-core::dilithium` is
//! verify-only (signing is explicitly out of scope for the workspace).
//!
//! This reimplements the verifier's own transcript computation against a
//! zero masking vector (`y = 0`, so `z = c·s` and `A·z - c·t = A·y = 0`
//! exactly) to produce a signature `dilithium::verify` accepts. It exists
//! purely so this CLI can exercise the upload path end to end without a
//! production signer; it leaks the secret `s` through `z` and must never be
//! used outside this kind of local, throwaway testing.

use sha3::digest::{ExtendableOutput, Update, XofReader};
use sha3::Shake256;

use qsfs_core::dilithium::{PublicKey, Signature};
use qsfs_core::params::{DILITHIUM_K, DILITHIUM_L, N, Q};
use qsfs_core::ring::{self, PolyMatrix, PolyVec};
use qsfs_core::sampler::{self, XofFlavor};

pub struct Keypair {
    pub public: PublicKey,
    pub secret: PolyVec,
}

fn pack_nibbles(p: &[i64]) -> Vec<u8> {
    (0..N / 2)
        .map(|i| {
            let lo = (p[2 * i] as u8) & 0x0F;
            let hi = (p[2 * i + 1] as u8) & 0x0F;
            lo | (hi << 4)
        })
        .collect()
}

fn transcript_hash(message: &[u8], packed_w1: &[u8]) -> [u8; 32] {
    let mut shake = Shake256::default();
    Update::update(&mut shake, message);
    Update::update(&mut shake, packed_w1);
    let mut reader = shake.finalize_xof();
    let mut out = [0u8; 32];
    reader.read(&mut out);
    out
}

/// Derive a throwaway keypair from `seed`, fresh per upload.
pub fn keygen(seed: &[u8; 32]) -> Keypair {
    let a = sampler::expand_matrix(seed, DILITHIUM_K, DILITHIUM_L, Q, XofFlavor::Dilithium);
    let s = PolyVec((0..DILITHIUM_L).map(|i| sampler::uniform_poly(seed, &[1, i as u8], 5)).collect());
    let t = ring::matmul_vec(&a, &s, Q, false);
    Keypair { public: PublicKey { a, t }, secret: s }
}

pub fn sign(message: &[u8], kp: &Keypair) -> Signature {
    let zero_w1 = vec![vec![0i64; N]; DILITHIUM_K];
    let mut packed = Vec::with_capacity(DILITHIUM_K * N / 2);
    for poly in &zero_w1 {
        packed.extend_from_slice(&pack_nibbles(poly));
    }
    let c_tilde = transcript_hash(message, &packed);
    let c = sampler::challenge(&c_tilde);
    let z = ring::scalar_mul_vec(&c, &kp.secret);
    Signature { z, c_tilde }
}

pub fn matrix_rows(m: &PolyMatrix) -> Vec<Vec<Vec<i64>>> {
    (0..m.rows).map(|i| (0..m.cols).map(|j| m.get(i, j).clone()).collect()).collect()
}
