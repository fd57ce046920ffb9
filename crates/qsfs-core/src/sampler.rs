//! Deterministic sampling of ring elements from an XOF, plus the
//! non-deterministic noise and seed generators that back key generation.

use rand_core::{CryptoRng, RngCore};
use sha3::digest::{ExtendableOutput, Update, XofReader};
use sha3::{Shake128, Shake256};

use crate::params::{
    GEN_NBLOCKS, N, STREAM128_BLOCKBYTES, STREAM256_OUTPUTBYTES, TAU, UNIFORM_NBLOCKS,
};
use crate::ring::{Poly, PolyMatrix, PolyVec};

/// Which rejection-sampling/nonce convention `expand_matrix` should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XofFlavor {
    /// Dilithium-style: 23-bit rejection window, big-endian `(i<<8)|j` nonce.
    Dilithium,
    /// Kyber-style: two 12-bit values per 3 bytes, raw `[i, j]` nonce.
    Kyber,
}

fn squeeze(seed: &[u8], nonce: &[u8], blocks: usize) -> Vec<u8> {
    let mut shake = Shake128::default();
    Update::update(&mut shake, seed);
    Update::update(&mut shake, nonce);
    let mut reader = shake.finalize_xof();
    let mut buf = vec![0u8; blocks * STREAM128_BLOCKBYTES];
    reader.read(&mut buf);
    buf
}

/// Dilithium-flavor uniform rejection sampler: 3 bytes -> one 23-bit
/// candidate, accepted if `< q`.
pub fn uniform_poly(seed: &[u8], nonce: &[u8], q: i64) -> Poly {
    let buffer = squeeze(seed, nonce, UNIFORM_NBLOCKS);
    let mut out = vec![0i64; N];
    let mut ctr = 0usize;
    let mut pos = 0usize;
    while ctr < N && pos + 3 <= buffer.len() {
        let b = (buffer[pos] as u32) | ((buffer[pos + 1] as u32) << 8) | ((buffer[pos + 2] as u32) << 16);
        let b = (b & 0x7F_FFFF) as i64;
        pos += 3;
        if b < q {
            out[ctr] = b;
            ctr += 1;
        }
    }
    out
}

/// Kyber-flavor uniform rejection sampler: 3 bytes -> two 12-bit candidates.
pub fn uniform_poly_kyber(seed: &[u8], nonce: &[u8], q: i64) -> Poly {
    let buffer = squeeze(seed, nonce, GEN_NBLOCKS);
    let mut out = vec![0i64; N];
    let mut ctr = 0usize;
    let mut pos = 0usize;
    while ctr < N && pos + 3 <= buffer.len() {
        let val0 = ((buffer[pos] as u32) | ((buffer[pos + 1] as u32) << 8)) & 0xFFF;
        let val1 = ((buffer[pos + 1] as u32 >> 4) | ((buffer[pos + 2] as u32) << 4)) & 0xFFF;
        pos += 3;
        if (val0 as i64) < q {
            out[ctr] = val0 as i64;
            ctr += 1;
        }
        if ctr < N && (val1 as i64) < q {
            out[ctr] = val1 as i64;
            ctr += 1;
        }
    }
    out
}

/// Deterministically expand a `rows x cols` matrix of ring elements from a
/// 32-byte seed, one independent XOF call per cell in row-major order.
pub fn expand_matrix(seed: &[u8], rows: usize, cols: usize, q: i64, flavor: XofFlavor) -> PolyMatrix {
    let mut cells = Vec::with_capacity(rows * cols);
    for i in 0..rows {
        for j in 0..cols {
            let poly = match flavor {
                XofFlavor::Dilithium => {
                    let nonce = (((i as u16) << 8) | j as u16).to_be_bytes();
                    uniform_poly(seed, &nonce, q)
                }
                XofFlavor::Kyber => {
                    let nonce = [i as u8, j as u8];
                    uniform_poly_kyber(seed, &nonce, q)
                }
            };
            cells.push(poly);
        }
    }
    PolyMatrix { rows, cols, cells }
}

/// Draw one centered-binomial sample in `[-eta, eta]` from a cryptographic RNG.
pub fn centered_binomial<R: RngCore + CryptoRng>(eta: i64, rng: &mut R) -> i64 {
    let eta = eta as u32;
    let mut a = 0i64;
    let mut b = 0i64;
    for _ in 0..eta {
        a += (rng.next_u32() & 1) as i64;
    }
    for _ in 0..eta {
        b += (rng.next_u32() & 1) as i64;
    }
    a - b
}

/// A noise polynomial whose every coefficient is an independent
/// `centered_binomial(eta)` draw.
pub fn noise_poly<R: RngCore + CryptoRng>(eta: i64, rng: &mut R) -> Poly {
    (0..N).map(|_| centered_binomial(eta, rng)).collect()
}

/// A noise poly-vector of the given size.
pub fn noise_vector<R: RngCore + CryptoRng>(size: usize, eta: i64, rng: &mut R) -> PolyVec {
    PolyVec((0..size).map(|_| noise_poly(eta, rng)).collect())
}

/// Dilithium-style sparse challenge polynomial with exactly `TAU`
/// coefficients of ±1, derived deterministically from a 32-byte commitment.
pub fn challenge(seed: &[u8]) -> Poly {
    let mut shake = Shake256::default();
    Update::update(&mut shake, seed);
    let mut reader = shake.finalize_xof();
    let mut random_bytes = vec![0u8; STREAM256_OUTPUTBYTES * 8];
    reader.read(&mut random_bytes);

    let mut c = vec![0i64; N];
    let mut position = 0usize;
    for i in (N - TAU)..N {
        let index_j = (random_bytes[position % N] as usize) % (i + 1);
        let sign = random_bytes[position] & 1;
        position += 1;

        c[i] = c[index_j];
        c[index_j] = if sign == 1 { -1 } else { 1 };
    }
    c
}

/// 32 cryptographically strong random bytes.
pub fn random_seed() -> [u8; 32] {
    let mut seed = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut seed);
    seed
}
