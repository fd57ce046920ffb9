//! Module-LWE key encapsulation (Kyber-like). Key generation, CPA
//! encapsulation and CPA decapsulation over the Kyber-flavor ring.

use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::params::{ETA_K, K_K, N, Q_K};
use crate::ring::{self, PolyVec};
use crate::sampler::{self, XofFlavor};

/// `(t, seed)`: the expandable public matrix seed plus the LWE sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicKey {
    pub t: PolyVec,
    pub seed: [u8; 32],
}

/// The sampled noise vector `s`. Zeroized on drop since it is
/// session-held secret material (§5's session-KEM binding). Serializable
/// so a session can be persisted across process boundaries (the CLI has no
/// long-running server to hold it in memory); callers that do this own the
/// responsibility of protecting the serialized form at rest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretKey {
    pub s: PolyVec,
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        for poly in &mut self.s.0 {
            poly.zeroize();
        }
    }
}

pub struct KeyPair {
    pub public: PublicKey,
    pub secret: SecretKey,
}

/// A Kyber-like ciphertext: `(u, v)`.
#[derive(Debug, Clone)]
pub struct Ciphertext {
    pub u: PolyVec,
    pub v: ring::Poly,
}

/// Result of encapsulation: the ciphertext plus the 256-bit shared key it
/// carries, expressed as one bit per `u8`.
pub struct Encapsulated {
    pub ciphertext: Ciphertext,
    pub key_bits: [u8; 256],
}

fn expand_a(seed: &[u8]) -> ring::PolyMatrix {
    sampler::expand_matrix(seed, K_K, K_K, Q_K, XofFlavor::Kyber)
}

/// Generate a fresh key pair: sample `A` from a random seed, sample secret
/// and error vectors, and compute `t = A·s + e (mod Q_K)`.
pub fn keygen() -> KeyPair {
    let seed = sampler::random_seed();
    let a = expand_a(&seed);

    let mut rng = OsRng;
    let s = sampler::noise_vector(K_K, ETA_K, &mut rng);
    let e = sampler::noise_vector(K_K, ETA_K, &mut rng);

    let as_prod = ring::matmul_vec(&a, &s, Q_K, false);
    let t = ring::reduce_vec_plus(&ring::add_vec(&as_prod, &e), Q_K);

    KeyPair {
        public: PublicKey { t, seed },
        secret: SecretKey { s },
    }
}

/// Expand a random 32-byte secret into a `{0,1}` bit sequence, big-endian
/// within each byte, then scale each bit by `ceil(Q_K / 2)` to produce the
/// message polynomial `m`.
fn message_poly_from_random() -> ([u8; 256], ring::Poly) {
    let raw = sampler::random_seed();
    let mut bits = [0u8; 256];
    for (byte_idx, byte) in raw.iter().enumerate() {
        for bit_idx in 0..8 {
            bits[byte_idx * 8 + bit_idx] = (byte >> (7 - bit_idx)) & 1;
        }
    }
    let scale = (Q_K + 1) / 2; // ceil(Q_K / 2)
    let m = bits.iter().map(|&b| b as i64 * scale).collect();
    (bits, m)
}

/// Encapsulate to a recipient's `(t, seed)` public key: `u = A^T·r + e1`,
/// `v = <t, r> + e2 + m`.
pub fn encapsulate(pk: &PublicKey) -> Encapsulated {
    let (key_bits, m) = message_poly_from_random();
    let a = expand_a(&pk.seed);

    let mut rng = OsRng;
    let r = sampler::noise_vector(K_K, ETA_K, &mut rng);
    let e1 = sampler::noise_vector(K_K, ETA_K, &mut rng);
    let e2 = sampler::noise_poly(ETA_K, &mut rng);

    let at_r = ring::matmul_vec(&a, &r, Q_K, true);
    let u = ring::reduce_vec_plus(&ring::add_vec(&at_r, &e1), Q_K);

    let t_r = ring::inner_product(&pk.t, &r, Q_K);
    let v = ring::reduce_plus(&ring::add(&ring::add(&t_r, &e2), &m), Q_K);

    Encapsulated {
        ciphertext: Ciphertext { u, v },
        key_bits,
    }
}

/// Recover the 256-bit shared key from a ciphertext using the secret `s`:
/// `w = v - <s, u>`, then threshold each coefficient against `ceil(Q_K/2)`.
pub fn decapsulate(sk: &SecretKey, ct: &Ciphertext) -> [u8; 256] {
    let s_u = ring::inner_product(&sk.s, &ct.u, Q_K);
    let w = ring::reduce_plus(&ring::sub(&ct.v, &s_u), Q_K);

    let half = (Q_K + 1) / 2;
    let mut out = [0u8; 256];
    for (i, &c) in w.iter().enumerate().take(N) {
        let d_half = (c - half).abs();
        let d_zero = c.abs();
        let d_q = (c - Q_K).abs();
        out[i] = if d_half < d_zero.min(d_q) { 1 } else { 0 };
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_recovers_shared_key() {
        let mut failures = 0u32;
        let trials = 200u32;
        for _ in 0..trials {
            let kp = keygen();
            let enc = encapsulate(&kp.public);
            let recovered = decapsulate(&kp.secret, &enc.ciphertext);
            if recovered != enc.key_bits {
                failures += 1;
            }
        }
        // Correctness bound is probabilistic (§4.C); require the overwhelming
        // majority of trials to round-trip exactly.
        assert!(
            failures as f64 / trials as f64 <= 0.01,
            "too many KEM decryption failures: {failures}/{trials}"
        );
    }

    #[test]
    fn fixed_seed_matrix_and_t_are_deterministic() {
        let seed = [9u8; 32];
        let a1 = expand_a(&seed);
        let a2 = expand_a(&seed);
        for (c1, c2) in a1.cells.iter().zip(&a2.cells) {
            assert_eq!(c1, c2);
        }
    }
}
