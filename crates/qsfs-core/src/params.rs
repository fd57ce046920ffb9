//! Fixed parameter sets for the two Module-LWE primitives.
//!
//! `N` is shared between both parameter sets; everything else is specific to
//! the Kyber-like KEM or the Dilithium-like verifier. These are not claimed
//! to be FIPS 203/204 compliant — they are the concrete numbers the rest of
//! the crate's rejection-sampling and reduction rules are built around.

/// Ring degree shared by both parameter sets.
pub const N: usize = 256;

// --- Kyber-like KEM parameters ---------------------------------------------

/// Kyber-like modulus.
pub const Q_K: i64 = 3329;
/// Module rank (size of the public/secret key poly-vectors).
pub const K_K: usize = 3;
/// Centered-binomial noise bound.
pub const ETA_K: i64 = 2;

/// SHAKE-128 blocks squeezed for the Dilithium-flavor uniform sampler:
/// `ceil((768 + 167) / 168)`.
pub const UNIFORM_NBLOCKS: usize = 6;
/// SHAKE-128 blocks squeezed for the Kyber-flavor uniform sampler:
/// `ceil(ceil(12 * (N/8) * 4096 / Q_K + 168) / 168)`.
pub const GEN_NBLOCKS: usize = 4;
/// SHAKE-128 rate in bytes.
pub const STREAM128_BLOCKBYTES: usize = 168;
/// SHAKE-256 output length used for `challenge`/transcript hashing.
pub const STREAM256_OUTPUTBYTES: usize = 32;

// --- Dilithium-like verifier parameters ------------------------------------

/// Dilithium-like modulus.
pub const Q: i64 = 8_380_417;
/// Matrix row count (length of `t`).
pub const DILITHIUM_K: usize = 6;
/// Matrix column count (length of `z`).
pub const DILITHIUM_L: usize = 5;
/// Low-bits/high-bits split bound used in `decompose`.
pub const GAMMA2: i64 = (Q - 1) / 32;
/// Signer-mask bound; a valid signature has some `z` polynomial with every
/// coefficient's absolute value below `GAMMA1 - BETA`.
pub const GAMMA1: i64 = 1 << 19;
/// Infinity-norm slack term in the verifier's `z`-norm predicate.
pub const BETA: i64 = 196;
/// Number of nonzero coefficients in a challenge polynomial.
pub const TAU: usize = 49;
