//! Standalone interoperability-vector checker (§8's "interoperability
//! vectors" contract). Reimplements just enough of the ring/sampler/KEM
//! arithmetic to revalidate a JSON vector file without linking the rest of
//! the workspace — a peer-client author can port this file alone to check
//! their own implementation against the same vectors.

use serde::Deserialize;
use sha3::digest::{ExtendableOutput, Update, XofReader};
use sha3::{Shake128, Shake256};

const N: usize = 256;
const UNIFORM_NBLOCKS: usize = 6;
const GEN_NBLOCKS: usize = 4;
const STREAM128_BLOCKBYTES: usize = 168;
const STREAM256_OUTPUTBYTES: usize = 32;
const TAU: usize = 49;

fn squeeze(seed: &[u8], nonce: &[u8], blocks: usize) -> Vec<u8> {
    let mut shake = Shake128::default();
    Update::update(&mut shake, seed);
    Update::update(&mut shake, nonce);
    let mut reader = shake.finalize_xof();
    let mut buf = vec![0u8; blocks * STREAM128_BLOCKBYTES];
    reader.read(&mut buf);
    buf
}

/// Dilithium-flavor uniform rejection sampler: 3 bytes -> one 23-bit candidate.
fn uniform_poly(seed: &[u8], nonce: &[u8], q: i64) -> Vec<i64> {
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
fn uniform_poly_kyber(seed: &[u8], nonce: &[u8], q: i64) -> Vec<i64> {
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

fn challenge(seed: &[u8]) -> Vec<i64> {
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

fn convolve(p1: &[i64], p2: &[i64]) -> Vec<i64> {
    if p1.is_empty() || p2.is_empty() {
        return Vec::new();
    }
    let mut out = vec![0i64; p1.len() + p2.len() - 1];
    for (i, &a) in p1.iter().enumerate() {
        if a == 0 {
            continue;
        }
        for (j, &b) in p2.iter().enumerate() {
            out[i + j] += a * b;
        }
    }
    out
}

fn ring_reduce(p: &[i64]) -> Vec<i64> {
    let mut reduced = vec![0i64; N];
    if p.is_empty() {
        return reduced;
    }
    let degree = p.len() - 1;
    for (i, &coeff) in p.iter().enumerate() {
        if coeff == 0 {
            continue;
        }
        let distance = degree - i;
        let index = distance % N;
        if (distance / N) % 2 == 0 {
            reduced[index] += coeff;
        } else {
            reduced[index] -= coeff;
        }
    }
    reduced.reverse();
    reduced
}

fn mul(p1: &[i64], p2: &[i64]) -> Vec<i64> {
    ring_reduce(&convolve(p1, p2))
}

fn add(p1: &[i64], p2: &[i64]) -> Vec<i64> {
    let len = p1.len().max(p2.len());
    (0..len).map(|i| p1.get(i).copied().unwrap_or(0) + p2.get(i).copied().unwrap_or(0)).collect()
}

fn reduce_plus(p: &[i64], q: i64) -> Vec<i64> {
    p.iter().map(|&c| c.rem_euclid(q)).collect()
}

#[derive(Deserialize)]
struct SamplerVector {
    flavor: String, // "dilithium" | "kyber"
    seed_hex: String,
    nonce_hex: String,
    q: i64,
    expected_hex: String, // N 4-byte big-endian i32s, concatenated
}

#[derive(Deserialize)]
struct ChallengeVector {
    commitment_hex: String,
    expected_hex: String,
}

#[derive(Deserialize)]
struct KyberVector {
    seed_hex: String,
    q: i64,
    k: usize,
    /// Row-major `k` secret polynomials, each `expected_hex`-style packed i64s.
    s_hex: Vec<String>,
    e_hex: Vec<String>,
    expected_t_hex: Vec<String>,
}

#[derive(Deserialize)]
struct Vectors {
    sampler: Vec<SamplerVector>,
    challenge: Vec<ChallengeVector>,
    kyber: Vec<KyberVector>,
}

fn pack_poly(p: &[i64]) -> String {
    let mut bytes = Vec::with_capacity(p.len() * 4);
    for &c in p {
        bytes.extend_from_slice(&(c as i32).to_be_bytes());
    }
    hex::encode(bytes)
}

fn unpack_poly(hex_str: &str) -> anyhow::Result<Vec<i64>> {
    let bytes = hex::decode(hex_str)?;
    Ok(bytes.chunks_exact(4).map(|c| i32::from_be_bytes([c[0], c[1], c[2], c[3]]) as i64).collect())
}

fn main() -> anyhow::Result<()> {
    let path = std::env::args().nth(1).expect("usage: verify-kat file.json");
    let data = std::fs::read_to_string(path)?;
    let vectors: Vectors = serde_json::from_str(&data)?;

    let mut checked = 0usize;

    for v in &vectors.sampler {
        let seed = hex::decode(&v.seed_hex)?;
        let nonce = hex::decode(&v.nonce_hex)?;
        let got = match v.flavor.as_str() {
            "dilithium" => uniform_poly(&seed, &nonce, v.q),
            "kyber" => uniform_poly_kyber(&seed, &nonce, v.q),
            other => anyhow::bail!("unknown sampler flavor: {other}"),
        };
        if pack_poly(&got) != v.expected_hex {
            anyhow::bail!("sampler vector mismatch for flavor {}", v.flavor);
        }
        checked += 1;
    }

    for v in &vectors.challenge {
        let commitment = hex::decode(&v.commitment_hex)?;
        let got = challenge(&commitment);
        if pack_poly(&got) != v.expected_hex {
            anyhow::bail!("challenge vector mismatch");
        }
        checked += 1;
    }

    for v in &vectors.kyber {
        let seed = hex::decode(&v.seed_hex)?;
        let mut a_rows = Vec::with_capacity(v.k);
        for i in 0..v.k {
            let mut row = Vec::with_capacity(v.k);
            for j in 0..v.k {
                let nonce = [i as u8, j as u8];
                row.push(uniform_poly_kyber(&seed, &nonce, v.q));
            }
            a_rows.push(row);
        }

        let s: Vec<Vec<i64>> = v.s_hex.iter().map(|h| unpack_poly(h)).collect::<anyhow::Result<_>>()?;
        let e: Vec<Vec<i64>> = v.e_hex.iter().map(|h| unpack_poly(h)).collect::<anyhow::Result<_>>()?;

        for i in 0..v.k {
            let mut acc = vec![0i64; N];
            for j in 0..v.k {
                acc = add(&acc, &mul(&a_rows[i][j], &s[j]));
            }
            let t_i = reduce_plus(&add(&acc, &e[i]), v.q);
            if pack_poly(&t_i) != v.expected_t_hex[i] {
                anyhow::bail!("kyber t[{i}] mismatch");
            }
        }
        checked += 1;
    }

    println!("KAT OK ({checked} vectors checked)");
    Ok(())
}
