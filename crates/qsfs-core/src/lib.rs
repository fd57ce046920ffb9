//! Module-LWE primitives for a post-quantum file-sharing envelope.
//!
//! This crate is the dependency-light arithmetic layer: ring operations
//! (§4.A), XOF-backed samplers (§4.B), a Kyber-like KEM (§4.C), a
//! Dilithium-like signature *verifier* (§4.D — signing is out of scope),
//! and the key-derivation/hashing helpers (§4.F). It has no knowledge of
//! HTTP, storage, or session state; `quantum-shield` composes it into the
//! envelope pipeline.

pub mod derivation;
pub mod dilithium;
pub mod error;
pub mod kyber;
pub mod params;
pub mod ring;
pub mod sampler;

pub use error::{CoreError, Result};
