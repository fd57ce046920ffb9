use thiserror::Error;

/// Errors surfaced by the arithmetic, sampling and KEM/signature primitives.
///
/// These are the failures that can occur independent of any envelope or
/// storage concern; the pipeline crate wraps this type rather than
/// duplicating it.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("key material shorter than 16 bytes")]
    KeyMaterialTooShort,

    #[error("XOF buffer exhausted before {needed} coefficients were accepted (got {got})")]
    XofExhausted { needed: usize, got: usize },

    #[error("poly-vector length mismatch: expected {expected}, got {got}")]
    LengthMismatch { expected: usize, got: usize },
}

pub type Result<T> = std::result::Result<T, CoreError>;
