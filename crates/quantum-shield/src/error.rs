//! Error taxonomy for the session, storage and upload/download pipeline.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("cannot send a file to yourself")]
    SelfRecipient,

    #[error("recipient or sender identity is not known to this node")]
    UnknownRecipient,

    #[error("no session secret for this identity/session id; call begin_session first")]
    SessionKeyMissing,

    #[error("file failed signature verification, refusing to store")]
    CorruptFile,

    #[error("upload and ciphertext/signature counts disagree: {uploads} buffers vs {signatures} signatures")]
    BatchLengthMismatch { uploads: usize, signatures: usize },

    #[error("record not found")]
    RecordNotFound,

    #[error("file contents missing from storage for id {0}")]
    FileMissing(String),

    #[error("download limit already reached for this record")]
    DownloadLimitReached,

    #[error("this record has expired")]
    RecordExpired,

    #[error(transparent)]
    Core(#[from] qsfs_core::CoreError),

    #[error("malformed JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("ciphertext is not a whole number of cipher blocks")]
    BadCiphertextLength,

    #[error("PKCS#7 padding is invalid")]
    BadPadding,

    #[error("missing configuration: {0}")]
    MissingConfig(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
