//! Wire DTOs and storage records for the upload/download pipeline.

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};

use qsfs_core::dilithium;
use qsfs_core::kyber;
use qsfs_core::ring::{PolyMatrix, PolyVec};

use crate::error::{PipelineError, Result};

/// A batch file upload, one entry per file in the batch.
#[derive(Debug, Deserialize)]
pub struct FileUploadDto {
    pub init_vectors: Vec<String>,
    pub file_names: Vec<String>,
    pub file_sizes: Vec<u64>,
    pub file_types: Vec<String>,
    pub file_signatures: Vec<String>,
    pub dl_public_key: String,
    pub kyber_key: String,
    pub recipient_email: String,
    pub expiration_days: i64,
    pub download_count: u32,
    pub anonymous: bool,
}

/// A single file download request.
#[derive(Debug, Deserialize)]
pub struct FileDownloadDto {
    pub file_id: String,
    pub kyber_key_pair: String,
}

/// Wire form of a Kyber public key: `(t, seed)`, `seed` base64-encoded.
#[derive(Debug, Serialize, Deserialize)]
pub struct KyberPublicKeyWire {
    pub t: Vec<Vec<i64>>,
    pub seed: String,
}

impl KyberPublicKeyWire {
    pub fn from_core(pk: &kyber::PublicKey) -> Self {
        Self {
            t: pk.t.0.clone(),
            seed: general_purpose::STANDARD.encode(pk.seed),
        }
    }

    pub fn into_core(self) -> Result<kyber::PublicKey> {
        let seed_bytes = general_purpose::STANDARD.decode(&self.seed)?;
        let mut seed = [0u8; 32];
        if seed_bytes.len() != 32 {
            return Err(PipelineError::BadCiphertextLength);
        }
        seed.copy_from_slice(&seed_bytes);
        Ok(kyber::PublicKey { t: PolyVec(self.t), seed })
    }
}

/// Wire form of a Kyber ciphertext: `(u, v)`.
#[derive(Debug, Serialize, Deserialize)]
pub struct KyberCiphertextWire {
    pub u: Vec<Vec<i64>>,
    pub v: Vec<i64>,
}

impl KyberCiphertextWire {
    pub fn from_core(ct: &kyber::Ciphertext) -> Self {
        Self { u: ct.u.0.clone(), v: ct.v.clone() }
    }

    pub fn into_core(self) -> kyber::Ciphertext {
        kyber::Ciphertext { u: PolyVec(self.u), v: self.v }
    }
}

/// Wire form of a file signature: `(z, c̃)`, `c̃` base64-encoded.
#[derive(Debug, Serialize, Deserialize)]
pub struct FileSignatureWire {
    pub z: Vec<Vec<i64>>,
    pub cp: String,
}

impl FileSignatureWire {
    pub fn into_core(self) -> Result<dilithium::Signature> {
        let bytes = general_purpose::STANDARD.decode(&self.cp)?;
        let mut c_tilde = [0u8; 32];
        if bytes.len() != 32 {
            return Err(PipelineError::BadCiphertextLength);
        }
        c_tilde.copy_from_slice(&bytes);
        Ok(dilithium::Signature { z: PolyVec(self.z), c_tilde })
    }
}

/// Wire form of a Dilithium verification key: `(A, t)`.
#[derive(Debug, Serialize, Deserialize)]
pub struct DilithiumPublicKeyWire {
    pub a: Vec<Vec<Vec<i64>>>,
    pub t: Vec<Vec<i64>>,
}

impl DilithiumPublicKeyWire {
    pub fn into_core(self) -> dilithium::PublicKey {
        let rows = self.a.len();
        let cols = self.a.first().map_or(0, |row| row.len());
        let cells = self.a.into_iter().flatten().collect();
        dilithium::PublicKey { a: PolyMatrix { rows, cols, cells }, t: PolyVec(self.t) }
    }
}

/// A content-addressed, at-rest-encrypted file blob (the `Files` table).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub file_id: String,
    pub encrypted_data: Vec<u8>,
    pub iv: [u8; 16],
}

/// Flat, serializable form of a [`FileLogRecord`] for on-disk persistence;
/// `remaining_downloads` is a plain integer here and rehydrated into an
/// `Arc<AtomicI64>` on load.
#[derive(Debug, Serialize, Deserialize)]
pub struct LogSnapshot {
    pub public_id: String,
    pub file_id: String,
    pub name: String,
    pub size: u64,
    pub from_email: String,
    pub to_email: String,
    pub sent_on: chrono::DateTime<chrono::Utc>,
    pub expiry: chrono::DateTime<chrono::Utc>,
    pub download_count: u32,
    pub remaining_downloads: i64,
    pub is_anonymous: bool,
    pub status: RecordStatus,
}

impl From<&FileLogRecord> for LogSnapshot {
    fn from(log: &FileLogRecord) -> Self {
        Self {
            public_id: log.public_id.clone(),
            file_id: log.file_id.clone(),
            name: log.name.clone(),
            size: log.size,
            from_email: log.from_email.clone(),
            to_email: log.to_email.clone(),
            sent_on: log.sent_on,
            expiry: log.expiry,
            download_count: log.download_count,
            remaining_downloads: log.remaining_downloads.load(std::sync::atomic::Ordering::SeqCst),
            is_anonymous: log.is_anonymous,
            status: log.status,
        }
    }
}

impl From<LogSnapshot> for FileLogRecord {
    fn from(snapshot: LogSnapshot) -> Self {
        Self {
            public_id: snapshot.public_id,
            file_id: snapshot.file_id,
            name: snapshot.name,
            size: snapshot.size,
            from_email: snapshot.from_email,
            to_email: snapshot.to_email,
            sent_on: snapshot.sent_on,
            expiry: snapshot.expiry,
            download_count: snapshot.download_count,
            remaining_downloads: std::sync::Arc::new(std::sync::atomic::AtomicI64::new(snapshot.remaining_downloads)),
            is_anonymous: snapshot.is_anonymous,
            status: snapshot.status,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordStatus {
    Active,
    Revoked,
}

/// A single logical transfer (the `FileLogs` table): one per file per
/// upload, addressed externally by `public_id`, internally by `file_id`
/// into the deduplicated blob store. `Clone` is implemented by hand in
/// `store` since `remaining_downloads` clones its `Arc`, not its value.
#[derive(Debug)]
pub struct FileLogRecord {
    pub public_id: String,
    pub file_id: String,
    pub name: String,
    pub size: u64,
    pub from_email: String,
    pub to_email: String,
    pub sent_on: chrono::DateTime<chrono::Utc>,
    pub expiry: chrono::DateTime<chrono::Utc>,
    pub download_count: u32,
    pub remaining_downloads: std::sync::Arc<std::sync::atomic::AtomicI64>,
    pub is_anonymous: bool,
    pub status: RecordStatus,
}

#[derive(Debug, Serialize)]
pub struct ActivityEntry {
    pub email: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ReceivedFileEntry {
    pub name: String,
    pub size: u64,
    pub received_on: String,
    pub received_from: String,
    pub expiry: String,
    pub download_count: u32,
    pub file_id: String,
}

/// Everything `pipeline::ingest_upload` needs: the session that produced the
/// client-side shared key, the per-file ciphertexts, and the batch metadata.
pub struct UploadRequest {
    pub session_id: String,
    pub encrypted_buffers: Vec<Vec<u8>>,
    pub dto: FileUploadDto,
}

/// Everything `pipeline::serve_download` needs: which log entry to serve and
/// the downloader's fresh Kyber public key to rewrap the one-time key under.
pub struct DownloadRequest {
    pub file_id: String,
    pub recipient_public_key: KyberPublicKeyWire,
}

pub struct DownloadResponse {
    pub encrypted_file_data: Vec<u8>,
    pub kyber_ciphertext: KyberCiphertextWire,
    pub iv: [u8; 16],
    pub file_name: String,
}

#[derive(Debug, Serialize)]
pub struct SharedFileEntry {
    pub name: String,
    pub size: u64,
    pub sent_on: String,
    pub sent_to: String,
    pub expiry: String,
    pub download_count: u32,
    pub file_id: String,
}
