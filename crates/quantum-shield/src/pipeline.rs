//! Session issuance, upload ingestion and download rewrap: the three
//! operations the source exposes as `process_upload_files`,
//! `process_download_file` and the session-bootstrap step folded into them.

use base64::{engine::general_purpose, Engine as _};
use tracing::{info, instrument, warn};

use qsfs_core::derivation;
use qsfs_core::kyber;

use crate::cbc;
use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::session::{SessionHandle, SessionStore};
use crate::store::{try_consume_download, FileStoreHandle};
use crate::types::{
    ActivityEntry, DilithiumPublicKeyWire, DownloadRequest, DownloadResponse, FileLogRecord,
    FileRecord, FileSignatureWire, KyberCiphertextWire, ReceivedFileEntry, RecordStatus,
    SharedFileEntry, UploadRequest,
};

const SESSION_KEY_BYTES: usize = 24; // 192 bits, matching the source's byte_key[0..24]

/// Issue a fresh Kyber keypair for `identity`, bound to a new session id.
#[instrument(skip(store))]
pub fn begin_session(store: &SessionStore, identity: &str) -> SessionHandle {
    let handle = store.begin_session(identity);
    info!(session_id = %handle.session_id, "issued session");
    handle
}

fn session_aes_key(key_bits: &[u8; 256]) -> [u8; SESSION_KEY_BYTES] {
    let packed = derivation::bits_to_key_bytes(key_bits, SESSION_KEY_BYTES);
    let mut key = [0u8; SESSION_KEY_BYTES];
    key.copy_from_slice(&packed);
    key
}

/// Ingest a batch upload: decrypt each client-side ciphertext under the
/// session's shared key, verify its signature, re-encrypt for at-rest
/// storage under the sender/recipient pairwise key, and append a log entry
/// per file.
#[instrument(skip(store, files, upload, config), fields(recipient = %upload.dto.recipient_email))]
pub fn ingest_upload(
    store: &SessionStore,
    files: &FileStoreHandle,
    identity: &str,
    upload: UploadRequest,
    config: &Config,
) -> Result<()> {
    let dto = &upload.dto;

    if dto.recipient_email.trim() == identity {
        return Err(PipelineError::SelfRecipient);
    }
    if !files.identity_known(identity) || !files.identity_known(&dto.recipient_email) {
        return Err(PipelineError::UnknownRecipient);
    }

    let buffer_count = upload.encrypted_buffers.len();
    let signature_count = dto.file_signatures.len();
    if buffer_count != signature_count
        || buffer_count != dto.init_vectors.len()
        || buffer_count != dto.file_names.len()
        || buffer_count != dto.file_sizes.len()
    {
        return Err(PipelineError::BatchLengthMismatch { uploads: buffer_count, signatures: signature_count });
    }

    let shared_key: [u8; 24] = {
        let kyber_ct: KyberCiphertextWire = serde_json::from_str(&dto.kyber_key)?;
        let key_bits = store.decapsulate(identity, &upload.session_id, &kyber_ct.into_core())?;
        session_aes_key(&key_bits)
    };

    let dl_public_key: DilithiumPublicKeyWire = serde_json::from_str(&dto.dl_public_key)?;
    let dl_public_key = dl_public_key.into_core();

    let pairwise = derivation::pairwise_key(identity, &dto.recipient_email);
    let storage_key = derivation::storage_aes_key(&pairwise, config.aes_secret_key().as_bytes())?;

    let now = chrono::Utc::now();
    let mut logs = Vec::with_capacity(buffer_count);

    for index in 0..buffer_count {
        let iv_bytes = general_purpose::STANDARD.decode(&dto.init_vectors[index])?;
        if iv_bytes.len() != 16 {
            return Err(PipelineError::BadCiphertextLength);
        }
        let mut iv = [0u8; 16];
        iv.copy_from_slice(&iv_bytes);

        let file_data = cbc::decrypt_192(&shared_key, &iv, &upload.encrypted_buffers[index])?;

        let signature: FileSignatureWire = serde_json::from_str(&dto.file_signatures[index])?;
        let signature = signature.into_core()?;
        let message_len = file_data.len().min(1024);
        if !qsfs_core::dilithium::verify(&file_data[..message_len], &signature, &dl_public_key) {
            warn!(file = %dto.file_names[index], "signature verification failed");
            return Err(PipelineError::CorruptFile);
        }

        let file_id = derivation::content_hash(&file_data);
        let storage_iv = cbc::random_iv();
        let encrypted_data = cbc::encrypt_256(&storage_key, &storage_iv, &file_data);
        files.put_blob_if_absent(FileRecord { file_id: file_id.clone(), encrypted_data, iv: storage_iv });

        let expiry = now + chrono::Duration::days(dto.expiration_days);
        logs.push(FileLogRecord {
            public_id: uuid::Uuid::new_v4().to_string(),
            file_id,
            name: dto.file_names[index].clone(),
            size: dto.file_sizes[index],
            from_email: identity.to_string(),
            to_email: dto.recipient_email.clone(),
            sent_on: now,
            expiry,
            download_count: dto.download_count,
            remaining_downloads: std::sync::Arc::new(std::sync::atomic::AtomicI64::new(dto.download_count as i64)),
            is_anonymous: dto.anonymous,
            status: RecordStatus::Active,
        });
    }

    for log in logs {
        files.append_log(log);
    }

    info!(count = buffer_count, "ingested upload batch");
    Ok(())
}

/// Serve a download: look up the log entry, check the caller owns it and
/// the remaining-downloads budget isn't exhausted, decrypt the at-rest blob,
/// and re-encrypt it under a fresh Kyber encapsulation to the requester's
/// public key.
#[instrument(skip(files, req, config))]
pub fn serve_download(
    files: &FileStoreHandle,
    identity: &str,
    req: DownloadRequest,
    config: &Config,
) -> Result<DownloadResponse> {
    let log = files.find_log_by_public_id(identity, &req.file_id).ok_or(PipelineError::RecordNotFound)?;

    if log.status != RecordStatus::Active {
        return Err(PipelineError::RecordNotFound);
    }
    if crate::store::is_expired(&log, chrono::Utc::now()) {
        return Err(PipelineError::RecordExpired);
    }
    if log.remaining_downloads.load(std::sync::atomic::Ordering::SeqCst) < 1 {
        return Err(PipelineError::DownloadLimitReached);
    }

    let blob = files.get_blob(&log.file_id).ok_or_else(|| PipelineError::FileMissing(log.file_id.clone()))?;

    let pairwise = derivation::pairwise_key(&log.to_email, &log.from_email);
    let storage_key = derivation::storage_aes_key(&pairwise, config.aes_secret_key().as_bytes())?;
    let plaintext = cbc::decrypt_256(&storage_key, &blob.iv, &blob.encrypted_data)?;

    let public_key = req.recipient_public_key.into_core()?;
    let encapsulated = kyber::encapsulate(&public_key);

    let session_key = session_aes_key(&encapsulated.key_bits);
    let iv = cbc::random_iv();
    let encrypted_file_data = cbc::encrypt_192(&session_key, &iv, &plaintext);

    // The budget is checked for every requester above, but only the
    // intended recipient's download consumes it; the sender may re-fetch
    // their own copy without spending it.
    if log.to_email == identity {
        try_consume_download(&log)?;
    }

    info!(public_id = %req.file_id, "served download");

    Ok(DownloadResponse {
        encrypted_file_data,
        kyber_ciphertext: KyberCiphertextWire::from_core(&encapsulated.ciphertext),
        iv,
        file_name: log.name,
    })
}

pub fn list_activity(files: &FileStoreHandle, identity: &str, limit: usize) -> Vec<ActivityEntry> {
    files
        .logs_for_identity(identity)
        .into_iter()
        .take(limit)
        .map(|log| ActivityEntry {
            email: if log.is_anonymous {
                "*".to_string()
            } else if log.from_email == identity {
                log.to_email.clone()
            } else {
                log.from_email.clone()
            },
            kind: if log.from_email == identity { "send" } else { "receive" },
        })
        .collect()
}

pub fn list_received(files: &FileStoreHandle, identity: &str) -> Vec<ReceivedFileEntry> {
    let now = chrono::Utc::now();
    files
        .logs_for_identity(identity)
        .into_iter()
        .filter(|log| log.to_email == identity && log.status == RecordStatus::Active && log.expiry > now)
        .map(|log| ReceivedFileEntry {
            name: log.name,
            size: log.size,
            received_on: log.sent_on.to_rfc3339(),
            received_from: if log.is_anonymous { "*".to_string() } else { log.from_email },
            expiry: log.expiry.to_rfc3339(),
            download_count: log.remaining_downloads.load(std::sync::atomic::Ordering::SeqCst).max(0) as u32,
            file_id: log.public_id,
        })
        .collect()
}

pub fn list_shared(files: &FileStoreHandle, identity: &str) -> Vec<SharedFileEntry> {
    let now = chrono::Utc::now();
    files
        .logs_for_identity(identity)
        .into_iter()
        .filter(|log| log.from_email == identity && log.status == RecordStatus::Active && log.expiry > now)
        .map(|log| SharedFileEntry {
            name: log.name,
            size: log.size,
            sent_on: log.sent_on.to_rfc3339(),
            sent_to: if log.is_anonymous { "*".to_string() } else { log.to_email },
            expiry: log.expiry.to_rfc3339(),
            download_count: log.download_count,
            file_id: log.public_id,
        })
        .collect()
}
