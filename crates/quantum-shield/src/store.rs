//! Content-addressed blob storage plus the transfer log, mirroring the
//! source's `Files`/`FileLogs` tables without a database dependency.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::types::{FileLogRecord, FileRecord, LogSnapshot};

/// Storage backend for blobs and transfer logs. A trait so the CLI's
/// JSON-on-disk backend and a future database-backed one share the pipeline.
pub trait FileStore: Send + Sync {
    fn get_blob(&self, file_id: &str) -> Option<FileRecord>;
    fn put_blob_if_absent(&self, record: FileRecord);
    fn append_log(&self, log: FileLogRecord);
    fn find_log_by_public_id(&self, user_email: &str, public_id: &str) -> Option<FileLogRecord>;
    fn logs_for_identity(&self, identity: &str) -> Vec<FileLogRecord>;
    /// Whether `email` is a known identity on this node. Upload is refused
    /// when either endpoint is unknown (§9 scenario S2).
    fn identity_known(&self, email: &str) -> bool;
}

/// A handle to a trait-object `FileStore`, matching the concrete signatures
/// the pipeline functions are specified against.
pub type FileStoreHandle = dyn FileStore;

/// Process-local, `HashMap`-backed implementation.
#[derive(Default)]
pub struct InMemoryStore {
    blobs: Mutex<HashMap<String, FileRecord>>,
    logs: Mutex<Vec<FileLogRecord>>,
    identities: Mutex<HashSet<String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_identity(&self, email: &str) {
        self.identities.lock().unwrap().insert(email.to_string());
    }

    /// Snapshot every blob, log and known identity for persistence.
    pub fn export(&self) -> StoreSnapshot {
        StoreSnapshot {
            blobs: self.blobs.lock().unwrap().values().cloned().collect(),
            logs: self.logs.lock().unwrap().iter().map(LogSnapshot::from).collect(),
            identities: self.identities.lock().unwrap().iter().cloned().collect(),
        }
    }

    /// Rebuild a store from a prior snapshot.
    pub fn import(snapshot: StoreSnapshot) -> Self {
        let store = Self::new();
        {
            let mut blobs = store.blobs.lock().unwrap();
            for record in snapshot.blobs {
                blobs.insert(record.file_id.clone(), record);
            }
        }
        {
            let mut logs = store.logs.lock().unwrap();
            for log in snapshot.logs {
                logs.push(FileLogRecord::from(log));
            }
        }
        {
            let mut identities = store.identities.lock().unwrap();
            for identity in snapshot.identities {
                identities.insert(identity);
            }
        }
        store
    }
}

/// Flat, serializable snapshot of an [`InMemoryStore`], for round-tripping
/// node state through a JSON file between CLI invocations.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub blobs: Vec<FileRecord>,
    pub logs: Vec<LogSnapshot>,
    pub identities: Vec<String>,
}

impl FileStore for InMemoryStore {
    fn get_blob(&self, file_id: &str) -> Option<FileRecord> {
        self.blobs.lock().unwrap().get(file_id).cloned()
    }

    /// Content-addressing: a blob already on file under this `file_id` is
    /// left untouched rather than re-encrypted and re-stored.
    fn put_blob_if_absent(&self, record: FileRecord) {
        self.blobs.lock().unwrap().entry(record.file_id.clone()).or_insert(record);
    }

    fn append_log(&self, log: FileLogRecord) {
        self.logs.lock().unwrap().push(log);
    }

    fn find_log_by_public_id(&self, user_email: &str, public_id: &str) -> Option<FileLogRecord> {
        self.logs
            .lock()
            .unwrap()
            .iter()
            .find(|log| {
                log.public_id == public_id && (log.from_email == user_email || log.to_email == user_email)
            })
            .cloned()
    }

    fn logs_for_identity(&self, identity: &str) -> Vec<FileLogRecord> {
        let mut logs: Vec<FileLogRecord> = self
            .logs
            .lock()
            .unwrap()
            .iter()
            .filter(|log| log.from_email == identity || log.to_email == identity)
            .cloned()
            .collect();
        logs.sort_by(|a, b| b.sent_on.cmp(&a.sent_on));
        logs
    }

    fn identity_known(&self, email: &str) -> bool {
        self.identities.lock().unwrap().contains(email)
    }
}

impl Clone for FileLogRecord {
    fn clone(&self) -> Self {
        Self {
            public_id: self.public_id.clone(),
            file_id: self.file_id.clone(),
            name: self.name.clone(),
            size: self.size,
            from_email: self.from_email.clone(),
            to_email: self.to_email.clone(),
            sent_on: self.sent_on,
            expiry: self.expiry,
            download_count: self.download_count,
            remaining_downloads: Arc::clone(&self.remaining_downloads),
            is_anonymous: self.is_anonymous,
            status: self.status,
        }
    }
}

/// Atomically decrement `remaining_downloads`, refusing to go below zero.
/// Replaces the source's read-modify-write that two concurrent downloads
/// could both observe before either commits.
pub fn try_consume_download(log: &FileLogRecord) -> Result<()> {
    let result = log.remaining_downloads.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
        if current > 0 { Some(current - 1) } else { None }
    });
    match result {
        Ok(_) => Ok(()),
        Err(_) => Err(PipelineError::DownloadLimitReached),
    }
}

pub fn is_expired(log: &FileLogRecord, now: DateTime<Utc>) -> bool {
    now > log.expiry
}
