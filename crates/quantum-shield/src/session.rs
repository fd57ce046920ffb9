//! Process-local Kyber session state: one keypair per `(identity,
//! session_id)` pair.
//!
//! The source keyed sessions by identity alone, so a second `begin_session`
//! call for the same user overwrote the first secret while an upload built
//! against the old one was still in flight. Binding the secret to a
//! server-issued session id closes that race: an upload must echo the id it
//! was handed, and a stale or wrong id is rejected rather than silently
//! decrypting with the wrong key.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use qsfs_core::kyber::{self, SecretKey};

use crate::error::{PipelineError, Result};

struct SessionEntry {
    identity: String,
    secret: SecretKey,
}

/// A `(session_id, identity, secret)` row, for persisting sessions across
/// process boundaries (the CLI's only practical option without a
/// long-running server to hold `SessionStore` in memory).
#[derive(Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub identity: String,
    pub secret: SecretKey,
}

/// An issued session: the caller gets the public key to hand to a peer and
/// an opaque id it must present on every subsequent upload.
pub struct SessionHandle {
    pub session_id: String,
    pub public: kyber::PublicKey,
}

#[derive(Default)]
pub struct SessionStore {
    entries: DashMap<String, SessionEntry>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self { entries: DashMap::new() }
    }

    /// Generate a fresh Kyber keypair for `identity` and register it under a
    /// new session id. Does not disturb any other session already on file
    /// for the same identity.
    pub fn begin_session(&self, identity: &str) -> SessionHandle {
        let keypair = kyber::keygen();
        let session_id = Uuid::new_v4().to_string();
        let public = keypair.public.clone();
        self.entries.insert(
            session_id.clone(),
            SessionEntry { identity: identity.to_string(), secret: keypair.secret },
        );
        SessionHandle { session_id, public }
    }

    /// Decapsulate `ciphertext` with the secret registered under
    /// `(identity, session_id)`. Fails closed if the id is unknown, expired,
    /// or was issued to a different identity.
    pub fn decapsulate(
        &self,
        identity: &str,
        session_id: &str,
        ciphertext: &kyber::Ciphertext,
    ) -> Result<[u8; 256]> {
        let entry = self.entries.get(session_id).ok_or(PipelineError::SessionKeyMissing)?;
        if entry.identity != identity {
            return Err(PipelineError::SessionKeyMissing);
        }
        Ok(kyber::decapsulate(&entry.secret, ciphertext))
    }

    /// Drop a session's secret once it has served its upload (or download
    /// rewrap), so a forgotten session id doesn't keep key material live
    /// indefinitely.
    pub fn end_session(&self, session_id: &str) {
        self.entries.remove(session_id);
    }

    /// Snapshot every live session for persistence.
    pub fn export(&self) -> Vec<SessionSnapshot> {
        self.entries
            .iter()
            .map(|entry| SessionSnapshot {
                session_id: entry.key().clone(),
                identity: entry.identity.clone(),
                secret: entry.secret.clone(),
            })
            .collect()
    }

    /// Rebuild a store from a prior snapshot.
    pub fn import(snapshots: Vec<SessionSnapshot>) -> Self {
        let store = Self::new();
        for snapshot in snapshots {
            store.entries.insert(
                snapshot.session_id,
                SessionEntry { identity: snapshot.identity, secret: snapshot.secret },
            );
        }
        store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrong_identity_is_rejected() {
        let store = SessionStore::new();
        let handle = store.begin_session("alice@example.com");
        let enc = kyber::encapsulate(&handle.public);
        let err = store.decapsulate("mallory@example.com", &handle.session_id, &enc.ciphertext);
        assert!(matches!(err, Err(PipelineError::SessionKeyMissing)));
    }

    #[test]
    fn unknown_session_id_is_rejected() {
        let store = SessionStore::new();
        let err = store.decapsulate("alice@example.com", "not-a-real-id", &kyber::Ciphertext {
            u: qsfs_core::ring::PolyVec(vec![]),
            v: vec![],
        });
        assert!(matches!(err, Err(PipelineError::SessionKeyMissing)));
    }

    #[test]
    fn concurrent_sessions_do_not_clobber_each_other() {
        let store = SessionStore::new();
        let h1 = store.begin_session("alice@example.com");
        let h2 = store.begin_session("alice@example.com");
        assert_ne!(h1.session_id, h2.session_id);

        let enc1 = kyber::encapsulate(&h1.public);
        let recovered = store.decapsulate("alice@example.com", &h1.session_id, &enc1.ciphertext).unwrap();
        assert_eq!(recovered, enc1.key_bits);
    }
}
