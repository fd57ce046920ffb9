//! End-to-end scenarios over `quantum_shield::pipeline`, covering the
//! refusal and expiry/limit behaviors the envelope is required to enforce.

use base64::{engine::general_purpose, Engine as _};
use sha3::digest::{ExtendableOutput, Update, XofReader};
use sha3::Shake256;

use qsfs_core::derivation;
use qsfs_core::kyber;
use qsfs_core::params::{DILITHIUM_K, DILITHIUM_L, N, Q};
use qsfs_core::ring::{self, PolyMatrix, PolyVec};
use qsfs_core::sampler::{self, XofFlavor};

use quantum_shield::cbc;
use quantum_shield::config::Config;
use quantum_shield::error::PipelineError;
use quantum_shield::pipeline;
use quantum_shield::session::SessionStore;
use quantum_shield::store::{FileStore, InMemoryStore};
use quantum_shield::types::{DownloadRequest, FileUploadDto, KyberPublicKeyWire, UploadRequest};

/// Reimplements the verifier's own transcript computation (pack_nibbles +
/// SHAKE-256) to forge a signature that `dilithium::verify` accepts, using
/// only the public ring/sampler API — there is no production signer since
/// signing is out of scope for this workspace.
mod forge {
    use super::*;

    fn pack_nibbles(p: &[i64]) -> Vec<u8> {
        (0..N / 2)
            .map(|i| {
                let lo = (p[2 * i] as u8) & 0x0F;
                let hi = (p[2 * i + 1] as u8) & 0x0F;
                lo | (hi << 4)
            })
            .collect()
    }

    fn transcript_hash(message: &[u8], packed_w1: &[u8]) -> [u8; 32] {
        let mut shake = Shake256::default();
        Update::update(&mut shake, message);
        Update::update(&mut shake, packed_w1);
        let mut reader = shake.finalize_xof();
        let mut out = [0u8; 32];
        reader.read(&mut out);
        out
    }

    pub struct Keypair {
        pub public: qsfs_core::dilithium::PublicKey,
        pub secret: PolyVec,
    }

    pub fn keygen(seed: &[u8; 32]) -> Keypair {
        let a = sampler::expand_matrix(seed, DILITHIUM_K, DILITHIUM_L, Q, XofFlavor::Dilithium);
        let s = PolyVec((0..DILITHIUM_L).map(|i| sampler::uniform_poly(seed, &[1, i as u8], 5)).collect());
        let t = ring::matmul_vec(&a, &s, Q, false);
        Keypair { public: qsfs_core::dilithium::PublicKey { a, t }, secret: s }
    }

    /// Sign with a zero masking vector (`y = 0`): trivially within the
    /// infinity-norm bound the verifier checks, and `A*0 = 0` so the
    /// transcript only depends on the all-zero high-bits vector.
    pub fn sign(message: &[u8], kp: &Keypair) -> qsfs_core::dilithium::Signature {
        let zero_w1 = vec![vec![0i64; N]; DILITHIUM_K];
        let mut packed = Vec::with_capacity(DILITHIUM_K * N / 2);
        for poly in &zero_w1 {
            packed.extend_from_slice(&pack_nibbles(poly));
        }
        let c_tilde = transcript_hash(message, &packed);
        let c = sampler::challenge(&c_tilde);
        let z = ring::scalar_mul_vec(&c, &kp.secret);
        qsfs_core::dilithium::Signature { z, c_tilde }
    }
}

struct Harness {
    sessions: SessionStore,
    files: InMemoryStore,
    config: Config,
}

impl Harness {
    fn new() -> Self {
        let files = InMemoryStore::new();
        files.register_identity("alice@example.com");
        files.register_identity("bob@example.com");
        Self { sessions: SessionStore::new(), files, config: Config::new("0123456789abcdef".to_string()).unwrap() }
    }
}

fn build_upload(
    harness: &Harness,
    sender: &str,
    recipient: &str,
    contents: &[u8],
    download_count: u32,
    expiration_days: i64,
) -> (String, UploadRequest) {
    let handle = pipeline::begin_session(&harness.sessions, sender);
    let enc = kyber::encapsulate(&handle.public);
    let session_key_bytes = derivation::bits_to_key_bytes(&enc.key_bits, 24);
    let mut session_key = [0u8; 24];
    session_key.copy_from_slice(&session_key_bytes);

    let iv = cbc::random_iv();
    let ciphertext = cbc::encrypt_192(&session_key, &iv, contents);

    let dl_seed = [5u8; 32];
    let dl_kp = forge::keygen(&dl_seed);
    let message_len = contents.len().min(1024);
    let signature = forge::sign(&contents[..message_len], &dl_kp);

    let dl_public_key_json = serde_json::to_string(&serde_json::json!({
        "a": matrix_rows(&dl_kp.public.a),
        "t": dl_kp.public.t.0,
    }))
    .unwrap();
    let signature_json = serde_json::to_string(&serde_json::json!({
        "z": signature.z.0,
        "cp": general_purpose::STANDARD.encode(signature.c_tilde),
    }))
    .unwrap();
    let kyber_key_json = serde_json::to_string(&serde_json::json!({
        "u": enc.ciphertext.u.0,
        "v": enc.ciphertext.v,
    }))
    .unwrap();

    let dto = FileUploadDto {
        init_vectors: vec![general_purpose::STANDARD.encode(iv)],
        file_names: vec!["secret.txt".to_string()],
        file_sizes: vec![contents.len() as u64],
        file_types: vec!["text/plain".to_string()],
        file_signatures: vec![signature_json],
        dl_public_key: dl_public_key_json,
        kyber_key: kyber_key_json,
        recipient_email: recipient.to_string(),
        expiration_days,
        download_count,
        anonymous: false,
    };

    (handle.session_id.clone(), UploadRequest { session_id: handle.session_id, encrypted_buffers: vec![ciphertext], dto })
}

fn matrix_rows(m: &PolyMatrix) -> Vec<Vec<Vec<i64>>> {
    (0..m.rows).map(|i| (0..m.cols).map(|j| m.get(i, j).clone()).collect()).collect()
}

#[test]
fn self_send_is_refused() {
    let harness = Harness::new();
    let (_, upload) = build_upload(&harness, "alice@example.com", "alice@example.com", b"hello", 5, 7);
    let err = pipeline::ingest_upload(&harness.sessions, &harness.files, "alice@example.com", upload, &harness.config);
    assert!(matches!(err, Err(PipelineError::SelfRecipient)));
}

#[test]
fn unknown_recipient_is_refused() {
    let harness = Harness::new();
    let (_, upload) = build_upload(&harness, "alice@example.com", "mallory@nowhere.test", b"hello", 5, 7);
    let err = pipeline::ingest_upload(&harness.sessions, &harness.files, "alice@example.com", upload, &harness.config);
    assert!(matches!(err, Err(PipelineError::UnknownRecipient)));
}

#[test]
fn tampered_signature_is_rejected() {
    let harness = Harness::new();
    let (_, mut upload) = build_upload(&harness, "alice@example.com", "bob@example.com", b"hello world", 5, 7);
    // Corrupt the signed file signature's challenge hash.
    let mut sig: serde_json::Value = serde_json::from_str(&upload.dto.file_signatures[0]).unwrap();
    sig["cp"] = serde_json::Value::String(general_purpose::STANDARD.encode([0u8; 32]));
    upload.dto.file_signatures[0] = serde_json::to_string(&sig).unwrap();

    let err = pipeline::ingest_upload(&harness.sessions, &harness.files, "alice@example.com", upload, &harness.config);
    assert!(matches!(err, Err(PipelineError::CorruptFile)));
}

#[test]
fn upload_then_download_round_trips_contents() {
    let harness = Harness::new();
    let contents = b"quarterly figures, handle with care".to_vec();
    let (_, upload) = build_upload(&harness, "alice@example.com", "bob@example.com", &contents, 3, 7);
    pipeline::ingest_upload(&harness.sessions, &harness.files, "alice@example.com", upload, &harness.config).unwrap();

    let log = harness.files.logs_for_identity("bob@example.com").remove(0);

    let recipient_seed = kyber::keygen();
    let req = DownloadRequest {
        file_id: log.public_id.clone(),
        recipient_public_key: KyberPublicKeyWire::from_core(&recipient_seed.public),
    };
    let response = pipeline::serve_download(&harness.files, "bob@example.com", req, &harness.config).unwrap();

    let shared_key = kyber::decapsulate(&recipient_seed.secret, &response.kyber_ciphertext.into_core());
    let session_key_bytes = derivation::bits_to_key_bytes(&shared_key, 24);
    let mut session_key = [0u8; 24];
    session_key.copy_from_slice(&session_key_bytes);

    let recovered = cbc::decrypt_192(&session_key, &response.iv, &response.encrypted_file_data).unwrap();
    assert_eq!(recovered, contents);
}

#[test]
fn download_budget_is_exhausted_after_limit() {
    let harness = Harness::new();
    let (_, upload) = build_upload(&harness, "alice@example.com", "bob@example.com", b"limited", 1, 7);
    pipeline::ingest_upload(&harness.sessions, &harness.files, "alice@example.com", upload, &harness.config).unwrap();
    let log = harness.files.logs_for_identity("bob@example.com").remove(0);

    let first_recipient = kyber::keygen();
    let req1 = DownloadRequest {
        file_id: log.public_id.clone(),
        recipient_public_key: KyberPublicKeyWire::from_core(&first_recipient.public),
    };
    pipeline::serve_download(&harness.files, "bob@example.com", req1, &harness.config).unwrap();

    let second_recipient = kyber::keygen();
    let req2 = DownloadRequest {
        file_id: log.public_id,
        recipient_public_key: KyberPublicKeyWire::from_core(&second_recipient.public),
    };
    let err = pipeline::serve_download(&harness.files, "bob@example.com", req2, &harness.config);
    assert!(matches!(err, Err(PipelineError::DownloadLimitReached)));
}

#[test]
fn expired_record_is_refused() {
    let harness = Harness::new();
    let (_, upload) = build_upload(&harness, "alice@example.com", "bob@example.com", b"stale", 5, -1);
    pipeline::ingest_upload(&harness.sessions, &harness.files, "alice@example.com", upload, &harness.config).unwrap();
    let log = harness.files.logs_for_identity("bob@example.com").remove(0);

    let recipient = kyber::keygen();
    let req = DownloadRequest { file_id: log.public_id, recipient_public_key: KyberPublicKeyWire::from_core(&recipient.public) };
    let err = pipeline::serve_download(&harness.files, "bob@example.com", req, &harness.config);
    assert!(matches!(err, Err(PipelineError::RecordExpired)));
}

#[test]
fn identical_content_deduplicates_blob_storage() {
    let harness = Harness::new();
    let contents = b"the same bytes, sent twice".to_vec();

    let (_, upload1) = build_upload(&harness, "alice@example.com", "bob@example.com", &contents, 5, 7);
    pipeline::ingest_upload(&harness.sessions, &harness.files, "alice@example.com", upload1, &harness.config).unwrap();

    let (_, upload2) = build_upload(&harness, "alice@example.com", "bob@example.com", &contents, 5, 7);
    pipeline::ingest_upload(&harness.sessions, &harness.files, "alice@example.com", upload2, &harness.config).unwrap();

    let logs = harness.files.logs_for_identity("bob@example.com");
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].file_id, logs[1].file_id);
}
