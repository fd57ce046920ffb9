mod demo_signer;
mod state;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use base64::{engine::general_purpose, Engine as _};
use clap::{Parser, Subcommand};

use qsfs_core::derivation;
use qsfs_core::kyber;

use quantum_shield::cbc;
use quantum_shield::config::Config;
use quantum_shield::error::PipelineError;
use quantum_shield::pipeline;
use quantum_shield::types::{DownloadRequest, FileUploadDto, KyberCiphertextWire, KyberPublicKeyWire, UploadRequest};

use state::NodeState;

/// Command-line driver for the quantum-shield post-quantum file-sharing
/// pipeline: drives `begin_session`/`ingest_upload`/`serve_download` against
/// a JSON node-state file, standing in for the HTTP layer this workspace
/// doesn't implement (see workspace Non-goals).
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Path to the JSON node-state file; defaults to $QSFS_STATE or
    /// ~/.qsfs/state.json.
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Register an identity as known to this node. Real user registration
    /// is out of scope for this workspace; this stands in for it so the
    /// pipeline's identity checks have something to check against.
    Register {
        #[arg(long)]
        identity: String,
    },
    /// Issue a fresh Kyber session for `identity`. Prints the session id and
    /// the public key a peer needs to encapsulate an upload key against.
    BeginSession {
        #[arg(long)]
        identity: String,
    },
    /// Encrypt and sign a file under a session's shared key, then ingest it.
    Upload {
        #[arg(long)]
        identity: String,
        #[arg(long = "session-id")]
        session_id: String,
        /// Base64 JSON of the `{t, seed}` public key printed by begin-session.
        #[arg(long = "public-key")]
        public_key: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        downloads: u32,
        #[arg(long = "expires-days", default_value_t = 7)]
        expires_days: i64,
        #[arg(long)]
        anonymous: bool,
    },
    /// Fetch and decrypt a file this identity can see (sender or recipient).
    Download {
        #[arg(long)]
        identity: String,
        #[arg(long = "file-id")]
        file_id: String,
        #[arg(long)]
        out: PathBuf,
    },
    /// List this identity's send/receive activity.
    Activity {
        #[arg(long)]
        identity: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let state_path = cli.state.unwrap_or_else(state::default_state_path);

    match run(cli.cmd, &state_path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "command failed");
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code_for(&err))
        }
    }
}

/// §7's CLI exit-code mapping: validation/crypto variants exit 2,
/// authorization/lifecycle variants exit 3, anything else (I/O, config,
/// internal) exits 70 (`EX_SOFTWARE`).
fn exit_code_for(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<PipelineError>() {
        Some(PipelineError::CorruptFile)
        | Some(PipelineError::BatchLengthMismatch { .. })
        | Some(PipelineError::BadCiphertextLength)
        | Some(PipelineError::BadPadding)
        | Some(PipelineError::Core(_))
        | Some(PipelineError::Json(_))
        | Some(PipelineError::Base64(_)) => 2,
        Some(PipelineError::SelfRecipient)
        | Some(PipelineError::UnknownRecipient)
        | Some(PipelineError::SessionKeyMissing)
        | Some(PipelineError::RecordNotFound)
        | Some(PipelineError::FileMissing(_))
        | Some(PipelineError::DownloadLimitReached)
        | Some(PipelineError::RecordExpired) => 3,
        _ => 70,
    }
}

fn run(cmd: Cmd, state_path: &PathBuf) -> Result<()> {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(_) => {
            tracing::warn!("AES_SECRET_KEY not set, using a fixed demo pepper for this run");
            Config::new("qsfs-cli-demo-pepper!".to_string())?
        }
    };

    match cmd {
        Cmd::Register { identity } => {
            let node = NodeState::load(state_path)?;
            let (sessions, files) = node.into_parts();
            files.register_identity(&identity);
            NodeState::from_parts(&sessions, &files).save(state_path)?;
            println!("registered {identity}");
        }
        Cmd::BeginSession { identity } => {
            let node = NodeState::load(state_path)?;
            let (sessions, files) = node.into_parts();
            let handle = pipeline::begin_session(&sessions, &identity);
            let public_key = serde_json::to_string(&KyberPublicKeyWire::from_core(&handle.public))?;
            NodeState::from_parts(&sessions, &files).save(state_path)?;
            println!("session_id={}", handle.session_id);
            println!("public_key={}", general_purpose::STANDARD.encode(public_key));
        }
        Cmd::Upload { identity, session_id, public_key, to, file, downloads, expires_days, anonymous } => {
            let node = NodeState::load(state_path)?;
            let (sessions, files) = node.into_parts();

            let public_key_json = general_purpose::STANDARD
                .decode(public_key)
                .context("--public-key is not valid base64")?;
            let public_key: KyberPublicKeyWire = serde_json::from_slice(&public_key_json)?;
            let public_key = public_key.into_core()?;

            let contents = std::fs::read(&file).with_context(|| format!("reading {}", file.display()))?;

            let encapsulated = kyber::encapsulate(&public_key);
            let session_key = session_aes_key(&encapsulated.key_bits);
            let iv = cbc::random_iv();
            let ciphertext = cbc::encrypt_192(&session_key, &iv, &contents);

            let signer_seed = qsfs_core::sampler::random_seed();
            let signer_kp = demo_signer::keygen(&signer_seed);
            let message_len = contents.len().min(1024);
            let signature = demo_signer::sign(&contents[..message_len], &signer_kp);

            let file_name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "upload.bin".to_string());

            let dto = FileUploadDto {
                init_vectors: vec![general_purpose::STANDARD.encode(iv)],
                file_names: vec![file_name],
                file_sizes: vec![contents.len() as u64],
                file_types: vec!["application/octet-stream".to_string()],
                file_signatures: vec![serde_json::to_string(&serde_json::json!({
                    "z": signature.z.0,
                    "cp": general_purpose::STANDARD.encode(signature.c_tilde),
                }))?],
                dl_public_key: serde_json::to_string(&serde_json::json!({
                    "a": demo_signer::matrix_rows(&signer_kp.public.a),
                    "t": signer_kp.public.t.0,
                }))?,
                kyber_key: serde_json::to_string(&KyberCiphertextWire::from_core(&encapsulated.ciphertext))?,
                recipient_email: to,
                expiration_days: expires_days,
                download_count: downloads,
                anonymous,
            };

            let upload = UploadRequest { session_id, encrypted_buffers: vec![ciphertext], dto };
            pipeline::ingest_upload(&sessions, &files, &identity, upload, &config)?;

            NodeState::from_parts(&sessions, &files).save(state_path)?;
            println!("uploaded");
        }
        Cmd::Download { identity, file_id, out } => {
            let node = NodeState::load(state_path)?;
            let (sessions, files) = node.into_parts();

            let recipient = kyber::keygen();
            let req = DownloadRequest { file_id, recipient_public_key: KyberPublicKeyWire::from_core(&recipient.public) };
            let response = pipeline::serve_download(&files, &identity, req, &config)?;

            let shared_key = kyber::decapsulate(&recipient.secret, &response.kyber_ciphertext.into_core());
            let session_key = session_aes_key(&shared_key);
            let plaintext = cbc::decrypt_192(&session_key, &response.iv, &response.encrypted_file_data)?;

            std::fs::write(&out, &plaintext).with_context(|| format!("writing {}", out.display()))?;
            NodeState::from_parts(&sessions, &files).save(state_path)?;
            println!("wrote {} ({} bytes)", response.file_name, plaintext.len());
        }
        Cmd::Activity { identity, limit } => {
            let node = NodeState::load(state_path)?;
            let (sessions, files) = node.into_parts();
            let entries = pipeline::list_activity(&files, &identity, limit);
            println!("{}", serde_json::to_string_pretty(&entries)?);
            NodeState::from_parts(&sessions, &files).save(state_path)?;
        }
    }

    Ok(())
}

fn session_aes_key(key_bits: &[u8; 256]) -> [u8; 24] {
    let packed = derivation::bits_to_key_bytes(key_bits, 24);
    let mut key = [0u8; 24];
    key.copy_from_slice(&packed);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_buckets_match_the_documented_mapping() {
        assert_eq!(exit_code_for(&anyhow::Error::new(PipelineError::SelfRecipient)), 3);
        assert_eq!(exit_code_for(&anyhow::Error::new(PipelineError::CorruptFile)), 2);
        assert_eq!(exit_code_for(&anyhow::Error::new(PipelineError::MissingConfig("x".into()))), 70);
    }
}
