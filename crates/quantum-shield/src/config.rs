//! Process-wide configuration. JWT/auth configuration is out of scope here
//! (§1); the only secret this pipeline needs is the at-rest storage pepper.

use secrecy::{ExposeSecret, Secret};

use crate::error::{PipelineError, Result};

pub struct Config {
    aes_secret_key: Secret<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let raw = std::env::var("AES_SECRET_KEY")
            .map_err(|_| PipelineError::MissingConfig("AES_SECRET_KEY".to_string()))?;
        Self::new(raw)
    }

    pub fn new(aes_secret_key: String) -> Result<Self> {
        if aes_secret_key.len() < 16 {
            return Err(PipelineError::Core(qsfs_core::CoreError::KeyMaterialTooShort));
        }
        Ok(Self { aes_secret_key: Secret::new(aes_secret_key) })
    }

    pub fn aes_secret_key(&self) -> &str {
        self.aes_secret_key.expose_secret()
    }
}
