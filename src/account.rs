//! Account service interface
//!
//! Authentication itself lives outside this crate. Everything here only needs
//! a credential pair for each request and a way to drop it when the server
//! answers 401.

use parking_lot::RwLock;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Account credentials attached to every remote request
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    /// Account identifier (email on the wire)
    #[serde(alias = "email")]
    pub account: String,
    /// Opaque credential (password on the wire)
    #[serde(alias = "password")]
    pub credential: String,
}

/// Supplies credentials and reacts to credential expiry
pub trait AccountService: Send + Sync {
    /// Current credentials, or `None` when logged out
    fn credentials(&self) -> Option<Credentials>;

    /// Called when the remote store rejects the credentials
    fn invalidate(&self);
}

#[derive(Error, Debug)]
pub enum AccountError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Credentials file parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Credentials file not found. Expected at: {0}")]
    NotFound(PathBuf),
}

/// Credentials file structure
///
/// Format:
/// ```toml
/// [account]
/// email = "user@example.com"
/// password = "123456"
/// ```
#[derive(Debug, Deserialize)]
struct CredentialsFile {
    account: Credentials,
}

/// Account service backed by a credentials file, held in memory
pub struct FileAccountService {
    current: RwLock<Option<Credentials>>,
}

impl FileAccountService {
    /// Get the default credentials file path: ~/.config/secure_camera/credentials.toml
    pub fn default_path() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home)
            .join(".config")
            .join("secure_camera")
            .join("credentials.toml")
    }

    pub fn load(path: &Path) -> Result<Self, AccountError> {
        if !path.exists() {
            return Err(AccountError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let file: CredentialsFile = toml::from_str(&content)?;
        Ok(Self::new(file.account))
    }

    pub fn new(credentials: Credentials) -> Self {
        Self {
            current: RwLock::new(Some(credentials)),
        }
    }
}

impl AccountService for FileAccountService {
    fn credentials(&self) -> Option<Credentials> {
        self.current.read().clone()
    }

    fn invalidate(&self) {
        if self.current.write().take().is_some() {
            tracing::warn!("Credentials rejected by server, local session invalidated");
        }
    }
}
