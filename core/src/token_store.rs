use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::error::AuthError;

/// Persisted access/refresh token pair. `expiry_date` is absolute epoch millis.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expiry_date: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl TokenRecord {
    pub fn is_expired_at(&self, now_millis: i64) -> bool {
        now_millis >= self.expiry_date
    }
}

impl std::fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRecord")
            .field("token_type", &self.token_type)
            .field("expiry_date", &self.expiry_date)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// Single-record token file.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing or unparseable file both mean "no token".
    pub async fn load(&self) -> Option<TokenRecord> {
        let data = tokio::fs::read_to_string(&self.path).await.ok()?;
        match serde_json::from_str(&data) {
            Ok(record) => Some(record),
            Err(err) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %err,
                    "Ignoring unreadable token file"
                );
                None
            }
        }
    }

    /// Replaces the whole record. The new content is written to a sibling temp
    /// file first and renamed over the target.
    pub async fn save(&self, record: &TokenRecord) -> Result<(), AuthError> {
        self.write_record(record)
            .await
            .map_err(|source| AuthError::TokenWrite {
                path: self.path.clone(),
                source,
            })
    }

    pub async fn remove(&self) -> Result<bool, std::io::Error> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn write_record(&self, record: &TokenRecord) -> Result<(), std::io::Error> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let data = serde_json::to_string_pretty(record)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        let mut tmp_name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "token.json".into());
        tmp_name.push(".tmp");
        let tmp_path = self.path.with_file_name(tmp_name);

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(&tmp_path).await?;
        file.write_all(data.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp_path, &self.path).await
    }
}
