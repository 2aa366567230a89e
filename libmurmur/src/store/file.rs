//! JSON token files, one per account

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::{Result, StoreError};
use crate::store::TokenStore;
use crate::types::TokenRecord;

/// Stores each account's tokens as `<dir>/<account>.json` with mode 0600
pub struct FileTokenStore {
    dir: PathBuf,
}

impl FileTokenStore {
    /// `dir` may start with `~`
    pub fn new(dir: impl AsRef<str>) -> Self {
        let expanded = shellexpand::tilde(dir.as_ref()).to_string();
        Self {
            dir: PathBuf::from(expanded),
        }
    }

    pub fn path_for(&self, account_id: &str) -> PathBuf {
        let safe: String = account_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", safe))
    }
}

/// Refuse to read or overwrite token files that are symlinks
async fn validate_not_symlink(path: &Path) -> Result<()> {
    let metadata = tokio::fs::symlink_metadata(path)
        .await
        .map_err(StoreError::Io)?;
    if metadata.is_symlink() {
        return Err(StoreError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!(
                "Token file '{}' is a symbolic link; token files must be regular files",
                path.display()
            ),
        ))
        .into());
    }
    Ok(())
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self, account_id: &str) -> Result<Option<TokenRecord>> {
        let path = self.path_for(account_id);
        if tokio::fs::symlink_metadata(&path).await.is_err() {
            return Ok(None);
        }
        validate_not_symlink(&path).await?;

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(StoreError::Io)?;
        let record: TokenRecord = serde_json::from_str(&content).map_err(StoreError::from)?;
        tracing::debug!(account_id, path = %path.display(), "Loaded token record");
        Ok(Some(record))
    }

    async fn save(&self, record: &TokenRecord) -> Result<()> {
        let path = self.path_for(&record.account_id);
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(StoreError::Io)?;
        if tokio::fs::symlink_metadata(&path).await.is_ok() {
            validate_not_symlink(&path).await?;
        }

        let json = serde_json::to_string_pretty(record).map_err(StoreError::from)?;
        tokio::fs::write(&path, json).await.map_err(StoreError::Io)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            tokio::fs::set_permissions(&path, perms)
                .await
                .map_err(StoreError::Io)?;
        }

        tracing::debug!(account_id = %record.account_id, path = %path.display(), "Saved token record");
        Ok(())
    }

    async fn delete(&self, account_id: &str) -> Result<()> {
        let path = self.path_for(account_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(e).into()),
        }
    }
}
