//! OS keyring token storage

use async_trait::async_trait;

use crate::error::{Result, StoreError};
use crate::store::TokenStore;
use crate::types::TokenRecord;

pub const KEYRING_SERVICE: &str = "murmur.oauth2";

/// Stores each account's token record as a JSON secret under `murmur.oauth2`
pub struct KeyringTokenStore {
    service: String,
}

impl KeyringTokenStore {
    /// Fails when the OS keyring cannot be reached, e.g. headless Linux
    /// without a Secret Service daemon
    pub fn new() -> Result<Self> {
        Self::with_service(KEYRING_SERVICE)
    }

    pub fn with_service(service: &str) -> Result<Self> {
        ::keyring::Entry::new(service, "availability_check")
            .map_err(|e| StoreError::Keyring(format!("OS keyring not accessible: {}", e)))?;
        Ok(Self {
            service: service.to_string(),
        })
    }

    fn entry(&self, account_id: &str) -> Result<::keyring::Entry> {
        ::keyring::Entry::new(&self.service, account_id)
            .map_err(|e| StoreError::Keyring(e.to_string()).into())
    }
}

#[async_trait]
impl TokenStore for KeyringTokenStore {
    async fn load(&self, account_id: &str) -> Result<Option<TokenRecord>> {
        let entry = self.entry(account_id)?;
        match entry.get_password() {
            Ok(json) => {
                let record = serde_json::from_str(&json).map_err(StoreError::from)?;
                tracing::debug!(account_id, "Loaded token record from OS keyring");
                Ok(Some(record))
            }
            Err(::keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(StoreError::Keyring(e.to_string()).into()),
        }
    }

    async fn save(&self, record: &TokenRecord) -> Result<()> {
        let json = serde_json::to_string(record).map_err(StoreError::from)?;
        self.entry(&record.account_id)?
            .set_password(&json)
            .map_err(|e| StoreError::Keyring(e.to_string()))?;
        tracing::debug!(account_id = %record.account_id, "Stored token record in OS keyring");
        Ok(())
    }

    async fn delete(&self, account_id: &str) -> Result<()> {
        match self.entry(account_id)?.delete_password() {
            Ok(()) | Err(::keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(StoreError::Keyring(e.to_string()).into()),
        }
    }
}
