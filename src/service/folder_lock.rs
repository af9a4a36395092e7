use crate::db::{FolderLockStorage, LockChange};
use crate::error::DriveError;
use crate::service::password::{self, validate_password};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of presenting a password for a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockOutcome {
    /// The folder has no lock; nothing to check.
    NotLocked,
    Granted,
    Denied,
    /// Per-folder attempt budget exhausted; the password was not checked.
    Throttled,
}

/// Password gate in front of folder listings.
#[derive(Clone)]
pub struct FolderLockService {
    storage: FolderLockStorage,
    attempts: Arc<DefaultKeyedRateLimiter<String>>,
}

impl FolderLockService {
    pub fn new(storage: FolderLockStorage, unlock_attempts_per_minute: u32) -> Self {
        let per_minute = NonZeroU32::new(unlock_attempts_per_minute).unwrap_or(NonZeroU32::MIN);
        let attempts = Arc::new(RateLimiter::keyed(Quota::per_minute(per_minute)));
        Self { storage, attempts }
    }

    pub fn storage(&self) -> &FolderLockStorage {
        &self.storage
    }

    /// Storage failures propagate; a folder is never assumed unlocked on error.
    pub async fn is_locked(&self, folder_id: &str) -> Result<bool, DriveError> {
        self.storage.is_locked(folder_id).await
    }

    pub async fn set_password(
        &self,
        folder_id: &str,
        password: &str,
    ) -> Result<LockChange, DriveError> {
        validate_password(password)?;
        let owned = password.to_owned();
        let hash = tokio::task::spawn_blocking(move || password::hash_password(&owned)).await??;

        let change = self.storage.upsert(folder_id, &hash).await?;
        info!(folder_id, ?change, "folder password set");
        Ok(change)
    }

    pub async fn remove(&self, folder_id: &str) -> Result<bool, DriveError> {
        let existed = self.storage.delete(folder_id).await?;
        info!(folder_id, existed, "folder password removed");
        Ok(existed)
    }

    pub async fn unlock(
        &self,
        folder_id: &str,
        password: &str,
    ) -> Result<UnlockOutcome, DriveError> {
        let Some(lock) = self.storage.get(folder_id).await? else {
            return Ok(UnlockOutcome::NotLocked);
        };

        self.attempts.retain_recent();
        if self.attempts.check_key(&folder_id.to_owned()).is_err() {
            warn!(folder_id, "unlock attempt throttled");
            return Ok(UnlockOutcome::Throttled);
        }

        let candidate = password.to_owned();
        let stored = lock.password_hash.clone();
        let matches =
            tokio::task::spawn_blocking(move || password::verify_password(&candidate, &stored))
                .await?;

        if matches {
            debug!(folder_id, "folder unlocked");
            if password::is_legacy_digest(&lock.password_hash) {
                self.upgrade_legacy_hash(folder_id, &lock.password_hash, password)
                    .await;
            }
            Ok(UnlockOutcome::Granted)
        } else {
            warn!(folder_id, "incorrect folder password");
            Ok(UnlockOutcome::Denied)
        }
    }

    /// Rewrite a legacy SHA-256 row as argon2id. The row is only touched if it
    /// still holds `legacy_hash`; failure leaves the old row usable.
    async fn upgrade_legacy_hash(&self, folder_id: &str, legacy_hash: &str, password: &str) {
        let owned = password.to_owned();
        let hashed = tokio::task::spawn_blocking(move || password::hash_password(&owned)).await;
        let result = match hashed {
            Ok(Ok(hash)) => self.storage.replace_hash(folder_id, legacy_hash, &hash).await,
            Ok(Err(e)) => Err(e.into()),
            Err(e) => Err(e.into()),
        };
        match result {
            Ok(true) => info!(folder_id, "legacy folder hash upgraded to argon2id"),
            Ok(false) => debug!(folder_id, "folder lock changed during upgrade; left as is"),
            Err(e) => warn!(folder_id, error = %e, "legacy folder hash upgrade failed"),
        }
    }
}
