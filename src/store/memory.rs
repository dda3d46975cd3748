use std::collections::HashMap;
use std::sync::RwLock;

use super::{non_empty, TokenStore};
use crate::auth::{hash_password, verify_password};
use crate::config::UserConfig;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone)]
struct StoredUser {
    access_code_hash: String,
    access_token: Option<String>,
    refresh_token: Option<String>,
}

/// Process-local store; contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    users: RwLock<HashMap<String, StoredUser>>,
}

impl MemoryTokenStore {
    pub fn with_user(
        username: &str,
        access_code: &str,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> Self {
        let store = Self::default();
        let user = UserConfig {
            username: username.to_string(),
            access_code: access_code.to_string(),
            dropbox_token: access_token.to_string(),
            dropbox_refresh_token: refresh_token.unwrap_or_default().to_string(),
        };
        if let Err(e) = store.seed_users(&[user]) {
            tracing::error!("Failed to seed in-memory user {}: {}", username, e);
        }
        store
    }

    fn read<T>(&self, username: &str, f: impl FnOnce(&StoredUser) -> T) -> AppResult<Option<T>> {
        let users = self
            .users
            .read()
            .map_err(|_| AppError::Internal("Token store lock poisoned".to_string()))?;
        Ok(users.get(username).map(f))
    }
}

impl TokenStore for MemoryTokenStore {
    fn user_exists(&self, username: &str) -> AppResult<bool> {
        Ok(self.read(username, |_| ())?.is_some())
    }

    fn verify_access_code(&self, username: &str, access_code: &str) -> AppResult<bool> {
        let hash = self.read(username, |u| u.access_code_hash.clone())?;
        Ok(hash.is_some_and(|h| verify_password(access_code, &h)))
    }

    fn access_token(&self, username: &str) -> AppResult<Option<String>> {
        Ok(self.read(username, |u| u.access_token.clone())?.flatten())
    }

    fn refresh_token(&self, username: &str) -> AppResult<Option<String>> {
        Ok(self.read(username, |u| u.refresh_token.clone())?.flatten())
    }

    fn save_access_token(&self, username: &str, token: &str) -> AppResult<()> {
        let mut users = self
            .users
            .write()
            .map_err(|_| AppError::Internal("Token store lock poisoned".to_string()))?;

        let user = users
            .get_mut(username)
            .ok_or_else(|| AppError::NotFound(format!("Unknown user {}", username)))?;
        user.access_token = Some(token.to_string());
        Ok(())
    }

    fn seed_users(&self, configured: &[UserConfig]) -> AppResult<()> {
        let mut users = self
            .users
            .write()
            .map_err(|_| AppError::Internal("Token store lock poisoned".to_string()))?;

        for user in configured {
            let access_code_hash = hash_password(&user.access_code)
                .map_err(|e| AppError::Internal(format!("Failed to hash access code: {}", e)))?;

            let entry = users
                .entry(user.username.clone())
                .or_insert_with(|| StoredUser {
                    access_code_hash: String::new(),
                    access_token: None,
                    refresh_token: None,
                });

            entry.access_code_hash = access_code_hash;
            entry.refresh_token = non_empty(&user.dropbox_refresh_token);
            if entry.access_token.is_none() {
                entry.access_token = non_empty(&user.dropbox_token);
            }
        }

        Ok(())
    }
}
