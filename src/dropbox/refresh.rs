use std::future::Future;
use tracing::{error, info};

use super::client::DropboxApi;
use super::error::DropboxError;
use crate::store::TokenStore;

/// Dropbox token pair of one gallery user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropboxCredentials {
    pub username: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
}

impl DropboxCredentials {
    pub fn new(username: &str, access_token: &str, refresh_token: Option<&str>) -> Self {
        Self {
            username: username.to_string(),
            access_token: access_token.to_string(),
            refresh_token: refresh_token.map(str::to_string),
        }
    }

    /// Unwraps a wrapped call result, switching to the refreshed token if there is one.
    /// Returns the data and whether a refresh happened.
    pub fn adopt<T>(&mut self, result: Refreshed<T>) -> (T, bool) {
        let refreshed = self.adopt_token(result.new_access_token);
        (result.data, refreshed)
    }

    pub fn adopt_token(&mut self, new_access_token: Option<String>) -> bool {
        match new_access_token {
            Some(token) => {
                self.access_token = token;
                true
            }
            None => false,
        }
    }
}

#[derive(Debug)]
pub struct Refreshed<T> {
    pub data: T,
    pub new_access_token: Option<String>,
}

impl<T> Refreshed<T> {
    pub fn token_refreshed(&self) -> bool {
        self.new_access_token.is_some()
    }
}

/// Result of a wrapped call, together with the token a refresh produced. The token is
/// kept when the retry itself fails, since it is already persisted by then.
#[derive(Debug)]
pub struct Attempt<T> {
    pub result: Result<T, DropboxError>,
    pub new_access_token: Option<String>,
}

impl<T> Attempt<T> {
    fn settled(result: Result<T, DropboxError>) -> Self {
        Self {
            result,
            new_access_token: None,
        }
    }

    pub fn into_refreshed(self) -> Result<Refreshed<T>, DropboxError> {
        let data = self.result?;
        Ok(Refreshed {
            data,
            new_access_token: self.new_access_token,
        })
    }
}

/// Retries an operation once with a fresh access token after an authorization failure.
///
/// Each call refreshes on its own; concurrent callers hitting the same expired token
/// each obtain (and persist) their own new token.
pub struct TokenRefresher<'a> {
    api: &'a dyn DropboxApi,
    store: &'a dyn TokenStore,
}

impl<'a> TokenRefresher<'a> {
    pub fn new(api: &'a dyn DropboxApi, store: &'a dyn TokenStore) -> Self {
        Self { api, store }
    }

    pub fn api(&self) -> &'a dyn DropboxApi {
        self.api
    }

    pub async fn run<T, F, Fut>(
        &self,
        credentials: &DropboxCredentials,
        operation: F,
    ) -> Result<Refreshed<T>, DropboxError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, DropboxError>>,
    {
        self.attempt(credentials, operation).await.into_refreshed()
    }

    /// Like [`run`](Self::run), but a refreshed token survives a failed retry.
    pub async fn attempt<T, F, Fut>(
        &self,
        credentials: &DropboxCredentials,
        operation: F,
    ) -> Attempt<T>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, DropboxError>>,
    {
        let err = match operation(credentials.access_token.clone()).await {
            Ok(data) => return Attempt::settled(Ok(data)),
            Err(err) => err,
        };

        if !err.is_auth_failure() {
            return Attempt::settled(Err(err));
        }

        let Some(refresh_token) = credentials.refresh_token.as_deref() else {
            return Attempt::settled(Err(err));
        };

        info!(
            "Dropbox access token for {} rejected ({}), refreshing",
            credentials.username, err
        );
        let new_token = match self.api.refresh_access_token(refresh_token).await {
            Ok(token) => token,
            Err(e) => return Attempt::settled(Err(e)),
        };

        if let Err(e) = self
            .store
            .save_access_token(&credentials.username, &new_token)
        {
            error!(
                "Failed to persist refreshed token for {}: {}",
                credentials.username, e
            );
        }

        Attempt {
            result: operation(new_token.clone()).await,
            new_access_token: Some(new_token),
        }
    }
}
