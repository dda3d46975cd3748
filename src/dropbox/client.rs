//! Dropbox API v2 client.
//!
//! RPC endpoints take a JSON body; content endpoints take their argument in the
//! `Dropbox-API-Arg` header. Every call authenticates with a bearer access token
//! supplied by the caller, so one client serves every user.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::error::DropboxError;
use super::types::{ListFolderPage, ThumbnailSize};
use crate::config::DropboxSettings;

/// Operations the gallery needs from Dropbox.
#[async_trait]
pub trait DropboxApi: Send + Sync {
    /// Starts a recursive, media-info listing of `path`, or continues `cursor` when given.
    async fn list_folder(
        &self,
        token: &str,
        path: &str,
        cursor: Option<&str>,
    ) -> Result<ListFolderPage, DropboxError>;

    /// Short-lived (about four hours) direct download URL.
    async fn get_temporary_link(&self, token: &str, path: &str) -> Result<String, DropboxError>;

    /// JPEG thumbnail inlined as a `data:image/jpeg;base64,...` URL.
    async fn get_thumbnail(
        &self,
        token: &str,
        path: &str,
        size: ThumbnailSize,
    ) -> Result<String, DropboxError>;

    /// `Ok(false)` when nothing (or a non-folder) lives at `path`. Authorization and
    /// transport failures come back as errors so callers can refresh and ask again.
    async fn folder_status(&self, token: &str, path: &str) -> Result<bool, DropboxError>;

    /// Any failure reads as "does not exist".
    async fn folder_exists(&self, token: &str, path: &str) -> bool {
        match self.folder_status(token, path).await {
            Ok(exists) => exists,
            Err(e) => {
                debug!("Metadata lookup for {} failed: {}", path, e);
                false
            }
        }
    }

    /// A 409 conflict (already exists) counts as success.
    async fn create_folder(&self, token: &str, path: &str) -> Result<(), DropboxError>;

    async fn move_file(&self, token: &str, from_path: &str, to_path: &str)
        -> Result<(), DropboxError>;

    /// Exchanges a refresh token for a new access token.
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<String, DropboxError>;
}

#[derive(Debug, Deserialize)]
struct TemporaryLinkResponse {
    link: String,
}

#[derive(Debug, Deserialize)]
struct FolderMetadataResponse {
    #[serde(rename = ".tag")]
    tag: String,
}

#[derive(Debug, Deserialize)]
struct PathMetadata {
    path_display: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MetadataEnvelope {
    metadata: PathMetadata,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

pub struct HttpDropboxClient {
    client: reqwest::Client,
    api_base: String,
    content_base: String,
    token_url: String,
    app_key: String,
    app_secret: String,
}

impl HttpDropboxClient {
    pub fn new(settings: &DropboxSettings) -> Result<Self, DropboxError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            api_base: settings.api_base_url.trim_end_matches('/').to_string(),
            content_base: settings.content_base_url.trim_end_matches('/').to_string(),
            token_url: settings.token_url.clone(),
            app_key: settings.app_key.clone(),
            app_secret: settings.app_secret.clone(),
        })
    }

    async fn send_rpc(
        &self,
        token: &str,
        endpoint: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, DropboxError> {
        let url = format!("{}/{}", self.api_base, endpoint);

        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .await?;

        Ok(response)
    }

    async fn rpc_call<T: DeserializeOwned>(
        &self,
        token: &str,
        endpoint: &str,
        body: &serde_json::Value,
    ) -> Result<T, DropboxError> {
        let response = ensure_success(self.send_rpc(token, endpoint, body).await?).await?;

        response
            .json()
            .await
            .map_err(|e| DropboxError::Parse(e.to_string()))
    }

    fn basic_credentials(&self) -> String {
        let pair = format!("{}:{}", self.app_key, self.app_secret);
        format!("Basic {}", STANDARD.encode(pair))
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, DropboxError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(DropboxError::from_status(status.as_u16(), body))
}

#[async_trait]
impl DropboxApi for HttpDropboxClient {
    async fn list_folder(
        &self,
        token: &str,
        path: &str,
        cursor: Option<&str>,
    ) -> Result<ListFolderPage, DropboxError> {
        let page: ListFolderPage = match cursor {
            Some(cursor) => {
                self.rpc_call(token, "files/list_folder/continue", &json!({ "cursor": cursor }))
                    .await?
            }
            None => {
                let body = json!({
                    "path": path,
                    "recursive": true,
                    "include_media_info": true,
                });
                self.rpc_call(token, "files/list_folder", &body).await?
            }
        };

        debug!(
            "Fetched {} entries from Dropbox (has_more: {})",
            page.entries.len(),
            page.has_more
        );
        Ok(page)
    }

    async fn get_temporary_link(&self, token: &str, path: &str) -> Result<String, DropboxError> {
        let response: TemporaryLinkResponse = self
            .rpc_call(token, "files/get_temporary_link", &json!({ "path": path }))
            .await?;
        Ok(response.link)
    }

    async fn get_thumbnail(
        &self,
        token: &str,
        path: &str,
        size: ThumbnailSize,
    ) -> Result<String, DropboxError> {
        let url = format!("{}/files/get_thumbnail_v2", self.content_base);
        let arg = json!({
            "resource": { ".tag": "path", "path": path },
            "format": "jpeg",
            "size": size.as_str(),
            "mode": "strict",
        });

        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .header("Dropbox-API-Arg", arg.to_string())
            .send()
            .await?;

        let bytes = ensure_success(response).await?.bytes().await?;
        Ok(format!("data:image/jpeg;base64,{}", STANDARD.encode(&bytes)))
    }

    async fn folder_status(&self, token: &str, path: &str) -> Result<bool, DropboxError> {
        let response = self
            .send_rpc(token, "files/get_metadata", &json!({ "path": path }))
            .await?;

        if response.status().as_u16() == 409 {
            debug!("No metadata for {}", path);
            return Ok(false);
        }

        let meta: FolderMetadataResponse = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| DropboxError::Parse(e.to_string()))?;

        if meta.tag != "folder" {
            warn!("{} exists but is a {}, not a folder", path, meta.tag);
            return Ok(false);
        }
        Ok(true)
    }

    async fn create_folder(&self, token: &str, path: &str) -> Result<(), DropboxError> {
        let body = json!({ "path": path, "autorename": false });
        let response = self.send_rpc(token, "files/create_folder_v2", &body).await?;

        if response.status().as_u16() == 409 {
            info!("Folder {} already exists, continuing", path);
            return Ok(());
        }

        let created: MetadataEnvelope = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| DropboxError::Parse(e.to_string()))?;

        info!(
            "Created folder {}",
            created.metadata.path_display.as_deref().unwrap_or(path)
        );
        Ok(())
    }

    async fn move_file(
        &self,
        token: &str,
        from_path: &str,
        to_path: &str,
    ) -> Result<(), DropboxError> {
        let body = json!({
            "from_path": from_path,
            "to_path": to_path,
            "autorename": false,
            "allow_ownership_transfer": false,
        });

        let moved: MetadataEnvelope = self.rpc_call(token, "files/move_v2", &body).await?;

        info!(
            "Moved {} -> {}",
            from_path,
            moved.metadata.path_display.as_deref().unwrap_or(to_path)
        );
        Ok(())
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> Result<String, DropboxError> {
        if self.app_key.is_empty() || self.app_secret.is_empty() {
            return Err(DropboxError::Refresh(
                "Dropbox app key/secret are not configured".to_string(),
            ));
        }

        let response = self
            .client
            .post(&self.token_url)
            .header(AUTHORIZATION, self.basic_credentials())
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DropboxError::Refresh(format!("{} - {}", status.as_u16(), body)));
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|e| DropboxError::Refresh(e.to_string()))?;

        info!(
            "Obtained new Dropbox access token (expires in {}s)",
            tokens.expires_in.unwrap_or_default()
        );
        Ok(tokens.access_token)
    }
}
