use crate::constants::{
    DEFAULT_DUPLICATE_SUFFIX_LEN, DEFAULT_PHOTOS_FOLDER, DEFAULT_REQUEST_TIMEOUT_SECONDS,
    DEFAULT_RESOLVE_BATCH_SIZE, DEFAULT_SESSION_EXPIRE_MINUTES, DROPBOX_API_BASE,
    DROPBOX_CONTENT_BASE, DROPBOX_TOKEN_URL,
};
use crate::dropbox::ThumbnailSize;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(default = "default_secret_key")]
    pub secret_key: String,
    #[serde(default = "default_session_expire_minutes")]
    pub session_expire_minutes: i64,
}

fn default_secret_key() -> String {
    "change-me-in-production-use-openssl-rand-hex-32".to_string()
}

fn default_session_expire_minutes() -> i64 {
    DEFAULT_SESSION_EXPIRE_MINUTES
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            secret_key: default_secret_key(),
            session_expire_minutes: default_session_expire_minutes(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DropboxSettings {
    #[serde(default)]
    pub app_key: String,
    #[serde(default)]
    pub app_secret: String,
    #[serde(default = "default_photos_folder")]
    pub photos_folder: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_content_base_url")]
    pub content_base_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default)]
    pub thumbnail_size: ThumbnailSize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Keep following the listing cursor until this many images are collected (0 = one call).
    #[serde(default)]
    pub min_page_photos: usize,
    #[serde(default = "default_drop_unresolved")]
    pub drop_unresolved: bool,
    #[serde(default = "default_duplicate_suffix_len")]
    pub duplicate_suffix_len: usize,
}

fn default_photos_folder() -> String {
    DEFAULT_PHOTOS_FOLDER.to_string()
}

fn default_api_base_url() -> String {
    DROPBOX_API_BASE.to_string()
}

fn default_content_base_url() -> String {
    DROPBOX_CONTENT_BASE.to_string()
}

fn default_token_url() -> String {
    DROPBOX_TOKEN_URL.to_string()
}

fn default_batch_size() -> usize {
    DEFAULT_RESOLVE_BATCH_SIZE
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECONDS
}

fn default_drop_unresolved() -> bool {
    true
}

fn default_duplicate_suffix_len() -> usize {
    DEFAULT_DUPLICATE_SUFFIX_LEN
}

impl Default for DropboxSettings {
    fn default() -> Self {
        Self {
            app_key: String::new(),
            app_secret: String::new(),
            photos_folder: default_photos_folder(),
            api_base_url: default_api_base_url(),
            content_base_url: default_content_base_url(),
            token_url: default_token_url(),
            thumbnail_size: ThumbnailSize::default(),
            batch_size: default_batch_size(),
            timeout_seconds: default_timeout_seconds(),
            min_page_photos: 0,
            drop_unresolved: default_drop_unresolved(),
            duplicate_suffix_len: default_duplicate_suffix_len(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserConfig {
    pub username: String,
    #[serde(default)]
    pub access_code: String,
    #[serde(default)]
    pub dropbox_token: String,
    #[serde(default)]
    pub dropbox_refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub dropbox: DropboxSettings,
    #[serde(default)]
    pub users: Vec<UserConfig>,
}

impl Config {
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("DROPBOX_APP_KEY") {
            self.dropbox.app_key = key;
        }
        if let Some(secret) = lookup("DROPBOX_APP_SECRET") {
            self.dropbox.app_secret = secret;
        }
        if let Some(folder) = lookup("DROPBOX_PHOTOS_FOLDER") {
            self.dropbox.photos_folder = folder;
        }
        if let Some(secret) = lookup("STORYBOOK_SECRET_KEY") {
            self.security.secret_key = secret;
        }
        if let Some(port) = lookup("STORYBOOK_PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
    }
}

pub fn load_config(config_path: &Path) -> Config {
    if !config_path.exists() {
        return Config::default();
    }

    match fs::read_to_string(config_path) {
        Ok(content) => serde_yaml::from_str(&content).unwrap_or_default(),
        Err(_) => Config::default(),
    }
}

pub fn save_default_config(config_path: &Path) -> std::io::Result<()> {
    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let config = Config::default();
    let yaml = serde_yaml::to_string(&config).map_err(|e| std::io::Error::other(e.to_string()))?;
    fs::write(config_path, yaml)
}
