use once_cell::sync::Lazy;
use std::path::PathBuf;

pub static DATA_DIR: Lazy<PathBuf> = Lazy::new(|| {
    std::env::var("STORYBOOK_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./data"))
});

pub static CONFIG_PATH: Lazy<PathBuf> = Lazy::new(|| DATA_DIR.join("config.yaml"));
pub static DATABASE_PATH: Lazy<PathBuf> = Lazy::new(|| DATA_DIR.join("storybook.sqlite"));

pub const DROPBOX_API_BASE: &str = "https://api.dropboxapi.com/2";
pub const DROPBOX_CONTENT_BASE: &str = "https://content.dropboxapi.com/2";
pub const DROPBOX_TOKEN_URL: &str = "https://api.dropbox.com/oauth2/token";

/// Lowercase suffixes accepted by `filter_images`.
pub const IMAGE_EXTENSIONS: [&str; 8] = [
    ".jpg", ".jpeg", ".png", ".heic", ".gif", ".webp", ".bmp", ".tiff",
];

pub const DEFAULT_PHOTOS_FOLDER: &str = "/Camera Uploads (1)";
pub const DEFAULT_RESOLVE_BATCH_SIZE: usize = 10;
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;
pub const DEFAULT_DUPLICATE_SUFFIX_LEN: usize = 20;
pub const DEFAULT_SESSION_EXPIRE_MINUTES: i64 = 60 * 24 * 7;

pub const TOKEN_REFRESHED_HEADER: &str = "x-token-refreshed";
