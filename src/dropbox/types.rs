use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::IMAGE_EXTENSIONS;

/// One entry of a `files/list_folder` page.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DropboxEntry {
    #[serde(rename = ".tag")]
    pub tag: String,
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub path_display: Option<String>,
    pub path_lower: Option<String>,
    #[serde(default)]
    pub size: u64,
    pub client_modified: Option<DateTime<Utc>>,
    pub media_info: Option<MediaInfo>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MediaInfo {
    pub metadata: Option<MediaMetadata>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MediaMetadata {
    pub dimensions: Option<Dimensions>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl DropboxEntry {
    pub fn is_file(&self) -> bool {
        self.tag == "file"
    }

    /// Display path, falling back to the lowercased path Dropbox always returns.
    pub fn path(&self) -> &str {
        self.path_display
            .as_deref()
            .or(self.path_lower.as_deref())
            .unwrap_or_default()
    }

    pub fn dimensions(&self) -> Option<Dimensions> {
        self.media_info
            .as_ref()
            .and_then(|info| info.metadata.as_ref())
            .and_then(|meta| meta.dimensions)
    }

    /// Names of the folders containing this entry, outermost first.
    pub fn parent_folders(&self) -> Vec<&str> {
        let path = self.path();
        let parent = path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("");
        parent.split('/').filter(|s| !s.is_empty()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ListFolderPage {
    pub entries: Vec<DropboxEntry>,
    pub cursor: String,
    pub has_more: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThumbnailSize {
    W32h32,
    W64h64,
    W128h128,
    #[default]
    W256h256,
    W480h320,
    W640h480,
    W960h640,
    W1024h768,
    W2048h1536,
}

impl ThumbnailSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThumbnailSize::W32h32 => "w32h32",
            ThumbnailSize::W64h64 => "w64h64",
            ThumbnailSize::W128h128 => "w128h128",
            ThumbnailSize::W256h256 => "w256h256",
            ThumbnailSize::W480h320 => "w480h320",
            ThumbnailSize::W640h480 => "w640h480",
            ThumbnailSize::W960h640 => "w960h640",
            ThumbnailSize::W1024h768 => "w1024h768",
            ThumbnailSize::W2048h1536 => "w2048h1536",
        }
    }
}

pub fn is_image_file(name: &str) -> bool {
    let lower = name.to_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Keeps file entries whose name carries an allow-listed image extension.
pub fn filter_images(entries: Vec<DropboxEntry>) -> Vec<DropboxEntry> {
    entries
        .into_iter()
        .filter(|entry| entry.is_file() && is_image_file(&entry.name))
        .collect()
}

pub fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or_default()
}
