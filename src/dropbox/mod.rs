//! Dropbox integration: HTTP client, token refresh, photo listing, batch moves.

mod batch_move;
mod client;
mod duplicates;
mod error;
mod listing;
mod refresh;
mod types;

pub use batch_move::batch_move_files;
pub use client::{DropboxApi, HttpDropboxClient};
pub use duplicates::{duplicate_key, find_duplicates, group_duplicates};
pub use error::DropboxError;
pub use listing::{count_photos, list_photos, ListingOptions};
pub use refresh::{Attempt, DropboxCredentials, Refreshed, TokenRefresher};
pub use types::{
    basename, filter_images, is_image_file, Dimensions, DropboxEntry, ListFolderPage,
    ThumbnailSize,
};
