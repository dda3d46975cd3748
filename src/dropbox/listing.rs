use futures::future::join_all;
use tracing::{info, warn};

use super::error::DropboxError;
use super::refresh::{Attempt, DropboxCredentials, Refreshed, TokenRefresher};
use super::types::{filter_images, DropboxEntry, ThumbnailSize};
use crate::config::DropboxSettings;
use crate::models::{Photo, PhotoFilter, PhotoPage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingOptions {
    pub thumbnail_size: ThumbnailSize,
    pub batch_size: usize,
    pub min_page_photos: usize,
    pub drop_unresolved: bool,
}

impl From<&DropboxSettings> for ListingOptions {
    fn from(settings: &DropboxSettings) -> Self {
        Self {
            thumbnail_size: settings.thumbnail_size,
            batch_size: settings.batch_size,
            min_page_photos: settings.min_page_photos,
            drop_unresolved: settings.drop_unresolved,
        }
    }
}

impl Default for ListingOptions {
    fn default() -> Self {
        Self::from(&DropboxSettings::default())
    }
}

/// Lists one page of images under `folder` and resolves a temporary link and an
/// inline thumbnail for each, in batches of `batch_size` concurrent files.
///
/// Photo order follows Dropbox's entry order. Files that fail to resolve are left out
/// (and counted) unless `drop_unresolved` is off.
pub async fn list_photos(
    refresher: &TokenRefresher<'_>,
    credentials: &DropboxCredentials,
    folder: &str,
    cursor: Option<&str>,
    filter: &PhotoFilter,
    options: &ListingOptions,
) -> Result<Refreshed<PhotoPage>, DropboxError> {
    let api = refresher.api();
    let mut credentials = credentials.clone();
    let mut token_refreshed = false;
    let mut images: Vec<DropboxEntry> = Vec::new();
    let mut cursor = cursor.map(str::to_string);

    let (next_cursor, has_more) = loop {
        let result = refresher
            .run(&credentials, |token| {
                let cursor = cursor.clone();
                async move { api.list_folder(&token, folder, cursor.as_deref()).await }
            })
            .await?;
        let (page, refreshed) = credentials.adopt(result);
        token_refreshed |= refreshed;

        let fetched = page.entries.len();
        images.extend(
            filter_images(page.entries)
                .into_iter()
                .filter(|entry| filter.matches(entry)),
        );
        info!(
            "Fetched {} entries from {}, {} images collected",
            fetched,
            folder,
            images.len()
        );

        if !page.has_more || images.len() >= options.min_page_photos {
            break (page.cursor, page.has_more);
        }
        cursor = Some(page.cursor);
    };

    let mut photos = Vec::with_capacity(images.len());
    let mut dropped = 0;

    for batch in images.chunks(options.batch_size.max(1)) {
        let snapshot = credentials.clone();
        let results = join_all(
            batch
                .iter()
                .map(|entry| resolve_photo(refresher, &snapshot, entry, options.thumbnail_size)),
        )
        .await;

        for (entry, resolved) in batch.iter().zip(results) {
            token_refreshed |= credentials.adopt_token(resolved.new_access_token);
            match resolved.result {
                Ok(photo) => photos.push(photo),
                Err(e) if options.drop_unresolved => {
                    warn!("Dropping {} from listing: {}", entry.path(), e);
                    dropped += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    info!(
        "Resolved {} photos ({} dropped, has_more: {})",
        photos.len(),
        dropped,
        has_more
    );

    Ok(Refreshed {
        data: PhotoPage {
            photos,
            cursor: next_cursor,
            has_more,
            dropped,
        },
        new_access_token: token_refreshed.then_some(credentials.access_token),
    })
}

async fn resolve_photo(
    refresher: &TokenRefresher<'_>,
    credentials: &DropboxCredentials,
    entry: &DropboxEntry,
    size: ThumbnailSize,
) -> Attempt<Photo> {
    let api = refresher.api();
    let path = entry.path();

    let (thumbnail, link) = futures::join!(
        refresher.attempt(credentials, |token| async move {
            api.get_thumbnail(&token, path, size).await
        }),
        refresher.attempt(credentials, |token| async move {
            api.get_temporary_link(&token, path).await
        }),
    );

    let new_access_token = link.new_access_token.or(thumbnail.new_access_token);
    let result = thumbnail.result.and_then(|thumbnail| {
        let url = link.result?;
        if thumbnail.is_empty() || url.is_empty() {
            return Err(DropboxError::Parse(format!(
                "Empty link or thumbnail for {}",
                path
            )));
        }

        let dimensions = entry.dimensions();
        Ok(Photo {
            id: entry.id.clone(),
            name: entry.name.clone(),
            path: path.to_string(),
            url,
            thumbnail_url: Some(thumbnail),
            width: dimensions.map(|d| d.width),
            height: dimensions.map(|d| d.height),
            size: entry.size,
        })
    });

    Attempt {
        result,
        new_access_token,
    }
}

/// Walks every listing page of `folder`, handing each page's image entries to `visit`.
pub(crate) async fn walk_images<F>(
    refresher: &TokenRefresher<'_>,
    credentials: &DropboxCredentials,
    folder: &str,
    mut visit: F,
) -> Result<Option<String>, DropboxError>
where
    F: FnMut(Vec<DropboxEntry>),
{
    let api = refresher.api();
    let mut credentials = credentials.clone();
    let mut token_refreshed = false;
    let mut cursor: Option<String> = None;

    loop {
        let result = refresher
            .run(&credentials, |token| {
                let cursor = cursor.clone();
                async move { api.list_folder(&token, folder, cursor.as_deref()).await }
            })
            .await?;
        let (page, refreshed) = credentials.adopt(result);
        token_refreshed |= refreshed;

        visit(filter_images(page.entries));

        if !page.has_more {
            break;
        }
        cursor = Some(page.cursor);
    }

    Ok(token_refreshed.then_some(credentials.access_token))
}

/// Number of image files anywhere under `folder`.
pub async fn count_photos(
    refresher: &TokenRefresher<'_>,
    credentials: &DropboxCredentials,
    folder: &str,
) -> Result<Refreshed<usize>, DropboxError> {
    let mut count = 0;
    let new_access_token =
        walk_images(refresher, credentials, folder, |images| count += images.len()).await?;

    info!("Counted {} photos in {}", count, folder);
    Ok(Refreshed {
        data: count,
        new_access_token,
    })
}
