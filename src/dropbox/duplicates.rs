use indexmap::IndexMap;
use tracing::info;

use super::error::DropboxError;
use super::listing::walk_images;
use super::refresh::{DropboxCredentials, Refreshed, TokenRefresher};
use super::types::DropboxEntry;
use crate::models::{DuplicateCandidate, DuplicateGroup, DuplicateReport};

/// Coarse grouping key: byte size plus the lowercased tail of the file name.
/// Files with equal keys are only *likely* duplicates; contents are never compared.
pub fn duplicate_key(name: &str, size: u64, suffix_len: usize) -> String {
    let chars: Vec<char> = name.chars().collect();
    let start = chars.len().saturating_sub(suffix_len);
    let tail: String = chars[start..].iter().collect();
    format!("{}-{}", size, tail.to_lowercase())
}

/// Groups entries by `duplicate_key`, keeping groups with more than one member.
/// Groups and their members stay in first-seen order.
pub fn group_duplicates(entries: &[DropboxEntry], suffix_len: usize) -> Vec<DuplicateGroup> {
    let mut groups: IndexMap<String, Vec<DuplicateCandidate>> = IndexMap::new();

    for entry in entries {
        groups
            .entry(duplicate_key(&entry.name, entry.size, suffix_len))
            .or_default()
            .push(DuplicateCandidate {
                id: entry.id.clone(),
                name: entry.name.clone(),
                path: entry.path().to_string(),
                size: entry.size,
            });
    }

    groups
        .into_iter()
        .filter(|(_, photos)| photos.len() > 1)
        .map(|(hash, photos)| DuplicateGroup { hash, photos })
        .collect()
}

/// Scans every image under `folder` and reports likely duplicate groups.
pub async fn find_duplicates(
    refresher: &TokenRefresher<'_>,
    credentials: &DropboxCredentials,
    folder: &str,
    suffix_len: usize,
) -> Result<Refreshed<DuplicateReport>, DropboxError> {
    let mut images = Vec::new();
    let new_access_token =
        walk_images(refresher, credentials, folder, |page| images.extend(page)).await?;

    let groups = group_duplicates(&images, suffix_len);
    info!(
        "Scanned {} photos in {}, found {} duplicate groups",
        images.len(),
        folder,
        groups.len()
    );

    Ok(Refreshed {
        data: DuplicateReport {
            groups,
            scanned: images.len(),
        },
        new_access_token,
    })
}
