use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{parse_filter_date, DateRange, Photo, PhotoFilter};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotosQuery {
    pub cursor: Option<String>,
    /// Comma-separated.
    pub tags: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub search_term: Option<String>,
}

impl PhotosQuery {
    pub fn filter(&self) -> AppResult<PhotoFilter> {
        let tags: Vec<String> = self
            .tags
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();

        let date_range = match (self.start_date.as_deref(), self.end_date.as_deref()) {
            (Some(start), Some(end)) => Some(DateRange {
                start: parse_filter_date(start, false)
                    .ok_or_else(|| AppError::BadRequest(format!("Invalid startDate: {}", start)))?,
                end: parse_filter_date(end, true)
                    .ok_or_else(|| AppError::BadRequest(format!("Invalid endDate: {}", end)))?,
            }),
            _ => None,
        };

        Ok(PhotoFilter {
            tags: if tags.is_empty() { None } else { Some(tags) },
            date_range,
            search_term: self.search_term.clone().filter(|s| !s.is_empty()),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct PhotosResponse {
    pub photos: Vec<Photo>,
    pub cursor: String,
    pub has_more: bool,
    #[serde(rename = "tokenRefreshed")]
    pub token_refreshed: bool,
    pub dropped: usize,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MoveBatchRequest {
    #[validate(length(min = 1, message = "paths must be a non-empty array"))]
    pub paths: Vec<String>,
    #[validate(length(min = 1, message = "destinationFolder is required"))]
    pub destination_folder: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedMove {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchMoveResult {
    pub success: Vec<String>,
    pub failed: Vec<FailedMove>,
    pub folder_created: bool,
}

#[derive(Debug, Deserialize)]
pub struct FolderQuery {
    pub folder: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoCountResponse {
    pub count: usize,
    pub folder_path: String,
    pub token_refreshed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateCandidate {
    pub id: String,
    pub name: String,
    pub path: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    pub hash: String,
    pub photos: Vec<DuplicateCandidate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateReport {
    pub groups: Vec<DuplicateGroup>,
    pub scanned: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicatesResponse {
    pub groups: Vec<DuplicateGroup>,
    pub scanned: usize,
    pub token_refreshed: bool,
}
