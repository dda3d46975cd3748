use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;

use crate::dropbox::DropboxEntry;

/// A Dropbox image resolved for display. Rebuilt on every listing; `url` expires
/// with Dropbox's temporary-link TTL.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub id: String,
    pub name: String,
    pub path: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhotoPage {
    pub photos: Vec<Photo>,
    pub cursor: String,
    pub has_more: bool,
    /// Files left out because their link or thumbnail could not be resolved.
    pub dropped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Listing filter; every present field must match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhotoFilter {
    pub tags: Option<Vec<String>>,
    pub date_range: Option<DateRange>,
    pub search_term: Option<String>,
}

impl PhotoFilter {
    pub fn is_empty(&self) -> bool {
        self.tags.is_none() && self.date_range.is_none() && self.search_term.is_none()
    }

    pub fn matches(&self, entry: &DropboxEntry) -> bool {
        if let Some(tags) = &self.tags {
            let folders: Vec<String> = entry
                .parent_folders()
                .into_iter()
                .map(str::to_lowercase)
                .collect();
            if !tags.iter().any(|tag| folders.contains(&tag.to_lowercase())) {
                return false;
            }
        }

        if let Some(range) = &self.date_range {
            match entry.client_modified {
                Some(ts) if ts >= range.start && ts <= range.end => {}
                _ => return false,
            }
        }

        if let Some(term) = &self.search_term {
            if !entry.name.to_lowercase().contains(&term.to_lowercase()) {
                return false;
            }
        }

        true
    }
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates. A plain end date covers
/// the whole day.
pub fn parse_filter_date(value: &str, end_of_day: bool) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?;
    let time = if end_of_day {
        NaiveTime::from_hms_milli_opt(23, 59, 59, 999)?
    } else {
        NaiveTime::MIN
    };
    Some(Utc.from_utc_datetime(&date.and_time(time)))
}
