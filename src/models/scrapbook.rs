use serde::Serialize;

use super::photo::Photo;

const GRID_CAPACITY: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PageTemplate {
    FullBleed,
    TwoUp,
    Grid,
}

impl PageTemplate {
    /// Template for a page holding `count` photos.
    fn for_count(count: usize) -> Self {
        match count {
            1 => PageTemplate::FullBleed,
            2 => PageTemplate::TwoUp,
            _ => PageTemplate::Grid,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageLayout {
    pub id: String,
    pub template: PageTemplate,
    pub photos: Vec<Photo>,
    pub caption: String,
}

/// Lays photos out into scrapbook pages, in order.
///
/// Full grids of four are taken while at least four photos remain; the remainder gets
/// a page of its own (one photo full-bleed, two side by side, three in a grid).
pub fn generate_pages(photos: &[Photo]) -> Vec<PageLayout> {
    photos
        .chunks(GRID_CAPACITY)
        .enumerate()
        .map(|(index, chunk)| PageLayout {
            id: format!("page-{}", index + 1),
            template: PageTemplate::for_count(chunk.len()),
            photos: chunk.to_vec(),
            caption: String::new(),
        })
        .collect()
}
