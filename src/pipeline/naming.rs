//! The file-name convention that links the two stages.
//!
//! The renderer writes `{stem}_page_{NN}.png`; the deck assembler parses the
//! same names back into `(stem, page)`. Nothing else is shared between them.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

static IMAGE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<stem>.+)_page_(?P<page>\d+)\.png$").unwrap());

/// Image file name for a 1-based page index, zero-padded to two digits.
pub fn image_file_name(stem: &str, page: usize) -> String {
    format!("{stem}_page_{page:02}.png")
}

/// Parse an image file name back into `(stem, page)`.
///
/// Returns `None` for names that don't follow the convention, including a
/// page index of zero. The stem is matched greedily so a stem that itself
/// contains `_page_` still round-trips.
pub fn parse_image_file_name(name: &str) -> Option<(String, usize)> {
    let caps = IMAGE_NAME.captures(name)?;
    let page: usize = caps["page"].parse().ok()?;
    if page == 0 {
        return None;
    }
    Some((caps["stem"].to_string(), page))
}

/// File stem of an HTML input, used as the naming and grouping key.
pub fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report".to_string())
}
