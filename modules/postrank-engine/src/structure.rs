use scraper::{Html, Selector};
use serde::Serialize;

/// Structural features of a post body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ContentStructure {
    pub image_count: u32,
    /// `<h2>` and `<h3>` only.
    pub heading_count: u32,
    pub has_blockquote: bool,
    pub has_list: bool,
    pub has_table: bool,
}

impl ContentStructure {
    /// How many of blockquote / list / table the body uses.
    pub fn rich_block_kinds(&self) -> u32 {
        self.has_blockquote as u32 + self.has_list as u32 + self.has_table as u32
    }
}

/// Parse post markup into structural features.
///
/// The HTML parser is error-tolerant, so malformed markup still yields
/// whatever elements it can recover. Empty input is all zero/false.
pub fn analyze(markup: &str) -> ContentStructure {
    if markup.trim().is_empty() {
        return ContentStructure::default();
    }

    let fragment = Html::parse_fragment(markup);

    ContentStructure {
        image_count: count(&fragment, "img"),
        heading_count: count(&fragment, "h2, h3"),
        has_blockquote: count(&fragment, "blockquote") > 0,
        has_list: count(&fragment, "ul, ol") > 0,
        has_table: count(&fragment, "table") > 0,
    }
}

fn count(fragment: &Html, css: &str) -> u32 {
    match Selector::parse(css) {
        Ok(selector) => fragment.select(&selector).count() as u32,
        Err(_) => 0,
    }
}
