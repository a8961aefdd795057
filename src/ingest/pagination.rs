use scraper::{Html, Selector};

/// Highest page number among the pagination anchors on a listing page.
///
/// Anchor texts that are not positive integers ("Next", "…") are ignored.
/// A page with no numeric controls is a single-page listing, so the result
/// is never below 1.
pub fn discover_page_count(html: &str, anchors: &Selector) -> u32 {
    let document = Html::parse_document(html);
    document
        .select(anchors)
        .filter_map(|a| page_number(a.text().collect::<String>().trim()))
        .max()
        .unwrap_or(1)
}

/// Plain decimal digits only; `str::parse` would also take a leading `+`.
fn page_number(label: &str) -> Option<u32> {
    if label.is_empty() || !label.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    label.parse().ok().filter(|n| *n > 0)
}
