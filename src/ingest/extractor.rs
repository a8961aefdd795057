//! Turns listing cards into `CardFields`.
//!
//! Each field is looked up on its own. A missing element leaves that field
//! at its default; only a card where nothing at all matches is rejected.

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::ingest::profile::CompiledProfile;
use crate::models::job::CardFields;

/// Result of extracting every card on one page.
#[derive(Debug, Default)]
pub struct PageExtract {
    pub cards: Vec<CardFields>,
    pub skipped: usize,
}

/// Parse a listing page and extract every card matched by the profile.
pub fn extract_page(html: &str, base: &Url, profile: &CompiledProfile) -> PageExtract {
    let document = Html::parse_document(html);
    let mut page = PageExtract::default();

    for card in document.select(&profile.card) {
        match extract(card, base, profile) {
            Some(fields) => page.cards.push(fields),
            None => {
                tracing::debug!("Skipping card with no recognizable fields");
                page.skipped += 1;
            }
        }
    }

    page
}

/// Extract one card. Returns `None` only when no field selector matches.
pub fn extract(card: ElementRef<'_>, base: &Url, profile: &CompiledProfile) -> Option<CardFields> {
    let title = first_text(card, &profile.title);
    let company_location = first_text(card, &profile.company_location);
    let salary = first_text(card, &profile.salary);
    let posted = first_text(card, &profile.posted);
    let tags: Vec<String> = card.select(&profile.tags).map(element_text).collect();
    let skills: Vec<String> = card.select(&profile.skills).map(element_text).collect();
    let apply_link = card.select(&profile.apply_link).next();
    let logo = card.select(&profile.logo).next();

    let located = title.is_some()
        || company_location.is_some()
        || salary.is_some()
        || posted.is_some()
        || !tags.is_empty()
        || !skills.is_empty()
        || apply_link.is_some()
        || logo.is_some();
    if !located {
        return None;
    }

    let tag_pair = TagPair::from_tags(&tags);

    let apply_url = apply_link
        .and_then(|a| a.value().attr("href"))
        .and_then(|href| resolve_url(base, href))
        .unwrap_or_default();

    let company_logo_url = logo
        .and_then(|img| img.value().attr("src"))
        .and_then(|src| resolve_url(base, src));

    Some(CardFields {
        title: title.unwrap_or_default(),
        company_location: company_location.unwrap_or_default(),
        salary: normalize_currency(&salary.unwrap_or_default()),
        job_type: tag_pair.job_type,
        posted: posted.unwrap_or_default(),
        skills: skills.join(", "),
        eligible_years: tag_pair.eligible_years,
        apply_url,
        company_logo_url,
    })
}

/// The site renders eligible years and job type as two identical-looking
/// tags. Position is the only thing telling them apart: index 0 is eligible
/// years, index 1 is job type. Further tags are ignored.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TagPair {
    pub eligible_years: String,
    pub job_type: String,
}

impl TagPair {
    pub const ELIGIBLE_YEARS: usize = 0;
    pub const JOB_TYPE: usize = 1;

    pub fn from_tags(tags: &[String]) -> Self {
        Self {
            eligible_years: tags.get(Self::ELIGIBLE_YEARS).cloned().unwrap_or_default(),
            job_type: tags.get(Self::JOB_TYPE).cloned().unwrap_or_default(),
        }
    }
}

fn first_text(card: ElementRef<'_>, selector: &Selector) -> Option<String> {
    card.select(selector).next().map(element_text)
}

fn element_text(element: ElementRef<'_>) -> String {
    let raw: String = element.text().collect();
    clean_text(&raw)
}

/// Trim and decode any HTML entities that survived parsing.
pub fn clean_text(raw: &str) -> String {
    html_escape::decode_html_entities(raw.trim())
        .trim()
        .to_string()
}

/// The rupee glyph arrives either intact or mangled to `?` depending on the
/// page encoding. Both become the literal `INR`.
pub fn normalize_currency(salary: &str) -> String {
    salary.replace('\u{20b9}', "INR").replace('?', "INR").trim().to_string()
}

/// Resolve a possibly relative reference against the page URL. Empty or
/// unresolvable references yield `None`.
pub fn resolve_url(base: &Url, reference: &str) -> Option<String> {
    let reference = reference.trim();
    if reference.is_empty() {
        return None;
    }
    base.join(reference).ok().map(String::from)
}
