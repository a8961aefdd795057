use scraper::Selector;

use crate::error::ProfileError;
use crate::models::job::SourceType;

/// CSS selectors naming where each field lives in a listing page.
///
/// `tags` matches an untyped row of labels; see `extractor::TagPair` for
/// how they map onto fields.
#[derive(Debug, Clone, Copy)]
pub struct SelectorProfile {
    pub card: &'static str,
    pub title: &'static str,
    pub company_location: &'static str,
    pub salary: &'static str,
    pub posted: &'static str,
    pub tags: &'static str,
    pub skills: &'static str,
    pub apply_link: &'static str,
    pub logo: &'static str,
    pub pagination: &'static str,
}

/// Card markup currently served by talentd.in for every category.
pub const TALENTD: SelectorProfile = SelectorProfile {
    card: "div.backdrop-blur-sm.rounded-xl.border.p-4",
    title: "h2.text-lg",
    company_location: "p.text-gray-600",
    salary: "p.text-green-600",
    posted: "p.text-gray-500",
    tags: "div.mt-2 span.text-sm",
    skills: "div.flex-wrap.gap-2.mt-3 span",
    apply_link: "a.bg-blue-600",
    logo: "img.rounded-lg",
    pagination: "div.hidden.sm\\:flex a[href*='page=']",
};

impl SelectorProfile {
    pub fn for_source(source: SourceType) -> &'static SelectorProfile {
        match source {
            SourceType::Regular | SourceType::Freshers | SourceType::Internships => &TALENTD,
        }
    }

    pub fn compile(&self) -> Result<CompiledProfile, ProfileError> {
        Ok(CompiledProfile {
            card: parse("card", self.card)?,
            title: parse("title", self.title)?,
            company_location: parse("company_location", self.company_location)?,
            salary: parse("salary", self.salary)?,
            posted: parse("posted", self.posted)?,
            tags: parse("tags", self.tags)?,
            skills: parse("skills", self.skills)?,
            apply_link: parse("apply_link", self.apply_link)?,
            logo: parse("logo", self.logo)?,
            pagination: parse("pagination", self.pagination)?,
        })
    }
}

fn parse(field: &'static str, selector: &str) -> Result<Selector, ProfileError> {
    Selector::parse(selector).map_err(|e| ProfileError {
        field,
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

/// A profile with every selector parsed once up front.
#[derive(Debug, Clone)]
pub struct CompiledProfile {
    pub card: Selector,
    pub title: Selector,
    pub company_location: Selector,
    pub salary: Selector,
    pub posted: Selector,
    pub tags: Selector,
    pub skills: Selector,
    pub apply_link: Selector,
    pub logo: Selector,
    pub pagination: Selector,
}
