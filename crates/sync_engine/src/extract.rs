use std::fmt::Write;

use scraper::{ElementRef, Selector};
use sha2::{Digest, Sha256};
use sync_core::RawRecord;
use url::Url;

use crate::discovery::{discover, estimate_total, DiscoveryStrategy};
use crate::selectors::record;
use crate::{PageSnapshot, SkipReason};

/// One discovery pass over a page, fully parsed into owned values.
#[derive(Debug, Clone, PartialEq)]
pub struct PageScan {
    pub strategy: DiscoveryStrategy,
    pub element_count: usize,
    pub estimated_total: u64,
    pub candidates: Vec<Result<RawRecord, SkipReason>>,
}

pub fn scan_page(snapshot: &PageSnapshot, base_origin: &str) -> PageScan {
    let document = snapshot.document();
    let found = discover(&document);
    let candidates = found
        .elements
        .iter()
        .map(|element| extract_record(*element, &snapshot.url, base_origin))
        .collect();
    PageScan {
        strategy: found.strategy,
        element_count: found.elements.len(),
        estimated_total: estimate_total(&document, found.elements.len()),
        candidates,
    }
}

/// Number of candidate elements currently on the page.
pub fn candidate_count(snapshot: &PageSnapshot) -> usize {
    discover(&snapshot.document()).elements.len()
}

pub fn extract_record(
    element: ElementRef<'_>,
    page_url: &str,
    base_origin: &str,
) -> Result<RawRecord, SkipReason> {
    let href = link_of(element).and_then(|link| link.value().attr("href"));
    let url = href
        .and_then(|href| resolve_url(href, base_origin))
        .or_else(|| Some(page_url.to_string()).filter(|url| !url.is_empty()))
        .ok_or(SkipReason::MissingUrl)?;
    let title = extract_title(element).ok_or(SkipReason::MissingTitle)?;

    Ok(RawRecord {
        id: extract_id(element, href),
        title,
        content: first_text(element, &record::CONTENT),
        image_url: extract_image(element, base_origin),
        url,
        author_name: first_text(element, &record::AUTHOR),
        author_avatar: extract_avatar(element, base_origin),
        tags: extract_tags(element),
    })
}

fn link_of(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    if element.value().name() == "a" {
        return Some(element);
    }
    element.select(&record::LINK).next()
}

/// Absolute http(s) links pass through; root-relative paths join the base origin.
pub fn resolve_url(href: &str, base_origin: &str) -> Option<String> {
    let href = href.trim();
    if let Ok(url) = Url::parse(href) {
        return matches!(url.scheme(), "http" | "https").then(|| url.to_string());
    }
    if href.starts_with('/') {
        return Url::parse(base_origin)
            .and_then(|base| base.join(href))
            .ok()
            .map(String::from);
    }
    None
}

fn extract_id(element: ElementRef<'_>, href: Option<&str>) -> String {
    if let Some(href) = href {
        let from_path = record::ID_PATTERNS
            .iter()
            .find_map(|pattern| pattern.captures(href))
            .and_then(|captures| captures.get(1))
            .map(|id| id.as_str().to_string());
        if let Some(id) = from_path {
            return id;
        }
    }
    let from_attribute = record::ID_ATTRIBUTES
        .iter()
        .find_map(|name| element.value().attr(name))
        .or_else(|| {
            element
                .select(&record::DATA_ID)
                .next()
                .and_then(|child| child.value().attr("data-id"))
        })
        .map(str::trim)
        .filter(|id| !id.is_empty());
    match from_attribute {
        Some(id) => id.to_string(),
        None => fallback_id(&element.html()),
    }
}

/// Stable across re-scans of the same markup.
fn fallback_id(markup: &str) -> String {
    let digest = Sha256::digest(markup.as_bytes());
    let mut id = String::from("gen-");
    for byte in digest.iter().take(8) {
        let _ = write!(&mut id, "{byte:02x}");
    }
    id
}

fn extract_title(element: ElementRef<'_>) -> Option<String> {
    if let Some(title) = first_text(element, &record::TITLE) {
        return Some(title);
    }
    let alt = element
        .select(&record::IMAGE)
        .next()
        .and_then(|img| img.value().attr("alt"))
        .filter(|alt| alt.chars().count() > 1)
        .map(|alt| alt.trim().to_string())
        .filter(|alt| !alt.is_empty());
    if alt.is_some() {
        return alt;
    }
    let text = text_of(element);
    (text.chars().count() > 3).then(|| text.chars().take(record::TITLE_FALLBACK_CHARS).collect())
}

fn first_text(element: ElementRef<'_>, selectors: &[(&'static str, Selector)]) -> Option<String> {
    selectors.iter().find_map(|(_, selector)| {
        element
            .select(selector)
            .next()
            .map(text_of)
            .filter(|text| !text.is_empty())
    })
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn image_source(img: ElementRef<'_>, base_origin: &str) -> Option<String> {
    record::IMAGE_ATTRIBUTES
        .iter()
        .filter_map(|name| img.value().attr(name))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(|value| resolve_url(value, base_origin).unwrap_or_else(|| value.to_string()))
}

fn extract_image(element: ElementRef<'_>, base_origin: &str) -> Option<String> {
    element
        .select(&record::IMAGE)
        .next()
        .and_then(|img| image_source(img, base_origin))
}

fn extract_avatar(element: ElementRef<'_>, base_origin: &str) -> Option<String> {
    element
        .select(&record::AVATAR)
        .next()
        .and_then(|img| image_source(img, base_origin))
}

fn extract_tags(element: ElementRef<'_>) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in element.select(&record::TAG) {
        let text = text_of(tag);
        if !text.is_empty() && !tags.contains(&text) {
            tags.push(text);
        }
    }
    tags
}
