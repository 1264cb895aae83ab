use std::collections::HashSet;

use ego_tree::NodeId;
use scraper::{ElementRef, Html};

use crate::selectors::discovery;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryStrategy {
    /// The first cascade selector with at least one match.
    Selector(&'static str),
    /// Containers found by walking up from hosted images.
    ImageFallback,
}

#[derive(Debug)]
pub struct Discovery<'a> {
    pub strategy: DiscoveryStrategy,
    pub elements: Vec<ElementRef<'a>>,
}

/// Finds candidate item elements, in document order.
pub fn discover(document: &Html) -> Discovery<'_> {
    for (source, selector) in discovery::CASCADE.iter() {
        let elements = document.select(selector).collect::<Vec<_>>();
        if !elements.is_empty() {
            return Discovery {
                strategy: DiscoveryStrategy::Selector(source),
                elements,
            };
        }
    }

    let mut seen: HashSet<NodeId> = HashSet::new();
    let elements = document
        .select(&discovery::HOSTED_IMAGE)
        .filter_map(image_container)
        .filter(|container| seen.insert(container.id()))
        .collect();
    Discovery {
        strategy: DiscoveryStrategy::ImageFallback,
        elements,
    }
}

/// Bounded walk up from an image to the element that most likely wraps one item.
fn image_container(image: ElementRef<'_>) -> Option<ElementRef<'_>> {
    let mut current = parent_element(image);
    for _ in 0..discovery::MAX_ANCESTOR_DEPTH {
        let Some(candidate) = current else {
            break;
        };
        if looks_like_container(candidate) {
            return Some(candidate);
        }
        current = parent_element(candidate);
    }
    image
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|ancestor| ancestor.value().name() == "a")
        .or_else(|| parent_element(image))
}

fn looks_like_container(element: ElementRef<'_>) -> bool {
    if element.value().name() == "a" {
        return true;
    }
    if element.select(&discovery::EXPLORE_LINK).next().is_some() {
        return true;
    }
    let class = element.value().attr("class").unwrap_or_default();
    discovery::CONTAINER_CLASS_MARKERS
        .iter()
        .any(|marker| class.contains(marker))
}

fn parent_element(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element.parent().and_then(ElementRef::wrap)
}

/// Best-effort total: a numeric count label on the page, else three times the
/// visible candidates, floored at 20.
pub fn estimate_total(document: &Html, visible: usize) -> u64 {
    let labelled = document
        .select(&discovery::COUNT_LABEL)
        .filter_map(|label| {
            let text = label.text().collect::<String>();
            discovery::FIRST_NUMBER
                .find(&text)
                .and_then(|number| number.as_str().parse::<u64>().ok())
        })
        .find(|count| (1..100_000).contains(count));
    labelled.unwrap_or_else(|| (visible as u64 * 3).max(20))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_fallback_walks_up_to_linked_container() {
        let html = r#"<div id="feed">
            <section class="card"><a href="/user/aa11"><span><img src="https://sns-img-hw.xhscdn.com/1"></span></a></section>
            <div class="note-wrap"><div><img src="https://ci.xiaohongshu.com/2"></div></div>
            <div><div><div><div><div><div id="leaf"><img src="https://other.xhscdn.com/3"></div></div></div></div></div></div>
        </div>"#;
        let document = Html::parse_document(html);
        let found = discover(&document);

        assert_eq!(found.strategy, DiscoveryStrategy::ImageFallback);
        assert_eq!(found.elements.len(), 3);
        assert_eq!(found.elements[0].value().name(), "a");
        assert_eq!(found.elements[1].value().attr("class"), Some("note-wrap"));
        // Nothing qualifies within five levels: falls back to the direct parent.
        assert_eq!(found.elements[2].value().attr("id"), Some("leaf"));
    }

    #[test]
    fn first_matching_cascade_selector_wins() {
        let html = r#"<div class="item">x</div><div class="note-card">y</div><div class="note-card">z</div>"#;
        let document = Html::parse_document(html);
        let found = discover(&document);
        assert_eq!(found.strategy, DiscoveryStrategy::Selector(".note-card"));
        assert_eq!(found.elements.len(), 2);
    }

    #[test]
    fn count_label_outside_range_falls_back_to_visible_estimate() {
        let document = Html::parse_document(r#"<span class="total">共 0 篇</span>"#);
        assert_eq!(estimate_total(&document, 4), 20);
        assert_eq!(estimate_total(&document, 10), 30);

        let document = Html::parse_document(r#"<span class="note-count">收藏 128</span>"#);
        assert_eq!(estimate_total(&document, 4), 128);
    }
}
