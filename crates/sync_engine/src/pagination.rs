use std::time::Duration;

use scraper::{ElementRef, Html, Selector};

use crate::selectors::pagination;
use crate::{scripts, SyncSettings};

/// A clickable control addressed the same way `querySelectorAll` would.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadMoreTarget {
    pub selector: &'static str,
    pub index: usize,
}

impl LoadMoreTarget {
    pub fn click_script(&self) -> String {
        scripts::click_element(self.selector, self.index)
    }
}

/// First visible, enabled "load more" control, if the page has one.
pub fn find_load_more(document: &Html) -> Option<LoadMoreTarget> {
    pagination::LOAD_MORE
        .iter()
        .find_map(|(source, selector)| first_usable(document, *source, selector, |_| true))
        .or_else(|| {
            let (source, selector) = &*pagination::BUTTON;
            first_usable(document, *source, selector, |button| {
                let label = button.text().collect::<String>();
                pagination::BUTTON_LABELS
                    .iter()
                    .any(|wanted| label.contains(wanted))
            })
        })
}

fn first_usable(
    document: &Html,
    source: &'static str,
    selector: &Selector,
    accept: impl Fn(ElementRef<'_>) -> bool,
) -> Option<LoadMoreTarget> {
    document
        .select(selector)
        .enumerate()
        .find(|(_, element)| is_usable(*element) && accept(*element))
        .map(|(index, _)| LoadMoreTarget {
            selector: source,
            index,
        })
}

fn is_usable(element: ElementRef<'_>) -> bool {
    let attrs = element.value();
    let disabled =
        attrs.attr("disabled").is_some() || attrs.attr("aria-disabled") == Some("true");
    !disabled
        && std::iter::once(element)
            .chain(element.ancestors().filter_map(ElementRef::wrap))
            .all(|node| !is_hidden(node))
}

fn is_hidden(element: ElementRef<'_>) -> bool {
    let attrs = element.value();
    if attrs.attr("hidden").is_some() {
        return true;
    }
    let style = attrs
        .attr("style")
        .unwrap_or_default()
        .to_ascii_lowercase()
        .replace(' ', "");
    style.contains("display:none") || style.contains("visibility:hidden")
}

/// Scroll-to-bottom followed by small nudges, each with the wait that follows it.
pub fn scroll_plan(settings: &SyncSettings) -> Vec<(String, Duration)> {
    let mut plan = vec![(
        scripts::SCROLL_TO_BOTTOM.to_string(),
        settings.scroll_bottom_wait,
    )];
    plan.extend((0..settings.scroll_nudges).map(|_| {
        (
            scripts::scroll_by(settings.scroll_nudge_px),
            settings.scroll_nudge_delay,
        )
    }));
    plan
}
