use scraper::Html;

use crate::selectors::gate;
use crate::PageSnapshot;

/// The three independent collection-page signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GateReport {
    pub url_matches: bool,
    pub has_container: bool,
    pub title_matches: bool,
}

impl GateReport {
    pub fn is_collection_page(&self) -> bool {
        self.url_matches || self.has_container || self.title_matches
    }
}

pub fn check_collection_page(snapshot: &PageSnapshot) -> GateReport {
    check_document(&snapshot.url, &snapshot.title, &snapshot.document())
}

pub(crate) fn check_document(url: &str, title: &str, document: &Html) -> GateReport {
    let url_matches = gate::URL_MARKERS.iter().any(|marker| url.contains(marker));
    let has_container = document.select(&gate::CONTAINER).next().is_some();
    let heading_matches = document
        .select(&gate::HEADING)
        .next()
        .is_some_and(|heading| heading.text().collect::<String>().contains(gate::HEADING_MARKER));
    let title_matches =
        gate::TITLE_MARKERS.iter().any(|marker| title.contains(marker)) || heading_matches;

    GateReport {
        url_matches,
        has_container,
        title_matches,
    }
}
