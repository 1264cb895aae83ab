//! CSS selectors and patterns for reading collection pages.
//!
//! All platform markup knowledge lives here. When the page structure changes,
//! capture a sample, update the lists below and add a fixture test.

use regex::Regex;
use scraper::Selector;
use std::sync::LazyLock;

fn parse_all(sources: &[&'static str]) -> Vec<(&'static str, Selector)> {
    sources
        .iter()
        .map(|source| (*source, Selector::parse(source).unwrap()))
        .collect()
}

/// Whole-document selectors.
pub mod page {
    use super::*;

    pub static TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());

    pub static BODY: LazyLock<Selector> = LazyLock::new(|| Selector::parse("body").unwrap());
}

/// Collection-page gate signals.
pub mod gate {
    use super::*;

    pub const URL_MARKERS: &[&str] = &["/collect", "/collection", "/liked"];

    pub const TITLE_MARKERS: &[&str] = &["收藏", "喜欢"];

    pub const HEADING_MARKER: &str = "收藏";

    pub static CONTAINER: LazyLock<Selector> = LazyLock::new(|| {
        Selector::parse(
            ".collection-container, \
             [data-testid=\"collection\"], \
             .note-item, \
             .feeds-container",
        )
        .unwrap()
    });

    pub static HEADING: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("h1, h2, h3").unwrap());
}

/// Element discovery cascade, tried in order; first non-empty wins.
pub mod discovery {
    use super::*;

    pub static CASCADE: LazyLock<Vec<(&'static str, Selector)>> = LazyLock::new(|| {
        parse_all(&[
            ".note-item",
            ".collection-item",
            "[data-testid=\"note-item\"]",
            ".feeds-page .note-item",
            ".col .cover",
            "section .note-item",
            ".note-card",
            ".item",
            ".noteItem",
            "a[href*=\"/explore/\"]",
            "a[href*=\"/discovery/item/\"]",
        ])
    });

    /// Images served from the platform's content hosts.
    pub static HOSTED_IMAGE: LazyLock<Selector> = LazyLock::new(|| {
        Selector::parse(
            "img[src*=\"ci.xiaohongshu.com\"], \
             img[src*=\"sns-img\"], \
             img[src*=\"xhscdn.com\"]",
        )
        .unwrap()
    });

    pub static EXPLORE_LINK: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("a[href*=\"explore\"]").unwrap());

    pub const MAX_ANCESTOR_DEPTH: usize = 5;

    pub const CONTAINER_CLASS_MARKERS: &[&str] = &["note", "item"];

    pub static COUNT_LABEL: LazyLock<Selector> = LazyLock::new(|| {
        Selector::parse(
            ".count, \
             .total, \
             [class*=\"count\"], \
             [class*=\"total\"]",
        )
        .unwrap()
    });

    pub static FIRST_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());
}

/// Per-record field selectors, each list tried in order.
pub mod record {
    use super::*;

    pub static LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());

    pub static IMAGE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img").unwrap());

    pub static DATA_ID: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("[data-id]").unwrap());

    pub static ID_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
        [
            r"(?i)/explore/([a-f0-9]+)",
            r"(?i)/discovery/item/([a-f0-9]+)",
            r"(?i)/notes/([a-f0-9]+)",
        ]
        .iter()
        .map(|pattern| Regex::new(pattern).unwrap())
        .collect()
    });

    pub const ID_ATTRIBUTES: &[&str] = &["data-id", "data-note-id"];

    pub const IMAGE_ATTRIBUTES: &[&str] = &["src", "data-src", "data-original"];

    pub static TITLE: LazyLock<Vec<(&'static str, Selector)>> = LazyLock::new(|| {
        parse_all(&[
            ".title",
            ".note-title",
            ".item-title",
            "h1",
            "h2",
            "h3",
            "h4",
            ".text-content",
            ".desc",
            ".content",
        ])
    });

    pub static CONTENT: LazyLock<Vec<(&'static str, Selector)>> = LazyLock::new(|| {
        parse_all(&[".desc", ".description", ".content", ".note-content", "p"])
    });

    pub static AUTHOR: LazyLock<Vec<(&'static str, Selector)>> = LazyLock::new(|| {
        parse_all(&[
            ".author",
            ".author-name",
            ".user-name",
            ".username",
            "[class*=\"author\"]",
            "[class*=\"user\"]",
        ])
    });

    pub static AVATAR: LazyLock<Selector> = LazyLock::new(|| {
        Selector::parse(
            ".avatar img, \
             .user-avatar img, \
             [class*=\"avatar\"] img",
        )
        .unwrap()
    });

    pub static TAG: LazyLock<Selector> = LazyLock::new(|| {
        Selector::parse(
            ".tag, \
             .hashtag, \
             [class*=\"tag\"]",
        )
        .unwrap()
    });

    pub const TITLE_FALLBACK_CHARS: usize = 50;
}

/// "Load more" controls, tried in order.
pub mod pagination {
    use super::*;

    pub static LOAD_MORE: LazyLock<Vec<(&'static str, Selector)>> = LazyLock::new(|| {
        parse_all(&[
            "button[class*=\"load\"]",
            "button[class*=\"more\"]",
            ".load-more",
            ".btn-load",
            "[class*=\"load-more\"]",
        ])
    });

    /// Plain buttons qualify when their text carries one of these labels.
    pub static BUTTON: LazyLock<(&'static str, Selector)> =
        LazyLock::new(|| ("button", Selector::parse("button").unwrap()));

    pub const BUTTON_LABELS: &[&str] = &["更多", "加载"];
}

/// Login readiness signals.
pub mod readiness {
    use super::*;

    pub static ACCOUNT_NUMBER: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"小红书号[：:]\s*\d+").unwrap());

    pub const FOLLOW_LABELS: &[&str] = &["关注", "粉丝"];

    pub const FAVORITES_LABELS: &[&str] = &["收藏", "获赞与收藏"];

    pub static IMAGE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img").unwrap());

    pub const AVATAR_SRC_MARKER: &str = "avatar";

    pub const AVATAR_ALT_MARKERS: &[&str] = &["头像", "用户"];

    pub static LOGIN_CONTROL: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("button, a").unwrap());

    pub const LOGIN_LABELS: &[&str] = &["登录", "去登录"];

    pub const PROFILE_PATHS: &[&str] = &["/user/", "/profile/"];

    pub const STORAGE_KEY_MARKERS: &[&str] = &["user", "auth", "token"];

    pub const COOKIE_MARKERS: &[&str] = &["user", "token", "session"];
}
