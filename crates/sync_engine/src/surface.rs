use async_trait::async_trait;
use scraper::Html;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::selectors::page;
use crate::{scripts, EvalError, NavigationError};

/// The embedded page-rendering capability the engine drives.
///
/// Implementations own the actual page; the engine only navigates, evaluates
/// script in page context and reads back JSON results.
#[async_trait]
pub trait RenderingSurface: Send + Sync {
    async fn navigate(&self, url: &str, headers: &[(String, String)]) -> Result<(), NavigationError>;

    async fn evaluate_script(&self, source: &str) -> Result<Value, EvalError>;

    async fn current_url(&self) -> Option<String>;

    async fn can_go_back(&self) -> bool;

    async fn can_go_forward(&self) -> bool;

    async fn go_back(&self) -> Result<(), NavigationError>;

    async fn go_forward(&self) -> Result<(), NavigationError>;

    async fn reload(&self) -> Result<(), NavigationError>;

    /// Drops cookies, storage and cached pages for every site.
    async fn clear_all_site_data(&self);
}

/// Everything the host-side heuristics read from a page, captured in one evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PageSnapshot {
    pub url: String,
    pub title: String,
    pub html: String,
    pub text: String,
    pub ready: bool,
    pub storage_keys: Vec<String>,
    pub cookie: String,
}

impl PageSnapshot {
    /// Builds a ready snapshot from server-rendered markup.
    pub fn from_html(url: impl Into<String>, html: impl Into<String>) -> Self {
        let html = html.into();
        let document = Html::parse_document(&html);
        let title = document
            .select(&page::TITLE)
            .next()
            .map(|title| title.text().collect::<String>().trim().to_string())
            .unwrap_or_default();
        let text = document
            .select(&page::BODY)
            .next()
            .map(|body| {
                body.text()
                    .map(str::trim)
                    .filter(|chunk| !chunk.is_empty())
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default();
        Self {
            url: url.into(),
            title,
            html,
            text,
            ready: true,
            storage_keys: Vec::new(),
            cookie: String::new(),
        }
    }

    pub fn document(&self) -> Html {
        Html::parse_document(&self.html)
    }
}

/// Evaluates the snapshot script and decodes its result.
pub async fn capture_snapshot(surface: &dyn RenderingSurface) -> Result<PageSnapshot, EvalError> {
    let value = surface.evaluate_script(scripts::SNAPSHOT).await?;
    serde_json::from_value(value).map_err(|err| EvalError::Decode(err.to_string()))
}
