use std::error::Error as _;
use std::io;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use engine_logging::{engine_debug, engine_info};
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, COOKIE};
use serde_json::Value;

use crate::decode::decode_page;
use crate::{scripts, EvalError, NavigationError, PageSnapshot, RenderingSurface};

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    /// Sent as the `Cookie` header, e.g. copied from a logged-in browser.
    pub cookie: Option<String>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            redirect_limit: 5,
            max_bytes: 5 * 1024 * 1024,
            cookie: None,
        }
    }
}

#[derive(Default)]
struct History {
    pages: Vec<PageSnapshot>,
    index: usize,
    cookie: Option<String>,
    last_headers: Vec<(String, String)>,
}

impl History {
    fn current(&self) -> Option<&PageSnapshot> {
        self.pages.get(self.index)
    }

    fn push(&mut self, page: PageSnapshot) {
        if !self.pages.is_empty() {
            self.pages.truncate(self.index + 1);
        }
        self.pages.push(page);
        self.index = self.pages.len() - 1;
    }
}

/// A surface over plain HTTP. Pages are fetched once and served from memory;
/// there is no script engine, so clicks and scrolls never load anything new.
pub struct StaticPageSurface {
    client: reqwest::Client,
    settings: FetchSettings,
    history: Mutex<History>,
}

impl StaticPageSurface {
    pub fn new(settings: FetchSettings) -> Result<Self, NavigationError> {
        let redirect_limit = settings.redirect_limit;
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(redirect_limit))
            .build()
            .map_err(|err| NavigationError::Other(err.to_string()))?;
        let history = History {
            cookie: settings.cookie.clone(),
            ..History::default()
        };
        Ok(Self {
            client,
            settings,
            history: Mutex::new(history),
        })
    }

    fn history(&self) -> MutexGuard<'_, History> {
        self.history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn fetch(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<PageSnapshot, NavigationError> {
        let parsed =
            reqwest::Url::parse(url).map_err(|err| NavigationError::Other(err.to_string()))?;
        let cookie = self.history().cookie.clone();
        let header_map = build_headers(headers, cookie.as_deref())?;

        let response = self
            .client
            .get(parsed)
            .headers(header_map)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(NavigationError::Other(format!(
                "server responded with status {}",
                status.as_u16()
            )));
        }
        if let Some(len) = response.content_length() {
            if len > self.settings.max_bytes {
                return Err(too_large(self.settings.max_bytes));
            }
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            if bytes.len() as u64 + chunk.len() as u64 > self.settings.max_bytes {
                return Err(too_large(self.settings.max_bytes));
            }
            bytes.extend_from_slice(&chunk);
        }

        let decoded = decode_page(&bytes, content_type.as_deref());
        engine_debug!(
            "Fetched {} ({} bytes, {})",
            final_url,
            bytes.len(),
            decoded.encoding
        );
        let mut page = PageSnapshot::from_html(final_url, decoded.html);
        page.cookie = cookie.unwrap_or_default();
        Ok(page)
    }

    /// Headers sent with the most recent navigation.
    pub fn last_headers(&self) -> Vec<(String, String)> {
        self.history().last_headers.clone()
    }
}

#[async_trait]
impl RenderingSurface for StaticPageSurface {
    async fn navigate(&self, url: &str, headers: &[(String, String)]) -> Result<(), NavigationError> {
        let page = self.fetch(url, headers).await?;
        let mut history = self.history();
        history.last_headers = headers.to_vec();
        history.push(page);
        Ok(())
    }

    async fn evaluate_script(&self, source: &str) -> Result<Value, EvalError> {
        if source != scripts::SNAPSHOT {
            return Ok(Value::Bool(false));
        }
        let history = self.history();
        let page = history.current().ok_or(EvalError::NoPage)?;
        serde_json::to_value(page).map_err(|err| EvalError::Decode(err.to_string()))
    }

    async fn current_url(&self) -> Option<String> {
        self.history().current().map(|page| page.url.clone())
    }

    async fn can_go_back(&self) -> bool {
        self.history().index > 0
    }

    async fn can_go_forward(&self) -> bool {
        let history = self.history();
        history.index + 1 < history.pages.len()
    }

    async fn go_back(&self) -> Result<(), NavigationError> {
        let mut history = self.history();
        if history.index == 0 {
            return Err(NavigationError::Other("no previous page".to_string()));
        }
        history.index -= 1;
        Ok(())
    }

    async fn go_forward(&self) -> Result<(), NavigationError> {
        let mut history = self.history();
        if history.index + 1 >= history.pages.len() {
            return Err(NavigationError::Other("no next page".to_string()));
        }
        history.index += 1;
        Ok(())
    }

    async fn reload(&self) -> Result<(), NavigationError> {
        let (url, headers) = {
            let history = self.history();
            let url = history
                .current()
                .map(|page| page.url.clone())
                .ok_or_else(|| NavigationError::Other("no page to reload".to_string()))?;
            (url, history.last_headers.clone())
        };
        let page = self.fetch(&url, &headers).await?;
        let mut history = self.history();
        let index = history.index;
        if let Some(slot) = history.pages.get_mut(index) {
            *slot = page;
        }
        Ok(())
    }

    async fn clear_all_site_data(&self) {
        let mut history = self.history();
        history.cookie = None;
        for page in &mut history.pages {
            page.cookie.clear();
            page.storage_keys.clear();
        }
        engine_info!("Cleared cookies and cached page data");
    }
}

fn build_headers(
    headers: &[(String, String)],
    cookie: Option<&str>,
) -> Result<HeaderMap, NavigationError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|err| NavigationError::Other(format!("invalid header {name}: {err}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|err| NavigationError::Other(format!("invalid header value: {err}")))?;
        map.insert(name, value);
    }
    if let Some(cookie) = cookie.filter(|cookie| !cookie.is_empty()) {
        let value = HeaderValue::from_str(cookie)
            .map_err(|err| NavigationError::Other(format!("invalid cookie: {err}")))?;
        map.insert(COOKIE, value);
    }
    Ok(map)
}

fn too_large(max_bytes: u64) -> NavigationError {
    NavigationError::Other(format!("page larger than {max_bytes} bytes"))
}

fn map_reqwest_error(err: reqwest::Error) -> NavigationError {
    if err.is_timeout() {
        return NavigationError::Timeout;
    }
    if err.is_redirect() {
        return NavigationError::Other("too many redirects".to_string());
    }
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            if let Some(kind) = classify_io_error(io_err.kind()) {
                return kind;
            }
        }
        if cause.to_string().contains("dns error") {
            return NavigationError::HostUnreachable;
        }
        source = cause.source();
    }
    NavigationError::Other(err.to_string())
}

fn classify_io_error(kind: io::ErrorKind) -> Option<NavigationError> {
    match kind {
        io::ErrorKind::ConnectionRefused => Some(NavigationError::ConnectionRefused),
        io::ErrorKind::HostUnreachable => Some(NavigationError::HostUnreachable),
        io::ErrorKind::NetworkUnreachable | io::ErrorKind::NetworkDown => {
            Some(NavigationError::NoConnectivity)
        }
        io::ErrorKind::TimedOut => Some(NavigationError::Timeout),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_map_to_navigation_kinds() {
        assert_eq!(
            classify_io_error(io::ErrorKind::ConnectionRefused),
            Some(NavigationError::ConnectionRefused)
        );
        assert_eq!(
            classify_io_error(io::ErrorKind::NetworkDown),
            Some(NavigationError::NoConnectivity)
        );
        assert_eq!(classify_io_error(io::ErrorKind::InvalidData), None);
    }

    #[test]
    fn history_push_drops_forward_entries() {
        let mut history = History::default();
        for url in ["a", "b", "c"] {
            history.push(PageSnapshot::from_html(url, ""));
        }
        history.index = 0;
        history.push(PageSnapshot::from_html("d", ""));
        let urls = history.pages.iter().map(|page| page.url.as_str()).collect::<Vec<_>>();
        assert_eq!(urls, vec!["a", "d"]);
        assert_eq!(history.index, 1);
    }
}
