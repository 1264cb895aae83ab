#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, Once};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sync_core::{NoteRecord, ScriptEvent};
use sync_engine::{
    scripts, EvalError, ExtractionHandle, NavigationError, PageSnapshot, RecordStore,
    RenderingSurface, StoreError,
};

pub const ORIGIN: &str = "https://www.xiaohongshu.com";
pub const COLLECTION_URL: &str = "https://www.xiaohongshu.com/user/profile/me/collect";
pub const LOGIN_URL: &str = "https://www.xiaohongshu.com/login";
pub const HOME_URL: &str = "https://www.xiaohongshu.com/explore";

static INIT: Once = Once::new();

pub fn init_logging() {
    INIT.call_once(|| {
        engine_logging::initialize_for_tests();
    });
}

pub fn note_id(n: u32) -> String {
    format!("{n:024x}")
}

/// A collection page listing notes `1..=count`, with an optional load-more button.
pub fn collection_page(count: u32, load_more: bool) -> String {
    let mut html = String::from(
        "<html><head><title>我的收藏 - 小红书</title></head><body>\
         <div class=\"feeds-container\">",
    );
    for n in 1..=count {
        let id = note_id(n);
        html.push_str(&format!(
            "<section class=\"note-item\">\
               <a href=\"/explore/{id}\"><img src=\"https://sns-img-qc.xhscdn.com/{id}\" alt=\"封面\"></a>\
               <div class=\"title\">笔记 {n}</div>\
               <span class=\"author\">作者{n}</span>\
             </section>"
        ));
    }
    html.push_str("</div>");
    if load_more {
        html.push_str("<button class=\"load-more-btn\">加载更多</button>");
    }
    html.push_str("</body></html>");
    html
}

/// A collection page that has not rendered any notes yet.
pub fn empty_collection_page() -> String {
    "<html><head><title>我的收藏</title></head><body><div class=\"feeds-container\"></div></body></html>"
        .to_string()
}

pub fn login_page() -> String {
    "<html><head><title>小红书 - 登录</title></head>\
     <body><h2>手机号登录</h2><button class=\"submit\">登录</button></body></html>"
        .to_string()
}

pub fn home_page() -> String {
    "<html><head><title>小红书 - 发现</title></head>\
     <body><div class=\"channel\">推荐</div><p>今日热门</p></body></html>"
        .to_string()
}

#[derive(Default)]
pub struct FixtureState {
    pub url: String,
    pub pages: Vec<String>,
    pub stage: usize,
    pub ready: bool,
    pub cookie: String,
    pub storage_keys: Vec<String>,
    pub scroll_loads_more: bool,
    pub routes: HashMap<String, Vec<String>>,
    pub history: Vec<String>,
    pub history_index: usize,
    pub fail_next_navigation: Option<NavigationError>,
    pub hang_navigation: bool,
    pub headers: Vec<Vec<(String, String)>>,
    pub scripts: Vec<String>,
    pub cleared: bool,
}

/// In-memory surface serving scripted page stages. Clicks advance to the next
/// stage; scroll-to-bottom does too when `scroll_loads_more` is set.
#[derive(Default)]
pub struct FixtureSurface {
    state: Mutex<FixtureState>,
}

impl FixtureSurface {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FixtureState {
                ready: true,
                ..FixtureState::default()
            }),
        }
    }

    pub fn with_route(self, url: &str, pages: Vec<String>) -> Self {
        self.lock().routes.insert(url.to_string(), pages);
        self
    }

    /// Puts the surface on `url` without a navigation.
    pub fn showing(self, url: &str, pages: Vec<String>) -> Self {
        self.show(url, pages);
        self
    }

    pub fn show(&self, url: &str, pages: Vec<String>) {
        let mut state = self.lock();
        state.url = url.to_string();
        state.pages = pages;
        state.stage = 0;
    }

    pub fn lock(&self) -> MutexGuard<'_, FixtureState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn scripts(&self) -> Vec<String> {
        self.lock().scripts.clone()
    }

    pub fn stage(&self) -> usize {
        self.lock().stage
    }

    fn snapshot(state: &FixtureState) -> Result<Value, EvalError> {
        let html = state
            .pages
            .get(state.stage)
            .cloned()
            .ok_or(EvalError::NoPage)?;
        let mut snapshot = PageSnapshot::from_html(state.url.clone(), html);
        snapshot.ready = state.ready;
        snapshot.cookie = state.cookie.clone();
        snapshot.storage_keys = state.storage_keys.clone();
        serde_json::to_value(snapshot).map_err(|err| EvalError::Decode(err.to_string()))
    }

    fn advance(state: &mut FixtureState) -> bool {
        if state.stage + 1 < state.pages.len() {
            state.stage += 1;
            true
        } else {
            false
        }
    }
}

#[async_trait]
impl RenderingSurface for FixtureSurface {
    async fn navigate(&self, url: &str, headers: &[(String, String)]) -> Result<(), NavigationError> {
        let hang = {
            let mut state = self.lock();
            state.headers.push(headers.to_vec());
            if let Some(err) = state.fail_next_navigation.take() {
                return Err(err);
            }
            state.hang_navigation
        };
        if hang {
            std::future::pending::<()>().await;
        }
        let mut state = self.lock();
        let pages = state
            .routes
            .get(url)
            .cloned()
            .ok_or(NavigationError::HostUnreachable)?;
        state.url = url.to_string();
        state.pages = pages;
        state.stage = 0;
        let keep = if state.history.is_empty() {
            0
        } else {
            state.history_index + 1
        };
        state.history.truncate(keep);
        state.history.push(url.to_string());
        state.history_index = state.history.len() - 1;
        Ok(())
    }

    async fn evaluate_script(&self, source: &str) -> Result<Value, EvalError> {
        let mut state = self.lock();
        state.scripts.push(source.to_string());
        if source == scripts::SNAPSHOT {
            return Self::snapshot(&state);
        }
        if scripts::is_click(source) {
            return Ok(Value::Bool(Self::advance(&mut state)));
        }
        if scripts::is_scroll_to_bottom(source) && state.scroll_loads_more {
            Self::advance(&mut state);
        }
        Ok(Value::Bool(true))
    }

    async fn current_url(&self) -> Option<String> {
        Some(self.lock().url.clone()).filter(|url| !url.is_empty())
    }

    async fn can_go_back(&self) -> bool {
        self.lock().history_index > 0
    }

    async fn can_go_forward(&self) -> bool {
        let state = self.lock();
        state.history_index + 1 < state.history.len()
    }

    async fn go_back(&self) -> Result<(), NavigationError> {
        let mut state = self.lock();
        if state.history_index == 0 {
            return Err(NavigationError::Other("no previous page".to_string()));
        }
        state.history_index -= 1;
        let url = state.history[state.history_index].clone();
        let pages = state.routes.get(&url).cloned().unwrap_or_default();
        state.url = url;
        state.pages = pages;
        state.stage = 0;
        Ok(())
    }

    async fn go_forward(&self) -> Result<(), NavigationError> {
        let mut state = self.lock();
        if state.history_index + 1 >= state.history.len() {
            return Err(NavigationError::Other("no next page".to_string()));
        }
        state.history_index += 1;
        let url = state.history[state.history_index].clone();
        let pages = state.routes.get(&url).cloned().unwrap_or_default();
        state.url = url;
        state.pages = pages;
        state.stage = 0;
        Ok(())
    }

    async fn reload(&self) -> Result<(), NavigationError> {
        let mut state = self.lock();
        state.stage = 0;
        Ok(())
    }

    async fn clear_all_site_data(&self) {
        let mut state = self.lock();
        state.cookie.clear();
        state.storage_keys.clear();
        state.cleared = true;
    }
}

/// Store keeping records in memory; can be told to reject saves.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<NoteRecord>>,
    reject_saves: bool,
}

impl MemoryStore {
    pub fn records(&self) -> Vec<NoteRecord> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn rejecting() -> Self {
        Self {
            reject_saves: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn save_record(&self, record: &NoteRecord) -> Result<Option<String>, StoreError> {
        if self.reject_saves {
            return Err(StoreError::Directory("read-only store".to_string()));
        }
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(record.clone());
        Ok(None)
    }

    async fn record_exists(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self
            .records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .any(|record| record.id == id))
    }
}

pub fn is_terminal_event(event: &ScriptEvent) -> bool {
    matches!(
        event,
        ScriptEvent::Complete { .. } | ScriptEvent::Error { .. } | ScriptEvent::Stopped
    )
}

/// Collects events until a terminal one arrives or the run goes quiet.
pub async fn collect_until_terminal(handle: &mut ExtractionHandle) -> Vec<ScriptEvent> {
    collect_until(handle, is_terminal_event).await
}

pub async fn collect_until(
    handle: &mut ExtractionHandle,
    stop: impl Fn(&ScriptEvent) -> bool,
) -> Vec<ScriptEvent> {
    let mut events = Vec::new();
    while let Ok(Some(event)) =
        tokio::time::timeout(Duration::from_secs(600), handle.next_event()).await
    {
        let done = stop(&event);
        events.push(event);
        if done {
            break;
        }
    }
    events
}

pub fn data_ids(events: &[ScriptEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            ScriptEvent::Data { data } => data
                .get("id")
                .and_then(Value::as_str)
                .map(ToOwned::to_owned),
            _ => None,
        })
        .collect()
}
