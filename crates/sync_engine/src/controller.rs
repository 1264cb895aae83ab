use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use engine_logging::{engine_debug, engine_info, engine_trace, engine_warn};
use sync_core::{
    update, ControllerState, Effect, LoginState, Msg, NoteRecord, ScriptEvent, SyncSession,
    SyncViewModel,
};
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

use crate::extractor::ExtractionHandle;
use crate::gate::check_collection_page;
use crate::persist::RecordStore;
use crate::readiness::detect_login;
use crate::{capture_snapshot, NavigationError, RenderingSurface, SyncError, SyncSettings};

const RUN_ENDED: &str = "extraction run ended unexpectedly";

enum Wake {
    Event(Option<ScriptEvent>),
    Readiness,
}

/// Host for one rendering surface: owns the controller state, runs effects and
/// publishes a fresh view model whenever the state changes.
pub struct SyncController {
    surface: Arc<dyn RenderingSurface>,
    store: Arc<dyn RecordStore>,
    settings: SyncSettings,
    state: ControllerState,
    extraction: Option<ExtractionHandle>,
    view_tx: watch::Sender<SyncViewModel>,
}

impl SyncController {
    pub fn new(
        surface: Arc<dyn RenderingSurface>,
        store: Arc<dyn RecordStore>,
        settings: SyncSettings,
    ) -> Self {
        let state = ControllerState::new();
        let (view_tx, _) = watch::channel(state.view());
        Self {
            surface,
            store,
            settings,
            state,
            extraction: None,
            view_tx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncViewModel> {
        self.view_tx.subscribe()
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn view(&self) -> SyncViewModel {
        self.state.view()
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn accepted_records(&self) -> &[NoteRecord] {
        self.state.accepted_records()
    }

    /// Applies a message and every follow-up message its effects produce.
    pub async fn dispatch(&mut self, msg: Msg) {
        let mut queue = VecDeque::from([msg]);
        while let Some(msg) = queue.pop_front() {
            engine_trace!("Dispatching {:?}", msg);
            let state = std::mem::take(&mut self.state);
            let (state, effects) = update(state, msg, Utc::now());
            self.state = state;
            for effect in effects {
                if let Some(follow_up) = self.run_effect(effect).await {
                    queue.push_back(follow_up);
                }
            }
            self.publish();
        }
    }

    fn publish(&mut self) {
        let view = self.state.view();
        if self.state.consume_dirty() {
            self.view_tx.send_replace(view);
        }
    }

    async fn run_effect(&mut self, effect: Effect) -> Option<Msg> {
        match effect {
            Effect::CheckReadiness => Some(self.readiness_msg().await),
            Effect::BeginExtraction { session_id } => {
                if let Some(previous) = self.extraction.take() {
                    previous.shutdown().await;
                }
                engine_info!("Spawning extraction run for session {}", session_id);
                self.extraction = Some(ExtractionHandle::spawn(
                    Arc::clone(&self.surface),
                    self.settings.clone(),
                ));
                None
            }
            Effect::SendCommand(command) => {
                match &self.extraction {
                    Some(handle) => {
                        engine_debug!("Sending {:?} to extraction run", command);
                        if !handle.send(command).await {
                            engine_warn!("Extraction run is gone; {:?} dropped", command);
                        }
                    }
                    None => engine_debug!("No extraction run for {:?}", command),
                }
                None
            }
            Effect::PersistRecord(record) => Some(self.persist(record).await),
        }
    }

    async fn readiness_msg(&self) -> Msg {
        match capture_snapshot(self.surface.as_ref()).await {
            Ok(snapshot) => Msg::LoginChecked(detect_login(&snapshot)),
            Err(err) => Msg::LoginCheckFailed {
                message: err.to_string(),
            },
        }
    }

    async fn persist(&self, record: NoteRecord) -> Msg {
        if self.settings.skip_existing_records {
            match self.store.record_exists(&record.id).await {
                Ok(true) => {
                    engine_debug!("Record {} already stored; skipping", record.id);
                    return Msg::NoOp;
                }
                Ok(false) => {}
                Err(err) => engine_warn!("Could not look up record {}: {}", record.id, err),
            }
        }
        match self.store.save_record(&record).await {
            Ok(category) => Msg::RecordSaved {
                id: record.id,
                category,
            },
            Err(err) => Msg::RecordSaveFailed {
                id: record.id,
                message: err.to_string(),
            },
        }
    }

    pub async fn navigate(&mut self, url: &str) -> Result<(), SyncError> {
        engine_info!("Navigating to {}", url);
        self.dispatch(Msg::NavigationStarted {
            url: url.to_string(),
        })
        .await;
        let surface = Arc::clone(&self.surface);
        let headers = self.settings.navigation_headers();
        let result = self.bounded(surface.navigate(url, &headers)).await;
        self.finish_navigation(result).await
    }

    pub async fn open_home(&mut self) -> Result<(), SyncError> {
        let url = self.settings.home_url.clone();
        self.navigate(&url).await
    }

    pub async fn open_login(&mut self) -> Result<(), SyncError> {
        let url = self.settings.login_url.clone();
        self.navigate(&url).await
    }

    pub async fn open_collection(&mut self) -> Result<(), SyncError> {
        let url = self.settings.collection_url.clone();
        self.navigate(&url).await
    }

    pub async fn go_back(&mut self) -> Result<(), SyncError> {
        let surface = Arc::clone(&self.surface);
        let result = self.bounded(surface.go_back()).await;
        self.finish_navigation(result).await
    }

    pub async fn go_forward(&mut self) -> Result<(), SyncError> {
        let surface = Arc::clone(&self.surface);
        let result = self.bounded(surface.go_forward()).await;
        self.finish_navigation(result).await
    }

    pub async fn reload(&mut self) -> Result<(), SyncError> {
        if let Some(url) = self.surface.current_url().await {
            self.dispatch(Msg::NavigationStarted { url }).await;
        }
        let surface = Arc::clone(&self.surface);
        let result = self.bounded(surface.reload()).await;
        self.finish_navigation(result).await
    }

    pub async fn clear_site_data(&mut self) {
        self.surface.clear_all_site_data().await;
        self.dispatch(Msg::SiteDataCleared).await;
    }

    async fn bounded<F>(&self, navigation: F) -> Result<(), NavigationError>
    where
        F: Future<Output = Result<(), NavigationError>>,
    {
        tokio::time::timeout(self.settings.navigation_timeout, navigation)
            .await
            .unwrap_or(Err(NavigationError::Timeout))
    }

    async fn finish_navigation(
        &mut self,
        result: Result<(), NavigationError>,
    ) -> Result<(), SyncError> {
        match result {
            Ok(()) => {
                let url = self.surface.current_url().await.unwrap_or_default();
                let title = capture_snapshot(self.surface.as_ref())
                    .await
                    .ok()
                    .map(|snapshot| snapshot.title)
                    .filter(|title| !title.is_empty());
                engine_info!("Navigation finished: {}", url);
                let msg = Msg::NavigationFinished {
                    url,
                    title,
                    can_go_back: self.surface.can_go_back().await,
                    can_go_forward: self.surface.can_go_forward().await,
                };
                self.dispatch(msg).await;
                Ok(())
            }
            Err(err) => {
                engine_warn!("Navigation failed: {:?}", err);
                self.dispatch(Msg::NavigationFailed {
                    message: err.to_string(),
                })
                .await;
                Err(err.into())
            }
        }
    }

    pub async fn check_readiness(&mut self) {
        let msg = self.readiness_msg().await;
        self.dispatch(msg).await;
    }

    /// Starts a sync on the current page and returns the new session id.
    ///
    /// Rejections are also recorded as the controller's last error.
    pub async fn request_sync(&mut self) -> Result<String, SyncError> {
        let on_collection_page = match self.state.sync_precondition(true) {
            Err(_) => true,
            Ok(()) => match capture_snapshot(self.surface.as_ref()).await {
                Ok(snapshot) => {
                    let report = check_collection_page(&snapshot);
                    engine_debug!("Page gate for {}: {:?}", snapshot.url, report);
                    report.is_collection_page()
                }
                Err(err) => {
                    self.dispatch(Msg::ScriptFailed {
                        message: err.to_string(),
                    })
                    .await;
                    return Err(err.into());
                }
            },
        };
        let outcome = self.state.sync_precondition(on_collection_page);
        let session_id = Uuid::new_v4().to_string();
        self.dispatch(Msg::SyncRequested {
            session_id: session_id.clone(),
            on_collection_page,
        })
        .await;
        outcome.map(|()| session_id).map_err(SyncError::from)
    }

    pub async fn pause(&mut self) {
        self.dispatch(Msg::PauseRequested).await;
    }

    pub async fn resume(&mut self) {
        self.dispatch(Msg::ResumeRequested).await;
    }

    pub async fn stop(&mut self) {
        self.dispatch(Msg::StopRequested).await;
    }

    pub async fn dismiss_error(&mut self) {
        self.dispatch(Msg::ErrorDismissed).await;
    }

    /// Waits for the next event from the extraction run and applies it.
    /// None once no run exists or its channel closed.
    pub async fn next_event(&mut self) -> Option<ScriptEvent> {
        let handle = self.extraction.as_mut()?;
        let event = handle.next_event().await;
        self.apply_event(event).await
    }

    async fn apply_event(&mut self, event: Option<ScriptEvent>) -> Option<ScriptEvent> {
        match event {
            Some(event) => {
                engine_debug!("Script event: {}", event.kind());
                self.dispatch(Msg::Script(event.clone())).await;
                Some(event)
            }
            None => {
                if let Some(handle) = self.extraction.take() {
                    handle.shutdown().await;
                }
                if self.state.has_session_in_progress() {
                    self.dispatch(Msg::ScriptFailed {
                        message: RUN_ENDED.to_string(),
                    })
                    .await;
                }
                None
            }
        }
    }

    /// Drives the current session to a terminal state, re-checking login on
    /// the readiness interval meanwhile.
    pub async fn run_until_finished(&mut self) -> Option<SyncSession> {
        self.run_until(|state| !state.has_session_in_progress()).await;
        self.state.session().cloned()
    }

    /// Waits until a readiness pass reports the user as logged in.
    pub async fn wait_for_login(&mut self) -> LoginState {
        self.run_until(|state| state.login().is_logged_in).await;
        self.state.login().clone()
    }

    /// Applies extraction events as they arrive and samples login state every
    /// readiness interval, whether or not a sync is running, until `done`
    /// holds.
    pub async fn run_until<F>(&mut self, mut done: F)
    where
        F: FnMut(&ControllerState) -> bool,
    {
        let period = self.settings.readiness_interval;
        let mut readiness = tokio::time::interval_at(Instant::now() + period, period);
        readiness.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !done(&self.state) {
            let wake = match self.extraction.as_mut() {
                Some(handle) => tokio::select! {
                    event = handle.next_event() => Wake::Event(event),
                    _ = readiness.tick() => Wake::Readiness,
                },
                None if self.state.has_session_in_progress() => Wake::Event(None),
                None => {
                    readiness.tick().await;
                    Wake::Readiness
                }
            };
            match wake {
                Wake::Event(event) => {
                    self.apply_event(event).await;
                }
                Wake::Readiness => self.check_readiness().await,
            }
        }
    }

    /// Tears down the extraction run, if any.
    pub async fn shutdown(mut self) {
        if let Some(handle) = self.extraction.take() {
            handle.shutdown().await;
        }
    }
}
