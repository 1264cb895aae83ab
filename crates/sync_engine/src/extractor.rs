//! Per-run extraction session.
//!
//! Runs as its own tokio task next to the controller. Commands arrive on one
//! bounded channel and events leave on another; nothing else is shared. The
//! session checks its run flags before every element and before every
//! pagination attempt, and every wait listens for commands so pause and stop
//! take effect at the next boundary.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use engine_logging::{engine_debug, engine_info, engine_warn};
use sync_core::{ScriptCommand, ScriptEvent};
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::extract::{candidate_count, scan_page};
use crate::gate::check_collection_page;
use crate::pagination::{find_load_more, scroll_plan};
use crate::{
    capture_snapshot, CompletionReason, EvalError, PageSnapshot, RenderingSurface, SyncSettings,
};

const NOT_ON_EXPECTED_PAGE: &str = "not on expected page";

/// Host-side ends of a running extraction session.
pub struct ExtractionHandle {
    commands: mpsc::Sender<ScriptCommand>,
    events: mpsc::Receiver<ScriptEvent>,
    task: JoinHandle<()>,
}

impl ExtractionHandle {
    pub fn spawn(surface: Arc<dyn RenderingSurface>, settings: SyncSettings) -> Self {
        let (command_tx, command_rx) = mpsc::channel(settings.command_capacity.max(1));
        let (event_tx, event_rx) = mpsc::channel(settings.event_capacity.max(1));
        let session = ExtractionSession::new(surface, settings, command_rx, event_tx);
        let task = tokio::spawn(session.run());
        Self {
            commands: command_tx,
            events: event_rx,
            task,
        }
    }

    /// Fire-and-forget; false if the session is gone.
    pub async fn send(&self, command: ScriptCommand) -> bool {
        self.commands.send(command).await.is_ok()
    }

    pub async fn next_event(&mut self) -> Option<ScriptEvent> {
        self.events.recv().await
    }

    pub fn try_next_event(&mut self) -> Option<ScriptEvent> {
        self.events.try_recv().ok()
    }

    /// Closes both channels and waits for the task to wind down.
    pub async fn shutdown(self) {
        let Self {
            commands,
            events,
            task,
        } = self;
        drop(commands);
        drop(events);
        if let Err(err) = task.await {
            engine_warn!("Extraction task ended abnormally: {}", err);
        }
    }
}

pub struct ExtractionSession {
    surface: Arc<dyn RenderingSurface>,
    settings: SyncSettings,
    commands: mpsc::Receiver<ScriptCommand>,
    events: mpsc::Sender<ScriptEvent>,
    emitted: HashSet<String>,
    emitted_count: u64,
    estimated_total: u64,
    empty_retries: u32,
    start_url: String,
    extracting: bool,
    paused: bool,
    closed: bool,
    generation: u64,
    pending_delay: Option<Duration>,
}

impl ExtractionSession {
    pub fn new(
        surface: Arc<dyn RenderingSurface>,
        settings: SyncSettings,
        commands: mpsc::Receiver<ScriptCommand>,
        events: mpsc::Sender<ScriptEvent>,
    ) -> Self {
        Self {
            surface,
            settings,
            commands,
            events,
            emitted: HashSet::new(),
            emitted_count: 0,
            estimated_total: 0,
            empty_retries: 0,
            start_url: String::new(),
            extracting: false,
            paused: false,
            closed: false,
            generation: 0,
            pending_delay: None,
        }
    }

    pub async fn run(mut self) {
        self.emit(ScriptEvent::Initialized).await;
        while !self.closed {
            if self.extracting && !self.paused {
                self.run_cycle().await;
                continue;
            }
            if self.extracting {
                self.watch_while_paused().await;
                continue;
            }
            match self.commands.recv().await {
                Some(command) => self.handle_command(command).await,
                None => self.closed = true,
            }
        }
        engine_debug!("Extraction session closed after {} records", self.emitted_count);
    }

    fn is_current(&self, generation: u64) -> bool {
        !self.closed && self.extracting && !self.paused && self.generation == generation
    }

    async fn emit(&mut self, event: ScriptEvent) {
        if self.events.send(event).await.is_err() {
            engine_debug!("Event channel closed; ending extraction session");
            self.closed = true;
            self.extracting = false;
        }
    }

    async fn handle_command(&mut self, command: ScriptCommand) {
        engine_debug!("Extraction command: {:?}", command);
        match command {
            ScriptCommand::Start => self.start().await,
            ScriptCommand::Pause => {
                if self.extracting && !self.paused {
                    self.paused = true;
                    engine_info!("Extraction paused at {} records", self.emitted_count);
                    self.emit(ScriptEvent::Paused).await;
                }
            }
            ScriptCommand::Resume => {
                if self.extracting && self.paused {
                    self.paused = false;
                    self.pending_delay = Some(self.settings.resume_delay);
                    engine_info!("Extraction resumed");
                    self.emit(ScriptEvent::Resumed).await;
                }
            }
            ScriptCommand::Stop => {
                self.extracting = false;
                self.paused = false;
                engine_info!("Extraction stopped at {} records", self.emitted_count);
                self.emit(ScriptEvent::Stopped).await;
            }
        }
    }

    async fn start(&mut self) {
        if self.extracting {
            engine_debug!("Start ignored: extraction already running");
            return;
        }
        let snapshot = match capture_snapshot(self.surface.as_ref()).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                self.emit(ScriptEvent::Error {
                    message: format!("extraction failed: {err}"),
                })
                .await;
                return;
            }
        };
        let report = check_collection_page(&snapshot);
        engine_debug!("Page gate for {}: {:?}", snapshot.url, report);
        if !report.is_collection_page() {
            engine_warn!("Refusing to extract from {}", snapshot.url);
            self.emit(ScriptEvent::Error {
                message: NOT_ON_EXPECTED_PAGE.to_string(),
            })
            .await;
            return;
        }

        self.generation += 1;
        self.extracting = true;
        self.paused = false;
        self.emitted.clear();
        self.emitted_count = 0;
        self.estimated_total = 0;
        self.empty_retries = 0;
        self.start_url = snapshot.url;
        self.pending_delay = Some(self.settings.start_delay);
        engine_info!("Extraction started on {}", self.start_url);
        self.emit(ScriptEvent::Progress {
            total: 0,
            current: 0,
        })
        .await;
    }

    /// Sleeps for `duration` while still serving commands. False once the run
    /// was paused, stopped or restarted.
    async fn wait(&mut self, duration: Duration, generation: u64) -> bool {
        let deadline = Instant::now() + duration;
        while self.is_current(generation) {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => break,
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => self.closed = true,
                },
            }
        }
        self.is_current(generation)
    }

    /// Serves commands while paused, polling the url so leaving the
    /// collection page still stops the run.
    async fn watch_while_paused(&mut self) {
        let poll = self.settings.page_load_poll;
        tokio::select! {
            command = self.commands.recv() => match command {
                Some(command) => self.handle_command(command).await,
                None => self.closed = true,
            },
            _ = tokio::time::sleep(poll) => {
                if let Err(err) = self.still_on_page().await {
                    engine_debug!("Page check while paused failed: {}", err);
                }
            }
        }
    }

    /// Drains queued commands without waiting.
    async fn poll_commands(&mut self, generation: u64) -> bool {
        while self.is_current(generation) {
            match self.commands.try_recv() {
                Ok(command) => self.handle_command(command).await,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => self.closed = true,
            }
        }
        self.is_current(generation)
    }

    async fn fail(&mut self, err: EvalError) {
        engine_warn!("Extraction failed: {}", err);
        self.extracting = false;
        self.emit(ScriptEvent::Error {
            message: format!("extraction failed: {err}"),
        })
        .await;
    }

    async fn complete(&mut self, reason: CompletionReason) {
        self.extracting = false;
        engine_info!(
            "Extraction complete with {} records: {}",
            self.emitted_count,
            reason
        );
        self.emit(ScriptEvent::Complete {
            message: format!("extraction complete: {} records", self.emitted_count),
            total: self.emitted_count,
        })
        .await;
    }

    /// Force-stops when the page moved away from the collection page.
    async fn watch_navigation(&mut self, snapshot: &PageSnapshot) -> bool {
        if snapshot.url == self.start_url {
            return true;
        }
        engine_info!("Page url changed to {}", snapshot.url);
        if check_collection_page(snapshot).is_collection_page() {
            self.start_url = snapshot.url.clone();
            return true;
        }
        engine_warn!("Left the collection page; stopping extraction");
        self.extracting = false;
        self.paused = false;
        self.emit(ScriptEvent::Stopped).await;
        false
    }

    /// Cheap url comparison first; a snapshot only when the url moved.
    async fn still_on_page(&mut self) -> Result<bool, EvalError> {
        let current = self.surface.current_url().await.unwrap_or_default();
        if current == self.start_url {
            return Ok(true);
        }
        let snapshot = capture_snapshot(self.surface.as_ref()).await?;
        Ok(self.watch_navigation(&snapshot).await)
    }

    async fn wait_for_page_load(
        &mut self,
        generation: u64,
    ) -> Result<Option<PageSnapshot>, EvalError> {
        let deadline = Instant::now() + self.settings.page_load_timeout;
        loop {
            let snapshot = capture_snapshot(self.surface.as_ref()).await?;
            if snapshot.ready || Instant::now() >= deadline {
                return Ok(Some(snapshot));
            }
            if !self.wait(self.settings.page_load_poll, generation).await {
                return Ok(None);
            }
        }
    }

    async fn run_cycle(&mut self) {
        let generation = self.generation;
        if let Some(delay) = self.pending_delay.take() {
            if !self.wait(delay, generation).await {
                return;
            }
        }

        let snapshot = match self.wait_for_page_load(generation).await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return,
            Err(err) => return self.fail(err).await,
        };
        if !self.watch_navigation(&snapshot).await {
            return;
        }

        let scan = scan_page(&snapshot, &self.settings.base_origin);
        drop(snapshot);
        engine_debug!(
            "Found {} elements via {:?}",
            scan.element_count,
            scan.strategy
        );
        if scan.element_count == 0 {
            if self.empty_retries < self.settings.max_empty_retries {
                self.empty_retries += 1;
                engine_info!(
                    "No elements found, retry {}/{}",
                    self.empty_retries,
                    self.settings.max_empty_retries
                );
                self.pending_delay = Some(self.settings.empty_retry_delay);
                return;
            }
            return self.complete(CompletionReason::DiscoveryExhausted).await;
        }
        self.empty_retries = 0;
        if self.estimated_total == 0 {
            self.estimated_total = scan.estimated_total;
            engine_debug!("Estimated total: {}", self.estimated_total);
        }

        for candidate in scan.candidates {
            if !self.poll_commands(generation).await {
                return;
            }
            match self.still_on_page().await {
                Ok(true) => {}
                Ok(false) => return,
                Err(err) => return self.fail(err).await,
            }
            match candidate {
                Err(reason) => engine_debug!("Skipping element: {}", reason),
                Ok(record) => {
                    if self.emitted.insert(record.id.clone()) {
                        self.emit_record(record).await;
                    }
                }
            }
            if !self.wait(self.settings.element_delay, generation).await {
                return;
            }
        }

        if !self.wait(self.settings.cycle_delay, generation).await {
            return;
        }
        self.paginate(generation).await;
    }

    async fn emit_record(&mut self, record: sync_core::RawRecord) {
        let data = match serde_json::to_value(&record) {
            Ok(data) => data,
            Err(err) => {
                engine_warn!("Could not encode record {}: {}", record.id, err);
                return;
            }
        };
        self.emitted_count += 1;
        engine_debug!("Emitting record {} ({})", record.id, record.title);
        self.emit(ScriptEvent::Data { data }).await;
        self.emit(ScriptEvent::Progress {
            total: self.estimated_total.max(self.emitted_count),
            current: self.emitted_count,
        })
        .await;
    }

    async fn paginate(&mut self, generation: u64) {
        if !self.poll_commands(generation).await {
            return;
        }
        let before = match capture_snapshot(self.surface.as_ref()).await {
            Ok(snapshot) => snapshot,
            Err(err) => return self.fail(err).await,
        };
        if !self.watch_navigation(&before).await {
            return;
        }
        let initial_count = candidate_count(&before);
        let target = find_load_more(&before.document());
        drop(before);

        let clicked = match target {
            Some(target) => match self.surface.evaluate_script(&target.click_script()).await {
                Ok(value) => value.as_bool().unwrap_or(false),
                Err(err) => return self.fail(err).await,
            },
            None => false,
        };
        if clicked {
            engine_debug!("Clicked load-more control {:?}", target);
            if !self.wait(self.settings.load_more_wait, generation).await {
                return;
            }
        } else {
            engine_debug!("No load-more control; scrolling");
            for (script, pause) in scroll_plan(&self.settings) {
                if let Err(err) = self.surface.evaluate_script(&script).await {
                    return self.fail(err).await;
                }
                if !self.wait(pause, generation).await {
                    return;
                }
            }
        }

        if !self.wait(self.settings.settle_delay, generation).await {
            return;
        }
        let after = match capture_snapshot(self.surface.as_ref()).await {
            Ok(snapshot) => snapshot,
            Err(err) => return self.fail(err).await,
        };
        let new_count = candidate_count(&after);
        if new_count > initial_count {
            engine_info!("Loaded more content: {} -> {} elements", initial_count, new_count);
        } else {
            self.complete(CompletionReason::NoNewContent).await;
        }
    }
}
