use std::collections::HashSet;

use thiserror::Error;

use crate::view_model::SyncViewModel;
use crate::{LoginState, NoteRecord, SyncSession};

/// Why a sync request was turned away before any session was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SyncRejection {
    #[error("a sync is already in progress")]
    SessionConflict,
    #[error("please log in before syncing")]
    NotLoggedIn,
    #[error("not on expected page: open the collection page first")]
    PageTypeMismatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ControllerState {
    pub(crate) session: Option<SyncSession>,
    pub(crate) login: LoginState,
    pub(crate) last_error: Option<String>,
    pub(crate) current_url: Option<String>,
    pub(crate) page_title: Option<String>,
    pub(crate) can_go_back: bool,
    pub(crate) can_go_forward: bool,
    pub(crate) is_loading: bool,
    pub(crate) accepted_ids: HashSet<String>,
    pub(crate) accepted: Vec<NoteRecord>,
    pub(crate) saved_count: u64,
    pub(crate) failed_saves: u64,
    dirty: bool,
}

impl ControllerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self) -> Option<&SyncSession> {
        self.session.as_ref()
    }

    pub fn login(&self) -> &LoginState {
        &self.login
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Records accepted during the current (or most recent) run.
    pub fn accepted_records(&self) -> &[NoteRecord] {
        &self.accepted
    }

    /// True while a session exists and has not reached a terminal state.
    pub fn has_session_in_progress(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| !session.status().is_terminal())
    }

    /// Guard applied before a sync may start.
    pub fn sync_precondition(&self, on_collection_page: bool) -> Result<(), SyncRejection> {
        if self.has_session_in_progress() {
            return Err(SyncRejection::SessionConflict);
        }
        if !self.login.is_logged_in {
            return Err(SyncRejection::NotLoggedIn);
        }
        if !on_collection_page {
            return Err(SyncRejection::PageTypeMismatch);
        }
        Ok(())
    }

    pub fn view(&self) -> SyncViewModel {
        SyncViewModel {
            session: self.session.clone(),
            progress: self.session.as_ref().map_or(0.0, SyncSession::progress),
            is_logged_in: self.login.is_logged_in,
            login_checks: self.login.checks.clone(),
            last_error: self.last_error.clone(),
            current_url: self.current_url.clone(),
            page_title: self.page_title.clone(),
            can_go_back: self.can_go_back,
            can_go_forward: self.can_go_forward,
            is_loading: self.is_loading,
            accepted_records: self.accepted.len(),
            saved_records: self.saved_count,
            failed_saves: self.failed_saves,
            dirty: self.dirty,
        }
    }

    /// Returns whether anything changed since the last call, clearing the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn set_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
        self.dirty = true;
    }

    pub(crate) fn start_session(&mut self, session: SyncSession) {
        self.session = Some(session);
        self.accepted_ids.clear();
        self.accepted.clear();
        self.saved_count = 0;
        self.failed_saves = 0;
        self.last_error = None;
        self.dirty = true;
    }

    pub(crate) fn session_in_progress_mut(&mut self) -> Option<&mut SyncSession> {
        self.session
            .as_mut()
            .filter(|session| !session.status().is_terminal())
    }

    /// Registers a record id for this run; false if it was already accepted.
    pub(crate) fn accept(&mut self, record: &NoteRecord) -> bool {
        if !self.accepted_ids.insert(record.id.clone()) {
            return false;
        }
        self.accepted.push(record.clone());
        self.dirty = true;
        true
    }
}
