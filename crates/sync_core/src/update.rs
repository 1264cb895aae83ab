use chrono::{DateTime, Utc};
use engine_logging::{engine_debug, engine_info, engine_warn};

use crate::{
    parse_record, ControllerState, Effect, Msg, ProtocolError, ScriptCommand, ScriptEvent,
    SyncRejection, SyncSession, SyncStatus,
};

/// Pure update function: applies a message to state and returns any effects.
///
/// `now` stamps session start/end times; callers pass the wall clock.
pub fn update(
    mut state: ControllerState,
    msg: Msg,
    now: DateTime<Utc>,
) -> (ControllerState, Vec<Effect>) {
    let effects = match msg {
        Msg::NavigationStarted { url } => {
            state.is_loading = true;
            state.current_url = Some(url);
            state.mark_dirty();
            Vec::new()
        }
        Msg::NavigationFinished {
            url,
            title,
            can_go_back,
            can_go_forward,
        } => {
            state.is_loading = false;
            state.current_url = Some(url);
            state.page_title = title;
            state.can_go_back = can_go_back;
            state.can_go_forward = can_go_forward;
            state.mark_dirty();
            vec![Effect::CheckReadiness]
        }
        Msg::NavigationFailed { message } => {
            state.is_loading = false;
            fail_in_progress(&mut state, message, now)
        }
        Msg::LoginChecked(login) => {
            if login.is_logged_in
                && state.last_error.as_deref() == Some(SyncRejection::NotLoggedIn.to_string().as_str())
            {
                state.last_error = None;
                state.mark_dirty();
            }
            if state.login != login {
                state.login = login;
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::LoginCheckFailed { message } => {
            engine_warn!("Readiness check failed: {}", message);
            Vec::new()
        }
        Msg::SiteDataCleared => {
            state.login = crate::LoginState::logged_out();
            state.mark_dirty();
            Vec::new()
        }
        Msg::SyncRequested {
            session_id,
            on_collection_page,
        } => match state.sync_precondition(on_collection_page) {
            Err(rejection) => {
                engine_warn!("Sync request rejected: {}", rejection);
                state.set_error(rejection.to_string());
                Vec::new()
            }
            Ok(()) => {
                let mut session = SyncSession::new(session_id.clone(), now);
                // Gate already passed and the start command goes out with this update.
                if let Err(err) = session.transition(SyncStatus::Running, now) {
                    engine_warn!("{}", err);
                }
                engine_info!("Sync session {} started", session_id);
                state.start_session(session);
                vec![
                    Effect::BeginExtraction { session_id },
                    Effect::SendCommand(ScriptCommand::Start),
                ]
            }
        },
        Msg::PauseRequested => {
            request_transition(&mut state, SyncStatus::Running, SyncStatus::Paused, now)
                .then(|| vec![Effect::SendCommand(ScriptCommand::Pause)])
                .unwrap_or_default()
        }
        Msg::ResumeRequested => {
            request_transition(&mut state, SyncStatus::Paused, SyncStatus::Running, now)
                .then(|| vec![Effect::SendCommand(ScriptCommand::Resume)])
                .unwrap_or_default()
        }
        Msg::StopRequested => match state.session_in_progress_mut() {
            Some(session) => {
                if let Err(err) = session.cancel(now) {
                    engine_warn!("{}", err);
                }
                engine_info!("Sync session {} cancelled", session.id());
                state.mark_dirty();
                vec![Effect::SendCommand(ScriptCommand::Stop)]
            }
            None => Vec::new(),
        },
        Msg::Script(event) => apply_script_event(&mut state, event, now),
        Msg::RecordSaved { id, category } => {
            engine_debug!("Record {} saved (category {:?})", id, category);
            state.saved_count += 1;
            state.mark_dirty();
            Vec::new()
        }
        Msg::RecordSaveFailed { id, message } => {
            engine_warn!("Record {} could not be saved: {}", id, message);
            state.failed_saves += 1;
            state.mark_dirty();
            Vec::new()
        }
        Msg::ScriptFailed { message } => fail_in_progress(&mut state, message, now),
        Msg::ErrorDismissed => {
            if state.last_error.take().is_some() {
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

fn request_transition(
    state: &mut ControllerState,
    from: SyncStatus,
    to: SyncStatus,
    now: DateTime<Utc>,
) -> bool {
    let Some(session) = state.session_in_progress_mut() else {
        return false;
    };
    if session.status() != from {
        engine_debug!("Ignoring {:?} request while {:?}", to, session.status());
        return false;
    }
    match session.transition(to, now) {
        Ok(()) => {
            state.mark_dirty();
            true
        }
        Err(err) => {
            engine_warn!("{}", err);
            false
        }
    }
}

/// Page- and transport-level failures end the run and surface verbatim.
fn fail_in_progress(state: &mut ControllerState, message: String, now: DateTime<Utc>) -> Vec<Effect> {
    let mut effects = Vec::new();
    if let Some(session) = state.session_in_progress_mut() {
        match session.fail(message.clone(), now) {
            Ok(()) => {
                engine_warn!("Sync session {} failed: {}", session.id(), message);
                effects.push(Effect::SendCommand(ScriptCommand::Stop));
            }
            Err(err) => engine_warn!("{}", err),
        }
    }
    state.set_error(message);
    effects
}

fn apply_script_event(
    state: &mut ControllerState,
    event: ScriptEvent,
    now: DateTime<Utc>,
) -> Vec<Effect> {
    let kind = event.kind();
    let Some(session) = state.session_in_progress_mut() else {
        engine_debug!("Ignoring {} event: no sync in progress", kind);
        return Vec::new();
    };

    match event {
        ScriptEvent::Initialized => {
            engine_info!("Extraction run initialized for session {}", session.id());
            Vec::new()
        }
        ScriptEvent::Progress { total, current } => {
            if current < session.synced_count() {
                let err = ProtocolError::Unexpected {
                    kind,
                    reason: format!(
                        "current went backwards ({} -> {})",
                        session.synced_count(),
                        current
                    ),
                };
                engine_warn!("{}", err);
                return Vec::new();
            }
            session.apply_progress(total, current);
            state.mark_dirty();
            Vec::new()
        }
        ScriptEvent::Data { data } => match parse_record(&data) {
            Ok(record) => {
                if state.accept(&record) {
                    vec![Effect::PersistRecord(record)]
                } else {
                    engine_debug!("Dropping duplicate record {}", record.id);
                    Vec::new()
                }
            }
            Err(err) => {
                engine_warn!("Dropping record: {}", err);
                Vec::new()
            }
        },
        ScriptEvent::Complete { message, total } => {
            engine_info!("Extraction complete: {}", message);
            if let Err(err) = session.complete(total, now) {
                engine_warn!("{}", err);
            }
            let failure = session.error_message().map(ToOwned::to_owned);
            if let Some(failure) = failure {
                state.set_error(failure);
            }
            state.mark_dirty();
            Vec::new()
        }
        ScriptEvent::Error { message } => {
            if let Err(err) = session.fail(message.clone(), now) {
                engine_warn!("{}", err);
            }
            engine_warn!("Extraction reported an error: {}", message);
            state.set_error(message);
            Vec::new()
        }
        ScriptEvent::Paused => {
            if session.status() == SyncStatus::Running {
                if let Err(err) = session.transition(SyncStatus::Paused, now) {
                    engine_warn!("{}", err);
                }
                state.mark_dirty();
            }
            Vec::new()
        }
        ScriptEvent::Resumed => {
            if session.status() == SyncStatus::Paused {
                if let Err(err) = session.transition(SyncStatus::Running, now) {
                    engine_warn!("{}", err);
                }
                state.mark_dirty();
            }
            Vec::new()
        }
        ScriptEvent::Stopped => {
            engine_info!("Extraction stopped by the page; cancelling session {}", session.id());
            if let Err(err) = session.cancel(now) {
                engine_warn!("{}", err);
            }
            state.mark_dirty();
            Vec::new()
        }
    }
}
