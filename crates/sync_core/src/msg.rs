use crate::{LoginState, ScriptEvent};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// The surface began loading a page.
    NavigationStarted { url: String },
    /// The surface finished loading a page.
    NavigationFinished {
        url: String,
        title: Option<String>,
        can_go_back: bool,
        can_go_forward: bool,
    },
    /// A navigation failed; the message is already user-facing.
    NavigationFailed { message: String },
    /// A readiness pass produced a fresh login snapshot.
    LoginChecked(LoginState),
    /// A readiness pass could not evaluate the page.
    LoginCheckFailed { message: String },
    /// Cookies and storage for the site were wiped.
    SiteDataCleared,
    /// User asked for a sync; the host already evaluated the page-type gate.
    SyncRequested {
        session_id: String,
        on_collection_page: bool,
    },
    PauseRequested,
    ResumeRequested,
    StopRequested,
    /// Event received from the extraction run.
    Script(ScriptEvent),
    /// Storage accepted a record.
    RecordSaved {
        id: String,
        category: Option<String>,
    },
    /// Storage rejected a record.
    RecordSaveFailed { id: String, message: String },
    /// Script evaluation or the event transport failed.
    ScriptFailed { message: String },
    /// User dismissed the current error.
    ErrorDismissed,
    NoOp,
}
