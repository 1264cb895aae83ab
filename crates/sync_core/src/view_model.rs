use std::collections::BTreeMap;

use crate::SyncSession;

/// Snapshot published to observers after every state change.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SyncViewModel {
    pub session: Option<SyncSession>,
    pub progress: f64,
    pub is_logged_in: bool,
    pub login_checks: BTreeMap<String, bool>,
    pub last_error: Option<String>,
    pub current_url: Option<String>,
    pub page_title: Option<String>,
    pub can_go_back: bool,
    pub can_go_forward: bool,
    pub is_loading: bool,
    pub accepted_records: usize,
    pub saved_records: u64,
    pub failed_saves: u64,
    pub dirty: bool,
}
