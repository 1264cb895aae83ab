use std::collections::BTreeMap;

/// Result of one readiness pass. Each pass replaces the previous one wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LoginState {
    pub is_logged_in: bool,
    pub checks: BTreeMap<String, bool>,
    pub current_url: Option<String>,
    pub page_title: Option<String>,
}

impl LoginState {
    pub fn logged_out() -> Self {
        Self::default()
    }

    /// One line per check, for diagnostics.
    pub fn summary(&self) -> String {
        let checks = self
            .checks
            .iter()
            .map(|(name, hit)| format!("{name}={}", if *hit { "yes" } else { "no" }))
            .collect::<Vec<_>>()
            .join(" ");
        format!("logged_in={} {checks}", self.is_logged_in)
    }
}
