//! Login detection from page content alone.
//!
//! Each signal is a named pure predicate over [`PageSignals`]; the page counts
//! as logged in when any of them holds. Every pass produces a complete
//! [`LoginState`] that replaces the previous one.

use engine_logging::engine_debug;
use sync_core::LoginState;

use crate::selectors::readiness;
use crate::PageSnapshot;

/// Inputs the predicates read, derived once per snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageSignals {
    pub url: String,
    pub text: String,
    pub storage_keys: Vec<String>,
    pub cookie: String,
    pub has_avatar: bool,
    pub has_login_control: bool,
}

impl PageSignals {
    pub fn from_snapshot(snapshot: &PageSnapshot) -> Self {
        let document = snapshot.document();
        let has_avatar = document.select(&readiness::IMAGE).any(|img| {
            let src = img.value().attr("src").unwrap_or_default();
            let alt = img.value().attr("alt").unwrap_or_default();
            src.contains(readiness::AVATAR_SRC_MARKER)
                || readiness::AVATAR_ALT_MARKERS
                    .iter()
                    .any(|marker| alt.contains(marker))
        });
        let mentions_login = readiness::LOGIN_LABELS
            .iter()
            .any(|label| snapshot.text.contains(label));
        let has_login_control = mentions_login
            && document.select(&readiness::LOGIN_CONTROL).any(|control| {
                let label = control.text().collect::<String>();
                readiness::LOGIN_LABELS.contains(&label.trim())
            });

        Self {
            url: snapshot.url.clone(),
            text: snapshot.text.clone(),
            storage_keys: snapshot.storage_keys.clone(),
            cookie: snapshot.cookie.clone(),
            has_avatar,
            has_login_control,
        }
    }
}

pub struct ReadinessCheck {
    pub name: &'static str,
    pub detect: fn(&PageSignals) -> bool,
}

pub const CHECKS: &[ReadinessCheck] = &[
    ReadinessCheck {
        name: "account_number",
        detect: |signals| readiness::ACCOUNT_NUMBER.is_match(&signals.text),
    },
    ReadinessCheck {
        name: "follow_labels",
        detect: |signals| {
            readiness::FOLLOW_LABELS
                .iter()
                .all(|label| signals.text.contains(label))
        },
    },
    ReadinessCheck {
        name: "favorites_label",
        detect: |signals| {
            readiness::FAVORITES_LABELS
                .iter()
                .any(|label| signals.text.contains(label))
        },
    },
    ReadinessCheck {
        name: "avatar_without_login",
        detect: |signals| signals.has_avatar && !signals.has_login_control,
    },
    ReadinessCheck {
        name: "profile_url",
        detect: |signals| {
            readiness::PROFILE_PATHS
                .iter()
                .any(|path| signals.url.contains(path))
        },
    },
    ReadinessCheck {
        name: "auth_storage",
        detect: |signals| {
            let in_storage = signals.storage_keys.iter().any(|key| {
                readiness::STORAGE_KEY_MARKERS
                    .iter()
                    .any(|marker| key.contains(marker))
            });
            in_storage
                || readiness::COOKIE_MARKERS
                    .iter()
                    .any(|marker| signals.cookie.contains(marker))
        },
    },
];

pub fn evaluate(signals: &PageSignals) -> LoginState {
    let checks = CHECKS
        .iter()
        .map(|check| (check.name.to_string(), (check.detect)(signals)))
        .collect::<std::collections::BTreeMap<_, _>>();
    LoginState {
        is_logged_in: checks.values().any(|hit| *hit),
        checks,
        current_url: Some(signals.url.clone()).filter(|url| !url.is_empty()),
        page_title: None,
    }
}

/// Runs every check against a snapshot and logs the result.
pub fn detect_login(snapshot: &PageSnapshot) -> LoginState {
    let signals = PageSignals::from_snapshot(snapshot);
    let mut state = evaluate(&signals);
    state.page_title = Some(snapshot.title.clone()).filter(|title| !title.is_empty());
    engine_debug!(
        "Readiness: {} login_control={} url={}",
        state.summary(),
        signals.has_login_control,
        snapshot.url
    );
    state
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signals() -> PageSignals {
        PageSignals {
            url: "https://host/explore".to_string(),
            ..PageSignals::default()
        }
    }

    #[test]
    fn nothing_detected_means_logged_out() {
        let state = evaluate(&signals());
        assert!(!state.is_logged_in);
        assert_eq!(state.checks.len(), CHECKS.len());
        assert!(state.checks.values().all(|hit| !hit));
    }

    #[test]
    fn avatar_next_to_login_button_does_not_count() {
        let mut input = signals();
        input.has_avatar = true;
        input.has_login_control = true;
        assert!(!evaluate(&input).is_logged_in);

        input.has_login_control = false;
        assert!(evaluate(&input).checks["avatar_without_login"]);
    }

    #[test]
    fn account_number_accepts_both_colon_forms() {
        let mut input = signals();
        input.text = "小红书号：  9527".to_string();
        assert!(evaluate(&input).checks["account_number"]);
        input.text = "小红书号:9527".to_string();
        assert!(evaluate(&input).checks["account_number"]);
        input.text = "小红书号 9527".to_string();
        assert!(!evaluate(&input).checks["account_number"]);
    }
}
