mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use pretty_assertions::assert_eq;
use sync_core::{ScriptCommand, ScriptEvent};
use sync_engine::{scripts, ExtractionHandle, SyncSettings};

fn spawn(surface: &Arc<FixtureSurface>) -> ExtractionHandle {
    ExtractionHandle::spawn(surface.clone(), SyncSettings::default())
}

#[tokio::test(start_paused = true)]
async fn load_more_pages_are_followed_without_duplicates() {
    init_logging();
    let surface = Arc::new(
        FixtureSurface::new().showing(
            COLLECTION_URL,
            vec![collection_page(3, true), collection_page(5, false)],
        ),
    );
    let mut handle = spawn(&surface);
    assert!(handle.send(ScriptCommand::Start).await);

    let events = collect_until_terminal(&mut handle).await;

    assert_eq!(events.first(), Some(&ScriptEvent::Initialized));
    assert_eq!(
        events.get(1),
        Some(&ScriptEvent::Progress {
            total: 0,
            current: 0
        })
    );
    assert_eq!(
        data_ids(&events),
        (1..=5).map(note_id).collect::<Vec<_>>()
    );
    assert_eq!(
        events.last(),
        Some(&ScriptEvent::Complete {
            message: "extraction complete: 5 records".to_string(),
            total: 5
        })
    );
    assert_eq!(surface.stage(), 1);
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn progress_never_reports_more_than_total() {
    init_logging();
    let surface = Arc::new(
        FixtureSurface::new().showing(COLLECTION_URL, vec![collection_page(4, false)]),
    );
    let mut handle = spawn(&surface);
    handle.send(ScriptCommand::Start).await;

    let events = collect_until_terminal(&mut handle).await;
    let progress = events
        .iter()
        .filter_map(|event| match event {
            ScriptEvent::Progress { total, current } => Some((*total, *current)),
            _ => None,
        })
        .collect::<Vec<_>>();

    assert_eq!(progress.len(), 5);
    assert!(progress.iter().all(|(total, current)| current <= total || *total == 0));
    assert!(progress.windows(2).all(|pair| pair[0].1 <= pair[1].1));
    assert_eq!(progress.last().map(|(_, current)| *current), Some(4));
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn scrolling_is_used_when_no_load_more_control_exists() {
    init_logging();
    let surface = Arc::new(
        FixtureSurface::new().showing(
            COLLECTION_URL,
            vec![collection_page(2, false), collection_page(4, false)],
        ),
    );
    surface.lock().scroll_loads_more = true;
    let mut handle = spawn(&surface);
    handle.send(ScriptCommand::Start).await;

    let events = collect_until_terminal(&mut handle).await;

    assert_eq!(data_ids(&events).len(), 4);
    let scrolled = surface
        .scripts()
        .iter()
        .filter(|source| scripts::is_scroll_to_bottom(source))
        .count();
    assert_eq!(scrolled, 2);
    assert!(surface
        .scripts()
        .iter()
        .any(|source| source.contains("scrollBy(0, 100)")));
    assert!(matches!(
        events.last(),
        Some(ScriptEvent::Complete { total: 4, .. })
    ));
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn empty_page_completes_after_bounded_retries() {
    init_logging();
    let surface = Arc::new(
        FixtureSurface::new().showing(COLLECTION_URL, vec![empty_collection_page()]),
    );
    let mut handle = spawn(&surface);
    let started = tokio::time::Instant::now();
    handle.send(ScriptCommand::Start).await;

    let events = collect_until_terminal(&mut handle).await;

    assert_eq!(
        events,
        vec![
            ScriptEvent::Initialized,
            ScriptEvent::Progress {
                total: 0,
                current: 0
            },
            ScriptEvent::Complete {
                message: "extraction complete: 0 records".to_string(),
                total: 0
            },
        ]
    );
    // Start delay plus three retry delays.
    assert!(started.elapsed() >= Duration::from_secs(10));
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn start_off_the_collection_page_reports_an_error() {
    init_logging();
    let surface = Arc::new(FixtureSurface::new().showing(HOME_URL, vec![home_page()]));
    let mut handle = spawn(&surface);
    handle.send(ScriptCommand::Start).await;

    let events = collect_until_terminal(&mut handle).await;

    assert_eq!(
        events,
        vec![
            ScriptEvent::Initialized,
            ScriptEvent::Error {
                message: "not on expected page".to_string()
            },
        ]
    );
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn pause_holds_the_run_until_resumed() {
    init_logging();
    let surface = Arc::new(
        FixtureSurface::new().showing(COLLECTION_URL, vec![collection_page(6, false)]),
    );
    let mut handle = spawn(&surface);
    handle.send(ScriptCommand::Start).await;

    let before_pause =
        collect_until(&mut handle, |event| matches!(event, ScriptEvent::Data { .. })).await;
    assert_eq!(data_ids(&before_pause).len(), 1);

    handle.send(ScriptCommand::Pause).await;
    let until_paused = collect_until(&mut handle, |event| *event == ScriptEvent::Paused).await;
    assert_eq!(until_paused.last(), Some(&ScriptEvent::Paused));
    let emitted_before_pause = data_ids(&until_paused).len() + 1;

    let quiet = tokio::time::timeout(Duration::from_secs(60), handle.next_event()).await;
    assert!(quiet.is_err(), "no events while paused");

    handle.send(ScriptCommand::Resume).await;
    let rest = collect_until_terminal(&mut handle).await;
    assert_eq!(rest.first(), Some(&ScriptEvent::Resumed));
    assert_eq!(data_ids(&rest).len() + emitted_before_pause, 6);
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn stop_ends_the_run_at_the_next_element() {
    init_logging();
    let surface = Arc::new(
        FixtureSurface::new().showing(COLLECTION_URL, vec![collection_page(10, true)]),
    );
    let mut handle = spawn(&surface);
    handle.send(ScriptCommand::Start).await;
    collect_until(&mut handle, |event| matches!(event, ScriptEvent::Data { .. })).await;

    handle.send(ScriptCommand::Stop).await;
    let rest = collect_until_terminal(&mut handle).await;

    assert_eq!(rest.last(), Some(&ScriptEvent::Stopped));
    assert!(data_ids(&rest).len() <= 1);
    let quiet = tokio::time::timeout(Duration::from_secs(60), handle.next_event()).await;
    assert!(quiet.is_err(), "no events after stop");
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn leaving_the_collection_page_stops_the_run() {
    init_logging();
    let surface = Arc::new(
        FixtureSurface::new().showing(COLLECTION_URL, vec![collection_page(8, false)]),
    );
    let mut handle = spawn(&surface);
    handle.send(ScriptCommand::Start).await;
    collect_until(&mut handle, |event| matches!(event, ScriptEvent::Data { .. })).await;

    surface.show(HOME_URL, vec![home_page()]);
    let rest = collect_until_terminal(&mut handle).await;

    assert_eq!(rest.last(), Some(&ScriptEvent::Stopped));
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn leaving_the_collection_page_while_paused_stops_the_run() {
    init_logging();
    let surface = Arc::new(
        FixtureSurface::new().showing(COLLECTION_URL, vec![collection_page(8, false)]),
    );
    let mut handle = spawn(&surface);
    handle.send(ScriptCommand::Start).await;
    collect_until(&mut handle, |event| matches!(event, ScriptEvent::Data { .. })).await;
    handle.send(ScriptCommand::Pause).await;
    collect_until(&mut handle, |event| *event == ScriptEvent::Paused).await;

    surface.show(HOME_URL, vec![home_page()]);
    let event = tokio::time::timeout(Duration::from_secs(5), handle.next_event()).await;

    assert_eq!(event, Ok(Some(ScriptEvent::Stopped)));
    handle.send(ScriptCommand::Resume).await;
    let quiet = tokio::time::timeout(Duration::from_secs(60), handle.next_event()).await;
    assert!(quiet.is_err(), "resume after a forced stop does nothing");
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn restart_after_completion_emits_records_again() {
    init_logging();
    let surface = Arc::new(
        FixtureSurface::new().showing(COLLECTION_URL, vec![collection_page(2, false)]),
    );
    let mut handle = spawn(&surface);

    handle.send(ScriptCommand::Start).await;
    let first = collect_until_terminal(&mut handle).await;
    handle.send(ScriptCommand::Start).await;
    let second = collect_until_terminal(&mut handle).await;

    assert_eq!(data_ids(&first), data_ids(&second));
    assert!(!second.contains(&ScriptEvent::Initialized));
    handle.shutdown().await;
}
