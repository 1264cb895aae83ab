mod cli;

use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use engine_logging::{engine_info, engine_warn};
use sync_core::{SyncSession, SyncViewModel};
use sync_engine::{FetchSettings, JsonFileStore, StaticPageSurface, SyncController, SyncSettings};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::cli::Cli;

enum Outcome {
    Finished(Option<SyncSession>),
    Interrupted,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    engine_logging::initialize(cli.log_destination(), cli.level());

    let settings = SyncSettings::load(&cli.settings)?;
    if cli.print_settings {
        println!("{}", settings.to_ron()?);
        return Ok(());
    }

    let store = Arc::new(
        JsonFileStore::open(&cli.output)
            .with_context(|| format!("opening record store in {:?}", cli.output))?,
    );
    let surface = Arc::new(StaticPageSurface::new(FetchSettings {
        request_timeout: settings.navigation_timeout,
        cookie: cli.cookie.clone(),
        ..FetchSettings::default()
    })?);
    let url = cli
        .url
        .clone()
        .unwrap_or_else(|| settings.collection_url.clone());

    let mut controller = SyncController::new(surface, store.clone(), settings);
    let reporter = spawn_progress_reporter(controller.subscribe());

    controller
        .navigate(&url)
        .await
        .with_context(|| format!("loading {url}"))?;
    let login = controller.state().login().summary();
    engine_info!("Login signals: {}", login);

    let session_id = match controller.request_sync().await {
        Ok(id) => id,
        Err(err) => {
            reporter.abort();
            controller.shutdown().await;
            bail!("sync not started: {err}");
        }
    };
    engine_info!("Sync {} running", session_id);

    let outcome = tokio::select! {
        session = controller.run_until_finished() => Outcome::Finished(session),
        _ = tokio::signal::ctrl_c() => Outcome::Interrupted,
    };
    let session = match outcome {
        Outcome::Finished(session) => session,
        Outcome::Interrupted => {
            engine_warn!("Interrupted; stopping sync");
            controller.stop().await;
            controller.state().session().cloned()
        }
    };

    let saved = controller.view().saved_records;
    let failed = controller.view().failed_saves;
    controller.shutdown().await;
    reporter.abort();

    let Some(session) = session else {
        bail!("no sync session was recorded");
    };
    println!(
        "{}: {} of {} records synced ({} saved, {} failed) into {}",
        session.status().display_name(),
        session.synced_count(),
        session.total_count(),
        saved,
        failed,
        store.path().display()
    );
    if let Some(duration) = session.duration() {
        println!("took {:.1}s", duration.num_milliseconds() as f64 / 1000.0);
    }
    if let Some(message) = session.error_message() {
        bail!("sync failed: {message}");
    }
    Ok(())
}

fn spawn_progress_reporter(mut views: watch::Receiver<SyncViewModel>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while views.changed().await.is_ok() {
            let view = views.borrow_and_update().clone();
            if let Some(session) = &view.session {
                engine_info!(
                    "{} {}/{} ({:.0}%)",
                    session.status().display_name(),
                    session.synced_count(),
                    session.total_count(),
                    view.progress * 100.0
                );
            }
        }
    })
}
