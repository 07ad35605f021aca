//! `skc` subcommand handlers

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use skc_client::api::{ScoreStatus, SketchApi, UploadFile};
use skc_client::callback::{AuthCallback, CallbackOutcome};
use skc_client::report::{render_history, render_report, render_result, render_user};
use skc_client::{ApiError, ClientContext};
use skc_common::config::{write_toml_config, CompiledDefaults, TomlConfig, DEFAULT_TIMEOUT_MS};
use skc_common::ClientEvent;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub async fn login(ctx: &ClientContext) -> Result<()> {
    if let Some(user) = ctx.session.restore().await? {
        println!("Already logged in as {}", user.name);
    }
    println!("Open this URL in a browser to sign in with Google:");
    println!("  {}", ctx.api.start_google_login());
    println!("Then run `skc callback <redirect URL>` with the address you land on.");
    Ok(())
}

pub async fn callback(ctx: &ClientContext, url: &str) -> Result<()> {
    let handler = AuthCallback::new(ctx.session.clone());
    println!("Processing login...");

    match handler.handle(url).await {
        CallbackOutcome::Success(user) => {
            println!("Logged in as {}", user.name);
            Ok(())
        }
        CallbackOutcome::Failed(message) => bail!("Login failed: {}", message),
    }
}

pub async fn whoami(ctx: &ClientContext) -> Result<()> {
    ctx.session.restore().await?;
    print!("{}", render_user(&ctx.session.snapshot().await));
    Ok(())
}

pub async fn analyze(ctx: &ClientContext, files: &[PathBuf]) -> Result<()> {
    if ctx.session.restore().await?.is_none() {
        bail!("Not logged in. Run `skc login` first.");
    }
    ctx.workflow.login_succeeded().await?;

    let printer = EventPrinter::spawn(ctx);
    let mut failures = 0usize;

    for path in files {
        match analyze_one(ctx, path).await {
            Ok(()) => {}
            Err(ApiError::Cancelled) => {
                printer.finish().await;
                bail!("Interrupted");
            }
            Err(e) => {
                failures += 1;
                warn!(file = %path.display(), "Analysis failed: {}", e);
            }
        }
        ctx.workflow.reset().await;
    }

    printer.finish().await;
    println!();
    print!("{}", render_history(&ctx.workflow.history().await));

    if failures > 0 {
        bail!("{} of {} uploads failed", failures, files.len());
    }
    Ok(())
}

async fn analyze_one(ctx: &ClientContext, path: &Path) -> Result<(), ApiError> {
    let file = match UploadFile::from_path(path).await {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Skipping {}: {}", path.display(), e);
            return Err(e);
        }
    };

    println!(
        "Analysing {} (first check in {:?})...",
        file.file_name,
        ctx.workflow.policy().initial_delay()
    );

    let task = tokio::select! {
        result = ctx.workflow.submit(file) => result?,
        _ = tokio::signal::ctrl_c() => {
            ctx.workflow.reset().await;
            return Err(ApiError::Cancelled);
        }
    };

    if let Some(result) = ctx.workflow.snapshot().await.last_result {
        print!("{}", render_report(&task, &result));
    }
    Ok(())
}

/// Prints pending progress and user-facing failures as they happen
struct EventPrinter {
    handle: JoinHandle<()>,
    done: CancellationToken,
}

impl EventPrinter {
    fn spawn(ctx: &ClientContext) -> Self {
        Self::spawn_with(ctx.events.subscribe(), print_event)
    }

    fn spawn_with<F>(mut rx: broadcast::Receiver<ClientEvent>, mut on_event: F) -> Self
    where
        F: FnMut(ClientEvent) + Send + 'static,
    {
        let done = CancellationToken::new();
        let stop = done.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = rx.recv() => match event {
                        Ok(event) => on_event(event),
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Event printer fell behind")
                        }
                        Err(RecvError::Closed) => break,
                    },
                    _ = stop.cancelled() => {
                        // Events emitted before the stop request are still queued
                        while let Ok(event) = rx.try_recv() {
                            on_event(event);
                        }
                        break;
                    }
                }
            }
        });
        Self { handle, done }
    }

    /// Print whatever is already queued, then stop
    async fn finish(self) {
        self.done.cancel();
        if let Err(e) = self.handle.await {
            warn!("Event printer ended abnormally: {}", e);
        }
    }
}

fn print_event(event: ClientEvent) {
    match event {
        ClientEvent::AnalysisPending {
            attempt, progress, ..
        } => match progress {
            Some(p) => println!("  still analysing ({:.0}%, check {})", p * 100.0, attempt),
            None => println!("  still analysing (check {})", attempt),
        },
        ClientEvent::WorkflowFailed {
            message, detail, ..
        } => eprintln!("{}: {}", message, detail),
        _ => {}
    }
}

pub async fn score(ctx: &ClientContext, task_id: &str) -> Result<()> {
    ctx.session.restore().await?;

    match ctx.api.get_score(task_id).await? {
        ScoreStatus::Ready(result) => {
            println!("Task {}", task_id);
            print!("{}", render_result(&result));
        }
        ScoreStatus::Pending {
            progress: Some(p),
        } => println!("Task {} is still being analysed ({:.0}%)", task_id, p * 100.0),
        ScoreStatus::Pending { progress: None } => {
            println!("Task {} is still being analysed", task_id)
        }
    }
    Ok(())
}

pub async fn health(ctx: &ClientContext) -> Result<()> {
    let health = ctx
        .api
        .health()
        .await
        .with_context(|| format!("Backend {} is not healthy", ctx.api.base_url()))?;

    match health.message {
        Some(message) => println!("{}: {} ({})", ctx.api.base_url(), health.status, message),
        None => println!("{}: {}", ctx.api.base_url(), health.status),
    }
    Ok(())
}

pub async fn logout(ctx: &ClientContext) -> Result<()> {
    ctx.workflow.logout().await?;
    println!("Logged out");
    Ok(())
}

pub fn config_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    let defaults = CompiledDefaults::for_current_platform();
    let config = TomlConfig {
        api_base_url: Some(defaults.api_base_url),
        timeout_ms: Some(DEFAULT_TIMEOUT_MS),
        ..TomlConfig::default()
    };
    write_toml_config(&config, path)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    info!(path = %path.display(), "Config file written");
    println!("Wrote {}", path.display());
    Ok(())
}
