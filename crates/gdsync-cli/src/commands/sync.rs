//! Sync command - Mirror the local root to Google Drive
//!
//! Provides the `gdsync sync` CLI command which:
//! 1. Applies command-line overrides to the configuration and validates it
//! 2. Loads the stored OAuth tokens, refreshing them when needed
//! 3. Loads the sync state cache and starts its periodic flush
//! 4. Runs the SyncEngine until it finishes or a shutdown signal arrives
//! 5. Saves the sync state cache, whatever the outcome, and prints the report

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use gdsync_core::config::{expand_tilde, Config, ConfigBuilder};
use gdsync_drive::auth::GoogleAuthAdapter;
use gdsync_drive::client::DriveClient;
use gdsync_drive::provider::DriveRemoteStore;
use gdsync_sync::engine::{SyncEngine, SyncReport};
use gdsync_sync::progress::format_thousands;
use gdsync_sync::state::SyncStateCache;

use super::CommandContext;
use crate::output::{get_formatter, OutputFormatter};

#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Local directory to mirror (overrides sync.local_root)
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Drive ID of the target folder (overrides sync.remote_root_id)
    #[arg(long)]
    pub remote_root: Option<String>,

    /// Maximum number of uploads in flight (overrides sync.max_concurrency)
    #[arg(long)]
    pub max_concurrency: Option<usize>,
}

impl SyncCommand {
    /// Configuration with this command's overrides applied
    fn effective_config(&self, base: &Config) -> Config {
        let mut builder = ConfigBuilder::from_config(base.clone());
        if let Some(root) = &self.root {
            builder = builder.local_root(root.clone());
        }
        if let Some(remote_root) = &self.remote_root {
            builder = builder.remote_root_id(remote_root.clone());
        }
        if let Some(n) = self.max_concurrency {
            builder = builder.max_concurrency(n);
        }
        builder.build()
    }

    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = get_formatter(ctx.is_json());

        // Step 1: Resolve and validate the configuration
        let config = self.effective_config(&ctx.config);
        let errors = config.validate();
        if !errors.is_empty() {
            for e in &errors {
                formatter.error(&e.to_string());
            }
            anyhow::bail!(
                "Invalid configuration ({}); see 'gdsync config validate'",
                ctx.config_path.display()
            );
        }

        let local_root = expand_tilde(&config.sync.local_root);
        let state_file = expand_tilde(&config.sync.state_file);
        info!(
            local_root = %local_root.display(),
            remote_root = %config.sync.remote_root_id,
            "Loaded configuration"
        );

        // Step 2: Authorize
        let auth = GoogleAuthAdapter::from_files(
            &expand_tilde(&config.auth.client_secret_file),
            &expand_tilde(&config.auth.token_file),
        )
        .context("Failed to load the OAuth client secret")?;
        let tokens = Arc::new(auth.authorize().await?);
        let client = DriveClient::new(tokens.access_token().await?);
        let store = Arc::new(DriveRemoteStore::with_token_manager(client, tokens));

        // Step 3: Load the sync state cache
        let cache = Arc::new(
            SyncStateCache::load(&state_file, &local_root)
                .await
                .context("Failed to load sync state")?,
        );
        let engine = SyncEngine::from_config(store, Arc::clone(&cache), &config)?;

        let shutdown = CancellationToken::new();
        let autosave = cache.spawn_autosave(config.sync_state_save_period(), shutdown.clone());
        let signals = tokio::spawn(shutdown_signal(shutdown.clone()));

        // Step 4: Run until done or interrupted
        formatter.info(&format!(
            "Mirroring {} to Drive folder {}",
            local_root.display(),
            config.sync.remote_root_id
        ));
        let outcome = tokio::select! {
            result = engine.sync() => Some(result),
            _ = shutdown.cancelled() => None,
        };

        shutdown.cancel();
        signals.abort();
        if let Err(e) = autosave.await {
            warn!(error = %e, "Autosave task ended abnormally");
        }

        // Step 5: Always persist the cache
        let saved = cache.save().await;
        match &saved {
            Ok(()) => info!(path = %state_file.display(), entries = cache.len(), "Saved sync state"),
            Err(e) => error!(path = %state_file.display(), error = %e, "Failed to save sync state"),
        }

        match outcome {
            None => {
                formatter.warn("Interrupted; sync state saved, the next run resumes from it");
                anyhow::bail!("Sync interrupted by signal")
            }
            Some(Err(e)) => Err(e).context("Sync failed"),
            Some(Ok(report)) => {
                saved.context("Failed to save sync state")?;
                print_report(&*formatter, ctx.is_json(), &report, &state_file)
            }
        }
    }
}

/// Displays the run summary
fn print_report(
    formatter: &dyn OutputFormatter,
    json: bool,
    report: &SyncReport,
    state_file: &std::path::Path,
) -> Result<()> {
    if json {
        let mut value =
            serde_json::to_value(report).context("Failed to serialize sync report")?;
        value["state_file"] = serde_json::json!(state_file.display().to_string());
        formatter.print_json(&value);
        return Ok(());
    }

    let duration_display = if report.duration_ms >= 1000 {
        format!("{:.1}s", report.duration_ms as f64 / 1000.0)
    } else {
        format!("{}ms", report.duration_ms)
    };

    if report.remote_changes() == 0 && report.upload_failures == 0 {
        formatter.success(&format!("Already up to date ({duration_display})"));
    } else {
        formatter.success(&format!("Sync completed in {duration_display}"));
    }

    let plural = |n: u64| if n == 1 { "" } else { "s" };
    formatter.field(
        "Uploaded",
        &format!("{} file{}", report.files_uploaded, plural(report.files_uploaded)),
    );
    formatter.field(
        "Unchanged",
        &format!("{} file{}", report.files_skipped, plural(report.files_skipped)),
    );
    if report.folders_created > 0 {
        formatter.field(
            "Created",
            &format!("{} folder{}", report.folders_created, plural(report.folders_created)),
        );
    }
    if report.objects_deleted > 0 {
        formatter.field(
            "Replaced",
            &format!(
                "{} remote object{}",
                report.objects_deleted,
                plural(report.objects_deleted)
            ),
        );
    }
    formatter.field("Bytes", &format_thousands(report.bytes_considered));

    if report.upload_failures > 0 {
        formatter.warn(&format!(
            "{} upload{} failed and will be retried on the next run (see log)",
            report.upload_failures,
            plural(report.upload_failures)
        ));
    }

    Ok(())
}

/// Cancels `token` on SIGINT or SIGTERM
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}
