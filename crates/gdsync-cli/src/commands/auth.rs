//! Auth commands - Login, Logout, and Status for Google Drive authentication
//!
//! Provides the `gdsync auth` CLI subcommands which:
//! 1. `login`  - Runs the installed-app OAuth2 flow and stores the tokens in
//!    the configured token file.
//! 2. `logout` - Deletes the stored tokens.
//! 3. `status` - Shows whether tokens are stored and when they expire.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use clap::Subcommand;
use tracing::info;

use gdsync_core::config::expand_tilde;
use gdsync_drive::auth::{FileTokenStorage, GoogleAuthAdapter, Tokens};

use super::CommandContext;
use crate::output::{get_formatter, OutputFormatter};

#[derive(Debug, Subcommand)]
pub enum AuthCommand {
    /// Authorize gdsync to access Google Drive
    Login {
        /// Print the authorization URL without opening a browser
        #[arg(long)]
        no_browser: bool,
    },
    /// Remove stored credentials
    Logout,
    /// Check authentication status
    Status,
}

/// Token validity as shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenStatus {
    Valid,
    /// Expired, but a refresh token is available
    Refreshable,
    Expired,
}

impl TokenStatus {
    fn of(tokens: &Tokens) -> Self {
        if !tokens.is_expired() {
            Self::Valid
        } else if tokens.refresh_token.is_some() {
            Self::Refreshable
        } else {
            Self::Expired
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Valid => "Valid",
            Self::Refreshable => "Expired (will refresh on next sync)",
            Self::Expired => "Expired",
        }
    }
}

impl AuthCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let fmt = get_formatter(ctx.is_json());
        match self {
            AuthCommand::Login { no_browser } => self.execute_login(ctx, *no_browser, &*fmt).await,
            AuthCommand::Logout => self.execute_logout(ctx, &*fmt),
            AuthCommand::Status => self.execute_status(ctx, &*fmt),
        }
    }

    /// Execute the login flow:
    /// 1. Load the client secret
    /// 2. Print (and open) the authorization URL
    /// 3. Exchange the pasted code and store the tokens
    async fn execute_login(
        &self,
        ctx: &CommandContext,
        no_browser: bool,
        fmt: &dyn OutputFormatter,
    ) -> Result<()> {
        let secret_path = expand_tilde(&ctx.config.auth.client_secret_file);
        let token_path = expand_tilde(&ctx.config.auth.token_file);

        let adapter = GoogleAuthAdapter::from_files(&secret_path, &token_path)
            .with_context(|| {
                format!(
                    "Failed to load the OAuth client secret from {}",
                    secret_path.display()
                )
            })?
            .with_browser(!no_browser);

        info!(token_file = %token_path.display(), "Starting OAuth2 login");
        let tokens = adapter.login().await.context("OAuth2 login failed")?;

        if ctx.is_json() {
            fmt.print_json(&serde_json::json!({
                "authenticated": true,
                "token_file": token_path.display().to_string(),
                "expires_at": tokens.expires_at.to_rfc3339(),
                "refresh_token": tokens.refresh_token.is_some(),
            }));
        } else {
            fmt.success("Authenticated with Google Drive");
            fmt.info(&format!("Tokens stored in {}", token_path.display()));
            if tokens.refresh_token.is_none() {
                fmt.warn("No refresh token was issued; you will need to log in again when the token expires");
            }
        }
        Ok(())
    }

    /// Execute logout: deletes the token file
    fn execute_logout(&self, ctx: &CommandContext, fmt: &dyn OutputFormatter) -> Result<()> {
        let storage = FileTokenStorage::new(expand_tilde(&ctx.config.auth.token_file));

        if storage.load()?.is_none() {
            fmt.info("No stored credentials. Nothing to log out.");
            return Ok(());
        }

        storage.clear().context("Failed to delete stored tokens")?;
        info!(token_file = %storage.path().display(), "Logged out");

        fmt.success("Logged out successfully");
        fmt.info(&format!("Removed {}", storage.path().display()));
        Ok(())
    }

    /// Execute status check:
    /// 1. Load the token file
    /// 2. Display token validity and expiry
    fn execute_status(&self, ctx: &CommandContext, fmt: &dyn OutputFormatter) -> Result<()> {
        let storage = FileTokenStorage::new(expand_tilde(&ctx.config.auth.token_file));

        let tokens = match storage.load() {
            Ok(Some(tokens)) => tokens,
            Ok(None) => {
                if ctx.is_json() {
                    fmt.print_json(&serde_json::json!({
                        "authenticated": false,
                        "token_file": storage.path().display().to_string(),
                    }));
                } else {
                    fmt.info("Authentication status: Not configured");
                    fmt.info("Run 'gdsync auth login' to authenticate");
                }
                return Ok(());
            }
            Err(e) => {
                fmt.error(&format!("Failed to read {}: {e:#}", storage.path().display()));
                return Ok(());
            }
        };

        let status = TokenStatus::of(&tokens);

        if ctx.is_json() {
            fmt.print_json(&serde_json::json!({
                "authenticated": true,
                "token_file": storage.path().display().to_string(),
                "token_status": status.as_str(),
                "expires_at": tokens.expires_at.to_rfc3339(),
                "refresh_token": tokens.refresh_token.is_some(),
            }));
        } else {
            fmt.success("Authenticated with Google Drive");
            fmt.field("Token status", status.as_str());
            fmt.field(
                "Expires",
                &format!(
                    "{} ({})",
                    tokens.expires_at.format("%Y-%m-%d %H:%M:%S UTC"),
                    describe_remaining(tokens.expires_at - Utc::now())
                ),
            );
            fmt.field("Token file", &storage.path().display().to_string());
        }

        Ok(())
    }
}

/// Human description of the time left before expiry
fn describe_remaining(remaining: Duration) -> String {
    if remaining <= Duration::zero() {
        return "expired".to_string();
    }
    let minutes = remaining.num_minutes();
    if minutes < 1 {
        "in less than a minute".to_string()
    } else if minutes < 120 {
        format!("in {minutes} minutes")
    } else {
        format!("in {} hours", remaining.num_hours())
    }
}
