//! OAuth2 authentication for Google Drive
//!
//! Implements the Authorization Code flow with PKCE (RFC 7636) for
//! Google "installed application" clients. The user opens the consent URL,
//! pastes the authorization code (or the whole redirect URL) back on the
//! terminal, and the resulting tokens are persisted to a JSON file.
//!
//! ## Components
//!
//! - [`ClientSecret`] - Client credentials loaded from Google's `client_secret.json`
//! - [`Tokens`] - Access/refresh token pair with expiry
//! - [`FileTokenStorage`] - Token persistence as a JSON file
//! - [`InstalledAppFlow`] - OAuth2 PKCE challenge/exchange logic
//! - [`TokenManager`] - Hands out access tokens, refreshing them when close to expiry
//! - [`GoogleAuthAdapter`] - Orchestrates the full authentication flow

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use oauth2::{
    basic::BasicClient, AuthUrl, AuthorizationCode, ClientId,
    ClientSecret as OAuthClientSecret, CsrfToken, EndpointNotSet, EndpointSet, PkceCodeChallenge,
    PkceCodeVerifier, RedirectUrl, RefreshToken, Scope, TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

/// Default Google OAuth2 authorization endpoint
const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";

/// Default Google OAuth2 token endpoint
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Out-of-band redirect used when the client secret lists no redirect URI
const DEFAULT_REDIRECT_URI: &str = "http://localhost";

/// Full read/write access to the user's Drive
const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

/// Access tokens this close to expiry are refreshed before use
const REFRESH_MARGIN_SECS: i64 = 60;

// ============================================================================
// ClientSecret
// ============================================================================

/// OAuth client credentials from a Google Cloud console download
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientSecret {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

fn default_auth_uri() -> String {
    AUTH_URL.to_string()
}

fn default_token_uri() -> String {
    TOKEN_URL.to_string()
}

/// Top-level layout of `client_secret.json`
#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

impl ClientSecret {
    /// Parses the JSON downloaded from the Google Cloud console
    ///
    /// Accepts both the `installed` and the `web` application layouts.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: ClientSecretFile =
            serde_json::from_str(json).context("Failed to parse client secret JSON")?;
        file.installed
            .or(file.web)
            .context("Client secret JSON has neither an 'installed' nor a 'web' section")
    }

    /// Loads and parses a client secret file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read client secret {}", path.display()))?;
        Self::from_json(&json)
    }

    /// Redirect URI registered for the client (first entry)
    pub fn redirect_uri(&self) -> &str {
        self.redirect_uris
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_REDIRECT_URI)
    }
}

// ============================================================================
// Tokens
// ============================================================================

/// OAuth2 tokens for authenticating with Google
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tokens {
    /// Bearer token for authenticating API requests
    pub access_token: String,
    /// Token for refreshing the access token without user interaction
    pub refresh_token: Option<String>,
    /// When the access token expires
    pub expires_at: DateTime<Utc>,
}

impl Tokens {
    /// Returns true if the access token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Returns true if the access token expires within `margin`
    pub fn expires_within(&self, margin: Duration) -> bool {
        Utc::now() + margin >= self.expires_at
    }
}

// ============================================================================
// FileTokenStorage
// ============================================================================

/// Stores and retrieves OAuth tokens as a JSON file
pub struct FileTokenStorage {
    path: PathBuf,
}

impl FileTokenStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes tokens, creating the parent directory if needed
    pub fn store(&self, tokens: &Tokens) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create token directory {}", parent.display())
            })?;
        }
        let json = serde_json::to_string_pretty(tokens).context("Failed to serialize tokens")?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write tokens to {}", self.path.display()))?;

        restrict_permissions(&self.path)?;
        debug!(path = %self.path.display(), "Stored tokens");
        Ok(())
    }

    /// Loads tokens
    ///
    /// # Returns
    /// `Some(Tokens)` if the file exists and is valid, `None` if it does not exist
    pub fn load(&self) -> Result<Option<Tokens>> {
        match std::fs::read_to_string(&self.path) {
            Ok(json) => {
                let tokens: Tokens = serde_json::from_str(&json).with_context(|| {
                    format!("Failed to parse tokens from {}", self.path.display())
                })?;
                debug!(path = %self.path.display(), "Loaded tokens");
                Ok(Some(tokens))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No stored tokens");
                Ok(None)
            }
            Err(e) => Err(anyhow::Error::new(e).context("Failed to read token file")),
        }
    }

    /// Removes the token file
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "Cleared stored tokens");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(anyhow::Error::new(e).context("Failed to delete token file")),
        }
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .context("Failed to restrict token file permissions")
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

// ============================================================================
// InstalledAppFlow
// ============================================================================

/// OAuth2 PKCE flow implementation using the `oauth2` crate
///
/// Handles generating authorization URLs with PKCE challenges,
/// exchanging authorization codes for tokens, and refreshing tokens.
pub struct InstalledAppFlow {
    client: BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>,
    scopes: Vec<String>,
}

impl InstalledAppFlow {
    /// Creates a new flow for the given client credentials
    pub fn new(secret: &ClientSecret) -> Result<Self> {
        let client = BasicClient::new(ClientId::new(secret.client_id.clone()))
            .set_client_secret(OAuthClientSecret::new(secret.client_secret.clone()))
            .set_auth_uri(AuthUrl::new(secret.auth_uri.clone()).context("Invalid authorization URL")?)
            .set_token_uri(TokenUrl::new(secret.token_uri.clone()).context("Invalid token URL")?)
            .set_redirect_uri(
                RedirectUrl::new(secret.redirect_uri().to_string())
                    .context("Invalid redirect URI")?,
            );

        Ok(Self {
            client,
            scopes: vec![DRIVE_SCOPE.to_string()],
        })
    }

    /// Generates an authorization URL with a PKCE challenge
    ///
    /// # Returns
    /// A tuple of `(authorization_url, csrf_token, pkce_verifier)`.
    /// The `pkce_verifier` must be kept until the code exchange step.
    pub fn generate_auth_url(&self) -> (String, CsrfToken, PkceCodeVerifier) {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let mut auth_request = self
            .client
            .authorize_url(CsrfToken::new_random)
            // Google only issues refresh tokens for offline access
            .add_extra_param("access_type", "offline");

        for scope in &self.scopes {
            auth_request = auth_request.add_scope(Scope::new(scope.clone()));
        }

        let (auth_url, csrf_token) = auth_request.set_pkce_challenge(pkce_challenge).url();

        debug!("Generated authorization URL");
        (auth_url.to_string(), csrf_token, pkce_verifier)
    }

    /// Exchanges an authorization code for OAuth tokens
    pub async fn exchange_code(
        &self,
        code: String,
        pkce_verifier: PkceCodeVerifier,
    ) -> Result<Tokens> {
        info!("Exchanging authorization code for tokens");

        let http_client = reqwest::Client::new();
        let token_result = self
            .client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(pkce_verifier)
            .request_async(&http_client)
            .await
            .context("Failed to exchange authorization code")?;

        let tokens = Tokens {
            access_token: token_result.access_token().secret().to_string(),
            refresh_token: token_result.refresh_token().map(|t| t.secret().to_string()),
            expires_at: expiry_from(token_result.expires_in()),
        };

        info!("Successfully obtained OAuth tokens");
        Ok(tokens)
    }

    /// Refreshes an access token using a refresh token
    ///
    /// Google usually omits the refresh token in refresh responses; the
    /// previous one is kept in that case.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<Tokens> {
        info!("Refreshing access token");

        let http_client = reqwest::Client::new();
        let token_result = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&http_client)
            .await
            .context("Failed to refresh token")?;

        let tokens = Tokens {
            access_token: token_result.access_token().secret().to_string(),
            refresh_token: token_result
                .refresh_token()
                .map(|t| t.secret().to_string())
                .or_else(|| Some(refresh_token.to_string())),
            expires_at: expiry_from(token_result.expires_in()),
        };

        info!("Successfully refreshed access token");
        Ok(tokens)
    }
}

fn expiry_from(expires_in: Option<std::time::Duration>) -> DateTime<Utc> {
    expires_in
        .map(|d| Utc::now() + Duration::seconds(d.as_secs() as i64))
        .unwrap_or_else(|| Utc::now() + Duration::hours(1))
}

/// Extracts the authorization code from what the user pasted
///
/// Accepts either the bare code or the full redirect URL containing a
/// `code` query parameter.
pub fn parse_pasted_code(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(url) = url::Url::parse(trimmed) {
        if url.query().is_some() {
            return url
                .query_pairs()
                .find(|(key, _)| key == "code")
                .map(|(_, value)| value.to_string());
        }
    }

    Some(trimmed.to_string())
}

// ============================================================================
// TokenManager
// ============================================================================

/// Hands out valid access tokens, refreshing and persisting them as needed
pub struct TokenManager {
    flow: InstalledAppFlow,
    storage: FileTokenStorage,
    tokens: tokio::sync::Mutex<Tokens>,
}

impl TokenManager {
    pub fn new(flow: InstalledAppFlow, storage: FileTokenStorage, tokens: Tokens) -> Self {
        Self {
            flow,
            storage,
            tokens: tokio::sync::Mutex::new(tokens),
        }
    }

    /// Returns an access token valid for at least another minute
    pub async fn access_token(&self) -> Result<String> {
        let mut tokens = self.tokens.lock().await;
        if tokens.expires_within(Duration::seconds(REFRESH_MARGIN_SECS)) {
            let refresh = tokens
                .refresh_token
                .clone()
                .context("Access token expired and no refresh token is stored")?;
            let fresh = self.flow.refresh_token(&refresh).await?;
            self.storage.store(&fresh)?;
            *tokens = fresh;
        }
        Ok(tokens.access_token.clone())
    }

    /// Snapshot of the current tokens
    pub async fn tokens(&self) -> Tokens {
        self.tokens.lock().await.clone()
    }
}

// ============================================================================
// GoogleAuthAdapter
// ============================================================================

/// High-level authentication adapter that orchestrates the full OAuth2 flow
///
/// 1. Generates a PKCE authorization URL
/// 2. Prints it and tries to open the user's browser
/// 3. Reads the pasted authorization code from the terminal
/// 4. Exchanges the code for tokens and persists them
pub struct GoogleAuthAdapter {
    secret: ClientSecret,
    storage_path: PathBuf,
    open_browser: bool,
}

impl GoogleAuthAdapter {
    pub fn new(secret: ClientSecret, token_path: impl Into<PathBuf>) -> Self {
        Self {
            secret,
            storage_path: token_path.into(),
            open_browser: true,
        }
    }

    /// Enables or disables launching the browser on login
    pub fn with_browser(mut self, open_browser: bool) -> Self {
        self.open_browser = open_browser;
        self
    }

    /// Loads the client secret from `secret_path`
    pub fn from_files(secret_path: &Path, token_path: &Path) -> Result<Self> {
        Ok(Self::new(ClientSecret::load(secret_path)?, token_path))
    }

    pub fn storage(&self) -> FileTokenStorage {
        FileTokenStorage::new(self.storage_path.clone())
    }

    /// Performs the interactive login on stdin/stderr
    pub async fn login(&self) -> Result<Tokens> {
        let mut stdin = tokio::io::BufReader::new(tokio::io::stdin());
        let mut stderr = tokio::io::stderr();
        self.login_with(&mut stdin, &mut stderr).await
    }

    /// Performs the interactive login reading the code from `input`
    pub async fn login_with<R, W>(&self, input: &mut R, prompt: &mut W) -> Result<Tokens>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!("Starting OAuth2 PKCE login flow");
        let flow = InstalledAppFlow::new(&self.secret)?;
        let (auth_url, _csrf_token, pkce_verifier) = flow.generate_auth_url();

        prompt
            .write_all(
                format!("Authorize this app by visiting this url:\n\n  {auth_url}\n\n").as_bytes(),
            )
            .await?;
        if self.open_browser {
            if let Err(e) = webbrowser::open(&auth_url) {
                debug!(error = %e, "Could not open browser");
            }
        }
        prompt
            .write_all(b"Enter the code from that page here: ")
            .await?;
        prompt.flush().await?;

        let mut line = String::new();
        input
            .read_line(&mut line)
            .await
            .context("Failed to read authorization code")?;
        let code = parse_pasted_code(&line).context("No authorization code entered")?;

        let tokens = flow.exchange_code(code, pkce_verifier).await?;
        self.storage().store(&tokens)?;

        info!("OAuth2 login completed successfully");
        Ok(tokens)
    }

    /// Returns a token manager backed by stored tokens
    ///
    /// Stored tokens that are expired or about to expire are refreshed and
    /// written back. Fails when nothing is stored yet.
    pub async fn authorize(&self) -> Result<TokenManager> {
        let storage = self.storage();
        let tokens = storage.load()?.with_context(|| {
            format!(
                "No stored tokens at {}. Run 'gdsync auth login' first.",
                storage.path().display()
            )
        })?;

        let manager = TokenManager::new(InstalledAppFlow::new(&self.secret)?, storage, tokens);
        manager
            .access_token()
            .await
            .context("Stored tokens could not be refreshed. Run 'gdsync auth login' again.")?;
        Ok(manager)
    }
}
