use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::task::JoinHandle;

use crate::auth::auth_storage::TokenStore;
use crate::auth::token_data::{AuthState, TokenResponse, TwitchUser};
use crate::error::{BridgeError, Result};

const DEFAULT_ID_BASE: &str = "https://id.twitch.tv/oauth2";
const DEFAULT_HELIX_BASE: &str = "https://api.twitch.tv/helix";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_DEVICE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone)]
pub struct OAuthOptions {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub id_base: String,
    pub helix_base: String,
    pub poll_interval: Duration,
    pub device_timeout: Duration,
    pub open_browser: bool,
}

impl OAuthOptions {
    pub fn new(client_id: String) -> Self {
        Self {
            client_id,
            client_secret: None,
            id_base: DEFAULT_ID_BASE.to_string(),
            helix_base: DEFAULT_HELIX_BASE.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            device_timeout: DEFAULT_DEVICE_TIMEOUT,
            open_browser: true,
        }
    }
}

#[derive(Deserialize)]
struct UsersResponse {
    data: Vec<TwitchUser>,
}

/// Owns the token record and every exchange with the Twitch identity provider.
pub struct OAuthClient {
    pub(crate) http: Client,
    pub(crate) opts: OAuthOptions,
    pub(crate) store: TokenStore,
    state: Mutex<AuthState>,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl OAuthClient {
    pub fn new(opts: OAuthOptions, store: TokenStore) -> Self {
        Self {
            http: Client::new(),
            opts,
            store,
            state: Mutex::new(AuthState::Unauthenticated),
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn options(&self) -> &OAuthOptions {
        &self.opts
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    pub fn state(&self) -> AuthState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_state(&self, state: AuthState) {
        let mut current = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *current != state {
            log::debug!("Auth state {:?} -> {:?}", *current, state);
            *current = state;
        }
    }

    pub fn access_token(&self) -> Result<String> {
        self.store
            .current()
            .access_token()
            .map(str::to_string)
            .ok_or_else(|| BridgeError::Auth("no Twitch tokens available".to_string()))
    }

    pub fn user_id(&self) -> Result<String> {
        self.store
            .current()
            .user_id
            .ok_or_else(|| BridgeError::Auth("Twitch account identity not resolved".to_string()))
    }

    /// Loads and validates persisted tokens, falling back to the device flow.
    pub async fn acquire(&self) -> Result<()> {
        match self.store.load() {
            Ok(Some(record)) if record.is_authenticated() => {
                match self.validate().await {
                    Ok(()) => {
                        if self.store.current().user_id.is_none() {
                            self.resolve_user().await?;
                        }
                        log::info!("Validated stored Twitch tokens");
                        return Ok(());
                    }
                    Err(e) => log::warn!("Stored Twitch tokens are unusable: {}", e),
                }
            }
            Ok(_) => {}
            Err(e) => log::warn!(
                "Could not read {}: {}",
                self.store.path().display(),
                e
            ),
        }

        let session = self.request_device_code().await?;
        self.present(&session);
        self.poll_for_token(&session).await
    }

    /// Checks the current access token, refreshing it once on 401.
    pub async fn validate(&self) -> Result<()> {
        let access_token = self.access_token()?;
        let response = self
            .http
            .get(format!("{}/validate", self.opts.id_base))
            .header(AUTHORIZATION, format!("OAuth {}", access_token))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            log::info!("Successfully validated tokens");
            self.set_state(AuthState::Authenticated);
            Ok(())
        } else if status == StatusCode::UNAUTHORIZED {
            log::info!("Access token rejected by validation, refreshing");
            self.refresh().await.map(|_| ())
        } else {
            let body = response.text().await.unwrap_or_default();
            self.set_state(AuthState::ReauthRequired);
            Err(BridgeError::Auth(format!(
                "unexpected validation status {}: {}",
                status.as_u16(),
                body
            )))
        }
    }

    /// Exchanges the refresh token for a new pair and persists it.
    /// Returns the new access token.
    pub async fn refresh(&self) -> Result<String> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    /// Refreshes unless `stale_token` was already replaced by a concurrent refresh.
    pub async fn refresh_after(&self, stale_token: &str) -> Result<String> {
        let _guard = self.refresh_lock.lock().await;
        let current = self.access_token()?;
        if current != stale_token {
            log::debug!("Tokens were refreshed concurrently, reusing them");
            return Ok(current);
        }
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> Result<String> {
        let record = self.store.current();
        let refresh_token = record
            .refresh_token()
            .ok_or_else(|| BridgeError::Auth("no refresh token available".to_string()))?;

        log::info!("Refreshing tokens...");
        let previous = self.state();
        self.set_state(AuthState::Refreshing);

        let mut params = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.opts.client_id.as_str()),
        ];
        if let Some(secret) = &self.opts.client_secret {
            params.push(("client_secret", secret.as_str()));
        }

        let response = match self
            .http
            .post(format!("{}/token", self.opts.id_base))
            .form(&params)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                // Unreachable endpoint, the refresh token may still be good.
                log::warn!("Could not reach the token endpoint: {}", e);
                self.set_state(previous);
                return Err(e.into());
            }
        };

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            log::error!("Failed refreshing tokens ({}): {}", status, error_text);
            self.set_state(AuthState::ReauthRequired);
            return Err(BridgeError::Auth(format!(
                "token refresh failed ({}): {}",
                status, error_text
            )));
        }

        let tokens: TokenResponse = match response.json().await {
            Ok(tokens) => tokens,
            Err(e) => {
                self.set_state(previous);
                return Err(e.into());
            }
        };
        if let Err(e) = self
            .store
            .update(|record| record.set_tokens(&tokens.access_token, &tokens.refresh_token))
        {
            self.set_state(previous);
            return Err(e);
        }
        self.set_state(AuthState::Authenticated);
        match tokens.expires_in {
            Some(secs) => log::info!("Successfully refreshed tokens, valid for {}s", secs),
            None => log::info!("Successfully refreshed tokens"),
        }

        Ok(tokens.access_token)
    }

    /// Looks up the account behind the current token and stores its id.
    pub async fn resolve_user(&self) -> Result<TwitchUser> {
        let access_token = self.access_token()?;
        let response = self
            .http
            .get(format!("{}/users", self.opts.helix_base))
            .header("Client-ID", &self.opts.client_id)
            .bearer_auth(&access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(BridgeError::Auth(format!(
                "could not resolve Twitch account ({}): {}",
                status, body
            )));
        }

        let users: UsersResponse = response.json().await?;
        let user = users
            .data
            .into_iter()
            .next()
            .ok_or_else(|| BridgeError::Auth("token does not belong to a user".to_string()))?;

        self.store
            .update(|record| record.user_id = Some(user.id.clone()))?;
        Ok(user)
    }

    /// Re-validates every `period` until validation leaves the client needing
    /// a new login. The first check runs one period after spawning.
    pub fn spawn_validation_tick(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                interval.tick().await;
                if let Err(e) = self.validate().await {
                    log::error!("Periodic token validation failed: {}", e);
                    if self.state() == AuthState::ReauthRequired {
                        log::error!("Twitch re-authentication required, restart the bot to log in again");
                        break;
                    }
                }
            }
        })
    }
}
