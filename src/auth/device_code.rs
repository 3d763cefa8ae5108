use std::time::Duration;

use reqwest::StatusCode;
use tokio::time::Instant;

use crate::auth::oauth_client::OAuthClient;
use crate::auth::token_data::{AuthState, DeviceCodeResponse, TokenResponse};
use crate::auth::SCOPES;
use crate::error::{BridgeError, Result};

const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

impl OAuthClient {
    /// Starts the device authorization grant and remembers the issued codes.
    pub async fn request_device_code(&self) -> Result<DeviceCodeResponse> {
        let scopes = SCOPES.join(" ");
        let params = [
            ("client_id", self.opts.client_id.as_str()),
            ("scopes", scopes.as_str()),
        ];
        let response = self
            .http
            .post(format!("{}/device", self.opts.id_base))
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(BridgeError::Auth(format!(
                "device authorization request failed ({}): {}",
                status, error_text
            )));
        }

        let session: DeviceCodeResponse = response.json().await?;
        self.store.update(|record| {
            record.device_code = Some(session.device_code.clone());
            record.user_code = Some(session.user_code.clone());
            record.verification_uri = Some(session.verification_uri.clone());
        })?;
        self.set_state(AuthState::PendingDeviceAuth);

        Ok(session)
    }

    pub(crate) fn present(&self, session: &DeviceCodeResponse) {
        log::info!(
            "Open {} in a browser and enter {} there!",
            session.verification_uri,
            session.user_code
        );
        if self.opts.open_browser {
            if let Err(e) = webbrowser::open(&session.verification_uri) {
                log::warn!("Failed to open browser: {}", e);
            }
        }
    }

    /// Polls the token endpoint until the operator approved the device.
    ///
    /// HTTP 400 means the authorization is still pending. Gives up after the
    /// configured timeout or the code's own lifetime, whichever ends first.
    pub async fn poll_for_token(&self, session: &DeviceCodeResponse) -> Result<()> {
        let mut timeout = self.opts.device_timeout;
        if let Some(expires_in) = session.expires_in {
            timeout = timeout.min(Duration::from_secs(expires_in));
        }
        let deadline = Instant::now() + timeout;

        let scopes = SCOPES.join(" ");
        let params = [
            ("client_id", self.opts.client_id.as_str()),
            ("scopes", scopes.as_str()),
            ("device_code", session.device_code.as_str()),
            ("grant_type", DEVICE_CODE_GRANT),
        ];

        loop {
            if Instant::now() >= deadline {
                self.set_state(AuthState::ReauthRequired);
                return Err(BridgeError::Auth(format!(
                    "device authorization was not completed within {}s",
                    timeout.as_secs()
                )));
            }
            tokio::time::sleep(self.opts.poll_interval).await;

            let response = self
                .http
                .post(format!("{}/token", self.opts.id_base))
                .form(&params)
                .send()
                .await?;

            let status = response.status();
            if status == StatusCode::BAD_REQUEST {
                log::debug!("Device authorization pending");
                continue;
            }
            if !status.is_success() {
                let error_text = response.text().await.unwrap_or_default();
                self.set_state(AuthState::ReauthRequired);
                return Err(BridgeError::Auth(format!(
                    "device token request failed ({}): {}",
                    status.as_u16(),
                    error_text
                )));
            }

            let tokens: TokenResponse = response.json().await?;
            log::debug!("Granted scopes: {}", tokens.scope.join(" "));
            self.store
                .update(|record| record.set_tokens(&tokens.access_token, &tokens.refresh_token))?;
            let user = self.resolve_user().await?;
            self.set_state(AuthState::Authenticated);
            log::info!(
                "Got Device Code Flow tokens for {} ({})",
                user.display_name,
                user.login
            );
            return Ok(());
        }
    }
}
