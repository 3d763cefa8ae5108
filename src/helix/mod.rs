//! Authenticated access to the Twitch Helix API.
//!
//! Every request goes through [`HelixClient::call`], which attaches the
//! current credentials and, on a 401, refreshes the tokens and retries once.

use std::sync::Arc;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::auth::OAuthClient;
use crate::error::{BridgeError, Result};

pub mod polls;
pub mod predictions;

pub use polls::{NewPoll, Poll, PollChoice, PollEndStatus};
pub use predictions::{
    NewPrediction, Prediction, PredictionEndStatus, PredictionOutcome, TopPredictor,
};

/// The `{ "data": [...] }` envelope Helix wraps every resource in.
#[derive(Deserialize, Debug)]
pub struct HelixResponse<T> {
    pub data: Vec<T>,
}

#[derive(Deserialize, Debug, Default)]
struct HelixErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    message: String,
}

#[derive(Clone)]
pub struct HelixClient {
    oauth: Arc<OAuthClient>,
}

impl HelixClient {
    pub fn new(oauth: Arc<OAuthClient>) -> Self {
        Self { oauth }
    }

    pub fn oauth(&self) -> &Arc<OAuthClient> {
        &self.oauth
    }

    /// The authorized account, which owns every poll and prediction we touch.
    pub fn broadcaster_id(&self) -> Result<String> {
        self.oauth.user_id()
    }

    /// Sends the request produced by `build` with the current credentials.
    ///
    /// `build` receives the HTTP client and the Helix base URL. It runs a
    /// second time only if the first attempt got a 401 and the refresh that
    /// followed succeeded; a second 401 is final.
    pub async fn call<T, F>(&self, build: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: Fn(&Client, &str) -> RequestBuilder,
    {
        let access_token = self.oauth.access_token()?;
        let mut response = self.send(&build, &access_token).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            log::info!("Helix rejected the access token, refreshing and retrying once");
            let access_token = self.oauth.refresh_after(&access_token).await?;
            response = self.send(&build, &access_token).await?;
        }

        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        Err(error_for_status(status, response).await)
    }

    async fn send<F>(&self, build: &F, access_token: &str) -> Result<Response>
    where
        F: Fn(&Client, &str) -> RequestBuilder,
    {
        let opts = self.oauth.options();
        let response = build(self.oauth.http(), &opts.helix_base)
            .header("Client-ID", &opts.client_id)
            .bearer_auth(access_token)
            .send()
            .await?;
        Ok(response)
    }
}

async fn error_for_status(status: StatusCode, response: Response) -> BridgeError {
    let text = response.text().await.unwrap_or_default();
    let body: HelixErrorBody = serde_json::from_str(&text).unwrap_or_default();
    let message = if body.message.is_empty() { text } else { body.message };

    match status {
        StatusCode::UNAUTHORIZED => BridgeError::Auth(message),
        StatusCode::NOT_FOUND => BridgeError::NotFound(message),
        _ => BridgeError::Provider {
            status: status.as_u16(),
            error: if body.error.is_empty() {
                status.canonical_reason().unwrap_or("Error").to_string()
            } else {
                body.error
            },
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{TokenRecord, TokenStore};
    use crate::test_support::{error_body, token_body, MockServer};
    use serde_json::json;
    use tempfile::tempdir;

    fn helix(server: &MockServer, path: &std::path::Path) -> HelixClient {
        let oauth = server.oauth_client(path);
        let mut record = TokenRecord::with_tokens("A", "R");
        record.user_id = Some("141981764".to_string());
        oauth.store().save(&record).unwrap();
        HelixClient::new(Arc::new(oauth))
    }

    fn users() -> serde_json::Value {
        json!({ "data": [{ "id": "141981764", "login": "twitchdev", "display_name": "TwitchDev" }] })
    }

    async fn get_users(client: &HelixClient) -> Result<serde_json::Value> {
        client
            .call(|http, base| http.get(format!("{}/users", base)))
            .await
    }

    #[tokio::test]
    async fn test_call_sends_client_id_and_bearer() {
        let server = MockServer::start();
        server.respond("GET", "/helix/users", 200, users());
        let dir = tempdir().unwrap();
        let client = helix(&server, &dir.path().join(".tokens.json"));

        let payload = get_users(&client).await.unwrap();

        assert_eq!(payload, users());
        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].header("Client-ID"), Some("test-client"));
        assert_eq!(requests[0].header("Authorization"), Some("Bearer A"));
    }

    #[tokio::test]
    async fn test_401_then_refresh_then_success_matches_direct_call() {
        let server = MockServer::start();
        server
            .respond("GET", "/helix/users", 401, error_body(401, "Unauthorized", "Invalid OAuth token"))
            .respond("GET", "/helix/users", 200, users());
        server.respond("POST", "/oauth2/token", 200, token_body("B", "R2"));
        let dir = tempdir().unwrap();
        let path = dir.path().join(".tokens.json");
        let client = helix(&server, &path);

        let payload = get_users(&client).await.unwrap();

        assert_eq!(payload, users());
        let calls = server.requests_to("GET", "/helix/users");
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].header("Authorization"), Some("Bearer A"));
        assert_eq!(calls[1].header("Authorization"), Some("Bearer B"));
        assert_eq!(server.requests_to("POST", "/oauth2/token").len(), 1);

        let persisted = TokenStore::new(&path).load().unwrap().unwrap();
        assert_eq!(persisted.tokens(), Some(("B", "R2")));
    }

    #[tokio::test]
    async fn test_new_tokens_are_on_disk_before_the_retry() {
        let server = MockServer::start();
        server
            .respond("GET", "/helix/users", 401, error_body(401, "Unauthorized", "Invalid OAuth token"))
            .respond("GET", "/helix/users", 200, users());
        server.respond("POST", "/oauth2/token", 200, token_body("B", "R2"));
        let dir = tempdir().unwrap();
        let path = dir.path().join(".tokens.json");
        let client = helix(&server, &path);
        server.watch_file(&path);

        get_users(&client).await.unwrap();

        let calls = server.requests_to("GET", "/helix/users");
        let before: serde_json::Value =
            serde_json::from_str(calls[0].watched_file.as_deref().unwrap()).unwrap();
        let at_retry: serde_json::Value =
            serde_json::from_str(calls[1].watched_file.as_deref().unwrap()).unwrap();
        assert_eq!(before["access_token"], "A");
        assert_eq!(at_retry["access_token"], "B");
        assert_eq!(at_retry["refresh_token"], "R2");
    }

    #[tokio::test]
    async fn test_second_401_is_final() {
        let server = MockServer::start();
        server.respond("GET", "/helix/users", 401, error_body(401, "Unauthorized", "Invalid OAuth token"));
        server.respond("POST", "/oauth2/token", 200, token_body("B", "R2"));
        let dir = tempdir().unwrap();
        let client = helix(&server, &dir.path().join(".tokens.json"));

        let err = get_users(&client).await.unwrap_err();

        assert!(err.is_auth());
        assert_eq!(err.to_string(), "Unauthorized: Invalid OAuth token");
        assert_eq!(server.requests_to("GET", "/helix/users").len(), 2);
        assert_eq!(server.requests_to("POST", "/oauth2/token").len(), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_is_not_retried() {
        let server = MockServer::start();
        server.respond("GET", "/helix/users", 401, error_body(401, "Unauthorized", "Invalid OAuth token"));
        server.respond("POST", "/oauth2/token", 400, error_body(400, "Bad Request", "Invalid refresh token"));
        let dir = tempdir().unwrap();
        let client = helix(&server, &dir.path().join(".tokens.json"));

        let err = get_users(&client).await.unwrap_err();

        assert!(err.is_auth());
        assert_eq!(server.requests_to("GET", "/helix/users").len(), 1);
    }

    #[tokio::test]
    async fn test_validate_401_refresh_then_call_uses_new_token() {
        let server = MockServer::start();
        server.respond("GET", "/oauth2/validate", 401, error_body(401, "Unauthorized", "invalid access token"));
        server.respond("POST", "/oauth2/token", 200, token_body("B", "R2"));
        server.respond("GET", "/helix/users", 200, users());
        let dir = tempdir().unwrap();
        let path = dir.path().join(".tokens.json");
        let client = helix(&server, &path);

        client.oauth().validate().await.unwrap();
        get_users(&client).await.unwrap();

        let calls = server.requests_to("GET", "/helix/users");
        assert_eq!(calls[0].header("Authorization"), Some("Bearer B"));
        let on_disk: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk["access_token"], "B");
        assert_eq!(on_disk["refresh_token"], "R2");
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let server = MockServer::start();
        server.respond("GET", "/helix/a", 400, error_body(400, "Bad Request", "Missing required parameter"));
        server.respond("GET", "/helix/b", 404, error_body(404, "Not Found", "poll not found"));
        server.respond("GET", "/helix/c", 429, error_body(429, "Too Many Requests", "rate limited"));
        server.respond("GET", "/helix/d", 503, error_body(503, "Service Unavailable", "down"));
        let dir = tempdir().unwrap();
        let client = helix(&server, &dir.path().join(".tokens.json"));

        let mut messages = Vec::new();
        for path in ["a", "b", "c", "d"] {
            let err = client
                .call::<serde_json::Value, _>(|http, base| http.get(format!("{}/{}", base, path)))
                .await
                .unwrap_err();
            messages.push(err.to_string());
        }

        assert_eq!(
            messages,
            vec![
                "Bad Request: Missing required parameter",
                "Not Found: poll not found",
                "Too Many Requests: rate limited",
                "Service Unavailable (503): down",
            ]
        );
        assert!(server.requests_to("POST", "/oauth2/token").is_empty());
    }

    #[tokio::test]
    async fn test_missing_tokens_fail_before_any_request() {
        let server = MockServer::start();
        let dir = tempdir().unwrap();
        let oauth = server.oauth_client(&dir.path().join(".tokens.json"));
        let client = HelixClient::new(Arc::new(oauth));

        let err = get_users(&client).await.unwrap_err();

        assert!(err.is_auth());
        assert!(server.requests().is_empty());
    }
}
