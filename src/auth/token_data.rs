use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Copy)]
pub enum AuthState {
    Unauthenticated,
    PendingDeviceAuth,
    Authenticated,
    Refreshing,
    ReauthRequired,
}

/// Everything persisted in the token file.
///
/// The access and refresh token are only ever set or cleared together.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct TokenRecord {
    access_token: Option<String>,
    refresh_token: Option<String>,

    /// Twitch user id of the authorized account, used as `broadcaster_id`.
    pub user_id: Option<String>,

    pub device_code: Option<String>,
    pub user_code: Option<String>,
    pub verification_uri: Option<String>,
}

impl TokenRecord {
    pub fn with_tokens(access_token: &str, refresh_token: &str) -> Self {
        let mut record = TokenRecord::default();
        record.set_tokens(access_token, refresh_token);
        record
    }

    pub fn tokens(&self) -> Option<(&str, &str)> {
        match (&self.access_token, &self.refresh_token) {
            (Some(access), Some(refresh)) => Some((access.as_str(), refresh.as_str())),
            _ => None,
        }
    }

    pub fn access_token(&self) -> Option<&str> {
        self.tokens().map(|(access, _)| access)
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.tokens().map(|(_, refresh)| refresh)
    }

    pub fn is_authenticated(&self) -> bool {
        self.tokens().is_some()
    }

    pub fn set_tokens(&mut self, access_token: &str, refresh_token: &str) {
        self.access_token = Some(access_token.to_string());
        self.refresh_token = Some(refresh_token.to_string());
    }

    pub fn clear_tokens(&mut self) {
        self.access_token = None;
        self.refresh_token = None;
    }

    /// Drops a half-present token pair. Returns true if anything was dropped.
    pub(crate) fn normalize(&mut self) -> bool {
        if self.access_token.is_some() != self.refresh_token.is_some() {
            self.clear_tokens();
            return true;
        }
        false
    }
}

/// Answer of the device authorization endpoint.
#[derive(Deserialize, Clone, Debug)]
pub struct DeviceCodeResponse {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Answer of the token endpoint for both device-code and refresh grants.
#[derive(Deserialize, Clone, Debug)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Vec<String>,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct TwitchUser {
    pub id: String,
    pub login: String,
    pub display_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_are_a_pair() {
        let mut record = TokenRecord::with_tokens("A", "R");
        assert_eq!(record.tokens(), Some(("A", "R")));
        assert!(record.is_authenticated());

        record.clear_tokens();
        assert_eq!(record.access_token(), None);
        assert_eq!(record.refresh_token(), None);
        assert!(!record.is_authenticated());
    }

    #[test]
    fn test_half_pair_is_normalized_away() {
        let mut record: TokenRecord = serde_json::from_str(
            r#"{"access_token":"A","refresh_token":null,"user_id":"42"}"#,
        )
        .unwrap();
        assert!(record.normalize());
        assert_eq!(record.tokens(), None);
        assert_eq!(record.user_id.as_deref(), Some("42"));

        let mut complete = TokenRecord::with_tokens("A", "R");
        assert!(!complete.normalize());
        assert!(complete.is_authenticated());
    }

    #[test]
    fn test_file_format_uses_flat_field_names() {
        let mut record = TokenRecord::with_tokens("A", "R");
        record.user_id = Some("42".to_string());
        let json: serde_json::Value = serde_json::to_value(&record).unwrap();

        assert_eq!(json["access_token"], "A");
        assert_eq!(json["refresh_token"], "R");
        assert_eq!(json["user_id"], "42");
        assert!(json["device_code"].is_null());
        assert!(json["user_code"].is_null());
        assert!(json["verification_uri"].is_null());
    }
}
