pub mod auth_storage;
pub mod device_code;
pub mod oauth_client;
pub mod token_data;

pub use auth_storage::TokenStore;
pub use oauth_client::{OAuthClient, OAuthOptions};
pub use token_data::{AuthState, DeviceCodeResponse, TokenRecord, TwitchUser};

// Scopes needed to manage polls and predictions on the authorized channel
pub const SCOPES: [&str; 2] = ["channel:manage:polls", "channel:manage:predictions"];
pub const DEFAULT_TOKEN_FILE: &str = ".tokens.json";
