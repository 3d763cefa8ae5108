use std::path::PathBuf;
use std::time::Duration;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};
use url::Url;

use crate::auth::{OAuthOptions, TokenStore, DEFAULT_TOKEN_FILE};
use crate::error::Result;
use crate::strings::Strings;

#[derive(Parser, Debug, Clone)]
#[command(name = "twitch-poll-bridge")]
#[command(version)]
#[command(about = "Run Twitch polls and predictions from Discord slash commands", long_about = None)]
pub struct Config {
    /// Discord bot token (required)
    #[arg(long, env = "DISCORD_TOKEN", hide_env_values = true)]
    pub discord_token: String,

    /// Client id of the Twitch application (required)
    #[arg(long, env = "TWITCH_CLIENT_ID")]
    pub twitch_client_id: String,

    /// Client secret of the Twitch application, sent when refreshing tokens
    #[arg(long, env = "TWITCH_CLIENT_SECRET", hide_env_values = true)]
    pub twitch_client_secret: Option<String>,

    /// The only Discord channel allowed to run commands
    ///
    /// Without it every command is rejected with a hint naming the channel id.
    #[arg(long, env = "ALLOWED_CHANNEL_ID")]
    pub allowed_channel_id: Option<u64>,

    /// Reply ephemerally to rejected commands
    #[arg(long, env = "EPHEMERAL", default_value_t = false, action = ArgAction::Set, value_parser = BoolishValueParser::new())]
    pub ephemeral: bool,

    /// Where the Twitch tokens are persisted
    #[arg(long, env = "TOKEN_FILE", default_value = DEFAULT_TOKEN_FILE)]
    pub token_file: PathBuf,

    /// Built-in reply language (en, de)
    #[arg(long, env = "BOT_LOCALE", default_value = "en")]
    pub locale: String,

    /// JSON string table used instead of the built-in one
    #[arg(long, env = "STRINGS_FILE")]
    pub strings_file: Option<PathBuf>,

    /// Seconds between token polls during device authorization
    #[arg(long, env = "DEVICE_POLL_INTERVAL_SECS", default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..=60))]
    pub device_poll_interval_secs: u64,

    /// Give up on device authorization after this many seconds
    #[arg(long, env = "DEVICE_AUTH_TIMEOUT_SECS", default_value_t = 1800, value_parser = clap::value_parser!(u64).range(1..))]
    pub device_auth_timeout_secs: u64,

    /// Seconds between background token validations
    #[arg(long, env = "VALIDATION_INTERVAL_SECS", default_value_t = 3600, value_parser = clap::value_parser!(u64).range(1..))]
    pub validation_interval_secs: u64,

    /// Do not open the verification page in a browser
    #[arg(long, env = "NO_BROWSER", default_value_t = false, action = ArgAction::Set, value_parser = BoolishValueParser::new())]
    pub no_browser: bool,

    /// Keep the registered global slash commands untouched on startup
    #[arg(long, env = "SKIP_COMMAND_REGISTRATION", default_value_t = false, action = ArgAction::Set, value_parser = BoolishValueParser::new())]
    pub skip_command_registration: bool,

    /// Twitch identity provider base URL
    #[arg(long, env = "TWITCH_ID_URL", default_value = "https://id.twitch.tv/oauth2")]
    pub twitch_id_url: Url,

    /// Twitch Helix API base URL
    #[arg(long, env = "TWITCH_HELIX_URL", default_value = "https://api.twitch.tv/helix")]
    pub twitch_helix_url: Url,
}

impl Config {
    pub fn oauth_options(&self) -> OAuthOptions {
        let mut opts = OAuthOptions::new(self.twitch_client_id.clone());
        opts.client_secret = self
            .twitch_client_secret
            .clone()
            .filter(|secret| !secret.is_empty());
        opts.id_base = base_url(&self.twitch_id_url);
        opts.helix_base = base_url(&self.twitch_helix_url);
        opts.poll_interval = Duration::from_secs(self.device_poll_interval_secs);
        opts.device_timeout = Duration::from_secs(self.device_auth_timeout_secs);
        opts.open_browser = !self.no_browser;
        opts
    }

    pub fn token_store(&self) -> TokenStore {
        TokenStore::new(&self.token_file)
    }

    pub fn validation_interval(&self) -> Duration {
        Duration::from_secs(self.validation_interval_secs)
    }

    pub fn strings(&self) -> Result<Strings> {
        match &self.strings_file {
            Some(path) => Strings::from_file(path),
            None => Strings::builtin(&self.locale),
        }
    }
}

fn base_url(url: &Url) -> String {
    url.as_str().trim_end_matches('/').to_string()
}
