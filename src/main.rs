use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use twitch_poll_bridge_lib::auth::OAuthClient;
use twitch_poll_bridge_lib::commands::Dispatcher;
use twitch_poll_bridge_lib::config::Config;
use twitch_poll_bridge_lib::discord;
use twitch_poll_bridge_lib::helix::HelixClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();
    let strings = config.strings().context("Failed to load reply strings")?;

    let oauth = Arc::new(OAuthClient::new(config.oauth_options(), config.token_store()));
    oauth
        .acquire()
        .await
        .context("Failed to authorize with Twitch")?;
    let _validation = oauth.clone().spawn_validation_tick(config.validation_interval());

    let dispatcher = Arc::new(Dispatcher::new(HelixClient::new(oauth), strings));
    discord::run(&config, dispatcher)
        .await
        .context("Discord client stopped")?;
    Ok(())
}
