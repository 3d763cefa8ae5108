use std::sync::Arc;

use serenity::all::{
    Client, Command, CommandDataOption, CommandDataOptionValue, CommandInteraction, Context,
    CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse,
    EventHandler, GatewayIntents, Interaction, Ready,
};

use crate::commands::{definitions, CommandOptions, Dispatcher, OptionValue};
use crate::config::Config;
use crate::strings::{fill, CommandStrings};

pub struct Handler {
    dispatcher: Arc<Dispatcher>,
    allowed_channel_id: Option<u64>,
    ephemeral: bool,
    register_commands: bool,
}

impl Handler {
    pub fn new(config: &Config, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            allowed_channel_id: config.allowed_channel_id,
            ephemeral: config.ephemeral,
            register_commands: !config.skip_command_registration,
        }
    }

    async fn run_command(&self, ctx: &Context, command: &CommandInteraction) {
        let channel_id = command.channel_id.get();
        let strings = &self.dispatcher.strings().command;

        if let Some(reason) = channel_rejection(strings, self.allowed_channel_id, channel_id) {
            log::info!(
                "Rejected /{} from {} in channel {}",
                command.data.name,
                command.user.name,
                channel_id
            );
            let reply = CreateInteractionResponseMessage::new()
                .content(reason)
                .ephemeral(self.ephemeral);
            if let Err(e) = command
                .create_response(&ctx.http, CreateInteractionResponse::Message(reply))
                .await
            {
                log::error!("Failed to reject /{}: {}", command.data.name, e);
            }
            return;
        }

        log::info!("/{} from {}", command.data.name, command.user.name);
        // Twitch calls can exceed the three seconds Discord waits for a reply.
        if let Err(e) = command.defer(&ctx.http).await {
            log::error!("Failed to defer /{}: {}", command.data.name, e);
            return;
        }

        let options = command_options(&command.data.options);
        let content = self.dispatcher.handle(&command.data.name, &options).await;
        if let Err(e) = command
            .edit_response(&ctx.http, EditInteractionResponse::new().content(content))
            .await
        {
            log::error!("Failed to answer /{}: {}", command.data.name, e);
        }
    }
}

#[serenity::async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        log::info!("Logged in to Discord as {}", ready.user.name);
        if !self.register_commands {
            return;
        }
        match Command::set_global_commands(&ctx.http, definitions()).await {
            Ok(commands) => log::info!("Registered {} slash commands", commands.len()),
            Err(e) => log::error!("Failed to register slash commands: {}", e),
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            self.run_command(&ctx, &command).await;
        }
    }
}

/// Text explaining why `channel_id` may not run commands, if it may not.
fn channel_rejection(strings: &CommandStrings, allowed: Option<u64>, channel_id: u64) -> Option<String> {
    let channel = format!("<#{}>", channel_id);
    match allowed {
        None => Some(fill(
            &strings.no_allowed_channel,
            &[("channelId", channel_id.to_string().as_str()), ("channel", channel.as_str())],
        )),
        Some(allowed) if allowed != channel_id => Some(fill(
            &strings.channel_not_allowed,
            &[("channel", channel.as_str())],
        )),
        Some(_) => None,
    }
}

fn command_options(options: &[CommandDataOption]) -> CommandOptions {
    let mut converted = CommandOptions::new();
    for option in options {
        let value = match &option.value {
            CommandDataOptionValue::String(s) => OptionValue::String(s.clone()),
            CommandDataOptionValue::Integer(i) => OptionValue::Integer(*i),
            other => {
                log::debug!("Ignoring option {} with value {:?}", option.name, other);
                continue;
            }
        };
        converted.insert(&option.name, value);
    }
    converted
}

/// Connects to the Discord gateway and serves interactions until the client stops.
pub async fn run(config: &Config, dispatcher: Arc<Dispatcher>) -> serenity::Result<()> {
    let intents =
        GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGES | GatewayIntents::DIRECT_MESSAGES;
    let handler = Handler::new(config, dispatcher);

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .await?;
    client.start().await
}
