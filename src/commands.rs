use std::collections::HashMap;

use serenity::all::{CommandOptionType, CreateCommand, CreateCommandOption};

use crate::error::{BridgeError, Result};
use crate::helix::{HelixClient, NewPoll, NewPrediction, PollEndStatus, PredictionEndStatus};
use crate::render::{render_poll, render_prediction, PollView, PredictionView};
use crate::strings::{fill, Strings};

#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    String(String),
    Integer(i64),
}

/// Option values of one slash command invocation, keyed by option name.
#[derive(Debug, Clone, Default)]
pub struct CommandOptions(HashMap<String, OptionValue>);

impl CommandOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: OptionValue) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: OptionValue) {
        self.0.insert(name.to_string(), value);
    }

    fn string(&self, name: &str) -> Option<&str> {
        match self.0.get(name) {
            Some(OptionValue::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    fn integer(&self, name: &str) -> Option<i64> {
        match self.0.get(name) {
            Some(OptionValue::Integer(i)) => Some(*i),
            _ => None,
        }
    }

    fn required_string(&self, name: &str) -> Result<&str> {
        self.string(name)
            .ok_or_else(|| BridgeError::Validation(format!("missing option '{}'", name)))
    }

    fn required_integer(&self, name: &str) -> Result<i64> {
        self.integer(name)
            .ok_or_else(|| BridgeError::Validation(format!("missing option '{}'", name)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SlashCommand {
    GetPoll,
    CreatePoll(NewPoll),
    EndPoll(PollEndStatus),
    GetPrediction,
    CreatePrediction(NewPrediction),
    EndPrediction {
        status: PredictionEndStatus,
        winning_outcome_id: Option<String>,
    },
}

impl SlashCommand {
    /// Builds a command from its Discord name and options.
    /// Returns `Ok(None)` for names this bot does not handle.
    pub fn parse(name: &str, options: &CommandOptions) -> Result<Option<SlashCommand>> {
        let command = match name {
            "getpoll" => SlashCommand::GetPoll,
            "poll" => SlashCommand::CreatePoll(NewPoll {
                title: options.required_string("title")?.trim().to_string(),
                choices: split_list(options.required_string("choices")?),
                duration_secs: duration_secs(options)?,
                channel_points_per_vote: match options.integer("channelpoints") {
                    Some(points) => Some(to_u32("channelpoints", points)?),
                    None => None,
                },
            }),
            "endpoll" => SlashCommand::EndPoll(first_word(options.required_string("status")?).parse()?),
            "getprediction" => SlashCommand::GetPrediction,
            "prediction" => SlashCommand::CreatePrediction(NewPrediction {
                title: options.required_string("title")?.trim().to_string(),
                outcomes: split_list(options.required_string("outcomes")?),
                window_secs: duration_secs(options)?,
            }),
            "endprediction" => SlashCommand::EndPrediction {
                status: first_word(options.required_string("status")?).parse()?,
                winning_outcome_id: options
                    .string("winning_outcome_id")
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(str::to_string),
            },
            _ => return Ok(None),
        };
        Ok(Some(command))
    }
}

/// `"a; b;;c"` -> `["a", "b", "c"]`
fn split_list(list: &str) -> Vec<String> {
    list.split(';')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

// Status values never contain spaces, but a pasted label might.
fn first_word(value: &str) -> &str {
    value.trim().split(' ').next().unwrap_or("")
}

fn duration_secs(options: &CommandOptions) -> Result<u32> {
    let duration = options.required_integer("duration")?;
    let multiplier = match options.string("unit") {
        Some(unit) if unit.eq_ignore_ascii_case("minutes") => 60,
        _ => 1,
    };
    to_u32("duration", duration.saturating_mul(multiplier))
}

fn to_u32(name: &str, value: i64) -> Result<u32> {
    u32::try_from(value).map_err(|_| {
        BridgeError::Validation(format!(
            "'{}' must be between 0 and {}, got {}",
            name,
            u32::MAX,
            value
        ))
    })
}

/// Runs slash commands against Twitch and phrases the outcome for Discord.
pub struct Dispatcher {
    helix: HelixClient,
    strings: Strings,
}

impl Dispatcher {
    pub fn new(helix: HelixClient, strings: Strings) -> Self {
        Self { helix, strings }
    }

    pub fn strings(&self) -> &Strings {
        &self.strings
    }

    /// Parses and runs one invocation; every failure becomes reply text.
    pub async fn handle(&self, name: &str, options: &CommandOptions) -> String {
        match SlashCommand::parse(name, options) {
            Ok(Some(command)) => self.execute(command).await,
            Ok(None) => fill(&self.strings.command.unknown_command, &[("command", name)]),
            Err(e) => format!("{}: {}", self.strings.command.invalid_input, e),
        }
    }

    pub async fn execute(&self, command: SlashCommand) -> String {
        let c = &self.strings.command;
        log::info!("Executing {:?}", command);

        match command {
            SlashCommand::GetPoll => match self.helix.get_poll().await {
                Ok(poll) => render_poll(&poll, PollView::Got, &self.strings),
                Err(e) => self.poll_error(&c.get_poll_failed, e),
            },
            SlashCommand::CreatePoll(poll) => match self.helix.create_poll(&poll).await {
                Ok(poll) => render_poll(&poll, PollView::Created, &self.strings),
                Err(e) if e.is_not_found() => self.strings.poll.notcreated.clone(),
                Err(e) => self.poll_error(&c.create_poll_failed, e),
            },
            SlashCommand::EndPoll(status) => {
                let poll_id = match self.helix.get_poll_id().await {
                    Ok(id) => id,
                    Err(e) => return self.poll_error(&c.get_poll_id_failed, e),
                };
                match self.helix.end_poll(&poll_id, status).await {
                    Ok(poll) => render_poll(&poll, PollView::Ended, &self.strings),
                    Err(e) => self.poll_error(&c.end_poll_failed, e),
                }
            }
            SlashCommand::GetPrediction => match self.helix.get_prediction().await {
                Ok(prediction) => render_prediction(&prediction, PredictionView::Got, &self.strings),
                Err(e) => self.prediction_error(&c.get_prediction_failed, e),
            },
            SlashCommand::CreatePrediction(prediction) => {
                match self.helix.create_prediction(&prediction).await {
                    Ok(prediction) => {
                        render_prediction(&prediction, PredictionView::Started, &self.strings)
                    }
                    Err(e) => self.prediction_error(&c.create_prediction_failed, e),
                }
            }
            SlashCommand::EndPrediction {
                status,
                winning_outcome_id,
            } => {
                let prediction_id = match self.helix.get_prediction_id().await {
                    Ok(id) => id,
                    Err(e) => return self.prediction_error(&c.get_prediction_id_failed, e),
                };
                match self
                    .helix
                    .end_prediction(&prediction_id, status, winning_outcome_id.as_deref())
                    .await
                {
                    Ok(prediction) => {
                        render_prediction(&prediction, PredictionView::Ended, &self.strings)
                    }
                    Err(e) => self.prediction_error(&c.end_prediction_failed, e),
                }
            }
        }
    }

    fn poll_error(&self, context: &str, e: BridgeError) -> String {
        if e.is_not_found() {
            return self.strings.poll.notfound.clone();
        }
        self.failure(context, e)
    }

    fn prediction_error(&self, context: &str, e: BridgeError) -> String {
        if e.is_not_found() {
            return self.strings.prediction.notfound.clone();
        }
        self.failure(context, e)
    }

    fn failure(&self, context: &str, e: BridgeError) -> String {
        log::warn!("{}: {}", context, e);
        match e {
            // Twitch explained itself, show its error and message as-is.
            BridgeError::Provider { error, message, .. } => format!(
                "{}\n{}: {}\n{}: {}",
                context, self.strings.error, error, self.strings.error_msg, message
            ),
            e => format!("{}: {}", context, e),
        }
    }
}

fn unit_option() -> CreateCommandOption {
    CreateCommandOption::new(CommandOptionType::String, "unit", "Which unit to use for the duration")
        .name_localized("de", "einheit")
        .description_localized("de", "Welche Einheit soll für die Dauer genutzt werden")
        .add_string_choice_localized("Minutes", "minutes", [("de", "Minuten")])
        .add_string_choice_localized("Seconds", "seconds", [("de", "Sekunden")])
        .required(false)
}

/// The global slash commands this bot registers.
pub fn definitions() -> Vec<CreateCommand> {
    vec![
        CreateCommand::new("getpoll")
            .name_localized("de", "umfrageabrufen")
            .description("Get information about the most recent poll in the authorized Twitch channel")
            .description_localized("de", "Informationen über die letzte Umfrage des authorisierten Twitch-Kanals abrufen"),
        CreateCommand::new("poll")
            .name_localized("de", "umfrage")
            .description("Create a poll in the authorized Twitch channel")
            .description_localized("de", "Eine Umfrage im authorisierten Twitch-Kanal erstellen")
            .add_option(
                CreateCommandOption::new(CommandOptionType::String, "title", "Title displayed in the poll")
                    .name_localized("de", "frage")
                    .description_localized("de", "Der Titel, der in der Umfrage angezeigt werden soll")
                    .required(true),
            )
            .add_option(
                CreateCommandOption::new(CommandOptionType::String, "choices", "List of the poll choices (separated by semicolon)")
                    .name_localized("de", "antworten")
                    .description_localized("de", "Eine Liste an Antwortmöglichkeiten (getrennt durch Strichpunkte/Semikolon)")
                    .required(true),
            )
            .add_option(
                CreateCommandOption::new(CommandOptionType::Integer, "duration", "Total duration for the poll (Default: in seconds)")
                    .name_localized("de", "dauer")
                    .description_localized("de", "Gesamtdauer der Umfrage (Standardmäßig in Sekunden)")
                    .required(true),
            )
            .add_option(unit_option())
            .add_option(
                CreateCommandOption::new(CommandOptionType::Integer, "channelpoints", "Number of Channel Points required to vote once with Channel Points")
                    .name_localized("de", "kanalpunkte")
                    .description_localized("de", "Anzahl der Kanalpunkte, die für eine Stimme mit Kanalpunkten benötigt wird")
                    .min_int_value(1)
                    .max_int_value(1_000_000)
                    .required(false),
            ),
        CreateCommand::new("endpoll")
            .name_localized("de", "umfragebeenden")
            .description("End the poll that is currently active")
            .description_localized("de", "Die Umfrage, die aktuell läuft, beenden")
            .add_option(
                CreateCommandOption::new(CommandOptionType::String, "status", "The poll status to be set")
                    .name_localized("de", "status")
                    .description_localized("de", "Der Status, auf den die Umfrage gesetzt werden soll")
                    .add_string_choice_localized(
                        "Terminated (End the poll manually, but allow it to be viewed publicly)",
                        "TERMINATED",
                        [("de", "Beendet (Umfrage manuell beenden, aber öffentlich sichtbar lassen)")],
                    )
                    .add_string_choice_localized(
                        "Archived (End the poll manually and do not allow it to be viewed publicly)",
                        "ARCHIVED",
                        [("de", "Archiviert (Umfrage manuell beenden und auf privat stellen)")],
                    )
                    .required(true),
            ),
        CreateCommand::new("getprediction")
            .name_localized("de", "vorhersageabrufen")
            .description("Get information about the most recent prediction in the authorized Twitch channel")
            .description_localized("de", "Informationen über die letzte Vorhersage des authorisierten Twitch-Kanals abrufen"),
        CreateCommand::new("prediction")
            .name_localized("de", "vorhersage")
            .description("Create a prediction in the authorized Twitch channel")
            .description_localized("de", "Eine Vorhersage im authorisierten Twitch-Kanal erstellen")
            .add_option(
                CreateCommandOption::new(CommandOptionType::String, "title", "Title for the prediction")
                    .name_localized("de", "titel")
                    .description_localized("de", "Titel für die Vorhersage")
                    .required(true),
            )
            .add_option(
                CreateCommandOption::new(CommandOptionType::String, "outcomes", "List of the outcomes (separated by semicolon)")
                    .name_localized("de", "ergebnisse")
                    .description_localized("de", "Liste der möglichen Ergebnisse (getrennt durch Strichpunkte/Semikolon)")
                    .required(true),
            )
            .add_option(
                CreateCommandOption::new(CommandOptionType::Integer, "duration", "Total duration for the prediction (Default: in seconds)")
                    .name_localized("de", "dauer")
                    .description_localized("de", "Gesamtdauer der Vorhersage (Standardmäßig in Sekunden)")
                    .required(true),
            )
            .add_option(unit_option()),
        CreateCommand::new("endprediction")
            .name_localized("de", "vorhersagebeenden")
            .description("Lock, resolve, or cancel a prediction")
            .description_localized("de", "Eine Vorhersage sperren, auflösen oder abbrechen")
            .add_option(
                CreateCommandOption::new(CommandOptionType::String, "status", "The prediction status to be set")
                    .name_localized("de", "status")
                    .description_localized("de", "Der Status, auf den die Vorhersage gesetzt werden soll")
                    .add_string_choice_localized(
                        "Resolved (A winning outcome has been chosen and the Channel Points have been distributed)",
                        "RESOLVED",
                        [("de", "Aufgelöst (Ein Gewinner wurde ausgewählt und die Kanalpunkte wurden verteilt)")],
                    )
                    .add_string_choice_localized(
                        "Canceled (The prediction has been canceled and the Channel Points have been refunded)",
                        "CANCELED",
                        [("de", "Abgebrochen (Die Vorhersage wurde abgebrochen und die Kanalpunkte wurden zurückerstattet)")],
                    )
                    .add_string_choice_localized(
                        "Locked (The prediction has been locked and viewers can no longer make predictions)",
                        "LOCKED",
                        [("de", "Gesperrt (Die Vorhersage wurde gesperrt und Zuschauer können nicht länger vorhersagen)")],
                    )
                    .required(true),
            )
            .add_option(
                CreateCommandOption::new(CommandOptionType::String, "winning_outcome_id", "ID of the winning outcome for the prediction (Required if status is \"Resolved\")")
                    .name_localized("de", "gewinnendes_ergebnis_id")
                    .description_localized("de", "ID des Ergebnisses, welches die Vorhersage gewinnen soll (Erforderlich, wenn status \"Aufgelöst\" ist)")
                    .required(false),
            ),
    ]
}
