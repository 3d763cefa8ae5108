//! Localized reply texts.
//!
//! Templates contain `<placeholder>` markers that [`fill`] replaces.

use std::path::Path;

use serde::Deserialize;

use crate::error::{BridgeError, Result};

const EN: &str = include_str!("../lang/en.json");
const DE: &str = include_str!("../lang/de.json");

#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "kebab-case")]
pub struct Strings {
    pub enabled: String,
    pub disabled: String,
    pub seconds: String,
    pub error: String,
    pub error_msg: String,
    pub poll: PollStrings,
    pub prediction: PredictionStrings,
    pub command: CommandStrings,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "kebab-case")]
pub struct PollStrings {
    pub notfound: String,
    pub notcreated: String,
    pub got: String,
    pub created: String,
    pub ended: String,
    pub title: String,
    pub id: String,
    pub broadcaster: String,
    pub choices: String,
    pub choice: ChoiceStrings,
    pub channel_points_voting: String,
    pub status: String,
    pub duration: String,
    pub started_at: String,
    pub ended_at: String,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "kebab-case")]
pub struct ChoiceStrings {
    pub id: String,
    pub votes: String,
    pub channel_point_votes: String,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "kebab-case")]
pub struct PredictionStrings {
    pub notfound: String,
    pub got: String,
    pub started: String,
    pub ended: String,
    pub title: String,
    pub id: String,
    pub broadcaster: String,
    pub outcomes: String,
    pub outcome: OutcomeStrings,
    pub prediction_window: String,
    pub status: String,
    pub created_at: String,
    pub ended_at: String,
    pub locked_at: String,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "kebab-case")]
pub struct OutcomeStrings {
    pub id: String,
    pub users: String,
    pub channel_points: String,
    pub color: String,
    pub top_predictors: String,
    pub top_predictor: TopPredictorStrings,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "kebab-case")]
pub struct TopPredictorStrings {
    pub user: String,
    pub channel_points_used: String,
    pub channel_points_won: String,
}

/// Prefixes and rejections used by the command layer.
#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "kebab-case")]
pub struct CommandStrings {
    pub no_allowed_channel: String,
    pub channel_not_allowed: String,
    pub unknown_command: String,
    pub invalid_input: String,
    pub get_poll_failed: String,
    pub create_poll_failed: String,
    pub get_poll_id_failed: String,
    pub end_poll_failed: String,
    pub get_prediction_failed: String,
    pub create_prediction_failed: String,
    pub get_prediction_id_failed: String,
    pub end_prediction_failed: String,
}

impl Strings {
    /// Built-in table for `locale`; unknown locales fall back to English.
    pub fn builtin(locale: &str) -> Result<Strings> {
        let source = match locale.to_lowercase().as_str() {
            "de" | "de-de" => DE,
            "en" | "en-us" | "en-gb" => EN,
            other => {
                log::warn!("No built-in strings for locale '{}', using English", other);
                EN
            }
        };
        Ok(serde_json::from_str(source)?)
    }

    pub fn from_file(path: &Path) -> Result<Strings> {
        let contents = std::fs::read_to_string(path)?;
        serde_json::from_str(&contents).map_err(|e| {
            BridgeError::Validation(format!("invalid strings file {}: {}", path.display(), e))
        })
    }
}

/// Replaces `<key>` with its value for every pair.
pub fn fill(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |text, (key, value)| {
        text.replace(&format!("<{}>", key), value)
    })
}
