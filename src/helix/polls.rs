// https://dev.twitch.tv/docs/api/reference#get-polls

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{BridgeError, Result};
use crate::helix::{HelixClient, HelixResponse};

pub const MAX_TITLE_LEN: usize = 60;
pub const MAX_CHOICE_LEN: usize = 25;
pub const CHOICES: std::ops::RangeInclusive<usize> = 2..=5;
pub const DURATION_SECS: std::ops::RangeInclusive<u32> = 15..=1800;
pub const CHANNEL_POINTS_PER_VOTE: std::ops::RangeInclusive<u32> = 1..=1_000_000;

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct Poll {
    pub id: String,
    pub broadcaster_id: String,
    pub broadcaster_name: String,
    pub title: String,
    pub choices: Vec<PollChoice>,
    #[serde(default)]
    pub channel_points_voting_enabled: bool,
    #[serde(default)]
    pub channel_points_per_vote: u32,
    pub status: String,
    pub duration: u32,
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct PollChoice {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub votes: u64,
    #[serde(default)]
    pub channel_points_votes: u64,
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PollEndStatus {
    /// Ends the poll but keeps it publicly visible.
    Terminated,
    /// Ends the poll and hides it.
    Archived,
}

impl std::str::FromStr for PollEndStatus {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "TERMINATED" => Ok(PollEndStatus::Terminated),
            "ARCHIVED" => Ok(PollEndStatus::Archived),
            other => Err(BridgeError::Validation(format!("unknown poll status '{}'", other))),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewPoll {
    pub title: String,
    pub choices: Vec<String>,
    pub duration_secs: u32,
    /// Channel points needed for each extra vote; `None` disables point voting.
    pub channel_points_per_vote: Option<u32>,
}

impl NewPoll {
    pub fn validate(&self) -> Result<()> {
        check_text("poll title", &self.title, MAX_TITLE_LEN)?;
        if !CHOICES.contains(&self.choices.len()) {
            return Err(BridgeError::Validation(format!(
                "a poll needs {} to {} choices, got {}",
                CHOICES.start(),
                CHOICES.end(),
                self.choices.len()
            )));
        }
        for choice in &self.choices {
            check_text("poll choice", choice, MAX_CHOICE_LEN)?;
        }
        if !DURATION_SECS.contains(&self.duration_secs) {
            return Err(BridgeError::Validation(format!(
                "poll duration must be between {} and {} seconds, got {}",
                DURATION_SECS.start(),
                DURATION_SECS.end(),
                self.duration_secs
            )));
        }
        if let Some(points) = self.channel_points_per_vote {
            if !CHANNEL_POINTS_PER_VOTE.contains(&points) {
                return Err(BridgeError::Validation(format!(
                    "channel points per vote must be between {} and {}, got {}",
                    CHANNEL_POINTS_PER_VOTE.start(),
                    CHANNEL_POINTS_PER_VOTE.end(),
                    points
                )));
            }
        }
        Ok(())
    }
}

pub(crate) fn check_text(what: &str, text: &str, max_len: usize) -> Result<()> {
    let len = text.chars().count();
    if len == 0 || len > max_len {
        return Err(BridgeError::Validation(format!(
            "{} must be 1 to {} characters, got {}",
            what, max_len, len
        )));
    }
    Ok(())
}

fn first<T>(response: HelixResponse<T>, what: &str) -> Result<T> {
    response
        .data
        .into_iter()
        .next()
        .ok_or_else(|| BridgeError::NotFound(what.to_string()))
}

impl HelixClient {
    /// The most recent poll of the broadcaster.
    pub async fn get_poll(&self) -> Result<Poll> {
        let broadcaster_id = self.broadcaster_id()?;
        let response: HelixResponse<Poll> = self
            .call(|http, base| {
                http.get(format!("{}/polls", base))
                    .query(&[("broadcaster_id", broadcaster_id.as_str())])
            })
            .await?;
        first(response, "no poll found")
    }

    pub async fn get_poll_id(&self) -> Result<String> {
        self.get_poll().await.map(|poll| poll.id)
    }

    // https://dev.twitch.tv/docs/api/reference#create-poll
    pub async fn create_poll(&self, poll: &NewPoll) -> Result<Poll> {
        poll.validate()?;
        let broadcaster_id = self.broadcaster_id()?;
        let body = json!({
            "broadcaster_id": broadcaster_id,
            "title": poll.title,
            "choices": poll.choices.iter().map(|title| json!({ "title": title })).collect::<Vec<_>>(),
            "duration": poll.duration_secs,
            "channel_points_voting_enabled": poll.channel_points_per_vote.is_some(),
            "channel_points_per_vote": poll.channel_points_per_vote,
        });

        let response: HelixResponse<Poll> = self
            .call(|http, base| http.post(format!("{}/polls", base)).json(&body))
            .await?;
        first(response, "Twitch did not return the created poll")
    }

    // https://dev.twitch.tv/docs/api/reference#end-poll
    pub async fn end_poll(&self, poll_id: &str, status: PollEndStatus) -> Result<Poll> {
        let broadcaster_id = self.broadcaster_id()?;
        let body = json!({
            "broadcaster_id": broadcaster_id,
            "id": poll_id,
            "status": status,
        });

        let response: HelixResponse<Poll> = self
            .call(|http, base| http.patch(format!("{}/polls", base)).json(&body))
            .await?;
        first(response, "no poll found")
    }
}
