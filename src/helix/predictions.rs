// https://dev.twitch.tv/docs/api/reference#get-predictions

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{BridgeError, Result};
use crate::helix::polls::check_text;
use crate::helix::{HelixClient, HelixResponse};

pub const MAX_TITLE_LEN: usize = 45;
pub const MAX_OUTCOME_LEN: usize = 25;
pub const OUTCOMES: std::ops::RangeInclusive<usize> = 2..=10;
pub const WINDOW_SECS: std::ops::RangeInclusive<u32> = 30..=1800;

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct Prediction {
    pub id: String,
    pub broadcaster_id: String,
    pub broadcaster_name: String,
    pub title: String,
    pub winning_outcome_id: Option<String>,
    pub outcomes: Vec<PredictionOutcome>,
    pub prediction_window: u32,
    pub status: String,
    pub created_at: Option<String>,
    pub ended_at: Option<String>,
    pub locked_at: Option<String>,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct PredictionOutcome {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub users: u64,
    #[serde(default)]
    pub channel_points: u64,
    /// Twitch sends `null` until someone predicted.
    #[serde(default)]
    pub top_predictors: Option<Vec<TopPredictor>>,
    pub color: String,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct TopPredictor {
    pub user_id: String,
    pub user_name: String,
    #[serde(default)]
    pub channel_points_used: u64,
    #[serde(default)]
    pub channel_points_won: Option<u64>,
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PredictionEndStatus {
    /// A winning outcome was chosen and the points were paid out.
    Resolved,
    /// The prediction was canceled and the points refunded.
    Canceled,
    /// Viewers can no longer predict.
    Locked,
}

impl std::str::FromStr for PredictionEndStatus {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "RESOLVED" => Ok(PredictionEndStatus::Resolved),
            "CANCELED" => Ok(PredictionEndStatus::Canceled),
            "LOCKED" => Ok(PredictionEndStatus::Locked),
            other => Err(BridgeError::Validation(format!(
                "unknown prediction status '{}'",
                other
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewPrediction {
    pub title: String,
    pub outcomes: Vec<String>,
    pub window_secs: u32,
}

impl NewPrediction {
    pub fn validate(&self) -> Result<()> {
        check_text("prediction title", &self.title, MAX_TITLE_LEN)?;
        if !OUTCOMES.contains(&self.outcomes.len()) {
            return Err(BridgeError::Validation(format!(
                "a prediction needs {} to {} outcomes, got {}",
                OUTCOMES.start(),
                OUTCOMES.end(),
                self.outcomes.len()
            )));
        }
        for outcome in &self.outcomes {
            check_text("prediction outcome", outcome, MAX_OUTCOME_LEN)?;
        }
        if !WINDOW_SECS.contains(&self.window_secs) {
            return Err(BridgeError::Validation(format!(
                "prediction window must be between {} and {} seconds, got {}",
                WINDOW_SECS.start(),
                WINDOW_SECS.end(),
                self.window_secs
            )));
        }
        Ok(())
    }
}

impl HelixClient {
    /// The most recent prediction of the broadcaster.
    pub async fn get_prediction(&self) -> Result<Prediction> {
        let broadcaster_id = self.broadcaster_id()?;
        let response: HelixResponse<Prediction> = self
            .call(|http, base| {
                http.get(format!("{}/predictions", base))
                    .query(&[("broadcaster_id", broadcaster_id.as_str())])
            })
            .await?;
        response
            .data
            .into_iter()
            .next()
            .ok_or_else(|| BridgeError::NotFound("no prediction found".to_string()))
    }

    pub async fn get_prediction_id(&self) -> Result<String> {
        self.get_prediction().await.map(|prediction| prediction.id)
    }

    // https://dev.twitch.tv/docs/api/reference#create-prediction
    pub async fn create_prediction(&self, prediction: &NewPrediction) -> Result<Prediction> {
        prediction.validate()?;
        let broadcaster_id = self.broadcaster_id()?;
        let body = json!({
            "broadcaster_id": broadcaster_id,
            "title": prediction.title,
            "outcomes": prediction.outcomes.iter().map(|title| json!({ "title": title })).collect::<Vec<_>>(),
            "prediction_window": prediction.window_secs,
        });

        let response: HelixResponse<Prediction> = self
            .call(|http, base| http.post(format!("{}/predictions", base)).json(&body))
            .await?;
        response.data.into_iter().next().ok_or_else(|| BridgeError::Provider {
            status: 200,
            error: "Empty Response".to_string(),
            message: "Twitch did not return the created prediction".to_string(),
        })
    }

    // https://dev.twitch.tv/docs/api/reference#end-prediction
    pub async fn end_prediction(
        &self,
        prediction_id: &str,
        status: PredictionEndStatus,
        winning_outcome_id: Option<&str>,
    ) -> Result<Prediction> {
        if status == PredictionEndStatus::Resolved && winning_outcome_id.is_none() {
            return Err(BridgeError::Validation(
                "a winning outcome id is required to resolve a prediction".to_string(),
            ));
        }
        let broadcaster_id = self.broadcaster_id()?;
        let mut body = json!({
            "broadcaster_id": broadcaster_id,
            "id": prediction_id,
            "status": status,
        });
        if let Some(outcome_id) = winning_outcome_id {
            body["winning_outcome_id"] = json!(outcome_id);
        }

        let response: HelixResponse<Prediction> = self
            .call(|http, base| http.patch(format!("{}/predictions", base)).json(&body))
            .await?;
        response
            .data
            .into_iter()
            .next()
            .ok_or_else(|| BridgeError::NotFound("no prediction found".to_string()))
    }
}
