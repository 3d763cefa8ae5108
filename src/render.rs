//! Turns Helix payloads into Discord message text.

use chrono::DateTime;

use crate::helix::{Poll, Prediction, PredictionOutcome};
use crate::strings::{fill, Strings};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollView {
    Got,
    Created,
    Ended,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PredictionView {
    Got,
    Started,
    Ended,
}

/// Discord's `<t:UNIX:T>` markup for an RFC 3339 time, `-` when absent.
pub fn discord_timestamp(twitch_time: Option<&str>) -> String {
    match twitch_time.map(DateTime::parse_from_rfc3339) {
        Some(Ok(time)) => format!("<t:{}:T>", time.timestamp()),
        Some(Err(e)) => {
            log::debug!("Unparsable Twitch timestamp {:?}: {}", twitch_time, e);
            "-".to_string()
        }
        None => "-".to_string(),
    }
}

pub fn render_poll(poll: &Poll, view: PollView, strings: &Strings) -> String {
    let s = &strings.poll;
    let header = match view {
        PollView::Got => &s.got,
        PollView::Created => &s.created,
        PollView::Ended => &s.ended,
    };
    let channel_points_voting = if poll.channel_points_voting_enabled {
        &strings.enabled
    } else {
        &strings.disabled
    };

    let mut choices = Vec::new();
    for choice in &poll.choices {
        choices.push(format!("> {}", choice.title));
        choices.push(format!("> > {}: {}", s.choice.id, choice.id));
        // A fresh poll has no votes to show yet.
        if view != PollView::Created {
            choices.push(format!("> > {}: {}", s.choice.votes, choice.votes));
            choices.push(format!(
                "> > {}: {}",
                s.choice.channel_point_votes, choice.channel_points_votes
            ));
        }
    }

    let mut response = vec![
        fill(header, &[("title", poll.title.as_str())]),
        format!("{}: {}", s.title, poll.title),
        format!("{}: {}", s.id, poll.id),
        format!("{}: {}", s.broadcaster, poll.broadcaster_name),
        format!("{}:\n{}", s.choices, choices.join("\n")),
        fill(
            &s.channel_points_voting,
            &[("channelPointsVoting", channel_points_voting.as_str())],
        ),
        format!("{}: {}", s.status, poll.status),
        format!("{}: {} {}", s.duration, poll.duration, strings.seconds),
        fill(
            &s.started_at,
            &[("startedAt", discord_timestamp(poll.started_at.as_deref()).as_str())],
        ),
    ];
    if view == PollView::Ended {
        response.push(fill(
            &s.ended_at,
            &[("endedAt", discord_timestamp(poll.ended_at.as_deref()).as_str())],
        ));
    }
    response.join("\n")
}

fn render_outcome(outcome: &PredictionOutcome, detailed: bool, strings: &Strings) -> Vec<String> {
    let s = &strings.prediction.outcome;
    let mut lines = vec![
        format!("> {}", outcome.title),
        format!("> > {}: {}", s.id, outcome.id),
    ];
    if detailed {
        lines.push(format!("> > {}: {}", s.users, outcome.users));
        lines.push(format!("> > {}: {}", s.channel_points, outcome.channel_points));
    }
    lines.push(format!("> > {}: {}", s.color, outcome.color));
    if detailed {
        lines.push(format!("> > {}:", s.top_predictors));
        for predictor in outcome.top_predictors.iter().flatten() {
            lines.push(format!(
                "> > > {}: {} ({})",
                s.top_predictor.user, predictor.user_name, predictor.user_id
            ));
            lines.push(format!(
                "> > > > {}: {}",
                s.top_predictor.channel_points_used, predictor.channel_points_used
            ));
            lines.push(format!(
                "> > > > {}: {}",
                s.top_predictor.channel_points_won,
                predictor.channel_points_won.unwrap_or(0)
            ));
        }
    }
    lines
}

pub fn render_prediction(prediction: &Prediction, view: PredictionView, strings: &Strings) -> String {
    let s = &strings.prediction;
    let header = match view {
        PredictionView::Got => &s.got,
        PredictionView::Started => &s.started,
        PredictionView::Ended => &s.ended,
    };
    let detailed = view != PredictionView::Started;
    let outcomes: Vec<String> = prediction
        .outcomes
        .iter()
        .flat_map(|outcome| render_outcome(outcome, detailed, strings))
        .collect();

    let mut response = vec![
        fill(header, &[("title", prediction.title.as_str())]),
        format!("{}: {}", s.title, prediction.title),
        format!("{}: {}", s.id, prediction.id),
        format!("{}: {}", s.broadcaster, prediction.broadcaster_name),
        format!("{}:\n{}", s.outcomes, outcomes.join("\n")),
        format!(
            "{}: {} {}",
            s.prediction_window, prediction.prediction_window, strings.seconds
        ),
        format!("{}: {}", s.status, prediction.status),
        fill(
            &s.created_at,
            &[("createdAt", discord_timestamp(prediction.created_at.as_deref()).as_str())],
        ),
    ];
    if detailed {
        response.push(fill(
            &s.ended_at,
            &[("endedAt", discord_timestamp(prediction.ended_at.as_deref()).as_str())],
        ));
        response.push(fill(
            &s.locked_at,
            &[("lockedAt", discord_timestamp(prediction.locked_at.as_deref()).as_str())],
        ));
    }
    response.join("\n")
}
