use thiserror::Error;

pub type Result<T> = std::result::Result<T, BridgeError>;

#[derive(Error, Debug)]
pub enum BridgeError {
    /// The request could not be sent or its response could not be read.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Credentials are missing, or still rejected after one refresh.
    #[error("Unauthorized: {0}")]
    Auth(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    /// Caller input rejected before anything was sent.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Any other non-2xx answer from Twitch.
    #[error("{}", provider_message(*status, error, message))]
    Provider {
        status: u16,
        error: String,
        message: String,
    },

    #[error("Token storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl BridgeError {
    pub fn is_auth(&self) -> bool {
        matches!(self, BridgeError::Auth(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BridgeError::NotFound(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, BridgeError::Validation(_))
    }
}

fn provider_message(status: u16, error: &str, message: &str) -> String {
    match status {
        400 => format!("Bad Request: {}", message),
        429 => format!("Too Many Requests: {}", message),
        _ => format!("{} ({}): {}", error, status, message),
    }
}
