use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("unable to find a control for action '{0}'")]
    UnknownControl(String),
    #[error("cannot disarm without a configured disarm code")]
    MissingDisarmCode,
    #[error("invalid arm/disarm code")]
    InvalidCode,
    #[error("invalid control payload: {0}")]
    Decode(String),
}

impl ControlError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownControl(_) => "unknown_control",
            Self::MissingDisarmCode => "missing_disarm_code",
            Self::InvalidCode => "invalid_code",
            Self::Decode(_) => "decode",
        }
    }
}

#[derive(Debug, Error)]
pub enum EventDecodeError {
    #[error("panel line is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("panel line is not a JSON object")]
    NotAnObject,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting '{0}'")]
    Missing(&'static str),
    #[error("invalid setting '{name}': {message}")]
    Invalid { name: &'static str, message: String },
}
