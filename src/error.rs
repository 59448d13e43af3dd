use thiserror::Error;

/// Errors from the frame codec (C1): framing and body decode failures.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame truncated: need {needed} bytes, have {have}")]
    Truncated { needed: usize, have: usize },
    #[error("body length {0} outside [1, 100000]")]
    BodyLengthOutOfRange(u32),
    #[error("frame body is not valid UTF-8 JSON: {0}")]
    BodyNotJson(#[from] serde_json::Error),
}

/// Errors from loading the configuration surface (C9/C12).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config directory {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("config file {path} is missing required field `{field}`")]
    MissingField { path: String, field: String },
    #[error("failed to parse config file {path}: {message}")]
    Parse { path: String, message: String },
    #[error("no AGV config files found in {0}")]
    NoAgvConfigs(String),
}

impl ConfigError {
    /// Classifies a config-file deserialization failure: serde's own "missing field
    /// `x`" wording is lifted into a distinct variant, everything else stays generic.
    pub(crate) fn from_parse(path: &std::path::Path, message: String) -> Self {
        let field = message
            .split("missing field `")
            .nth(1)
            .and_then(|rest| rest.split('`').next());
        match field {
            Some(field) => ConfigError::MissingField {
                path: path.display().to_string(),
                field: field.to_string(),
            },
            None => ConfigError::Parse {
                path: path.display().to_string(),
                message,
            },
        }
    }
}

/// Errors from an individual AGV session (C7).
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("write failed: {0}")]
    Write(#[source] std::io::Error),
    #[error("session is closed")]
    Closed,
}

/// Top-level aggregate error surfaced at the supervisor boundary (C8).
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("mqtt error: {0}")]
    Mqtt(#[from] paho_mqtt::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
