use thiserror::Error;

pub type Result<T> = std::result::Result<T, FrameError>;

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("no {capability} registered as `{key}`")]
    UnknownComponent {
        capability: &'static str,
        key: String,
    },
    #[error("gateway error: {0}")]
    Gateway(String),
    #[error("HTTP {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("cannot build request: {0}")]
    Prompt(String),
    #[error("malformed response: {0}")]
    Decode(String),
    #[error(transparent)]
    Request(#[from] reqwest::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Base64(#[from] base64::DecodeError),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Schedule(#[from] cron::error::Error),
    #[error(transparent)]
    Display(#[from] waveshare_epd::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
