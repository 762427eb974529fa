use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("record fetch failed: {0}")]
    Fetch(#[source] BoxError),
}

#[derive(Error, Debug)]
pub enum RoutingError {
    #[error("too many waypoints for a route: {count} (max {max})")]
    TooManyWaypoints { count: usize, max: usize },
    #[error("directions request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid directions url: {0}")]
    Url(#[from] url::ParseError),
    #[error("directions service answered {code}: {}", .message.as_deref().unwrap_or("no message"))]
    Api {
        code: String,
        message: Option<String>,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid palette colour '{0}'")]
    Colour(String),
}
