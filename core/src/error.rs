use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("invalid configuration for `{key}`: `{value}`")]
    InvalidConfig { key: String, value: String },
    #[error("could not read safety phrases at `{path}`: {source}")]
    ReadPhrases { path: PathBuf, source: std::io::Error },
    #[error("could not parse safety phrases at `{path}`: {source}")]
    ParsePhrases { path: PathBuf, source: serde_json::Error },
    #[error("agent request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("agent returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("agent response was not valid JSON: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("search query is empty")]
    EmptyQuery,
}

pub type Result<T> = std::result::Result<T, CatalogError>;
