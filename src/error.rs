//! Error kinds produced while driving a BrowserStack XCUITest run.

use std::path::PathBuf;

use serde_json::{Map, Value};

/// Every failure is fatal to the run; callers branch on the variant.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("missing or empty configuration value `{key}`")]
    Config { key: String },

    #[error("{method} {url} failed")]
    Network {
        method: String,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("response from {url} is not a JSON object")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("HTTP status code {status} not in the 2xx range for {url}")]
    Remote {
        url: String,
        status: u16,
        body: Option<Map<String, Value>>,
    },

    #[error("key `{field}` not found in response from {url}")]
    MissingField { field: &'static str, url: String },

    #[error("failed to read {}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported status value `{status}` found in response")]
    UnsupportedStatus { status: String },

    #[error("failed to publish {key}: {reason}")]
    Publish { key: String, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
