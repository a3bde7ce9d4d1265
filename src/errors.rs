use std::path::PathBuf;
use thiserror::Error;

/// Failures of a single request/response exchange with the appliance.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("A connection could not be established to {host}")]
    Connectivity {
        host: String,
        #[source]
        source: reqwest::Error,
    },
    /// The appliance understood the request and reported a failure.
    #[error("{0}")]
    Application(String),
    #[error("response is not valid JSON")]
    InvalidJson(#[source] serde_json::Error),
    #[error("response is not a JSON object")]
    NotAnObject,
    #[error("`{name}` contains `{character}`, which cannot appear in a resource path segment")]
    InvalidName { name: String, character: char },
    #[error("File content not found in response")]
    MissingFile,
    #[error("{message} {host}")]
    MissingSection { message: &'static str, host: String },
    #[error("unexpected `{section}` content in response")]
    UnexpectedShape {
        section: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("file content is not valid base64")]
    Encoding(#[source] base64::DecodeError),
    #[error("failed to write {}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
