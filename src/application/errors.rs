//! Application layer error types

use thiserror::Error;

/// Transport failures while talking to an upstream feed. Aborts the run for
/// that source; the previously persisted markers stay untouched.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("network failure: {0}")]
    Network(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    Status { status: u16, url: String },
}

/// A feed body that could not be decoded. One kind regardless of the wire
/// format; aborts the run without persisting a new marker so the same work is
/// retried next time.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("invalid JSON document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid YAML document: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid XML document: {0}")]
    Xml(#[from] quick_xml::DeError),
}

/// Failures of the marker persistence capability.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("marker store I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("marker store operation failed: {message}")]
    Operation { message: String },
}

/// Everything that can abort a single updater run. Version-parsing problems
/// are deliberately absent: a malformed version string in a feed drops only
/// that record, never the run.
#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("could not download feed: {0}")]
    CouldNotDownload(#[from] FetchError),

    #[error("could not parse feed: {0}")]
    CouldNotParse(#[from] DecodeError),

    #[error("marker storage failure: {0}")]
    Storage(#[from] StorageError),
}
