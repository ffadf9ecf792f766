//! Error types for the trip note pipeline.
//!
//! Only [`PipelineError`] aborts a run. Everything else is scoped to one photo
//! and ends up in the [`RunReport`](crate::model::RunReport).

use std::path::PathBuf;
use thiserror::Error;

/// Fatal conditions. Any of these stops the run before notes are written.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Cannot read input directory {path}: {source}")]
    Discovery {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("No photo with usable location data")]
    NoValidPhotos,

    #[error("Failed to write {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub(crate) fn output(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Output {
            path: path.into(),
            source,
        }
    }
}

/// Why a discovered photo was left out of the trip.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidReason {
    #[error("unreadable metadata")]
    UnreadableMetadata,

    #[error("no location data")]
    NoLocation,

    #[error("coordinate conversion failed: {0}")]
    ConversionFailed(String),
}

/// Failure of a single coordinate conversion call.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("service returned HTTP {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("malformed response body: {0}")]
    Body(#[from] serde_json::Error),

    #[error("service rejected the request: {0}")]
    Rejected(String),

    #[error("response has no `locations` field")]
    MissingLocations,

    #[error("cannot parse coordinate pair `{0}`")]
    BadPair(String),

    #[error("conversion task aborted")]
    Aborted,
}

/// Failure while copying, transcoding or deleting one photo.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("copy failed: {0}")]
    Copy(#[source] std::io::Error),

    #[error("transcode failed: {0}")]
    Transcode(#[from] image::ImageError),

    #[error("archive target is the source file itself")]
    SameFile,

    #[error("`{0}` was already archived from another folder in this run")]
    NameTaken(String),

    #[error("archive directory unavailable: {0}")]
    Target(#[source] std::io::Error),

    #[error("delete failed: {0}")]
    Delete(#[source] std::io::Error),
}

/// Metadata could not be decoded from a photo.
#[derive(Debug, Error)]
pub enum ExifError {
    #[error("cannot open file: {0}")]
    Open(#[source] std::io::Error),

    #[error("cannot parse EXIF: {0}")]
    Parse(String),
}
