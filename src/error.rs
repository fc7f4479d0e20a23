use std::{io, path::PathBuf};

use reqwest::StatusCode;
use thiserror::Error;

use crate::db::backups::PackageKey;

/// Everything that can stop a retrieval run.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("missing required setting {0}")]
    MissingSetting(&'static str),

    #[error("invalid value {value:?} for setting {name}: {reason}")]
    InvalidSetting {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("error connecting to mongo: {0}")]
    Connection(#[source] mongodb::error::Error),

    #[error("error searching for {key}: {source}")]
    Lookup {
        key: PackageKey,
        #[source]
        source: mongodb::error::Error,
    },

    #[error("no backup package found for {0}")]
    NotFound(PackageKey),

    #[error("error creating output folder ({}): {source}", path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("error while downloading file {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: DownloadError,
    },
}

/// Failure while fetching a single backup file.
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("error reading response body: {0}")]
    Body(#[source] io::Error),

    #[error("server responded with status {0}")]
    Status(StatusCode),

    #[error("could not write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no usable file name in url or hash")]
    NoFileName,

    #[error("swift authentication failed: {0}")]
    Auth(String),

    #[error("{primary}; cloud fallback also failed: {fallback}")]
    Fallback {
        primary: Box<DownloadError>,
        fallback: Box<DownloadError>,
    },
}
