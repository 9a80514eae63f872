use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while establishing the authenticated session
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Login request to {url} failed: {source}")]
    RequestFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Login to {url} rejected with HTTP {status}")]
    Rejected { url: String, status: u16 },

    #[error("No user name given: pass --user or provide a credential file")]
    MissingUser,

    #[error("No password given: pass --pwd or set the {env_var} environment variable")]
    MissingPassword { env_var: &'static str },

    #[error("Failed to read credential file {path}: {source}")]
    CredentialFileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Credential file {path} is malformed: expected username and password on two lines")]
    CredentialFileMalformed { path: PathBuf },
}

/// Errors that can occur when fetching or parsing a remote directory listing
#[derive(Error, Debug)]
pub enum ListingError {
    #[error("Failed to fetch listing {url}: {source}")]
    FetchFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Listing {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Listing {url} contained no parseable entry rows")]
    NoEntries { url: String },
}

/// Errors that can occur while transferring a single file
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("HTTP request failed for {url}: {source}")]
    HttpFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to write {path}: {source}")]
    FileWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Downloaded {path} is {actual} bytes, smaller than the expected {expected}")]
    SizeMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },
}

/// Errors that can occur when probing or mutating the local archive
#[derive(Error, Debug)]
pub enum InventoryError {
    #[error("Failed to create directory {path}: {source}")]
    CreateDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to stat {path}: {source}")]
    StatFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove stale file {path}: {source}")]
    RemoveFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Top-level errors for a sync run.
///
/// Only these abort the run. Everything that goes wrong for an individual
/// entry (transfer failure, size mismatch, unparseable timestamp) is
/// collected into the run summary instead.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Year listing error: {0}")]
    YearListing(#[from] ListingError),

    #[error("Local archive error: {0}")]
    Inventory(#[from] InventoryError),

    #[error("Invalid day range '{0}': expected \"start/end\" with days between 1 and 366")]
    InvalidDayRange(String),
}
