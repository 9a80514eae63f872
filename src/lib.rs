pub mod decision;
pub mod download;
pub mod error;
pub mod http;
pub mod inventory;
pub mod listing;
pub mod report;
pub mod sync;

// Re-export main types for convenience
pub use decision::{SyncDecision, decide, parse_remote_timestamp};
pub use error::{AuthError, DownloadError, InventoryError, ListingError, SyncError};
pub use http::{ArchiveSession, Credentials, EarthdataSession, PASSWORD_ENV, SessionResponse};
pub use inventory::LocalFileRecord;
pub use listing::{RemoteEntry, SubdirLink, list_files, list_subdirectories};
pub use report::{
    FileLogReporter, NoopReporter, Reporter, SharedReporter, SyncEvent, TeeReporter,
};
pub use sync::{DayFilter, RunSummary, SyncOptions, download_url, local_filename, sync_year};
