use chrono::{DateTime, NaiveDateTime, Utc};

use crate::inventory::LocalFileRecord;
use crate::listing::RemoteEntry;

/// Classification of one remote entry against the local archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncDecision {
    /// Local copy is current, nothing to do
    Skip,
    /// No local copy exists yet
    FetchNew,
    /// Local copy is older than the remote one
    FetchUpdate,
    /// The entry cannot be classified; recorded, never fetched
    Error(String),
}

/// Parse a remote last-modified string and normalize it to UTC.
///
/// Hyrax listing tables have shipped a few different stamp styles over
/// the years, so RFC 2822 and RFC 3339 are tried before the plain table
/// formats. Stamps without an offset are taken as UTC, which is what the
/// server uses.
pub fn parse_remote_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S %z", "%Y-%m-%dT%H:%M:%S%z"] {
        if let Ok(dt) = DateTime::parse_from_str(raw, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.and_utc());
        }
    }

    None
}

/// Decide what to do for one remote entry. Pure: no filesystem or network
/// access happens here.
///
/// The comparison is a strict `<`; a local file stamped at exactly the
/// remote time is current. An unparseable remote stamp is an `Error`
/// decision, never a `Skip` — stale data must not pass for current data
/// because a date failed to parse.
pub fn decide(entry: &RemoteEntry, local: &LocalFileRecord) -> SyncDecision {
    if !local.exists {
        return SyncDecision::FetchNew;
    }

    let Some(remote_mtime) = parse_remote_timestamp(&entry.last_modified) else {
        return SyncDecision::Error(format!(
            "unparseable last-modified '{}' for {}",
            entry.last_modified, entry.name
        ));
    };

    match local.modified_time {
        Some(local_mtime) if local_mtime < remote_mtime => SyncDecision::FetchUpdate,
        Some(_) => SyncDecision::Skip,
        None => SyncDecision::Error(format!(
            "no readable modification time for {}",
            local.path.display()
        )),
    }
}
