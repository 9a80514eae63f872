// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use url::Url;

use crate::decision::{SyncDecision, decide};
use crate::download::fetch_file;
use crate::error::{DownloadError, SyncError};
use crate::http::ArchiveSession;
use crate::inventory;
use crate::listing::{RemoteEntry, list_files, list_subdirectories};
use crate::report::{SharedReporter, SyncEvent};

/// Inclusive day-of-year restriction, parsed once from the CLI
/// "start/end" string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DayFilter {
    /// No restriction, process every day directory of the year
    All,
    /// Inclusive range of day numbers
    Range { start: u16, end: u16 },
}

impl DayFilter {
    /// Parse a "start/end" range string. A bare "/" (the CLI default) or
    /// an empty string means all days.
    pub fn parse(raw: &str) -> Result<Self, SyncError> {
        let raw = raw.trim();
        if raw.is_empty() || raw == "/" {
            return Ok(Self::All);
        }

        let invalid = || SyncError::InvalidDayRange(raw.to_string());

        let (start, end) = raw.split_once('/').ok_or_else(invalid)?;
        let start: u16 = start.trim().parse().map_err(|_| invalid())?;
        let end: u16 = end.trim().parse().map_err(|_| invalid())?;

        if !(1..=366).contains(&start) || !(1..=366).contains(&end) || start > end {
            return Err(invalid());
        }

        Ok(Self::Range { start, end })
    }

    /// Whether a zero-padded 3-digit day directory name falls inside the
    /// filter
    pub fn contains(&self, day: &str) -> bool {
        match self {
            Self::All => true,
            Self::Range { start, end } => day
                .parse::<u16>()
                .is_ok_and(|d| (*start..=*end).contains(&d)),
        }
    }
}

/// Options for one sync run
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Root of the remote year/day listing tree
    pub base_url: Url,
    pub year: i32,
    pub days: DayFilter,
    /// Local archive root; files land under `<data_dir>/<year>/`
    pub data_dir: PathBuf,
}

/// Outcome of a sync run.
///
/// Every processed entry lands in exactly one of the three lists, or in
/// none of them when it was classified as current.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub new: Vec<PathBuf>,
    pub updated: Vec<PathBuf>,
    pub error: Vec<PathBuf>,
}

/// Local filename for a listing entry: the `.HDF5.html` landing page name
/// maps onto the converted `.nc` stored on disk
pub fn local_filename(href: &str) -> String {
    match href.strip_suffix("HDF5.html") {
        Some(stem) => format!("{stem}nc"),
        None => href.to_string(),
    }
}

/// Download URL for one entry.
///
/// A pure function of (base, year, subdir, href), called the same way in
/// every fetch path so the update branch can never reuse a URL built
/// somewhere else.
pub fn download_url(base: &Url, year: i32, subdir: &str, href: &str) -> String {
    let dir = subdir.trim_end_matches("contents.html");
    let file = match href.strip_suffix(".html") {
        Some(stem) => format!("{stem}.nc4"),
        None => href.to_string(),
    };
    format!(
        "{}/{}/{}{}",
        base.as_str().trim_end_matches('/'),
        year,
        dir,
        file
    )
}

pub fn year_url(base: &Url, year: i32) -> String {
    format!("{}/{}/contents.html", base.as_str().trim_end_matches('/'), year)
}

pub fn subdir_url(base: &Url, year: i32, subdir: &str) -> String {
    format!("{}/{}/{}", base.as_str().trim_end_matches('/'), year, subdir)
}

/// Synchronize one year of the archive.
///
/// This is the main entry point for the library. It:
/// 1. Creates the local year directory
/// 2. Lists the year's day subdirectories and applies the day filter
/// 3. Lists each retained day, deduplicating repeated listing rows
/// 4. Classifies every distinct entry against the local archive
/// 5. Fetches what is new or out of date and accumulates the summary
///
/// Entry-level failures are collected in the summary; only
/// authentication, the year directory and the year listing itself can
/// fail the run. Re-running with an unchanged remote is idempotent:
/// everything classifies as current.
pub async fn sync_year<S: ArchiveSession + ?Sized>(
    session: &S,
    options: &SyncOptions,
    reporter: &SharedReporter,
) -> Result<RunSummary, SyncError> {
    let year_dir = inventory::ensure_year_dir(&options.data_dir, options.year)?;

    let url = year_url(&options.base_url, options.year);
    reporter.report(SyncEvent::ListingYear { url: url.clone() });
    let subdirs = list_subdirectories(session, &url).await?;

    let mut summary = RunSummary::default();

    for link in subdirs {
        if !options.days.contains(&link.day) {
            reporter.report(SyncEvent::DaySkipped {
                day: link.day.clone(),
            });
            continue;
        }

        let url = subdir_url(&options.base_url, options.year, &link.href);
        let entries = match list_files(session, &url, &link.href).await {
            Ok(entries) => entries,
            Err(e) => {
                // One bad listing page skips that day, not the year.
                reporter.report(SyncEvent::DayFailed {
                    day: link.day.clone(),
                    error: e.to_string(),
                });
                summary.error.push(year_dir.join(&link.day));
                continue;
            }
        };

        reporter.report(SyncEvent::DayListed {
            day: link.day.clone(),
            entries: entries.len(),
        });

        // The same href is repeated across rows of a listing page, so
        // each distinct name is processed exactly once, first-seen order.
        let mut seen = HashSet::new();
        for entry in entries {
            reporter.report(SyncEvent::EntrySeen {
                name: entry.name.clone(),
                last_modified: entry.last_modified.clone(),
                size_bytes: entry.size_bytes,
            });
            if !seen.insert(entry.name.clone()) {
                continue;
            }
            process_entry(session, options, &year_dir, &entry, &mut summary, reporter).await;
        }
    }

    reporter.report(SyncEvent::YearCompleted { year: options.year });
    Ok(summary)
}

/// Classify one entry and act on the decision. Never fails the run:
/// whatever goes wrong lands in the error list.
async fn process_entry<S: ArchiveSession + ?Sized>(
    session: &S,
    options: &SyncOptions,
    year_dir: &Path,
    entry: &RemoteEntry,
    summary: &mut RunSummary,
    reporter: &SharedReporter,
) {
    let local_path = year_dir.join(local_filename(&entry.name));

    let local = match inventory::probe(&local_path) {
        Ok(local) => local,
        Err(e) => {
            reporter.report(SyncEvent::DecisionError {
                path: local_path.clone(),
                reason: e.to_string(),
            });
            summary.error.push(local_path);
            return;
        }
    };

    let url = download_url(&options.base_url, options.year, &entry.subdir, &entry.name);

    match decide(entry, &local) {
        SyncDecision::Skip => {}
        SyncDecision::FetchNew => {
            match fetch_with_retry(session, &url, &local_path, entry, false, reporter).await {
                Ok(bytes) => {
                    reporter.report(SyncEvent::FetchCompleted {
                        path: local_path.clone(),
                        bytes,
                        update: false,
                    });
                    summary.new.push(local_path);
                }
                Err(e) => {
                    reporter.report(SyncEvent::FetchFailed {
                        path: local_path.clone(),
                        error: e.to_string(),
                    });
                    summary.error.push(local_path);
                }
            }
        }
        SyncDecision::FetchUpdate => {
            // The stale copy goes first; the transfer must never write
            // over a file that could pass for current if interrupted.
            if let Err(e) = inventory::remove_stale(&local_path) {
                reporter.report(SyncEvent::FetchFailed {
                    path: local_path.clone(),
                    error: e.to_string(),
                });
                summary.error.push(local_path);
                return;
            }
            match fetch_with_retry(session, &url, &local_path, entry, true, reporter).await {
                Ok(bytes) => {
                    reporter.report(SyncEvent::FetchCompleted {
                        path: local_path.clone(),
                        bytes,
                        update: true,
                    });
                    summary.updated.push(local_path);
                }
                Err(e) => {
                    reporter.report(SyncEvent::FetchFailed {
                        path: local_path.clone(),
                        error: e.to_string(),
                    });
                    summary.error.push(local_path);
                }
            }
        }
        SyncDecision::Error(reason) => {
            reporter.report(SyncEvent::DecisionError {
                path: local_path.clone(),
                reason,
            });
            summary.error.push(local_path);
        }
    }
}

/// Run the executor with one bounded re-attempt.
///
/// A hung or dropped connection should cost one retry, not the rest of
/// the year. Whatever the failed attempt left on disk is removed before
/// the retry and after a final failure, so no truncated file survives to
/// be mistaken for a complete one by the next run.
async fn fetch_with_retry<S: ArchiveSession + ?Sized>(
    session: &S,
    url: &str,
    dest: &Path,
    entry: &RemoteEntry,
    update: bool,
    reporter: &SharedReporter,
) -> Result<u64, DownloadError> {
    reporter.report(SyncEvent::FetchStarting {
        name: entry.name.clone(),
        url: url.to_string(),
        update,
    });

    match fetch_file(session, url, dest, entry.size_bytes).await {
        Ok(bytes) => Ok(bytes),
        Err(_) => {
            let _ = std::fs::remove_file(dest);
            match fetch_file(session, url, dest, entry.size_bytes).await {
                Ok(bytes) => Ok(bytes),
                Err(e) => {
                    let _ = std::fs::remove_file(dest);
                    Err(e)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use bytes::Bytes;
    use tempfile::tempdir;

    use crate::http::SessionResponse;
    use crate::report::NoopReporter;

    /// Serves canned pages by URL and records every request
    struct MockSession {
        pages: HashMap<String, (u16, Vec<u8>)>,
        requests: Mutex<Vec<String>>,
    }

    impl MockSession {
        fn new() -> Self {
            Self {
                pages: HashMap::new(),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn page(mut self, url: &str, status: u16, body: impl Into<Vec<u8>>) -> Self {
            self.pages.insert(url.to_string(), (status, body.into()));
            self
        }

        fn requests_for(&self, needle: &str) -> usize {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .filter(|u| u.contains(needle))
                .count()
        }
    }

    #[async_trait]
    impl ArchiveSession for MockSession {
        async fn get(&self, url: &str) -> Result<SessionResponse, reqwest::Error> {
            self.requests.lock().unwrap().push(url.to_string());
            let (status, body) = self
                .pages
                .get(url)
                .cloned()
                .unwrap_or((404, b"Not Found".to_vec()));
            Ok(SessionResponse {
                status,
                body: Bytes::from(body),
            })
        }
    }

    const BASE: &str = "https://archive.example.com/opendap/GPM_3IMERGHH.06";
    const GRANULE: &str = "3B-HHR.20200101.0000.HDF5.html";

    fn options(data_dir: &Path) -> SyncOptions {
        SyncOptions {
            base_url: Url::parse(BASE).unwrap(),
            year: 2020,
            days: DayFilter::All,
            data_dir: data_dir.to_path_buf(),
        }
    }

    fn year_page(days: &[&str]) -> String {
        let rows: String = days
            .iter()
            .map(|d| {
                format!(
                    r#"<tr><td><a href="{d}/contents.html">{d}/</a></td><td>2020-07-01 10:22</td><td>-</td></tr>"#
                )
            })
            .collect();
        format!("<html><body><table>{rows}</table></body></html>")
    }

    fn day_page(rows: &[(&str, &str, u64)]) -> String {
        let rows: String = rows
            .iter()
            .map(|(href, last_mod, size)| {
                format!(
                    r#"<tr><td><a href="{href}">{href}</a></td><td>{last_mod}</td><td>{size}</td></tr>"#
                )
            })
            .collect();
        format!("<html><body><table>{rows}</table></body></html>")
    }

    fn day_url(day: &str) -> String {
        format!("{BASE}/2020/{day}/contents.html")
    }

    fn granule_url(day: &str) -> String {
        format!("{BASE}/2020/{day}/3B-HHR.20200101.0000.HDF5.nc4")
    }

    #[tokio::test]
    async fn new_file_is_downloaded_and_recorded() {
        let dir = tempdir().unwrap();
        let session = MockSession::new()
            .page(&year_url_str(), 200, year_page(&["001"]))
            .page(
                &day_url("001"),
                200,
                day_page(&[(GRANULE, "2020-06-29 22:14", 1000)]),
            )
            .page(&granule_url("001"), 200, vec![0u8; 1200]);

        let summary = sync_year(&session, &options(dir.path()), &NoopReporter::shared())
            .await
            .unwrap();

        let expected = dir.path().join("2020").join("3B-HHR.20200101.0000.nc");
        assert_eq!(summary.new, vec![expected.clone()]);
        assert!(summary.updated.is_empty());
        assert!(summary.error.is_empty());
        assert_eq!(std::fs::read(&expected).unwrap().len(), 1200);
    }

    #[tokio::test]
    async fn out_of_date_file_is_replaced_and_recorded_as_updated() {
        let dir = tempdir().unwrap();
        let year_dir = dir.path().join("2020");
        std::fs::create_dir_all(&year_dir).unwrap();
        let local = year_dir.join("3B-HHR.20200101.0000.nc");
        std::fs::write(&local, b"old content").unwrap();

        // The local mtime is "now"; a remote stamp in the far future
        // forces the update branch.
        let session = MockSession::new()
            .page(&year_url_str(), 200, year_page(&["001"]))
            .page(
                &day_url("001"),
                200,
                day_page(&[(GRANULE, "2999-01-02 00:00", 1000)]),
            )
            .page(&granule_url("001"), 200, vec![1u8; 1500]);

        let summary = sync_year(&session, &options(dir.path()), &NoopReporter::shared())
            .await
            .unwrap();

        assert_eq!(summary.updated, vec![local.clone()]);
        assert!(summary.new.is_empty());
        assert!(summary.error.is_empty());
        assert_eq!(std::fs::read(&local).unwrap(), vec![1u8; 1500]);
    }

    #[tokio::test]
    async fn current_file_is_skipped() {
        let dir = tempdir().unwrap();
        let year_dir = dir.path().join("2020");
        std::fs::create_dir_all(&year_dir).unwrap();
        let local = year_dir.join("3B-HHR.20200101.0000.nc");
        std::fs::write(&local, b"current content").unwrap();

        let session = MockSession::new()
            .page(&year_url_str(), 200, year_page(&["001"]))
            .page(
                &day_url("001"),
                200,
                day_page(&[(GRANULE, "2020-06-29 22:14", 1000)]),
            );

        let summary = sync_year(&session, &options(dir.path()), &NoopReporter::shared())
            .await
            .unwrap();

        assert!(summary.new.is_empty());
        assert!(summary.updated.is_empty());
        assert!(summary.error.is_empty());
        // No download request went out.
        assert_eq!(session.requests_for(".nc4"), 0);
        assert_eq!(std::fs::read(&local).unwrap(), b"current content");
    }

    #[tokio::test]
    async fn second_run_with_unchanged_remote_does_nothing() {
        let dir = tempdir().unwrap();
        let session = MockSession::new()
            .page(&year_url_str(), 200, year_page(&["001"]))
            .page(
                &day_url("001"),
                200,
                day_page(&[(GRANULE, "2020-06-29 22:14", 1000)]),
            )
            .page(&granule_url("001"), 200, vec![0u8; 1200]);

        let first = sync_year(&session, &options(dir.path()), &NoopReporter::shared())
            .await
            .unwrap();
        assert_eq!(first.new.len(), 1);

        let second = sync_year(&session, &options(dir.path()), &NoopReporter::shared())
            .await
            .unwrap();
        assert!(second.new.is_empty());
        assert!(second.updated.is_empty());
        assert!(second.error.is_empty());
        // One download across both runs.
        assert_eq!(session.requests_for(".nc4"), 1);
    }

    #[tokio::test]
    async fn duplicate_listing_rows_download_once() {
        let dir = tempdir().unwrap();
        let session = MockSession::new()
            .page(&year_url_str(), 200, year_page(&["001"]))
            .page(
                &day_url("001"),
                200,
                day_page(&[
                    (GRANULE, "2020-06-29 22:14", 1000),
                    (GRANULE, "2020-06-29 22:14", 1000),
                ]),
            )
            .page(&granule_url("001"), 200, vec![0u8; 1200]);

        let summary = sync_year(&session, &options(dir.path()), &NoopReporter::shared())
            .await
            .unwrap();

        assert_eq!(summary.new.len(), 1);
        assert_eq!(session.requests_for(".nc4"), 1);
    }

    #[tokio::test]
    async fn malformed_timestamp_is_an_error_and_nothing_is_fetched() {
        let dir = tempdir().unwrap();
        let year_dir = dir.path().join("2020");
        std::fs::create_dir_all(&year_dir).unwrap();
        let local = year_dir.join("3B-HHR.20200101.0000.nc");
        std::fs::write(&local, b"existing").unwrap();

        let session = MockSession::new()
            .page(&year_url_str(), 200, year_page(&["001"]))
            .page(&day_url("001"), 200, day_page(&[(GRANULE, "", 1000)]));

        let summary = sync_year(&session, &options(dir.path()), &NoopReporter::shared())
            .await
            .unwrap();

        assert_eq!(summary.error, vec![local.clone()]);
        assert_eq!(session.requests_for(".nc4"), 0);
        // The existing file is untouched.
        assert_eq!(std::fs::read(&local).unwrap(), b"existing");
    }

    #[tokio::test]
    async fn day_filter_restricts_processed_subdirectories() {
        let dir = tempdir().unwrap();
        let days = ["009", "010", "011", "012", "013"];
        let mut session = MockSession::new().page(&year_url_str(), 200, year_page(&days));
        for day in days {
            session = session
                .page(
                    &day_url(day),
                    200,
                    day_page(&[(GRANULE, "2020-06-29 22:14", 1000)]),
                )
                .page(&granule_url(day), 200, vec![0u8; 1200]);
        }

        let mut options = options(dir.path());
        options.days = DayFilter::parse("010/012").unwrap();

        sync_year(&session, &options, &NoopReporter::shared())
            .await
            .unwrap();

        assert_eq!(session.requests_for("/009/"), 0);
        assert_eq!(session.requests_for("/010/contents.html"), 1);
        assert_eq!(session.requests_for("/011/contents.html"), 1);
        assert_eq!(session.requests_for("/012/contents.html"), 1);
        assert_eq!(session.requests_for("/013/"), 0);
    }

    #[tokio::test]
    async fn truncated_transfer_is_retried_once_then_recorded() {
        let dir = tempdir().unwrap();
        let session = MockSession::new()
            .page(&year_url_str(), 200, year_page(&["001"]))
            .page(
                &day_url("001"),
                200,
                day_page(&[(GRANULE, "2020-06-29 22:14", 1000)]),
            )
            // Always short of the expected 1000 bytes.
            .page(&granule_url("001"), 200, vec![0u8; 100]);

        let summary = sync_year(&session, &options(dir.path()), &NoopReporter::shared())
            .await
            .unwrap();

        let expected = dir.path().join("2020").join("3B-HHR.20200101.0000.nc");
        assert_eq!(summary.error, vec![expected.clone()]);
        assert_eq!(session.requests_for(".nc4"), 2);
        // The truncated file does not survive to fool the next run.
        assert!(!expected.exists());
    }

    #[tokio::test]
    async fn failing_day_listing_skips_that_day_only() {
        let dir = tempdir().unwrap();
        let session = MockSession::new()
            .page(&year_url_str(), 200, year_page(&["001", "002"]))
            // 001 serves garbage, 002 is fine.
            .page(&day_url("001"), 200, "<html><body>broken</body></html>")
            .page(
                &day_url("002"),
                200,
                day_page(&[(GRANULE, "2020-06-29 22:14", 1000)]),
            )
            .page(&granule_url("002"), 200, vec![0u8; 1200]);

        let summary = sync_year(&session, &options(dir.path()), &NoopReporter::shared())
            .await
            .unwrap();

        assert_eq!(summary.error, vec![dir.path().join("2020").join("001")]);
        assert_eq!(summary.new.len(), 1);
    }

    fn year_url_str() -> String {
        format!("{BASE}/2020/contents.html")
    }

    #[test]
    fn day_filter_parses_ranges_and_sentinels() {
        assert_eq!(DayFilter::parse("/").unwrap(), DayFilter::All);
        assert_eq!(DayFilter::parse("").unwrap(), DayFilter::All);
        assert_eq!(
            DayFilter::parse("010/012").unwrap(),
            DayFilter::Range {
                start: 10,
                end: 12
            }
        );
        assert_eq!(
            DayFilter::parse("1/366").unwrap(),
            DayFilter::Range { start: 1, end: 366 }
        );
    }

    #[test]
    fn day_filter_rejects_malformed_ranges() {
        for raw in ["abc", "10", "12/10", "0/5", "1/367", "one/two"] {
            assert!(
                matches!(DayFilter::parse(raw), Err(SyncError::InvalidDayRange(_))),
                "input: {raw:?}"
            );
        }
    }

    #[test]
    fn day_filter_contains_is_inclusive() {
        let filter = DayFilter::parse("010/012").unwrap();

        assert!(!filter.contains("009"));
        assert!(filter.contains("010"));
        assert!(filter.contains("011"));
        assert!(filter.contains("012"));
        assert!(!filter.contains("013"));
        assert!(!filter.contains("not-a-day"));

        assert!(DayFilter::All.contains("200"));
    }

    #[test]
    fn local_filename_swaps_the_listing_suffix() {
        assert_eq!(
            local_filename("3B-HHR.20200101.0000.HDF5.html"),
            "3B-HHR.20200101.0000.nc"
        );
    }

    #[test]
    fn download_url_is_built_from_its_parts() {
        let base = Url::parse(BASE).unwrap();
        let url = download_url(
            &base,
            2020,
            "001/contents.html",
            "3B-HHR.20200101.0000.HDF5.html",
        );

        assert_eq!(
            url,
            format!("{BASE}/2020/001/3B-HHR.20200101.0000.HDF5.nc4")
        );
    }
}
