// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

/// Day-of-year subdirectories are linked with their zero-padded number as
/// the visible text, e.g. "001/"
static DAY_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{3}/").expect("valid day link pattern"));

/// Half-hourly granules are listed through their landing page, e.g.
/// "3B-HHR.MS.MRG.3IMERG.20200101-S000000-E002959.0000.V06B.HDF5.html"
static GRANULE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^3B-HHR.*\.HDF5\.html$").expect("valid granule pattern"));

/// One file row parsed out of a remote day listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    /// Displayed name of the listing link (the `.HDF5.html` landing page)
    pub name: String,
    /// Raw last-modified cell, parsed lazily at decision time
    pub last_modified: String,
    /// Size of the packed HDF5 form, as advertised by the listing
    pub size_bytes: u64,
    /// Subdirectory href the entry was listed under
    pub subdir: String,
}

/// A day-of-year subdirectory link parsed from a year listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubdirLink {
    /// Zero-padded 3-digit day of year
    pub day: String,
    /// href of the subdirectory listing, e.g. "001/contents.html"
    pub href: String,
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

/// Extract the day-of-year subdirectory links from a year contents page.
///
/// Anything that is not a 3-digit day link (parent links, metadata files,
/// THREDDS decoration) is ignored.
pub fn parse_subdirectories(html: &str) -> Vec<SubdirLink> {
    let document = Html::parse_document(html);
    let anchors = selector("a");

    let mut links = Vec::new();
    for anchor in document.select(&anchors) {
        let text: String = anchor.text().collect();
        if !DAY_LINK_RE.is_match(text.trim()) {
            continue;
        }
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        links.push(SubdirLink {
            day: text.trim()[..3].to_string(),
            href: href.to_string(),
        });
    }
    links
}

/// Extract the granule rows from a day listing page.
///
/// Hyrax lists each granule as a table row with the link in the first
/// cell, followed by the last-modified and size cells. Rows without a
/// parseable size cell are not granule rows and are dropped; a malformed
/// last-modified cell is kept as-is so the decision step can fail closed
/// on it.
pub fn parse_file_entries(html: &str, subdir: &str) -> Vec<RemoteEntry> {
    let document = Html::parse_document(html);
    let rows = selector("tr");
    let cells = selector("td");
    let anchors = selector("a");

    let mut entries = Vec::new();
    for row in document.select(&rows) {
        let Some(href) = row
            .select(&anchors)
            .find_map(|a| a.value().attr("href"))
            .filter(|href| GRANULE_RE.is_match(href))
        else {
            continue;
        };

        let texts: Vec<String> = row
            .select(&cells)
            .map(|td| td.text().collect::<String>().trim().to_string())
            .collect();

        // cells after the name cell: last-modified, then size
        let Some(size_bytes) = texts.get(2).and_then(|s| s.parse::<u64>().ok()) else {
            continue;
        };
        let last_modified = texts.get(1).cloned().unwrap_or_default();

        entries.push(RemoteEntry {
            name: href.to_string(),
            last_modified,
            size_bytes,
            subdir: subdir.to_string(),
        });
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    const YEAR_PAGE: &str = r#"<html><body>
<table>
  <tr><td><a href="/opendap/hyrax/">Parent Directory</a></td></tr>
  <tr><td><a href="001/contents.html">001/</a></td><td>2020-07-01 10:22</td><td>-</td></tr>
  <tr><td><a href="002/contents.html">002/</a></td><td>2020-07-01 10:25</td><td>-</td></tr>
  <tr><td><a href="catalog.xml">catalog.xml</a></td><td>2020-07-01 10:25</td><td>1931</td></tr>
</table>
</body></html>"#;

    const DAY_PAGE: &str = r#"<html><body>
<table>
  <tr><td><a href="contents.html">Parent Directory</a></td></tr>
  <tr>
    <td><a href="3B-HHR.MS.MRG.3IMERG.20200101-S000000-E002959.0000.V06B.HDF5.html">3B-HHR...0000.V06B.HDF5</a></td>
    <td>2020-06-29 22:14</td>
    <td>921600</td>
  </tr>
  <tr>
    <td><a href="3B-HHR.MS.MRG.3IMERG.20200101-S003000-E005959.0030.V06B.HDF5.html">3B-HHR...0030.V06B.HDF5</a></td>
    <td>2020-06-29 22:15</td>
    <td>921700</td>
  </tr>
  <tr>
    <td><a href="3B-HHR.MS.MRG.3IMERG.20200101-S003000-E005959.0030.V06B.HDF5.html">3B-HHR...0030.V06B.HDF5</a></td>
    <td>2020-06-29 22:15</td>
    <td>921700</td>
  </tr>
</table>
</body></html>"#;

    #[test]
    fn year_page_yields_only_day_links() {
        let links = parse_subdirectories(YEAR_PAGE);

        assert_eq!(
            links,
            vec![
                SubdirLink {
                    day: "001".to_string(),
                    href: "001/contents.html".to_string(),
                },
                SubdirLink {
                    day: "002".to_string(),
                    href: "002/contents.html".to_string(),
                },
            ]
        );
    }

    #[test]
    fn day_page_yields_granule_rows() {
        let entries = parse_file_entries(DAY_PAGE, "001/contents.html");

        // The duplicated listing row is passed through; deduplication is
        // the orchestrator's job.
        assert_eq!(entries.len(), 3);
        assert_eq!(
            entries[0].name,
            "3B-HHR.MS.MRG.3IMERG.20200101-S000000-E002959.0000.V06B.HDF5.html"
        );
        assert_eq!(entries[0].last_modified, "2020-06-29 22:14");
        assert_eq!(entries[0].size_bytes, 921600);
        assert_eq!(entries[0].subdir, "001/contents.html");
    }

    #[test]
    fn rows_without_granule_link_are_dropped() {
        let entries = parse_file_entries(YEAR_PAGE, "001/contents.html");
        assert!(entries.is_empty());
    }

    #[test]
    fn rows_without_size_cell_are_dropped() {
        let html = r#"<table><tr>
            <td><a href="3B-HHR.x.HDF5.html">3B-HHR.x.HDF5</a></td>
            <td>2020-06-29 22:14</td>
        </tr></table>"#;
        let entries = parse_file_entries(html, "001/contents.html");
        assert!(entries.is_empty());
    }

    #[test]
    fn malformed_last_modified_is_preserved_for_the_decision_step() {
        let html = r#"<table><tr>
            <td><a href="3B-HHR.x.HDF5.html">3B-HHR.x.HDF5</a></td>
            <td></td>
            <td>1000</td>
        </tr></table>"#;
        let entries = parse_file_entries(html, "001/contents.html");

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].last_modified, "");
    }
}
