//! Sitemap persistence: load, merge, save.
//!
//! Loading is two-pass by design: a strict XML parse first, and on any
//! parse failure a tolerant structural scan that recovers whatever
//! `(loc, lastmod)` pairs are still recognisable. A partially corrupted
//! prior sitemap therefore degrades to fewer recovered entries, never to an
//! aborted run; hopeless input yields an empty list.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, warn};

use pagepress_core::SitemapEntry;

use crate::error::{StateError, StateResult};

/// Read a sitemap file, tolerating absence and partial corruption.
pub fn load_sitemap(path: &Path) -> Vec<SitemapEntry> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(_) => {
            debug!(path = %path.display(), "No existing sitemap");
            return Vec::new();
        }
    };

    match parse_strict(&contents) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(
                path = %path.display(),
                error = %err,
                "Sitemap failed strict parse, falling back to structural scan"
            );
            scan_entries(&contents)
        }
    }
}

/// Merge sitemap entries keyed by `loc`.
///
/// On collision the incoming entry wins entirely (its `lastmod` replaces
/// the existing one). The result is sorted by `loc`, all `loc`s pairwise
/// distinct, size = |existing ∪ incoming| by key.
pub fn merge_entries(
    existing: Vec<SitemapEntry>,
    incoming: Vec<SitemapEntry>,
) -> Vec<SitemapEntry> {
    let mut merged: BTreeMap<String, SitemapEntry> = BTreeMap::new();
    for entry in existing.into_iter().chain(incoming) {
        merged.insert(entry.loc.clone(), entry);
    }
    merged.into_values().collect()
}

/// Write the sitemap document atomically (temp file + rename).
pub fn save_sitemap(path: &Path, entries: &[SitemapEntry]) -> StateResult<()> {
    let mut doc = String::with_capacity(128 + entries.len() * 96);
    doc.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    doc.push_str("<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n");
    for entry in entries {
        doc.push_str("  <url>\n");
        doc.push_str("    <loc>");
        doc.push_str(&xml_escape(&entry.loc));
        doc.push_str("</loc>\n");
        doc.push_str("    <lastmod>");
        doc.push_str(&entry.lastmod.format("%Y-%m-%d").to_string());
        doc.push_str("</lastmod>\n");
        doc.push_str("  </url>\n");
    }
    doc.push_str("</urlset>\n");

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    std::fs::write(&tmp, doc.as_bytes())?;
    std::fs::rename(&tmp, path).map_err(|err| StateError::Persist {
        path: path.display().to_string(),
        reason: err.to_string(),
    })?;

    debug!(path = %path.display(), entries = entries.len(), "Saved sitemap");
    Ok(())
}

#[derive(Clone, Copy)]
enum Field {
    Loc,
    Lastmod,
}

/// Strict event-based parse of `<url><loc>…</loc><lastmod>…</lastmod></url>`
/// records. Any XML error aborts the pass.
fn parse_strict(xml: &str) -> Result<Vec<SitemapEntry>, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut in_url = false;
    let mut field: Option<Field> = None;
    let mut loc: Option<String> = None;
    let mut lastmod: Option<NaiveDate> = None;

    loop {
        match reader.read_event().map_err(|e| e.to_string())? {
            Event::Start(e) => match e.name().as_ref() {
                b"url" => {
                    in_url = true;
                    loc = None;
                    lastmod = None;
                }
                b"loc" if in_url => field = Some(Field::Loc),
                b"lastmod" if in_url => field = Some(Field::Lastmod),
                _ => {}
            },
            Event::Text(text) => {
                let value = text.unescape().map_err(|e| e.to_string())?.into_owned();
                match field {
                    Some(Field::Loc) => loc = Some(value.trim().to_string()),
                    Some(Field::Lastmod) => {
                        lastmod = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok();
                    }
                    None => {}
                }
            }
            Event::End(e) => match e.name().as_ref() {
                b"url" => {
                    if let Some(loc) = loc.take() {
                        if !loc.is_empty() {
                            entries.push(SitemapEntry {
                                loc,
                                lastmod: lastmod.take().unwrap_or_else(today),
                            });
                        }
                    }
                    in_url = false;
                }
                b"loc" | b"lastmod" => field = None,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(entries)
}

/// Best-effort structural scan for `(loc, lastmod)` pairs.
///
/// Walks `<loc>` spans in order; a `<lastmod>` counts for the preceding
/// `loc` only when it appears before the next `<loc>`. Records missing a
/// closing tag are dropped.
fn scan_entries(xml: &str) -> Vec<SitemapEntry> {
    let mut entries = Vec::new();
    let mut rest = xml;

    while let Some(start) = rest.find("<loc>") {
        let after = &rest[start + "<loc>".len()..];
        let Some(end) = after.find("</loc>") else {
            break;
        };
        let loc = xml_unescape(after[..end].trim());

        let tail = &after[end + "</loc>".len()..];
        let record_end = tail.find("<loc>").unwrap_or(tail.len());
        let lastmod = tail[..record_end].find("<lastmod>").and_then(|i| {
            let value = &tail[i + "<lastmod>".len()..record_end];
            let close = value.find("</lastmod>")?;
            NaiveDate::parse_from_str(value[..close].trim(), "%Y-%m-%d").ok()
        });

        if !loc.is_empty() {
            entries.push(SitemapEntry {
                loc,
                lastmod: lastmod.unwrap_or_else(today),
            });
        }
        rest = tail;
    }

    entries
}

fn today() -> NaiveDate {
    chrono::Utc::now().date_naive()
}

/// Escape characters that are structurally significant in XML.
fn xml_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn xml_unescape(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("date")
    }

    #[test]
    fn test_merge_incoming_wins_and_sorts() {
        let existing = vec![SitemapEntry::dated("https://e.x/a", date("2024-01-01"))];
        let incoming = vec![
            SitemapEntry::dated("https://e.x/a", date("2024-02-01")),
            SitemapEntry::dated("https://e.x/b", date("2024-02-01")),
        ];

        let merged = merge_entries(existing, incoming);
        assert_eq!(
            merged,
            vec![
                SitemapEntry::dated("https://e.x/a", date("2024-02-01")),
                SitemapEntry::dated("https://e.x/b", date("2024-02-01")),
            ]
        );
    }

    #[test]
    fn test_merge_keys_are_pairwise_distinct() {
        let existing = vec![
            SitemapEntry::dated("https://e.x/c", date("2024-01-01")),
            SitemapEntry::dated("https://e.x/a", date("2024-01-01")),
        ];
        let incoming = vec![
            SitemapEntry::dated("https://e.x/b", date("2024-01-02")),
            SitemapEntry::dated("https://e.x/a", date("2024-01-02")),
        ];

        let merged = merge_entries(existing, incoming);
        assert_eq!(merged.len(), 3);
        let locs: Vec<&str> = merged.iter().map(|e| e.loc.as_str()).collect();
        assert_eq!(locs, vec!["https://e.x/a", "https://e.x/b", "https://e.x/c"]);
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sitemap.xml");

        let entries = vec![
            SitemapEntry::dated("https://e.x/articles/a.html", date("2024-03-01")),
            SitemapEntry::dated("https://e.x/articles/b.html?x=1&y=2", date("2024-03-02")),
        ];
        save_sitemap(&path, &entries).expect("save failed");

        let loaded = load_sitemap(&path);
        assert_eq!(loaded, entries);
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(load_sitemap(&dir.path().join("absent.xml")).is_empty());
    }

    #[test]
    fn test_load_garbage_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("garbage.xml");
        std::fs::write(&path, b"\x00\x01 not a sitemap at all").expect("write fixture");

        assert!(load_sitemap(&path).is_empty());
    }

    #[test]
    fn test_scan_recovers_from_truncated_document() {
        // Truncated mid-record: the strict pass fails, the scanner keeps
        // the two complete records and drops the torn one.
        let truncated = "<?xml version=\"1.0\"?>\n<urlset>\n\
            <url><loc>https://e.x/a.html</loc><lastmod>2024-01-05</lastmod></url>\n\
            <url><loc>https://e.x/b.html</loc></url>\n\
            <url><loc>https://e.x/c.h";

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("torn.xml");
        std::fs::write(&path, truncated).expect("write fixture");

        let loaded = load_sitemap(&path);
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].loc, "https://e.x/a.html");
        assert_eq!(loaded[0].lastmod, date("2024-01-05"));
        assert_eq!(loaded[1].loc, "https://e.x/b.html");
    }

    #[test]
    fn test_scanner_does_not_steal_next_records_lastmod() {
        let broken = "<url><loc>https://e.x/a</loc></url>\
            <url><loc>https://e.x/b</loc><lastmod>2024-06-01</lastmod></url><oops";

        let entries = scan_entries(broken);
        assert_eq!(entries.len(), 2);
        // a has no lastmod of its own; b's date must not leak backwards.
        assert_ne!(entries[0].lastmod, date("2024-06-01"));
        assert_eq!(entries[1].lastmod, date("2024-06-01"));
    }

    #[test]
    fn test_escaping_round_trips_through_strict_parse() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("escaped.xml");

        let entries = vec![SitemapEntry::dated(
            "https://e.x/a.html?q=<tag>&r=\"x\"",
            date("2024-04-01"),
        )];
        save_sitemap(&path, &entries).expect("save failed");

        let raw = std::fs::read_to_string(&path).expect("read");
        assert!(raw.contains("&lt;tag&gt;"));
        assert!(raw.contains("&amp;"));

        assert_eq!(load_sitemap(&path), entries);
    }
}
