//! Parser for UNIX-style long-format directory listings.
//!
//! The listing response is free-form text, one record per line
//! (permissions, link count, owner, group, size, month, day, time/year,
//! name). Servers disagree on how columns are separated, so the field split
//! is configurable; the canonical layout splits on runs of whitespace and
//! carries the size at token index 4.

use crate::{RemoteEntry, RemoteInventory};

/// How a listing line is split into fields. Empty tokens produced by repeated
/// separators are discarded in both modes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tokenization {
    /// Split on any run of whitespace.
    Whitespace,
    /// Split on a fixed delimiter, trimming each token.
    Delimiter(String),
}

/// Shape of one listing line.
#[derive(Debug, Clone)]
pub struct ListingFormat {
    pub tokenization: Tokenization,
    /// Zero-based index of the size field after tokenization.
    pub size_field: usize,
    /// Lines with fewer tokens are skipped, silently.
    pub min_fields: usize,
}

impl Default for ListingFormat {
    fn default() -> Self {
        Self {
            tokenization: Tokenization::Whitespace,
            size_field: 4,
            min_fields: 5,
        }
    }
}

impl ListingFormat {
    fn tokens<'a>(&self, line: &'a str) -> Vec<&'a str> {
        match &self.tokenization {
            Tokenization::Whitespace => line.split_whitespace().collect(),
            Tokenization::Delimiter(sep) => line
                .split(sep.as_str())
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }
}

/// Parse a raw directory-listing response into a remote inventory.
///
/// Lines may be terminated by `\r\n`, `\r` or `\n`, in any mix. Malformed
/// lines are skipped rather than failing the whole listing, and an
/// unparseable size is recorded as `(0, size_valid = false)` instead of
/// rejecting the entry. Later entries overwrite earlier ones with the same
/// name.
///
/// The name is the *last* token of the line: filenames with embedded spaces
/// are not recovered. That limitation is deliberate; the listing grammar
/// gives no reliable way to tell a multi-word name from trailing columns.
pub fn parse_listing(raw: &str, format: &ListingFormat) -> RemoteInventory {
    let mut inventory = RemoteInventory::new();

    for line in raw.split(['\r', '\n']) {
        if line.trim().is_empty() {
            continue;
        }
        // Aggregate-size summary emitted ahead of the records.
        if starts_with_ignore_case(line, "total") {
            continue;
        }
        // Known non-file entry name.
        if ends_with_ignore_case(line, "cache") {
            continue;
        }

        let tokens = format.tokens(line);
        if tokens.len() < format.min_fields || tokens.len() <= format.size_field {
            continue;
        }
        let Some(name) = tokens.last() else {
            continue;
        };

        let (size, size_valid) = match tokens[format.size_field].parse::<u64>() {
            Ok(n) => (n, true),
            Err(_) => (0, false),
        };

        inventory.insert((*name).to_string(), RemoteEntry { size, size_valid });
    }

    inventory
}

fn starts_with_ignore_case(line: &str, prefix: &str) -> bool {
    line.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

fn ends_with_ignore_case(line: &str, suffix: &str) -> bool {
    line.len() >= suffix.len()
        && line
            .get(line.len() - suffix.len()..)
            .is_some_and(|tail| tail.eq_ignore_ascii_case(suffix))
}
