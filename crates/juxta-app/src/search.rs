// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::ops::Range;

use crate::FieldRecord;

/// Normalized free-text filter. Empty means inactive.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchTerm(String);

impl SearchTerm {
    pub fn new(raw: &str) -> Self {
        Self(fold(raw.trim()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_active(&self) -> bool {
        !self.0.is_empty()
    }

    /// Label, key, or any column's string form contains the term.
    pub fn matches(&self, record: &FieldRecord) -> bool {
        if !self.is_active() {
            return true;
        }
        self.highlight(&record.label).is_some()
            || self.highlight(&record.key).is_some()
            || record
                .values
                .iter()
                .filter_map(|cell| cell.compare_key())
                .any(|value| self.highlight(&value).is_some())
    }

    /// Byte range of the first case-insensitive occurrence in `text`.
    pub fn highlight(&self, text: &str) -> Option<Range<usize>> {
        if !self.is_active() {
            return None;
        }
        find_folded(text, &self.0)
    }
}

/// Per-character lowercase expansion, shared by the term and the text.
fn fold(text: &str) -> String {
    text.chars().flat_map(char::to_lowercase).collect()
}

/// Finds the folded `needle` in `haystack` and maps the hit back onto
/// `haystack`'s byte offsets, widened to whole source characters.
fn find_folded(haystack: &str, needle: &str) -> Option<Range<usize>> {
    let needle = needle.chars().collect::<Vec<_>>();
    if needle.is_empty() {
        return None;
    }
    let folded = haystack
        .char_indices()
        .flat_map(|(offset, ch)| {
            let width = ch.len_utf8();
            ch.to_lowercase().map(move |lower| (offset, width, lower))
        })
        .collect::<Vec<_>>();

    folded.windows(needle.len()).find_map(|window| {
        let hit = window
            .iter()
            .zip(&needle)
            .all(|((_, _, lower), want)| lower == want);
        hit.then(|| {
            let (start, _, _) = window[0];
            let (last, width, _) = window[window.len() - 1];
            start..last + width
        })
    })
}
