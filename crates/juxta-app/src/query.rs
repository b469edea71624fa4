// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::cmp::Ordering;
use std::collections::HashSet;

use anyhow::{Result, bail};

use crate::{
    Cell, Column, SectionKind, add_on_records, flat_records, is_diff, plan_records,
    setting_names, setting_values,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyOp {
    #[default]
    Contains,
    Equals,
}

impl KeyOp {
    pub const ALL: [Self; 2] = [Self::Contains, Self::Equals];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::Equals => "equals",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "contains" => Some(Self::Contains),
            "equals" => Some(Self::Equals),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueOp {
    #[default]
    Any,
    Contains,
    Equals,
    True,
    False,
}

impl ValueOp {
    pub const ALL: [Self; 5] = [
        Self::Any,
        Self::Contains,
        Self::Equals,
        Self::True,
        Self::False,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Contains => "contains",
            Self::Equals => "equals",
            Self::True => "true",
            Self::False => "false",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "any" => Some(Self::Any),
            "contains" => Some(Self::Contains),
            "equals" => Some(Self::Equals),
            "true" => Some(Self::True),
            "false" => Some(Self::False),
            _ => None,
        }
    }

    pub const fn takes_term(self) -> bool {
        matches!(self, Self::Contains | Self::Equals)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Query {
    pub key_op: KeyOp,
    pub key_term: String,
    pub value_op: ValueOp,
    pub value_term: String,
}

impl Query {
    fn key_matches(&self, key: &str) -> bool {
        let term = self.key_term.trim().to_lowercase();
        if term.is_empty() {
            return true;
        }
        let key = key.to_lowercase();
        match self.key_op {
            KeyOp::Contains => key.contains(&term),
            KeyOp::Equals => key == term,
        }
    }

    /// Whether one cell satisfies the value predicate. `Any` never marks a
    /// cell, and absent cells never satisfy anything.
    pub fn cell_matches(&self, cell: &Cell) -> bool {
        let Some(value) = cell.compare_key() else {
            return false;
        };
        let value = value.to_lowercase();
        let term = self.value_term.trim().to_lowercase();
        match self.value_op {
            ValueOp::Any => false,
            ValueOp::Contains => value.contains(&term),
            ValueOp::Equals => value == term,
            ValueOp::True => value == "true",
            ValueOp::False => value == "false",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegistryEntry {
    pub key: String,
    pub label: String,
    pub section: SectionKind,
    pub values: Vec<Cell>,
}

/// Every key of every section across the loaded columns, flat. The first
/// registration of a key wins.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct KeyRegistry {
    entries: Vec<RegistryEntry>,
}

impl KeyRegistry {
    pub fn build(columns: &[Column]) -> Self {
        let mut registry = Self::default();
        let mut seen = HashSet::new();
        let mut register = |entry: RegistryEntry| {
            if seen.insert(entry.key.clone()) {
                registry.entries.push(entry);
            }
        };

        for kind in SectionKind::FLAT {
            for record in flat_records(kind, columns) {
                register(RegistryEntry {
                    key: record.key,
                    label: record.label,
                    section: kind,
                    values: record.values,
                });
            }
        }
        // The synthesized current-plan row is a compare-table convenience,
        // not a catalog key.
        for record in plan_records(columns).into_iter().skip(1) {
            register(RegistryEntry {
                label: format!("Plan: {}", record.label),
                key: record.key,
                section: SectionKind::Plans,
                values: record.values,
            });
        }
        for record in add_on_records(columns) {
            register(RegistryEntry {
                label: format!("Add-on: {}", record.label),
                key: record.key,
                section: SectionKind::AddOns,
                values: record.values,
            });
        }
        for name in setting_names(columns) {
            let values = setting_values(&name, columns);
            register(RegistryEntry {
                key: name.clone(),
                label: name,
                section: SectionKind::Settings,
                values,
            });
        }
        registry
    }

    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryHit {
    pub key: String,
    pub label: String,
    pub section: SectionKind,
    pub values: Vec<Cell>,
    /// Per column: the cell satisfied the value predicate.
    pub matched: Vec<bool>,
    pub is_diff: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryResult {
    pub hits: Vec<QueryHit>,
    pub diff_count: usize,
}

impl QueryResult {
    pub fn summary(&self) -> String {
        let count = self.hits.len();
        let noun = if count == 1 { "match" } else { "matches" };
        if self.diff_count > 0 {
            format!("{count} {noun}, {} with diffs", self.diff_count)
        } else {
            format!("{count} {noun}")
        }
    }
}

pub fn validate_query(query: &Query) -> Result<()> {
    if query.key_term.trim().is_empty() && query.value_op == ValueOp::Any {
        bail!("query has no condition -- enter a key term or pick a value condition");
    }
    Ok(())
}

pub fn run_query(columns: &[Column], query: &Query) -> Result<QueryResult> {
    validate_query(query)?;
    if columns.is_empty() {
        bail!("no entities loaded -- add an entity before running a query");
    }

    let registry = KeyRegistry::build(columns);
    let mut hits = registry
        .entries
        .into_iter()
        .filter(|entry| query.key_matches(&entry.key))
        .filter_map(|entry| {
            let matched = entry
                .values
                .iter()
                .map(|cell| query.cell_matches(cell))
                .collect::<Vec<_>>();
            if query.value_op != ValueOp::Any && !matched.contains(&true) {
                return None;
            }
            Some(QueryHit {
                is_diff: is_diff(&entry.values),
                key: entry.key,
                label: entry.label,
                section: entry.section,
                values: entry.values,
                matched,
            })
        })
        .collect::<Vec<_>>();

    hits.sort_by(compare_hits);
    let diff_count = hits.iter().filter(|hit| hit.is_diff).count();
    tracing::debug!(hits = hits.len(), diff_count, "query evaluated");
    Ok(QueryResult { hits, diff_count })
}

fn compare_hits(left: &QueryHit, right: &QueryHit) -> Ordering {
    right
        .is_diff
        .cmp(&left.is_diff)
        .then_with(|| left.key.to_lowercase().cmp(&right.key.to_lowercase()))
        .then_with(|| left.key.cmp(&right.key))
}
