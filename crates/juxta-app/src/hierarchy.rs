// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::{BTreeMap, HashMap};

use crate::normalize::KeyOrder;
use crate::{Cell, Column, ColumnId, FieldRecord};

pub const ROOT_PREFIX: &str = "__root__";
pub const LEVEL_PRIORITY: [&str; 4] = ["DOMAIN", "DC", "POD", "DEFAULT"];

#[derive(Debug, Clone, PartialEq)]
pub struct PrefixGroup {
    pub prefix: String,
    pub leaves: Vec<FieldRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LevelGroup {
    pub level: String,
    pub prefixes: Vec<PrefixGroup>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SettingsBody {
    Loading { pending: Vec<ColumnId> },
    Empty,
    Tree(Vec<LevelGroup>),
}

/// Splits `prefix.rest` at the first dot. Names without a dot land in the
/// root bucket and keep their full name as label.
pub fn split_setting_name(name: &str) -> (&str, &str) {
    match name.split_once('.') {
        Some((prefix, label)) => (prefix, label),
        None => (ROOT_PREFIX, name),
    }
}

/// Level of the first column, in column order, whose item for `name`
/// carries a non-empty `key_level`.
pub fn resolve_level<'a>(name: &str, columns: &'a [Column]) -> Option<&'a str> {
    columns
        .iter()
        .filter_map(|column| column.settings.ready())
        .filter_map(|catalog| catalog.find(name))
        .filter_map(|item| item.key_level.as_deref())
        .find(|level| !level.is_empty())
}

fn level_rank(level: &str) -> usize {
    LEVEL_PRIORITY
        .iter()
        .position(|known| *known == level)
        .unwrap_or(LEVEL_PRIORITY.len())
}

pub fn setting_names(columns: &[Column]) -> Vec<String> {
    let mut order = KeyOrder::default();
    for catalog in columns.iter().filter_map(|column| column.settings.ready()) {
        for item in &catalog.content {
            order.insert(&item.name, &item.name);
        }
    }
    order.into_entries().into_iter().map(|(name, _)| name).collect()
}

pub fn setting_values(name: &str, columns: &[Column]) -> Vec<Cell> {
    columns
        .iter()
        .map(|column| {
            column
                .settings
                .ready()
                .and_then(|catalog| catalog.find(name))
                .map_or(Cell::Absent, |item| Cell::Value(item.value.clone()))
        })
        .collect()
}

pub fn build_settings_tree(columns: &[Column]) -> SettingsBody {
    let pending = columns
        .iter()
        .filter(|column| column.settings.is_pending())
        .map(|column| column.id)
        .collect::<Vec<_>>();
    if !pending.is_empty() {
        return SettingsBody::Loading { pending };
    }

    let names = setting_names(columns);
    if names.is_empty() {
        return SettingsBody::Empty;
    }

    let mut level_order: Vec<String> = Vec::new();
    let mut grouped: HashMap<String, BTreeMap<String, BTreeMap<String, FieldRecord>>> =
        HashMap::new();
    for name in names {
        let Some(level) = resolve_level(&name, columns) else {
            tracing::debug!(setting = %name, "setting has no level; excluded from tree");
            continue;
        };
        if !grouped.contains_key(level) {
            level_order.push(level.to_owned());
        }
        let (prefix, label) = split_setting_name(&name);
        let record = FieldRecord {
            key: name.clone(),
            label: label.to_owned(),
            values: setting_values(&name, columns),
        };
        grouped
            .entry(level.to_owned())
            .or_default()
            .entry(prefix.to_owned())
            .or_default()
            .insert(name.clone(), record);
    }

    level_order.sort_by_key(|level| level_rank(level));
    let levels = level_order
        .into_iter()
        .map(|level| {
            let prefixes = grouped
                .remove(&level)
                .unwrap_or_default()
                .into_iter()
                .map(|(prefix, leaves)| PrefixGroup {
                    prefix,
                    leaves: leaves.into_values().collect(),
                })
                .collect();
            LevelGroup { level, prefixes }
        })
        .collect::<Vec<_>>();

    if levels.is_empty() {
        SettingsBody::Empty
    } else {
        SettingsBody::Tree(levels)
    }
}
