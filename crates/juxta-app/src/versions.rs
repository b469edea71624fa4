// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::macros::format_description;

use crate::{
    AddOnCatalog, Column, ColumnId, Details, PlanCatalog, SectionKind, SettingsCatalog, Slot,
};

pub const HISTORY_LIMIT: usize = 50;
pub const VERSION_COLORS: [&str; 2] = ["#a855f7", "#00c2ff"];

/// Payloads captured for one entity at one point in time. Only `details`
/// takes part in change detection.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SnapshotPayload {
    pub details: Details,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plans: Option<PlanCatalog>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add_ons: Option<AddOnCatalog>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<SettingsCatalog>,
}

impl SnapshotPayload {
    pub fn from_column(column: &Column) -> Option<Self> {
        let details = column.details.ready()?.clone();
        Some(Self {
            details,
            plans: column.plans.ready().cloned(),
            add_ons: column.add_ons.ready().cloned(),
            settings: column.settings.ready().cloned(),
        })
    }

    pub fn signature(&self) -> String {
        canonical_signature(&self.details)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionSnapshot {
    pub timestamp_ms: i64,
    pub label: String,
    pub payload: SnapshotPayload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    Unchanged,
}

/// Read/write contract for per-entity history.
pub trait HistoryStore {
    fn load_history(&self, entity: &str) -> Result<Vec<VersionSnapshot>>;
    fn save_history(&self, entity: &str, history: &[VersionSnapshot]) -> Result<()>;
}

/// Sorted `key=value` pairs of the flat sections joined with `|`.
pub fn canonical_signature(details: &Details) -> String {
    let mut parts = SectionKind::FLAT
        .iter()
        .flat_map(|kind| details.rows(*kind))
        .map(|row| format!("{}={}", row.key(), row.value().to_compare_string()))
        .collect::<Vec<_>>();
    parts.sort();
    parts.join("|")
}

pub fn snapshot_label(at: OffsetDateTime) -> Result<String> {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second] UTC");
    at.to_offset(time::UtcOffset::UTC)
        .format(&format)
        .context("format snapshot label")
}

/// Appends `payload` unless it matches the most recent entry. Older entries
/// are never consulted.
pub fn save_if_changed(
    store: &impl HistoryStore,
    entity: &str,
    payload: SnapshotPayload,
    now: OffsetDateTime,
) -> Result<SaveOutcome> {
    let mut history = store.load_history(entity)?;
    if let Some(last) = history.last()
        && last.payload.signature() == payload.signature()
    {
        tracing::debug!(entity, "snapshot unchanged; not saved");
        return Ok(SaveOutcome::Unchanged);
    }

    history.push(VersionSnapshot {
        timestamp_ms: (now.unix_timestamp_nanos() / 1_000_000) as i64,
        label: snapshot_label(now)?,
        payload,
    });
    if history.len() > HISTORY_LIMIT {
        let overflow = history.len() - HISTORY_LIMIT;
        history.drain(..overflow);
    }
    store.save_history(entity, &history)?;
    tracing::info!(entity, versions = history.len(), "snapshot saved");
    Ok(SaveOutcome::Saved)
}

pub fn version_title(index: usize, snapshot: &VersionSnapshot) -> String {
    format!("v{}: {}", index + 1, snapshot.label)
}

/// Default pair to compare: the previous version against the newest.
pub fn default_version_picks(history: &[VersionSnapshot]) -> Option<(usize, usize)> {
    let newest = history.len().checked_sub(1)?;
    Some((newest.saturating_sub(1), newest))
}

/// Columns for comparing two stored versions. Picking the same index twice
/// yields a single column.
pub fn version_columns(history: &[VersionSnapshot], first: usize, second: usize) -> Result<Vec<Column>> {
    let picks = if first == second {
        vec![first]
    } else {
        vec![first, second]
    };
    picks
        .into_iter()
        .enumerate()
        .map(|(position, index)| {
            let snapshot = history.get(index).ok_or_else(|| {
                anyhow!(
                    "version v{} does not exist -- pick one of v1..v{}",
                    index + 1,
                    history.len()
                )
            })?;
            let payload = snapshot.payload.clone();
            Ok(Column {
                id: ColumnId::new(index as i64),
                label: version_title(index, snapshot),
                color: VERSION_COLORS[position % VERSION_COLORS.len()],
                details: Slot::Ready(payload.details),
                plans: Slot::from_option(payload.plans),
                add_ons: Slot::from_option(payload.add_ons),
                settings: Slot::from_option(payload.settings),
            })
        })
        .collect()
}
