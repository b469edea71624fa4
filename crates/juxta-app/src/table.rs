// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{
    Column, ColumnId, DiffCounts, FieldRecord, LevelGroup, LoadState, NodeId, PrefixGroup,
    SectionKind, SettingsBody, build_settings_tree, is_diff, normalize_section,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableOptions {
    pub section_filter: Option<SectionKind>,
    pub diff_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnHeader {
    pub id: ColumnId,
    pub label: String,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldRow {
    pub record: FieldRecord,
    pub is_diff: bool,
}

impl FieldRow {
    fn new(record: FieldRecord) -> Self {
        let is_diff = is_diff(&record.values);
        Self { record, is_diff }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrefixNode {
    pub id: NodeId,
    pub prefix: String,
    pub counts: DiffCounts,
    pub rows: Vec<FieldRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LevelNode {
    pub id: NodeId,
    pub level: String,
    pub counts: DiffCounts,
    pub prefixes: Vec<PrefixNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SettingsTable {
    Loading { pending: Vec<ColumnId> },
    Empty,
    Levels(Vec<LevelNode>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SectionBody {
    Fields(Vec<FieldRow>),
    Settings(SettingsTable),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SectionNode {
    pub kind: SectionKind,
    pub counts: DiffCounts,
    pub load: LoadState,
    pub body: SectionBody,
}

impl SectionNode {
    pub fn id(&self) -> NodeId {
        NodeId::Section(self.kind)
    }

    /// Every level and prefix header under this section.
    pub fn descendant_headers(&self) -> Vec<NodeId> {
        match &self.body {
            SectionBody::Fields(_) => Vec::new(),
            SectionBody::Settings(SettingsTable::Levels(levels)) => levels
                .iter()
                .flat_map(|level| {
                    std::iter::once(level.id.clone())
                        .chain(level.prefixes.iter().map(|prefix| prefix.id.clone()))
                })
                .collect(),
            SectionBody::Settings(_) => Vec::new(),
        }
    }

    pub fn levels(&self) -> &[LevelNode] {
        match &self.body {
            SectionBody::Settings(SettingsTable::Levels(levels)) => levels,
            SectionBody::Fields(_) | SectionBody::Settings(_) => &[],
        }
    }

    /// Every field row in display order, settings leaves included.
    pub fn field_rows(&self) -> Box<dyn Iterator<Item = &FieldRow> + '_> {
        match &self.body {
            SectionBody::Fields(rows) => Box::new(rows.iter()),
            SectionBody::Settings(_) => Box::new(
                self.levels()
                    .iter()
                    .flat_map(|level| level.prefixes.iter())
                    .flat_map(|prefix| prefix.rows.iter()),
            ),
        }
    }
}

/// Immutable render model. Every change rebuilds it from the columns.
#[derive(Debug, Clone, PartialEq)]
pub struct CompareTable {
    pub columns: Vec<ColumnHeader>,
    pub sections: Vec<SectionNode>,
    pub total: DiffCounts,
}

impl CompareTable {
    pub fn build(columns: &[Column], options: TableOptions) -> Self {
        let headers = columns
            .iter()
            .map(|column| ColumnHeader {
                id: column.id,
                label: column.label.clone(),
                color: column.color,
            })
            .collect();

        let sections = SectionKind::ALL
            .into_iter()
            .filter(|kind| options.section_filter.is_none_or(|only| only == *kind))
            .filter_map(|kind| build_section(kind, columns, options.diff_only))
            .collect::<Vec<_>>();
        let total = sections.iter().map(|section| section.counts).sum();

        Self {
            columns: headers,
            sections,
            total,
        }
    }

    pub fn section(&self, kind: SectionKind) -> Option<&SectionNode> {
        self.sections.iter().find(|section| section.kind == kind)
    }

    /// Headers that inherit the new state when `node` is toggled.
    pub fn descendant_headers(&self, node: &NodeId) -> Vec<NodeId> {
        match node {
            NodeId::Section(kind) => self
                .section(*kind)
                .map(SectionNode::descendant_headers)
                .unwrap_or_default(),
            NodeId::Level(level) => self
                .section(SectionKind::Settings)
                .and_then(|section| {
                    section
                        .levels()
                        .iter()
                        .find(|candidate| candidate.level == *level)
                })
                .map(|level| level.prefixes.iter().map(|p| p.id.clone()).collect())
                .unwrap_or_default(),
            NodeId::Prefix { .. } => Vec::new(),
        }
    }
}

fn build_section(kind: SectionKind, columns: &[Column], diff_only: bool) -> Option<SectionNode> {
    if kind == SectionKind::Settings {
        return build_settings_section(columns, diff_only);
    }

    let normalized = normalize_section(kind, columns);
    if normalized.records.is_empty() && !normalized.load.is_partial() {
        return None;
    }
    let rows = normalized
        .records
        .into_iter()
        .map(FieldRow::new)
        .collect::<Vec<_>>();
    let counts = rows.iter().map(|row| DiffCounts::leaf(row.is_diff)).sum();
    let rows = rows
        .into_iter()
        .filter(|row| !diff_only || row.is_diff)
        .collect();

    Some(SectionNode {
        kind,
        counts,
        load: normalized.load,
        body: SectionBody::Fields(rows),
    })
}

fn build_settings_section(columns: &[Column], diff_only: bool) -> Option<SectionNode> {
    let kind = SectionKind::Settings;
    let load = LoadState::for_section(kind, columns);
    let (table, counts) = match build_settings_tree(columns) {
        SettingsBody::Loading { pending } => (SettingsTable::Loading { pending }, DiffCounts::default()),
        SettingsBody::Empty => (SettingsTable::Empty, DiffCounts::default()),
        SettingsBody::Tree(groups) => {
            let mut counts = DiffCounts::default();
            let levels = groups
                .into_iter()
                .filter_map(|group| {
                    let (node, level_counts) = build_level(group, diff_only);
                    counts += level_counts;
                    node
                })
                .collect::<Vec<_>>();
            if levels.is_empty() {
                return None;
            }
            (SettingsTable::Levels(levels), counts)
        }
    };

    Some(SectionNode {
        kind,
        counts,
        load,
        body: SectionBody::Settings(table),
    })
}

/// Returns the level node (if it survives diff-only filtering) and its
/// counts, which always cover every leaf.
fn build_level(group: LevelGroup, diff_only: bool) -> (Option<LevelNode>, DiffCounts) {
    let LevelGroup { level, prefixes } = group;
    let mut counts = DiffCounts::default();
    let prefixes = prefixes
        .into_iter()
        .filter_map(|prefix| {
            let node = build_prefix(&level, prefix, diff_only);
            counts += node.counts;
            keep_header(node.counts, diff_only).then_some(node)
        })
        .collect::<Vec<_>>();

    let node = keep_header(counts, diff_only).then(|| LevelNode {
        id: NodeId::level(level.clone()),
        level,
        counts,
        prefixes,
    });
    (node, counts)
}

fn build_prefix(level: &str, group: PrefixGroup, diff_only: bool) -> PrefixNode {
    let rows = group
        .leaves
        .into_iter()
        .map(FieldRow::new)
        .collect::<Vec<_>>();
    let counts = rows.iter().map(|row| DiffCounts::leaf(row.is_diff)).sum();
    let rows = rows
        .into_iter()
        .filter(|row| !diff_only || row.is_diff)
        .collect();
    PrefixNode {
        id: NodeId::prefix(level, group.prefix.clone()),
        prefix: group.prefix,
        counts,
        rows,
    }
}

fn keep_header(counts: DiffCounts, diff_only: bool) -> bool {
    !counts.is_empty() && (!diff_only || counts.has_diffs())
}
