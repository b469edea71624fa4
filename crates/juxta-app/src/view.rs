// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::ops::Range;

use crate::{
    CollapseState, ColumnHeader, CompareTable, DiffCounts, FieldRow, NodeId, SearchTerm,
    SectionBody, SectionKind, SectionNode, SettingsTable,
};

#[derive(Debug, Clone, PartialEq)]
pub enum ViewRowKind {
    Section {
        kind: SectionKind,
        counts: DiffCounts,
        loading: bool,
    },
    Level {
        level: String,
        counts: DiffCounts,
    },
    Prefix {
        prefix: String,
        counts: DiffCounts,
    },
    Field {
        section: SectionKind,
        row: FieldRow,
        label_highlight: Option<Range<usize>>,
        key_highlight: Option<Range<usize>>,
    },
    Loading {
        pending: usize,
    },
    Empty,
}

/// One visible line of the compare table.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewRow {
    pub depth: u8,
    pub node: Option<NodeId>,
    pub collapsed: bool,
    /// Diff count shown next to a header; suppressed while searching.
    pub badge: Option<usize>,
    pub kind: ViewRowKind,
}

impl ViewRow {
    pub fn is_header(&self) -> bool {
        self.node.is_some()
    }

    pub fn field(&self) -> Option<&FieldRow> {
        match &self.kind {
            ViewRowKind::Field { row, .. } => Some(row),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompareView {
    pub columns: Vec<ColumnHeader>,
    pub rows: Vec<ViewRow>,
    pub total_diffs: Option<usize>,
    pub searching: bool,
}

impl CompareView {
    /// Flattens `table` into the rows a renderer should draw. With an active
    /// term, only matching fields and their headers survive and stored
    /// collapse flags are ignored (but left untouched).
    pub fn project(
        table: &CompareTable,
        collapse: &CollapseState,
        term: &SearchTerm,
        show_keys: bool,
    ) -> Self {
        let mut projector = Projector {
            collapse,
            term,
            show_keys,
            rows: Vec::new(),
        };
        for section in &table.sections {
            projector.section(section);
        }

        Self {
            columns: table.columns.clone(),
            rows: projector.rows,
            total_diffs: (!term.is_active()).then_some(table.total.diffs),
            searching: term.is_active(),
        }
    }

    pub fn field_rows(&self) -> impl Iterator<Item = &FieldRow> {
        self.rows.iter().filter_map(ViewRow::field)
    }

    pub fn header_index(&self, node: &NodeId) -> Option<usize> {
        self.rows
            .iter()
            .position(|row| row.node.as_ref() == Some(node))
    }
}

struct Projector<'a> {
    collapse: &'a CollapseState,
    term: &'a SearchTerm,
    show_keys: bool,
    rows: Vec<ViewRow>,
}

impl Projector<'_> {
    fn searching(&self) -> bool {
        self.term.is_active()
    }

    fn collapsed(&self, node: &NodeId) -> bool {
        !self.searching() && self.collapse.is_collapsed(node)
    }

    fn any_match(&self, rows: &[FieldRow]) -> bool {
        rows.iter().any(|row| self.term.matches(&row.record))
    }

    fn badge(&self, counts: DiffCounts) -> Option<usize> {
        (!self.searching() && counts.has_diffs()).then_some(counts.diffs)
    }

    fn header(&mut self, depth: u8, node: NodeId, counts: DiffCounts, kind: ViewRowKind) {
        let collapsed = self.collapsed(&node);
        let badge = self.badge(counts);
        self.rows.push(ViewRow {
            depth,
            node: Some(node),
            collapsed,
            badge,
            kind,
        });
    }

    fn section(&mut self, section: &SectionNode) {
        if self.searching() && !section.field_rows().any(|row| self.term.matches(&row.record))
        {
            return;
        }
        let node = section.id();
        let hidden = self.collapsed(&node);
        self.header(
            0,
            node,
            section.counts,
            ViewRowKind::Section {
                kind: section.kind,
                counts: section.counts,
                loading: section.load.is_partial(),
            },
        );
        if hidden {
            return;
        }

        match &section.body {
            SectionBody::Fields(rows) => self.fields(section.kind, 1, rows),
            SectionBody::Settings(SettingsTable::Loading { pending }) => {
                if !self.searching() {
                    self.placeholder(ViewRowKind::Loading {
                        pending: pending.len(),
                    });
                }
            }
            SectionBody::Settings(SettingsTable::Empty) => {
                if !self.searching() {
                    self.placeholder(ViewRowKind::Empty);
                }
            }
            SectionBody::Settings(SettingsTable::Levels(levels)) => {
                for level in levels {
                    if self.searching()
                        && !level.prefixes.iter().any(|p| self.any_match(&p.rows))
                    {
                        continue;
                    }
                    let level_hidden = self.collapsed(&level.id);
                    self.header(
                        1,
                        level.id.clone(),
                        level.counts,
                        ViewRowKind::Level {
                            level: level.level.clone(),
                            counts: level.counts,
                        },
                    );
                    if level_hidden {
                        continue;
                    }
                    for prefix in &level.prefixes {
                        if self.searching() && !self.any_match(&prefix.rows) {
                            continue;
                        }
                        let prefix_hidden = self.collapsed(&prefix.id);
                        self.header(
                            2,
                            prefix.id.clone(),
                            prefix.counts,
                            ViewRowKind::Prefix {
                                prefix: prefix.prefix.clone(),
                                counts: prefix.counts,
                            },
                        );
                        if !prefix_hidden {
                            self.fields(SectionKind::Settings, 3, &prefix.rows);
                        }
                    }
                }
            }
        }
    }

    fn placeholder(&mut self, kind: ViewRowKind) {
        self.rows.push(ViewRow {
            depth: 1,
            node: None,
            collapsed: false,
            badge: None,
            kind,
        });
    }

    fn fields(&mut self, section: SectionKind, depth: u8, rows: &[FieldRow]) {
        for row in rows {
            if !self.term.matches(&row.record) {
                continue;
            }
            let label_highlight = self.term.highlight(&row.record.label);
            let key_highlight = if self.show_keys {
                self.term.highlight(&row.record.key)
            } else {
                None
            };
            self.rows.push(ViewRow {
                depth,
                node: None,
                collapsed: false,
                badge: None,
                kind: ViewRowKind::Field {
                    section,
                    row: row.clone(),
                    label_highlight,
                    key_highlight,
                },
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CompareView, ViewRowKind};
    use crate::{
        CollapseState, Column, ColumnId, CompareTable, Details, FieldValue, FlatRow, NodeId,
        SearchTerm, SectionKind, SettingItem, SettingsCatalog, TableOptions,
    };

    fn setting(name: &str, level: &str, value: &str) -> SettingItem {
        SettingItem {
            name: name.to_owned(),
            key_level: Some(level.to_owned()),
            value: FieldValue::text(value),
        }
    }

    fn columns() -> Vec<Column> {
        let details = |mrr: f64| Details {
            basic_data: vec![
                FlatRow::new("MRR(current)", "current_mrr", FieldValue::Number(mrr)),
                FlatRow::new(
                    "Trash Retention policy",
                    "trash_empty_days",
                    FieldValue::Number(30.0),
                ),
            ],
            ..Details::default()
        };
        let settings = |theme: &str| SettingsCatalog {
            content: vec![
                setting("ui.theme", "DOMAIN", theme),
                setting("ui.font", "DOMAIN", "mono"),
                setting("mail.from", "DOMAIN", "ops@x"),
            ],
        };
        vec![
            Column::new(ColumnId::new(1), "a", "#fff")
                .with_details(details(33.57))
                .with_settings(settings("dark")),
            Column::new(ColumnId::new(2), "b", "#000")
                .with_details(details(40.0))
                .with_settings(settings("light")),
        ]
    }

    fn labels(view: &CompareView) -> Vec<String> {
        view.field_rows().map(|row| row.record.label.clone()).collect()
    }

    fn table() -> CompareTable {
        let options = TableOptions {
            section_filter: None,
            diff_only: false,
        };
        CompareTable::build(&columns(), options)
    }

    fn expanded_settings() -> CollapseState {
        let mut collapse = CollapseState::default();
        collapse.set(NodeId::Section(SectionKind::Settings), false);
        collapse
    }

    #[test]
    fn settings_start_collapsed() {
        let view = CompareView::project(
            &table(),
            &CollapseState::default(),
            &SearchTerm::default(),
            false,
        );
        assert_eq!(
            labels(&view),
            vec!["MRR(current)", "Trash Retention policy"]
        );
        let settings = view
            .header_index(&NodeId::Section(SectionKind::Settings))
            .expect("settings header");
        assert!(view.rows[settings].collapsed);
        assert_eq!(view.total_diffs, Some(2));
    }

    #[test]
    fn collapsing_level_hides_prefixes_and_leaves() {
        let table = table();
        let mut collapse = expanded_settings();
        let level = NodeId::level("DOMAIN");
        collapse.toggle(&level, &table.descendant_headers(&level));

        let view = CompareView::project(&table, &collapse, &SearchTerm::default(), false);
        assert!(view.header_index(&level).is_some());
        assert!(view.header_index(&NodeId::prefix("DOMAIN", "ui")).is_none());
        assert!(!labels(&view).contains(&"theme".to_owned()));
    }

    #[test]
    fn collapsing_prefix_hides_only_its_leaves() {
        let table = table();
        let mut collapse = expanded_settings();
        let ui = NodeId::prefix("DOMAIN", "ui");
        collapse.toggle(&ui, &table.descendant_headers(&ui));

        let view = CompareView::project(&table, &collapse, &SearchTerm::default(), false);
        assert!(view.header_index(&NodeId::level("DOMAIN")).is_some());
        assert!(view.header_index(&ui).is_some());
        assert!(view.header_index(&NodeId::prefix("DOMAIN", "mail")).is_some());
        let shown = labels(&view);
        assert!(shown.contains(&"from".to_owned()));
        assert!(!shown.contains(&"theme".to_owned()));
        assert!(!shown.contains(&"font".to_owned()));
    }

    #[test]
    fn search_narrows_rows_and_restores_on_clear() {
        let table = table();
        let collapse = CollapseState::default();
        let before = table.clone();

        for _ in 0..3 {
            let view = CompareView::project(&table, &collapse, &SearchTerm::new("mrr"), false);
            assert_eq!(labels(&view), vec!["MRR(current)"]);
            assert_eq!(view.total_diffs, None);
            assert!(view.rows.iter().all(|row| row.badge.is_none()));
            let ViewRowKind::Field {
                label_highlight, ..
            } = &view.rows[1].kind
            else {
                panic!("second row should be the matching field");
            };
            assert_eq!(label_highlight.clone(), Some(0..3));

            let cleared = CompareView::project(&table, &collapse, &SearchTerm::new(""), false);
            assert_eq!(
                labels(&cleared),
                vec!["MRR(current)", "Trash Retention policy"]
            );
            assert_eq!(cleared.total_diffs, Some(2));
        }
        assert_eq!(table, before);
    }

    #[test]
    fn search_overrides_collapse_without_mutating_it() {
        let table = table();
        let collapse = CollapseState::default();
        let view = CompareView::project(&table, &collapse, &SearchTerm::new("THEME"), true);

        assert_eq!(labels(&view), vec!["theme"]);
        let section = view
            .header_index(&NodeId::Section(SectionKind::Settings))
            .expect("settings header visible");
        assert!(!view.rows[section].collapsed);
        assert!(view.header_index(&NodeId::prefix("DOMAIN", "mail")).is_none());
        assert!(view.header_index(&NodeId::Section(SectionKind::Basic)).is_none());
        assert!(collapse.is_collapsed(&NodeId::Section(SectionKind::Settings)));

        let ViewRowKind::Field { key_highlight, .. } = &view.rows[3].kind else {
            panic!("fourth row should be the matching leaf");
        };
        assert_eq!(key_highlight.clone(), Some(3..8));
    }

    #[test]
    fn key_highlight_requires_show_keys() {
        let view = CompareView::project(
            &table(),
            &CollapseState::default(),
            &SearchTerm::new("current_mrr"),
            false,
        );
        let ViewRowKind::Field {
            label_highlight,
            key_highlight,
            ..
        } = &view.rows[1].kind
        else {
            panic!("expected a field row");
        };
        assert_eq!(label_highlight, &None);
        assert_eq!(key_highlight, &None);
    }
}
