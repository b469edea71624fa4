// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::HashSet;

use crate::{AddOn, Cell, Column, ColumnId, FieldValue, Plan, SectionKind};

pub const CURRENT_PLAN_KEY: &str = "__current_plan__";
pub const CURRENT_PLAN_LABEL: &str = "Current Plan";
pub const PLAN_KEY_PREFIX: &str = "plan__";
pub const ADD_ON_KEY_PREFIX: &str = "addon__";

/// One merged row: a key, the label of the first column that defined it,
/// and one cell per column in column order.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRecord {
    pub key: String,
    pub label: String,
    pub values: Vec<Cell>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Complete,
    Partial {
        pending: Vec<ColumnId>,
    },
}

impl LoadState {
    pub fn for_section(kind: SectionKind, columns: &[Column]) -> Self {
        let pending = columns
            .iter()
            .filter(|column| column.is_pending(kind))
            .map(|column| column.id)
            .collect::<Vec<_>>();
        if pending.is_empty() {
            Self::Complete
        } else {
            Self::Partial { pending }
        }
    }

    pub const fn is_partial(&self) -> bool {
        matches!(self, Self::Partial { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSection {
    pub kind: SectionKind,
    pub records: Vec<FieldRecord>,
    pub load: LoadState,
}

/// Keys in first-seen order, each with the label it was first seen with.
#[derive(Debug, Default)]
pub(crate) struct KeyOrder {
    entries: Vec<(String, String)>,
    seen: HashSet<String>,
}

impl KeyOrder {
    pub(crate) fn insert(&mut self, key: &str, label: &str) {
        if self.seen.insert(key.to_owned()) {
            self.entries.push((key.to_owned(), label.to_owned()));
        }
    }

    pub(crate) fn into_entries(self) -> Vec<(String, String)> {
        self.entries
    }
}

/// Merges the columns' payloads for one non-settings section. Settings go
/// through [`crate::build_settings_tree`] instead.
pub fn normalize_section(kind: SectionKind, columns: &[Column]) -> NormalizedSection {
    let records = match kind {
        SectionKind::Basic | SectionKind::Features | SectionKind::Advanced => {
            flat_records(kind, columns)
        }
        SectionKind::Plans => plan_records(columns),
        SectionKind::AddOns => add_on_records(columns),
        SectionKind::Settings => Vec::new(),
    };
    NormalizedSection {
        kind,
        records,
        load: LoadState::for_section(kind, columns),
    }
}

pub fn flat_records(kind: SectionKind, columns: &[Column]) -> Vec<FieldRecord> {
    let mut order = KeyOrder::default();
    for details in columns.iter().filter_map(|column| column.details.ready()) {
        for row in details.rows(kind) {
            order.insert(row.key(), row.label());
        }
    }

    order
        .into_entries()
        .into_iter()
        .map(|(key, label)| {
            let values = columns
                .iter()
                .map(|column| {
                    column
                        .details
                        .ready()
                        .and_then(|details| details.find(kind, &key))
                        .map_or(Cell::Absent, |row| Cell::Value(row.value().clone()))
                })
                .collect();
            FieldRecord { key, label, values }
        })
        .collect()
}

pub fn plan_records(columns: &[Column]) -> Vec<FieldRecord> {
    let mut order = KeyOrder::default();
    for catalog in columns.iter().filter_map(|column| column.plans.ready()) {
        for plan in &catalog.trial_plans {
            order.insert(&plan.name, &plan.name);
        }
    }

    let current = columns
        .iter()
        .map(|column| {
            column
                .plans
                .ready()
                .and_then(|catalog| catalog.current())
                .map_or(Cell::Absent, |plan| Cell::text(plan.name.clone()))
        })
        .collect();

    let mut records = vec![FieldRecord {
        key: CURRENT_PLAN_KEY.to_owned(),
        label: CURRENT_PLAN_LABEL.to_owned(),
        values: current,
    }];
    records.extend(order.into_entries().into_iter().map(|(name, label)| {
        let values = columns
            .iter()
            .map(|column| {
                column
                    .plans
                    .ready()
                    .and_then(|catalog| catalog.find(&name))
                    .map_or(Cell::Absent, plan_cell)
            })
            .collect();
        FieldRecord {
            key: format!("{PLAN_KEY_PREFIX}{name}"),
            label,
            values,
        }
    }));
    records
}

pub fn add_on_records(columns: &[Column]) -> Vec<FieldRecord> {
    let mut order = KeyOrder::default();
    for catalog in columns.iter().filter_map(|column| column.add_ons.ready()) {
        for add_on in &catalog.trial_add_ons {
            order.insert(&add_on.name, add_on_title(add_on));
        }
    }

    order
        .into_entries()
        .into_iter()
        .map(|(name, label)| {
            let values = columns
                .iter()
                .map(|column| {
                    column
                        .add_ons
                        .ready()
                        .and_then(|catalog| catalog.find(&name))
                        .map_or(Cell::Absent, add_on_cell)
                })
                .collect();
            FieldRecord {
                key: format!("{ADD_ON_KEY_PREFIX}{name}"),
                label,
                values,
            }
        })
        .collect()
}

pub fn add_on_title(add_on: &AddOn) -> &str {
    add_on
        .title
        .as_deref()
        .filter(|title| !title.is_empty())
        .unwrap_or(&add_on.name)
}

pub fn plan_cell(plan: &Plan) -> Cell {
    if plan.is_current() {
        return Cell::text("CURRENT");
    }
    Cell::text(next_action_text(plan.next_action.as_deref()))
}

pub fn add_on_cell(add_on: &AddOn) -> Cell {
    if let Some(status) = add_on.status.as_deref()
        && !status.is_empty()
    {
        return Cell::text(status);
    }
    if let Some(days) = add_on.days_left {
        return Cell::text(format!(
            "{} days left",
            FieldValue::Number(days).to_compare_string()
        ));
    }
    Cell::text(next_action_text(add_on.next_action.as_deref()))
}

fn next_action_text(action: Option<&str>) -> String {
    match action {
        Some(action) if !action.is_empty() => action.replace('_', " "),
        _ => "available".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        CURRENT_PLAN_KEY, LoadState, add_on_records, flat_records, normalize_section,
        plan_records,
    };
    use crate::{
        AddOn, AddOnCatalog, Cell, Column, ColumnId, Details, FieldValue, FlatRow, Plan,
        PlanCatalog, SectionKind,
    };

    fn details(rows: &[(&str, &str, FieldValue)]) -> Details {
        Details {
            basic_data: rows
                .iter()
                .map(|(label, key, value)| FlatRow::new(label, key, value.clone()))
                .collect(),
            ..Details::default()
        }
    }

    fn plan(name: &str, status: Option<&str>, next_action: Option<&str>) -> Plan {
        Plan {
            name: name.to_owned(),
            status: status.map(str::to_owned),
            next_action: next_action.map(str::to_owned),
        }
    }

    fn add_on(name: &str, status: Option<&str>, days_left: Option<f64>) -> AddOn {
        AddOn {
            name: name.to_owned(),
            title: Some(format!("{name} title")),
            status: status.map(str::to_owned),
            days_left,
            next_action: Some("START_TRIAL".to_owned()),
        }
    }

    #[test]
    fn flat_labels_come_from_first_column() {
        let columns = vec![
            Column::new(ColumnId::new(1), "a", "#fff").with_details(details(&[
                ("Users", "users", FieldValue::Number(4.0)),
                ("Status", "status", FieldValue::text("ACTIVE")),
            ])),
            Column::new(ColumnId::new(2), "b", "#000").with_details(details(&[
                ("Seats", "users", FieldValue::Number(4.0)),
                ("Region", "region", FieldValue::text("eu")),
            ])),
        ];

        let records = flat_records(SectionKind::Basic, &columns);
        let keys = records.iter().map(|r| r.key.as_str()).collect::<Vec<_>>();
        assert_eq!(keys, vec!["users", "status", "region"]);
        assert_eq!(records[0].label, "Users");
        assert_eq!(records[1].values[1], Cell::Absent);
        assert_eq!(records[2].values[0], Cell::Absent);
        assert_eq!(records[2].values[1], Cell::text("eu"));
    }

    #[test]
    fn plan_rows_synthesize_current_plan() {
        let columns = vec![
            Column::new(ColumnId::new(1), "a", "#fff").with_plans(PlanCatalog {
                trial_plans: vec![
                    plan("Ultimate", Some("CURRENT_PLAN"), None),
                    plan("Gxp", None, Some("CONTACT_SALES")),
                ],
            }),
            Column::new(ColumnId::new(2), "b", "#000").with_plans(PlanCatalog {
                trial_plans: vec![plan("Ultimate", None, None), plan("Rooms", None, None)],
            }),
        ];

        let records = plan_records(&columns);
        assert_eq!(records[0].key, CURRENT_PLAN_KEY);
        assert_eq!(records[0].values, vec![Cell::text("Ultimate"), Cell::Absent]);
        assert_eq!(records[1].key, "plan__Ultimate");
        assert_eq!(
            records[1].values,
            vec![Cell::text("CURRENT"), Cell::text("available")]
        );
        assert_eq!(
            records[2].values,
            vec![Cell::text("CONTACT SALES"), Cell::Absent]
        );
        assert_eq!(records[3].label, "Rooms");
    }

    #[test]
    fn add_on_value_priority() {
        let columns = vec![Column::new(ColumnId::new(1), "a", "#fff").with_add_ons(
            AddOnCatalog {
                trial_add_ons: vec![
                    add_on("copilot", Some("ACTIVE"), Some(3.0)),
                    add_on("rooms", None, Some(12.0)),
                    add_on("audit", Some(""), None),
                ],
            },
        )];

        let records = add_on_records(&columns);
        assert_eq!(records[0].key, "addon__copilot");
        assert_eq!(records[0].label, "copilot title");
        assert_eq!(records[0].values, vec![Cell::text("ACTIVE")]);
        assert_eq!(records[1].values, vec![Cell::text("12 days left")]);
        assert_eq!(records[2].values, vec![Cell::text("START TRIAL")]);
    }

    #[test]
    fn pending_catalog_marks_section_partial() {
        let ready = Column::new(ColumnId::new(1), "a", "#fff")
            .with_details(Details::default())
            .with_plans(PlanCatalog::default());
        let waiting = Column::new(ColumnId::new(2), "b", "#000").with_details(Details::default());
        let columns = vec![ready, waiting];

        let plans = normalize_section(SectionKind::Plans, &columns);
        assert_eq!(
            plans.load,
            LoadState::Partial {
                pending: vec![ColumnId::new(2)]
            }
        );
        assert_eq!(plans.records.len(), 1);

        let basic = normalize_section(SectionKind::Basic, &columns);
        assert_eq!(basic.load, LoadState::Complete);
        assert!(basic.records.is_empty());
    }

    #[test]
    fn normalization_is_idempotent() {
        let columns = vec![
            Column::new(ColumnId::new(1), "a", "#fff")
                .with_details(details(&[("Users", "users", FieldValue::Number(4.0))])),
        ];
        let first = normalize_section(SectionKind::Basic, &columns);
        let second = normalize_section(SectionKind::Basic, &columns);
        assert_eq!(first, second);
    }
}
