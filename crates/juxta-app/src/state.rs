// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};

use crate::{
    AddOnCatalog, CollapseState, Column, ColumnId, CompareTable, CompareView, Details, NodeId,
    PlanCatalog, SearchTerm, SectionKind, SettingsCatalog, Slot, TabKind, TableOptions,
    palette_color,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityStatus {
    Loading,
    Active,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub name: String,
    pub status: EntityStatus,
    pub column: Column,
}

impl Entity {
    pub fn id(&self) -> ColumnId {
        self.column.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    Details,
    Plans,
    AddOns,
    Settings,
}

impl PayloadKind {
    pub const ALL: [Self; 4] = [Self::Details, Self::Plans, Self::AddOns, Self::Settings];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Details => "details",
            Self::Plans => "plans",
            Self::AddOns => "add-ons",
            Self::Settings => "settings",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Details(Details),
    Plans(PlanCatalog),
    AddOns(AddOnCatalog),
    Settings(SettingsCatalog),
}

impl Payload {
    pub const fn kind(&self) -> PayloadKind {
        match self {
            Self::Details(_) => PayloadKind::Details,
            Self::Plans(_) => PayloadKind::Plans,
            Self::AddOns(_) => PayloadKind::AddOns,
            Self::Settings(_) => PayloadKind::Settings,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    pub active_tab: TabKind,
    pub entities: Vec<Entity>,
    pub collapse: CollapseState,
    pub search: SearchTerm,
    pub options: TableOptions,
    pub show_keys: bool,
    pub status_line: Option<String>,
    next_id: i64,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            active_tab: TabKind::Compare,
            entities: Vec::new(),
            collapse: CollapseState::default(),
            search: SearchTerm::default(),
            options: TableOptions::default(),
            show_keys: false,
            status_line: None,
            next_id: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    NextTab,
    PrevTab,
    AddEntity(String),
    RemoveEntity(ColumnId),
    ApplyPayload { id: ColumnId, payload: Payload },
    FetchFailed {
        id: ColumnId,
        kind: PayloadKind,
        reason: String,
    },
    ToggleCollapse(NodeId),
    ResetCollapse,
    SetSearch(String),
    SetSectionFilter(Option<SectionKind>),
    ToggleDiffOnly,
    ToggleShowKeys,
    SetStatus(String),
    ClearStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    TabChanged(TabKind),
    EntityAdded { id: ColumnId, name: String },
    EntityRemoved { id: ColumnId, name: String },
    /// The details payload arrived; the entity now has a column.
    EntityActivated { id: ColumnId, name: String },
    PayloadApplied { id: ColumnId, kind: PayloadKind },
    CollapseToggled { node: NodeId, collapsed: bool },
    CollapseReset,
    SearchChanged(String),
    SectionFilterChanged(Option<SectionKind>),
    DiffOnlyChanged(bool),
    ShowKeysChanged(bool),
    StatusUpdated(String),
    StatusCleared,
}

pub fn normalize_entity_name(raw: &str) -> String {
    raw.trim().to_lowercase()
}

impl AppState {
    pub fn dispatch(&mut self, command: AppCommand) -> Vec<AppEvent> {
        match command {
            AppCommand::NextTab => self.rotate_tab(1),
            AppCommand::PrevTab => self.rotate_tab(-1),
            AppCommand::AddEntity(raw) => match self.add_entity(&raw) {
                Ok(id) => {
                    let name = normalize_entity_name(&raw);
                    vec![
                        AppEvent::EntityAdded {
                            id,
                            name: name.clone(),
                        },
                        self.set_status(&format!("loading {name}")),
                    ]
                }
                Err(error) => vec![self.set_status(&format!("{error:#}"))],
            },
            AppCommand::RemoveEntity(id) => match self.remove_entity(id) {
                Some(entity) => vec![
                    AppEvent::EntityRemoved {
                        id,
                        name: entity.name.clone(),
                    },
                    self.set_status(&format!("removed {}", entity.name)),
                ],
                None => Vec::new(),
            },
            AppCommand::ApplyPayload { id, payload } => self.apply_payload(id, payload),
            AppCommand::FetchFailed { id, kind, reason } => self.fetch_failed(id, kind, &reason),
            AppCommand::ToggleCollapse(node) => {
                let descendants = self.compare_table().descendant_headers(&node);
                let collapsed = self.collapse.toggle(&node, &descendants);
                vec![AppEvent::CollapseToggled { node, collapsed }]
            }
            AppCommand::ResetCollapse => {
                self.collapse.reset();
                vec![AppEvent::CollapseReset]
            }
            AppCommand::SetSearch(raw) => {
                self.search = SearchTerm::new(&raw);
                vec![AppEvent::SearchChanged(self.search.as_str().to_owned())]
            }
            AppCommand::SetSectionFilter(filter) => {
                self.options.section_filter = filter;
                let label = filter.map_or("all sections", SectionKind::label);
                vec![
                    AppEvent::SectionFilterChanged(filter),
                    self.set_status(&format!("showing {}", label.to_lowercase())),
                ]
            }
            AppCommand::ToggleDiffOnly => {
                self.options.diff_only = !self.options.diff_only;
                let label = if self.options.diff_only {
                    "diffs only"
                } else {
                    "all rows"
                };
                vec![
                    AppEvent::DiffOnlyChanged(self.options.diff_only),
                    self.set_status(label),
                ]
            }
            AppCommand::ToggleShowKeys => {
                self.show_keys = !self.show_keys;
                let label = if self.show_keys {
                    "keys shown"
                } else {
                    "keys hidden"
                };
                vec![
                    AppEvent::ShowKeysChanged(self.show_keys),
                    self.set_status(label),
                ]
            }
            AppCommand::SetStatus(message) => vec![self.set_status(&message)],
            AppCommand::ClearStatus => {
                self.status_line = None;
                vec![AppEvent::StatusCleared]
            }
        }
    }

    pub fn add_entity(&mut self, raw: &str) -> Result<ColumnId> {
        let name = normalize_entity_name(raw);
        if name.is_empty() {
            bail!("entity name is required -- type a name and retry");
        }
        if self.entities.iter().any(|entity| entity.name == name) {
            bail!("{name} is already loaded -- pick a different entity");
        }

        let id = ColumnId::new(self.next_id);
        self.next_id += 1;
        let color = palette_color(self.entities.len());
        self.entities.push(Entity {
            name: name.clone(),
            status: EntityStatus::Loading,
            column: Column::new(id, name, color),
        });
        Ok(id)
    }

    pub fn remove_entity(&mut self, id: ColumnId) -> Option<Entity> {
        let index = self.entities.iter().position(|entity| entity.id() == id)?;
        Some(self.entities.remove(index))
    }

    pub fn entity(&self, id: ColumnId) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.id() == id)
    }

    pub fn entity_names(&self) -> Vec<String> {
        self.entities.iter().map(|entity| entity.name.clone()).collect()
    }

    /// Columns of entities whose details have arrived, in display order.
    pub fn columns(&self) -> Vec<Column> {
        self.entities
            .iter()
            .filter(|entity| entity.status == EntityStatus::Active)
            .map(|entity| entity.column.clone())
            .collect()
    }

    pub fn compare_table(&self) -> CompareTable {
        CompareTable::build(&self.columns(), self.options)
    }

    pub fn compare_view(&self) -> CompareView {
        CompareView::project(
            &self.compare_table(),
            &self.collapse,
            &self.search,
            self.show_keys,
        )
    }

    fn apply_payload(&mut self, id: ColumnId, payload: Payload) -> Vec<AppEvent> {
        let kind = payload.kind();
        let Some(entity) = self.entities.iter_mut().find(|entity| entity.id() == id) else {
            tracing::debug!(column = id.get(), kind = kind.as_str(), "payload for removed entity discarded");
            return Vec::new();
        };

        let mut events = Vec::new();
        match payload {
            Payload::Details(details) => {
                entity.column.details = Slot::Ready(details);
                if entity.status == EntityStatus::Loading {
                    entity.status = EntityStatus::Active;
                    events.push(AppEvent::EntityActivated {
                        id,
                        name: entity.name.clone(),
                    });
                }
            }
            Payload::Plans(plans) => entity.column.plans = Slot::Ready(plans),
            Payload::AddOns(add_ons) => entity.column.add_ons = Slot::Ready(add_ons),
            Payload::Settings(settings) => entity.column.settings = Slot::Ready(settings),
        }
        events.push(AppEvent::PayloadApplied { id, kind });
        events
    }

    fn fetch_failed(&mut self, id: ColumnId, kind: PayloadKind, reason: &str) -> Vec<AppEvent> {
        let Some(entity) = self.entities.iter_mut().find(|entity| entity.id() == id) else {
            tracing::debug!(column = id.get(), kind = kind.as_str(), "failure for removed entity discarded");
            return Vec::new();
        };
        tracing::warn!(entity = %entity.name, kind = kind.as_str(), reason, "fetch failed");

        match kind {
            PayloadKind::Details => {
                let name = entity.name.clone();
                self.remove_entity(id);
                vec![
                    AppEvent::EntityRemoved {
                        id,
                        name: name.clone(),
                    },
                    self.set_status(&format!("{name}: {reason}")),
                ]
            }
            PayloadKind::Plans => {
                entity.column.plans = Slot::Unavailable;
                let message = format!("{}: {} unavailable ({reason})", entity.name, kind.as_str());
                vec![self.set_status(&message)]
            }
            PayloadKind::AddOns => {
                entity.column.add_ons = Slot::Unavailable;
                let message = format!("{}: {} unavailable ({reason})", entity.name, kind.as_str());
                vec![self.set_status(&message)]
            }
            PayloadKind::Settings => {
                entity.column.settings = Slot::Unavailable;
                let message = format!("{}: {} unavailable ({reason})", entity.name, kind.as_str());
                vec![self.set_status(&message)]
            }
        }
    }

    fn rotate_tab(&mut self, delta: isize) -> Vec<AppEvent> {
        let tabs = TabKind::ALL;
        let current = tabs
            .iter()
            .position(|tab| *tab == self.active_tab)
            .unwrap_or(0) as isize;
        let len = tabs.len() as isize;
        let next = (current + delta).rem_euclid(len) as usize;
        self.active_tab = tabs[next];
        vec![AppEvent::TabChanged(self.active_tab)]
    }

    fn set_status(&mut self, message: &str) -> AppEvent {
        self.status_line = Some(message.to_owned());
        AppEvent::StatusUpdated(message.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::{AppCommand, AppEvent, AppState, EntityStatus, Payload, PayloadKind};
    use crate::{
        ColumnId, Details, FieldValue, FlatRow, NodeId, PlanCatalog, SectionKind, Slot, TabKind,
    };

    fn details(users: f64) -> Payload {
        Payload::Details(Details {
            basic_data: vec![FlatRow::new("Users", "users", FieldValue::Number(users))],
            ..Details::default()
        })
    }

    #[test]
    fn tab_rotation_wraps() {
        let mut state = AppState {
            active_tab: TabKind::Query,
            ..AppState::default()
        };

        let events = state.dispatch(AppCommand::NextTab);
        assert_eq!(state.active_tab, TabKind::Compare);
        assert_eq!(events, vec![AppEvent::TabChanged(TabKind::Compare)]);

        state.dispatch(AppCommand::PrevTab);
        assert_eq!(state.active_tab, TabKind::Query);
    }

    #[test]
    fn entity_names_are_normalized_and_unique() -> anyhow::Result<()> {
        let mut state = AppState::default();
        let id = state.add_entity("  ACME ")?;
        assert_eq!(state.entity(id).map(|e| e.name.as_str()), Some("acme"));
        assert_eq!(state.entity(id).map(|e| e.status), Some(EntityStatus::Loading));

        let error = state.add_entity("acme").expect_err("duplicate should fail");
        assert!(error.to_string().contains("already loaded"));
        let error = state.add_entity("   ").expect_err("empty should fail");
        assert!(error.to_string().contains("name is required"));

        let events = state.dispatch(AppCommand::AddEntity("Acme".to_owned()));
        assert_eq!(
            events,
            vec![AppEvent::StatusUpdated(
                "acme is already loaded -- pick a different entity".to_owned()
            )]
        );
        Ok(())
    }

    #[test]
    fn details_activate_entity_column() -> anyhow::Result<()> {
        let mut state = AppState::default();
        let first = state.add_entity("acme")?;
        let second = state.add_entity("globex")?;
        assert!(state.columns().is_empty());

        let events = state.dispatch(AppCommand::ApplyPayload {
            id: second,
            payload: details(5.0),
        });
        assert_eq!(
            events,
            vec![
                AppEvent::EntityActivated {
                    id: second,
                    name: "globex".to_owned()
                },
                AppEvent::PayloadApplied {
                    id: second,
                    kind: PayloadKind::Details
                },
            ]
        );
        state.dispatch(AppCommand::ApplyPayload {
            id: first,
            payload: details(4.0),
        });

        let columns = state.columns();
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].label, "acme");
        assert_eq!(columns[1].color, "#ff6b35");
        assert_eq!(state.compare_table().total.diffs, 1);
        Ok(())
    }

    #[test]
    fn late_payload_for_removed_entity_is_ignored() -> anyhow::Result<()> {
        let mut state = AppState::default();
        let id = state.add_entity("acme")?;
        state.dispatch(AppCommand::RemoveEntity(id));
        let before = state.clone();

        let events = state.dispatch(AppCommand::ApplyPayload {
            id,
            payload: Payload::Plans(PlanCatalog::default()),
        });
        assert!(events.is_empty());
        assert_eq!(state, before);

        let events = state.dispatch(AppCommand::FetchFailed {
            id,
            kind: PayloadKind::Details,
            reason: "not found".to_owned(),
        });
        assert!(events.is_empty());
        assert_eq!(state, before);
        Ok(())
    }

    #[test]
    fn details_failure_removes_placeholder() -> anyhow::Result<()> {
        let mut state = AppState::default();
        let id = state.add_entity("acme")?;
        let events = state.dispatch(AppCommand::FetchFailed {
            id,
            kind: PayloadKind::Details,
            reason: "not logged in".to_owned(),
        });
        assert!(state.entities.is_empty());
        assert_eq!(
            events.last(),
            Some(&AppEvent::StatusUpdated("acme: not logged in".to_owned()))
        );
        Ok(())
    }

    #[test]
    fn catalog_failure_resolves_slot() -> anyhow::Result<()> {
        let mut state = AppState::default();
        let id = state.add_entity("acme")?;
        state.dispatch(AppCommand::ApplyPayload {
            id,
            payload: details(4.0),
        });
        state.dispatch(AppCommand::FetchFailed {
            id,
            kind: PayloadKind::Settings,
            reason: "HTTP 500".to_owned(),
        });
        let entity = state.entity(id).expect("entity kept");
        assert_eq!(entity.column.settings, Slot::Unavailable);
        assert!(entity.column.plans.is_pending());
        Ok(())
    }

    #[test]
    fn toggle_collapse_and_filters() -> anyhow::Result<()> {
        let mut state = AppState::default();
        let id = state.add_entity("acme")?;
        state.dispatch(AppCommand::ApplyPayload {
            id,
            payload: details(4.0),
        });

        let events = state.dispatch(AppCommand::ToggleCollapse(NodeId::Section(
            SectionKind::Settings,
        )));
        assert_eq!(
            events,
            vec![AppEvent::CollapseToggled {
                node: NodeId::Section(SectionKind::Settings),
                collapsed: false
            }]
        );

        state.dispatch(AppCommand::SetSectionFilter(Some(SectionKind::Basic)));
        assert_eq!(state.compare_table().sections.len(), 1);
        assert_eq!(state.status_line.as_deref(), Some("showing basic configuration"));

        state.dispatch(AppCommand::SetSearch("  USERS ".to_owned()));
        assert_eq!(state.search.as_str(), "users");
        assert_eq!(state.compare_view().field_rows().count(), 1);

        state.dispatch(AppCommand::ToggleDiffOnly);
        assert!(state.options.diff_only);
        assert_eq!(state.compare_view().field_rows().count(), 0);
        Ok(())
    }
}
