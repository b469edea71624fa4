// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeMap;
use std::fmt;

use crate::SectionKind;

const LEVEL_SEPARATOR: &str = "::";

/// A collapsible header in the compare table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeId {
    Section(SectionKind),
    Level(String),
    Prefix { level: String, prefix: String },
}

impl NodeId {
    pub fn level(level: impl Into<String>) -> Self {
        Self::Level(level.into())
    }

    pub fn prefix(level: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self::Prefix {
            level: level.into(),
            prefix: prefix.into(),
        }
    }

    pub fn default_collapsed(&self) -> bool {
        match self {
            Self::Section(kind) => kind.default_collapsed(),
            Self::Level(_) | Self::Prefix { .. } => false,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let mut parts = value.splitn(3, LEVEL_SEPARATOR);
        let section = SectionKind::parse(parts.next()?)?;
        match (parts.next(), parts.next()) {
            (None, _) => Some(Self::Section(section)),
            (Some(level), None) if section == SectionKind::Settings && !level.is_empty() => {
                Some(Self::level(level))
            }
            (Some(level), Some(prefix))
                if section == SectionKind::Settings && !level.is_empty() && !prefix.is_empty() =>
            {
                Some(Self::prefix(level, prefix))
            }
            _ => None,
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let settings = SectionKind::Settings.as_str();
        match self {
            Self::Section(kind) => f.write_str(kind.as_str()),
            Self::Level(level) => write!(f, "{settings}{LEVEL_SEPARATOR}{level}"),
            Self::Prefix { level, prefix } => {
                write!(
                    f,
                    "{settings}{LEVEL_SEPARATOR}{level}{LEVEL_SEPARATOR}{prefix}"
                )
            }
        }
    }
}

/// Explicit collapse flags per header. Headers without an entry resolve to
/// their default.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CollapseState {
    entries: BTreeMap<NodeId, bool>,
}

impl CollapseState {
    pub fn is_collapsed(&self, node: &NodeId) -> bool {
        self.entries
            .get(node)
            .copied()
            .unwrap_or_else(|| node.default_collapsed())
    }

    pub fn set(&mut self, node: NodeId, collapsed: bool) {
        self.entries.insert(node, collapsed);
    }

    /// Flips `node` and writes the new state onto every descendant header.
    /// Ancestors are never touched. Returns the new state.
    pub fn toggle<'a>(
        &mut self,
        node: &NodeId,
        descendants: impl IntoIterator<Item = &'a NodeId>,
    ) -> bool {
        let collapsed = !self.is_collapsed(node);
        self.entries.insert(node.clone(), collapsed);
        for child in descendants {
            self.entries.insert(child.clone(), collapsed);
        }
        collapsed
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{CollapseState, NodeId};
    use crate::SectionKind;

    #[test]
    fn defaults_follow_section_kind() {
        let state = CollapseState::default();
        assert!(state.is_collapsed(&NodeId::Section(SectionKind::Settings)));
        assert!(!state.is_collapsed(&NodeId::Section(SectionKind::Basic)));
        assert!(!state.is_collapsed(&NodeId::level("DOMAIN")));
    }

    #[test]
    fn toggle_flips_and_cascades_down() {
        let mut state = CollapseState::default();
        let level = NodeId::level("DOMAIN");
        let children = vec![NodeId::prefix("DOMAIN", "ui"), NodeId::prefix("DOMAIN", "mail")];

        assert!(state.toggle(&level, &children));
        assert!(children.iter().all(|child| state.is_collapsed(child)));

        assert!(!state.toggle(&level, &children));
        assert!(children.iter().all(|child| !state.is_collapsed(child)));
    }

    #[test]
    fn prefix_toggle_leaves_parents_alone() {
        let mut state = CollapseState::default();
        let section = NodeId::Section(SectionKind::Settings);
        let level = NodeId::level("DC");
        state.toggle(&section, &[level.clone()]);
        assert!(!state.is_collapsed(&section));

        state.toggle(&NodeId::prefix("DC", "ui"), &[] as &[NodeId]);
        assert!(!state.is_collapsed(&level));
        assert!(!state.is_collapsed(&section));
        assert!(!state.is_collapsed(&NodeId::prefix("DC", "mail")));
    }

    #[test]
    fn reset_restores_defaults() {
        let mut state = CollapseState::default();
        state.set(NodeId::Section(SectionKind::Settings), false);
        state.reset();
        assert!(state.is_empty());
        assert!(state.is_collapsed(&NodeId::Section(SectionKind::Settings)));
    }

    #[test]
    fn node_ids_round_trip_through_text() {
        let nodes = [
            NodeId::Section(SectionKind::AddOns),
            NodeId::level("DOMAIN"),
            NodeId::prefix("POD", "__root__"),
        ];
        for node in nodes {
            assert_eq!(NodeId::parse(&node.to_string()), Some(node));
        }
        assert_eq!(NodeId::parse("basic::DOMAIN"), None);
        assert_eq!(NodeId::parse("nope"), None);
    }
}
