// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};

use crate::ids::*;

pub const ABSENT_MARK: &str = "—";
pub const CURRENT_PLAN_STATUS: &str = "CURRENT_PLAN";

pub const COLUMN_PALETTE: [&str; 8] = [
    "#00c2ff", "#ff6b35", "#a855f7", "#22c55e", "#fbbf24", "#ec4899", "#14b8a6", "#f97316",
];

pub fn palette_color(index: usize) -> &'static str {
    COLUMN_PALETTE[index % COLUMN_PALETTE.len()]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SectionKind {
    Basic,
    Features,
    Advanced,
    Plans,
    AddOns,
    Settings,
}

impl SectionKind {
    pub const ALL: [Self; 6] = [
        Self::Basic,
        Self::Features,
        Self::Advanced,
        Self::Plans,
        Self::AddOns,
        Self::Settings,
    ];

    pub const FLAT: [Self; 3] = [Self::Basic, Self::Features, Self::Advanced];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Features => "features",
            Self::Advanced => "advanced",
            Self::Plans => "plans",
            Self::AddOns => "addons",
            Self::Settings => "settings",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "basic" => Some(Self::Basic),
            "features" => Some(Self::Features),
            "advanced" => Some(Self::Advanced),
            "plans" => Some(Self::Plans),
            "addons" => Some(Self::AddOns),
            "settings" => Some(Self::Settings),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Basic => "Basic Configuration",
            Self::Features => "Features",
            Self::Advanced => "Advanced / Infrastructure",
            Self::Plans => "Plans",
            Self::AddOns => "Add-ons",
            Self::Settings => "Settings",
        }
    }

    pub const fn default_collapsed(self) -> bool {
        matches!(self, Self::Settings)
    }

    pub const fn is_flat(self) -> bool {
        matches!(self, Self::Basic | Self::Features | Self::Advanced)
    }
}

/// A raw scalar as it appears in a payload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Structured(serde_json::Value),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// String form used for every comparison. Numbers print the way a
    /// script runtime prints them, so `10` and `"10"` compare equal while
    /// `10` and `"10.0"` do not.
    pub fn to_compare_string(&self) -> String {
        match self {
            Self::Null => "null".to_owned(),
            Self::Bool(value) => value.to_string(),
            Self::Number(value) => format_number(*value),
            Self::Text(value) => value.clone(),
            Self::Structured(value) => structured_string(value),
        }
    }
}

pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_owned();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_owned();
    }
    if value == 0.0 {
        return "0".to_owned();
    }
    let magnitude = value.abs();
    if magnitude < 1e-6 || magnitude >= 1e21 {
        let formatted = format!("{value:e}");
        return match formatted.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                format!("{mantissa}e+{exponent}")
            }
            _ => formatted,
        };
    }
    value.to_string()
}

fn structured_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::Bool(flag) => flag.to_string(),
        serde_json::Value::Number(number) => number
            .as_f64()
            .map(format_number)
            .unwrap_or_else(|| number.to_string()),
        serde_json::Value::String(text) => text.clone(),
        serde_json::Value::Array(items) => items
            .iter()
            .map(structured_string)
            .collect::<Vec<_>>()
            .join(","),
        serde_json::Value::Object(_) => "[object Object]".to_owned(),
    }
}

/// One column's value for a field. `Absent` never equals a real value,
/// including an empty string.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    #[default]
    Absent,
    Value(FieldValue),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Value(FieldValue::Text(value.into()))
    }

    pub const fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    pub fn compare_key(&self) -> Option<String> {
        match self {
            Self::Absent => None,
            Self::Value(value) => Some(value.to_compare_string()),
        }
    }

    pub fn display(&self) -> String {
        self.compare_key().unwrap_or_else(|| ABSENT_MARK.to_owned())
    }
}

/// `[label, key, value]` row from a details payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatRow(pub String, pub String, #[serde(default)] pub FieldValue);

impl FlatRow {
    pub fn new(label: &str, key: &str, value: FieldValue) -> Self {
        Self(label.to_owned(), key.to_owned(), value)
    }

    pub fn label(&self) -> &str {
        &self.0
    }

    pub fn key(&self) -> &str {
        &self.1
    }

    pub fn value(&self) -> &FieldValue {
        &self.2
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Details {
    #[serde(default)]
    pub basic_data: Vec<FlatRow>,
    #[serde(default)]
    pub features_data: Vec<FlatRow>,
    #[serde(default)]
    pub advanced_data: Vec<FlatRow>,
}

impl Details {
    pub fn rows(&self, kind: SectionKind) -> &[FlatRow] {
        match kind {
            SectionKind::Basic => &self.basic_data,
            SectionKind::Features => &self.features_data,
            SectionKind::Advanced => &self.advanced_data,
            SectionKind::Plans | SectionKind::AddOns | SectionKind::Settings => &[],
        }
    }

    pub fn rows_mut(&mut self, kind: SectionKind) -> Option<&mut Vec<FlatRow>> {
        match kind {
            SectionKind::Basic => Some(&mut self.basic_data),
            SectionKind::Features => Some(&mut self.features_data),
            SectionKind::Advanced => Some(&mut self.advanced_data),
            SectionKind::Plans | SectionKind::AddOns | SectionKind::Settings => None,
        }
    }

    pub fn find(&self, kind: SectionKind, key: &str) -> Option<&FlatRow> {
        self.rows(kind).iter().find(|row| row.key() == key)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DetailsPayload {
    #[serde(default)]
    pub details: Details,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub next_action: Option<String>,
}

impl Plan {
    pub fn is_current(&self) -> bool {
        self.status.as_deref() == Some(CURRENT_PLAN_STATUS)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlanCatalog {
    #[serde(default)]
    pub trial_plans: Vec<Plan>,
}

impl PlanCatalog {
    pub fn current(&self) -> Option<&Plan> {
        self.trial_plans.iter().find(|plan| plan.is_current())
    }

    pub fn find(&self, name: &str) -> Option<&Plan> {
        self.trial_plans.iter().find(|plan| plan.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddOn {
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub days_left: Option<f64>,
    #[serde(default)]
    pub next_action: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AddOnCatalog {
    #[serde(default)]
    pub trial_add_ons: Vec<AddOn>,
}

impl AddOnCatalog {
    pub fn find(&self, name: &str) -> Option<&AddOn> {
        self.trial_add_ons.iter().find(|add_on| add_on.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingItem {
    pub name: String,
    #[serde(default, deserialize_with = "lenient_key_level")]
    pub key_level: Option<String>,
    #[serde(default)]
    pub value: FieldValue,
}

/// Any non-string level decodes as missing.
fn lenient_key_level<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(level) => Ok(Some(level)),
        _ => Ok(None),
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SettingsCatalog {
    #[serde(default)]
    pub content: Vec<SettingItem>,
}

impl SettingsCatalog {
    pub fn find(&self, name: &str) -> Option<&SettingItem> {
        self.content.iter().find(|item| item.name == name)
    }
}

/// Resolution state of one payload for one column.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Slot<T> {
    #[default]
    Pending,
    Ready(T),
    Unavailable,
}

impl<T> Slot<T> {
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub const fn ready(&self) -> Option<&T> {
        match self {
            Self::Ready(value) => Some(value),
            Self::Pending | Self::Unavailable => None,
        }
    }

    pub fn from_option(value: Option<T>) -> Self {
        match value {
            Some(value) => Self::Ready(value),
            None => Self::Unavailable,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub id: ColumnId,
    pub label: String,
    pub color: &'static str,
    pub details: Slot<Details>,
    pub plans: Slot<PlanCatalog>,
    pub add_ons: Slot<AddOnCatalog>,
    pub settings: Slot<SettingsCatalog>,
}

impl Column {
    pub fn new(id: ColumnId, label: impl Into<String>, color: &'static str) -> Self {
        Self {
            id,
            label: label.into(),
            color,
            details: Slot::Pending,
            plans: Slot::Pending,
            add_ons: Slot::Pending,
            settings: Slot::Pending,
        }
    }

    pub fn with_details(mut self, details: Details) -> Self {
        self.details = Slot::Ready(details);
        self
    }

    pub fn with_plans(mut self, plans: PlanCatalog) -> Self {
        self.plans = Slot::Ready(plans);
        self
    }

    pub fn with_add_ons(mut self, add_ons: AddOnCatalog) -> Self {
        self.add_ons = Slot::Ready(add_ons);
        self
    }

    pub fn with_settings(mut self, settings: SettingsCatalog) -> Self {
        self.settings = Slot::Ready(settings);
        self
    }

    /// Whether the payload feeding `kind` has not arrived yet.
    pub const fn is_pending(&self, kind: SectionKind) -> bool {
        match kind {
            SectionKind::Basic | SectionKind::Features | SectionKind::Advanced => {
                self.details.is_pending()
            }
            SectionKind::Plans => self.plans.is_pending(),
            SectionKind::AddOns => self.add_ons.is_pending(),
            SectionKind::Settings => self.settings.is_pending(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabKind {
    Compare,
    Versions,
    Query,
}

impl TabKind {
    pub const ALL: [Self; 3] = [Self::Compare, Self::Versions, Self::Query];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Compare => "compare",
            Self::Versions => "versions",
            Self::Query => "query",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        AddOnCatalog, Cell, DetailsPayload, FieldValue, PlanCatalog, SectionKind,
        SettingsCatalog, format_number, palette_color,
    };

    #[test]
    fn numbers_stringify_like_a_script_runtime() {
        assert_eq!(format_number(10.0), "10");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(33.57), "33.57");
        assert_eq!(format_number(7968.0), "7968");
        assert_eq!(format_number(0.000001), "0.000001");
        assert_eq!(format_number(1e-7), "1e-7");
        assert_eq!(format_number(-2.5e-9), "-2.5e-9");
        assert_eq!(format_number(1e20), "100000000000000000000");
        assert_eq!(format_number(1e21), "1e+21");
        assert_eq!(format_number(1.5e300), "1.5e+300");
        assert_eq!(FieldValue::Number(1e-7).to_compare_string(), "1e-7");
        assert_eq!(FieldValue::Number(10.0).to_compare_string(), "10");
        assert_eq!(FieldValue::text("10.0").to_compare_string(), "10.0");
        assert_eq!(FieldValue::Bool(true).to_compare_string(), "true");
        assert_eq!(FieldValue::Null.to_compare_string(), "null");
    }

    #[test]
    fn absent_cell_is_distinct_from_empty_text() {
        assert_ne!(Cell::Absent.compare_key(), Cell::text("").compare_key());
        assert_ne!(Cell::Absent.compare_key(), Cell::text("—").compare_key());
        assert_eq!(Cell::Absent.display(), "—");
    }

    #[test]
    fn details_payload_parses_mixed_scalars() -> anyhow::Result<()> {
        let payload: DetailsPayload = serde_json::from_str(
            r#"{"details":{"basic_data":[["Users","actual_total_users",46],
                ["Status","domain_status","ACTIVE"],["MRR","current_mrr",33.57],
                ["Two FA","tfa",null],["Flag","flag",true]]}}"#,
        )?;
        let rows = payload.details.rows(SectionKind::Basic);
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0].value(), &FieldValue::Number(46.0));
        assert_eq!(rows[1].value(), &FieldValue::text("ACTIVE"));
        assert_eq!(rows[3].value(), &FieldValue::Null);
        assert_eq!(rows[4].value(), &FieldValue::Bool(true));
        assert!(payload.details.features_data.is_empty());
        Ok(())
    }

    #[test]
    fn structured_values_stringify() -> anyhow::Result<()> {
        let payload: DetailsPayload =
            serde_json::from_str(r#"{"details":{"advanced_data":[["Zones","zones",[1,"b"]]]}}"#)?;
        let row = &payload.details.advanced_data[0];
        assert_eq!(row.value().to_compare_string(), "1,b");
        Ok(())
    }

    #[test]
    fn catalogs_ignore_unknown_fields() -> anyhow::Result<()> {
        let plans: PlanCatalog = serde_json::from_str(
            r#"{"trial_plans":[{"name":"Ultimate","pvi":1,"status":"CURRENT_PLAN","next_action":null},
                {"name":"Basic","status":null,"next_action":"TRY_FEATURES"}],"can_edit":true}"#,
        )?;
        assert_eq!(plans.current().map(|plan| plan.name.as_str()), Some("Ultimate"));

        let add_ons: AddOnCatalog = serde_json::from_str(
            r#"{"trial_add_ons":[{"name":"copilot","title":"Copilot","status":null,"days_left":12,"next_action":null}]}"#,
        )?;
        assert_eq!(add_ons.find("copilot").and_then(|a| a.days_left), Some(12.0));

        let settings: SettingsCatalog = serde_json::from_str(
            r#"{"content":[{"name":"ui.theme","key_level":"DOMAIN","value":"dark"},{"name":"orphan"}]}"#,
        )?;
        assert_eq!(settings.content.len(), 2);
        assert!(settings.content[1].key_level.is_none());
        Ok(())
    }

    #[test]
    fn section_metadata() {
        assert_eq!(SectionKind::ALL.len(), 6);
        assert!(SectionKind::Settings.default_collapsed());
        assert!(!SectionKind::Basic.default_collapsed());
        for kind in SectionKind::ALL {
            assert_eq!(SectionKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(palette_color(0), "#00c2ff");
        assert_eq!(palette_color(8), "#00c2ff");
    }
}
