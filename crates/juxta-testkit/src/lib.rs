// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use juxta_app::{
    AddOn, AddOnCatalog, CURRENT_PLAN_STATUS, Column, ColumnId, Details, FieldValue, FlatRow,
    Plan, PlanCatalog, SettingItem, SettingsCatalog, palette_color,
};
use std::path::PathBuf;

const ENTITY_NAMES: [&str; 12] = [
    "acme", "globex", "initech", "umbrella", "hooli", "vandelay", "wonka", "stark", "wayne",
    "tyrell", "cyberdyne", "soylent",
];

const ADMIN_NAMES: [&str; 10] = [
    "Avery", "Jordan", "Taylor", "Riley", "Morgan", "Casey", "Quinn", "Parker", "Rowan", "Drew",
];
const ADMIN_SURNAMES: [&str; 10] = [
    "Walker", "Martin", "Evans", "Lopez", "Reed", "Turner", "Flores", "Bennett", "Price",
    "Brooks",
];

const PLAN_NAMES: [&str; 3] = ["Business", "Ultimate", "Enterprise"];
const PLAN_GENERATIONS: [&str; 2] = ["Gen_4", "Gen_5"];
const SEAT_TIERS: [&str; 5] = ["25", "50", "100", "250", "500"];
const DOMAIN_STATUSES: [&str; 4] = ["active", "active", "active", "inactive"];
const TRASH_DAYS: [&str; 4] = ["30", "90", "180", "365"];
const PAYMENT_TYPES: [&str; 3] = ["Invoice", "Credit Card", "Reseller"];
const FLAGS: [&str; 2] = ["TRUE", "FALSE"];
const SUPPORT_TYPES: [&str; 3] = ["standard", "premium", "enhanced"];
const TFA_MODES: [&str; 3] = ["Enabled", "Disabled", "Optional"];
const DATA_CENTERS: [&str; 4] = ["avl", "sjc", "iad", "dub"];
const PODS: [&str; 4] = ["1000", "1001", "1002", "2000"];
const STORAGE_TYPES: [&str; 3] = ["GCS", "S3", "Azure"];
const RESELLER_CODES: [&str; 4] = ["None", "MSFT", "GOOG", "None"];

const CATALOG_PLANS: [(&str, &str); 4] = [
    ("Ultimate", "TRY_FEATURES"),
    ("Life Sciences Professional", "TRY_FEATURES"),
    ("Document Room Enterprise", "TRY_FEATURES"),
    ("GxP With Governance", "CONTACT_SALES"),
];

const CATALOG_ADD_ONS: [(&str, &str); 5] = [
    ("project_control_package", "Project Hub"),
    (
        "specialized_file_handler_package",
        "Specialized File Handler Add-On",
    ),
    ("document_portal_add_on", "Document Portal Add-On"),
    ("copilot_add_on", "Copilot Add-On"),
    ("ransomware_recovery_90", "Advanced Snapshot & Recovery"),
];

const SETTING_LEVELS: [&str; 4] = ["DOMAIN", "DC", "POD", "DEFAULT"];

/// Setting names with the level they usually resolve at. Names without a
/// dot land in the root bucket.
const SETTING_NAMES: [(&str, usize); 12] = [
    ("sharing.external_links", 0),
    ("sharing.link_expiry_days", 0),
    ("sharing.upload_links", 0),
    ("security.tfa_required", 0),
    ("security.session_timeout", 1),
    ("sync.max_file_size_gb", 1),
    ("sync.delta_sync", 2),
    ("search.ocr_enabled", 2),
    ("search.index_batch", 2),
    ("retention.trash_days", 3),
    ("retention.version_limit", 3),
    ("maintenance_window", 3),
];

struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }

    fn bool(&mut self) -> bool {
        (self.next_u64() & 1) == 1
    }
}

/// Generates plausible payloads for one entity. The same seed always yields
/// the same payloads, so demo sessions and tests are reproducible.
pub struct PayloadFaker {
    rng: DeterministicRng,
    seed: u64,
}

impl PayloadFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
            seed: normalized,
        }
    }

    /// Faker seeded from the entity name.
    pub fn for_entity(entity: &str) -> Self {
        Self::new(entity_seed(entity))
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn int_n(&mut self, n: usize) -> usize {
        self.rng.int_n(n)
    }

    pub fn entity_name(&mut self) -> String {
        let base = self.pick(&ENTITY_NAMES);
        if self.rng.bool() {
            base.to_owned()
        } else {
            format!("{base}{}", self.int_range(2, 99))
        }
    }

    pub fn details(&mut self) -> Details {
        let admin = self.pick(&ADMIN_NAMES);
        let surname = self.pick(&ADMIN_SURNAMES);
        let email = format!(
            "{}.{}@example.com",
            admin.to_lowercase(),
            surname.to_lowercase()
        );
        let current_mrr = self.money(500, 15_500);
        let max_members = self.pick(&SEAT_TIERS);
        let seats: i64 = max_members.parse().unwrap_or(50);

        let basic_data = vec![
            text_row("Scheme Type (Trial or Buy?)", "schemeType", "buy"),
            text_row(
                "Subscription date",
                "subscription_date",
                &format!(
                    "{:02}/{:02}/{}",
                    self.int_range(1, 12),
                    self.int_range(1, 28),
                    self.int_range(2014, 2025)
                ),
            ),
            text_row(
                "Domain status",
                "domain_status",
                self.pick(&DOMAIN_STATUSES),
            ),
            text_row("Payment type", "payment_type", self.pick(&PAYMENT_TYPES)),
            text_row("Admin name", "admin_name", admin),
            text_row("Admin surname", "admin_surname", surname),
            text_row("Admin email", "admin_email", &email),
            number_row("MRR(current)", "current_mrr", current_mrr),
            number_row("MRR(subscription)", "subscription_mrr", 3500.0),
            text_row("Plan Name", "planName", self.pick(&PLAN_NAMES)),
            text_row("Plan Type", "planTypeBilling", self.pick(&PLAN_GENERATIONS)),
            number_row(
                "Power Users Consumed",
                "actual_total_users",
                self.int_range(10, 209) as f64,
            ),
            text_row("Power Users Purchased", "maxMembers", max_members),
            number_row(
                "Standard Users Consumed",
                "actual_total_standard_users",
                self.int_range(0, seats) as f64,
            ),
            number_row("Storage Purchased", "maxSpaceAllowed", 10_240.0),
            text_row(
                "Trash Retention policy (in Days)",
                "trash_empty_days",
                self.pick(&TRASH_DAYS),
            ),
            text_row("Max File Size Limit", "max_filesize_limit", "150.0 GB"),
        ];

        let features_data = vec![
            text_row("Is Branding Enabled", "isAdvancedBrandingAvailable", "TRUE"),
            text_row("Is Advanced Audit Enabled", "isAuditEnabled", "TRUE"),
            text_row("Is FTP Enabled", "isFtpEnabled", self.pick(&FLAGS)),
            text_row(
                "Is Local Cloud Available",
                "isLocalCloudAvailable",
                self.pick(&FLAGS),
            ),
            text_row(
                "Is TFA Enabled",
                "twoFactorAuthenticationAvailable",
                "TRUE",
            ),
            text_row(
                "TFA info",
                "twoFactorAuthenticationInfo",
                self.pick(&TFA_MODES),
            ),
            text_row("Support Type", "supportType", self.pick(&SUPPORT_TYPES)),
            text_row(
                "Is Egnyte for DocuSign Enabled",
                "isDocuSignIntegrationAvailable",
                self.pick(&FLAGS),
            ),
        ];

        let advanced_data = vec![
            text_row("Data Center", "dc", self.pick(&DATA_CENTERS)),
            text_row("POD number", "pod_number", self.pick(&PODS)),
            FlatRow::new(
                "External Storage",
                "custom_storage",
                FieldValue::Bool(self.rng.int_n(4) == 0),
            ),
            text_row(
                "External Storage Type",
                "storage_type",
                self.pick(&STORAGE_TYPES),
            ),
            text_row("Reseller Code", "resellerCode", self.pick(&RESELLER_CODES)),
        ];

        Details {
            basic_data,
            features_data,
            advanced_data,
        }
    }

    /// Catalog with exactly one current plan, chosen at random.
    pub fn plan_catalog(&mut self) -> PlanCatalog {
        let current = self.rng.int_n(CATALOG_PLANS.len());
        let trial_plans = CATALOG_PLANS
            .iter()
            .enumerate()
            .map(|(index, (name, next_action))| {
                if index == current {
                    Plan {
                        name: (*name).to_owned(),
                        status: Some(CURRENT_PLAN_STATUS.to_owned()),
                        next_action: None,
                    }
                } else {
                    Plan {
                        name: (*name).to_owned(),
                        status: None,
                        next_action: Some((*next_action).to_owned()),
                    }
                }
            })
            .collect();
        PlanCatalog { trial_plans }
    }

    pub fn add_on_catalog(&mut self) -> AddOnCatalog {
        let trial_add_ons = CATALOG_ADD_ONS
            .iter()
            .map(|(name, title)| match self.rng.int_n(4) {
                0 => AddOn {
                    name: (*name).to_owned(),
                    title: Some((*title).to_owned()),
                    status: Some("ACTIVE".to_owned()),
                    days_left: None,
                    next_action: None,
                },
                1 => AddOn {
                    name: (*name).to_owned(),
                    title: Some((*title).to_owned()),
                    status: None,
                    days_left: Some(self.int_range(1, 30) as f64),
                    next_action: None,
                },
                _ => AddOn {
                    name: (*name).to_owned(),
                    title: Some((*title).to_owned()),
                    status: None,
                    days_left: None,
                    next_action: Some("START_FREE_TRIAL".to_owned()),
                },
            })
            .collect();
        AddOnCatalog { trial_add_ons }
    }

    /// Settings spread over the known levels. Roughly one name in six is
    /// missing so columns disagree on which settings exist.
    pub fn settings_catalog(&mut self) -> SettingsCatalog {
        let mut content = Vec::new();
        for (name, level) in SETTING_NAMES {
            if self.rng.int_n(6) == 0 {
                continue;
            }
            let value = match name.rsplit(['.', '_']).next() {
                Some("days") | Some("timeout") | Some("gb") | Some("limit") | Some("batch") => {
                    FieldValue::Number(self.int_range(1, 12) as f64 * 10.0)
                }
                Some("window") => FieldValue::text(format!("{:02}:00", self.int_range(0, 23))),
                _ => FieldValue::Bool(self.rng.bool()),
            };
            content.push(SettingItem {
                name: name.to_owned(),
                key_level: Some(SETTING_LEVELS[level].to_owned()),
                value,
            });
        }
        SettingsCatalog { content }
    }

    /// A column with every payload resolved.
    pub fn column(&mut self, id: i64, label: &str) -> Column {
        let details = self.details();
        let plans = self.plan_catalog();
        let add_ons = self.add_on_catalog();
        let settings = self.settings_catalog();
        Column::new(
            ColumnId::new(id),
            label,
            palette_color(id.unsigned_abs() as usize),
        )
        .with_details(details)
        .with_plans(plans)
        .with_add_ons(add_ons)
        .with_settings(settings)
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }

    fn int_range(&mut self, min: i64, max: i64) -> i64 {
        if max <= min {
            return min;
        }
        let span = max - min + 1;
        min + (self.rng.next_u64() % (span as u64)) as i64
    }

    fn money(&mut self, min: i64, max: i64) -> f64 {
        let cents = self.int_range(min * 100, max * 100);
        cents as f64 / 100.0
    }
}

/// FNV-1a over the bytes of `entity`.
pub fn entity_seed(entity: &str) -> u64 {
    entity.bytes().fold(0xCBF2_9CE4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0000_0100_0000_01B3)
    })
}

pub fn text_row(label: &str, key: &str, value: &str) -> FlatRow {
    FlatRow::new(label, key, FieldValue::text(value))
}

pub fn number_row(label: &str, key: &str, value: f64) -> FlatRow {
    FlatRow::new(label, key, FieldValue::Number(value))
}

pub fn setting(name: &str, level: &str, value: FieldValue) -> SettingItem {
    SettingItem {
        name: name.to_owned(),
        key_level: Some(level.to_owned()),
        value,
    }
}

/// Column with only a basic section, for tests that care about one field set.
pub fn basic_column(id: i64, label: &str, rows: Vec<FlatRow>) -> Column {
    Column::new(
        ColumnId::new(id),
        label,
        palette_color(id.unsigned_abs() as usize),
    )
    .with_details(Details {
        basic_data: rows,
        ..Details::default()
    })
}

pub fn temp_db_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let db_path = dir.path().join("juxta.db");
    Ok((dir, db_path))
}

pub fn fixture_entities() -> &'static [&'static str] {
    &ENTITY_NAMES
}

#[cfg(test)]
mod tests {
    use super::{PayloadFaker, entity_seed, setting};
    use juxta_app::{FieldValue, LEVEL_PRIORITY, SectionKind, split_setting_name};
    use std::collections::BTreeSet;

    #[test]
    fn same_seed_same_payloads() {
        let mut left = PayloadFaker::new(42);
        let mut right = PayloadFaker::new(42);
        assert_eq!(left.details(), right.details());
        assert_eq!(left.plan_catalog(), right.plan_catalog());
        assert_eq!(left.settings_catalog(), right.settings_catalog());
    }

    #[test]
    fn entity_seed_is_stable_per_name() {
        assert_eq!(entity_seed("acme"), entity_seed("acme"));
        assert_ne!(entity_seed("acme"), entity_seed("globex"));
        assert_eq!(
            PayloadFaker::for_entity("acme").seed(),
            PayloadFaker::for_entity("acme").seed()
        );
    }

    #[test]
    fn zero_seed_is_normalized() {
        assert_eq!(PayloadFaker::new(0).seed(), 1);
    }

    #[test]
    fn details_keys_are_unique_per_section() {
        let mut faker = PayloadFaker::new(7);
        let details = faker.details();
        for kind in SectionKind::FLAT {
            let rows = details.rows(kind);
            assert!(!rows.is_empty(), "{} should have rows", kind.label());
            let keys: BTreeSet<&str> = rows.iter().map(|row| row.key()).collect();
            assert_eq!(keys.len(), rows.len());
        }
        assert!(details.find(SectionKind::Basic, "current_mrr").is_some());
        assert!(details.find(SectionKind::Features, "isFtpEnabled").is_some());
    }

    #[test]
    fn plan_catalog_has_one_current_plan() {
        for seed in 1..40 {
            let catalog = PayloadFaker::new(seed).plan_catalog();
            let current = catalog
                .trial_plans
                .iter()
                .filter(|plan| plan.is_current())
                .count();
            assert_eq!(current, 1, "seed {seed}");
            assert_eq!(catalog.trial_plans.len(), 4);
        }
    }

    #[test]
    fn add_ons_always_carry_titles() {
        let catalog = PayloadFaker::new(3).add_on_catalog();
        assert!(!catalog.trial_add_ons.is_empty());
        assert!(
            catalog
                .trial_add_ons
                .iter()
                .all(|add_on| add_on.title.as_deref().is_some_and(|t| !t.is_empty()))
        );
    }

    #[test]
    fn settings_use_known_levels() {
        let mut faker = PayloadFaker::new(11);
        for _ in 0..10 {
            let catalog = faker.settings_catalog();
            for item in &catalog.content {
                let level = item.key_level.as_deref().unwrap_or_default();
                assert!(LEVEL_PRIORITY.contains(&level), "unexpected level {level}");
                let (prefix, label) = split_setting_name(&item.name);
                assert!(!prefix.is_empty());
                assert!(!label.is_empty());
            }
        }
    }

    #[test]
    fn generated_entity_names_are_lowercase() {
        let mut faker = PayloadFaker::new(5);
        for _ in 0..20 {
            let name = faker.entity_name();
            assert_eq!(name, name.to_lowercase());
            assert!(!name.is_empty());
        }
    }

    #[test]
    fn setting_helper_sets_level() {
        let item = setting("sharing.x", "POD", FieldValue::Bool(true));
        assert_eq!(item.key_level.as_deref(), Some("POD"));
    }
}
