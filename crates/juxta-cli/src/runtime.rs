// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use juxta_app::{ColumnId, Payload, PayloadKind, SaveOutcome, SnapshotPayload, VersionSnapshot};
use juxta_db::Store;
use juxta_source::PayloadSource;
use juxta_tui::InternalEvent;
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::thread;

/// Persistence through the store, payloads from a shared source.
pub struct SourceRuntime<'a> {
    store: &'a Store,
    source: Arc<dyn PayloadSource>,
}

impl<'a> SourceRuntime<'a> {
    pub fn new(store: &'a Store, source: Arc<dyn PayloadSource>) -> Self {
        Self { store, source }
    }
}

impl juxta_tui::AppRuntime for SourceRuntime<'_> {
    fn load_active_entities(&mut self) -> Result<Vec<String>> {
        self.store.load_active_entities()
    }

    fn save_active_entities(&mut self, names: &[String]) -> Result<()> {
        self.store.save_active_entities(names)
    }

    fn history_entities(&mut self) -> Result<Vec<String>> {
        self.store.history_entities()
    }

    fn load_history(&mut self, entity: &str) -> Result<Vec<VersionSnapshot>> {
        juxta_app::HistoryStore::load_history(self.store, entity)
    }

    fn save_version(&mut self, entity: &str, payload: SnapshotPayload) -> Result<SaveOutcome> {
        self.store.save_version_if_changed(entity, payload)
    }

    fn source_label(&self) -> String {
        self.source.describe()
    }

    fn fetch_payload(&mut self, entity: &str, kind: PayloadKind) -> Result<Payload> {
        self.source.fetch(entity, kind)
    }

    /// One worker thread per payload kind.
    fn spawn_fetch(&mut self, id: ColumnId, entity: &str, tx: Sender<InternalEvent>) -> Result<()> {
        for kind in PayloadKind::ALL {
            let source = Arc::clone(&self.source);
            let sender = tx.clone();
            let owned_entity = entity.to_owned();
            thread::Builder::new()
                .name(format!("fetch-{}-{}", kind.as_str(), id.get()))
                .spawn(move || {
                    let result = source
                        .fetch(&owned_entity, kind)
                        .map_err(|error| format!("{error:#}"));
                    let _ = sender.send(InternalEvent::Fetched { id, kind, result });
                })
                .with_context(|| format!("spawn {} fetch for {entity}", kind.as_str()))?;
        }
        Ok(())
    }
}
