// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use juxta_app::{
    AppCommand, AppEvent, AppState, CollapseState, ColumnHeader, ColumnId, CompareTable,
    CompareView, EntityStatus, KeyOp, NodeId, Payload, PayloadKind, Query, QueryResult,
    ROOT_PREFIX, SaveOutcome, SectionKind, SnapshotPayload, TabKind, ValueOp, VersionSnapshot,
    ViewRow, ViewRowKind, default_version_picks, normalize_entity_name, run_query,
    version_columns, version_title,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Tabs};
use std::collections::BTreeSet;
use std::io;
use std::ops::Range;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

const HALF_PAGE_ROWS: isize = 10;
const LABEL_COLUMN_WIDTH: u16 = 40;
const EXPANDED_MARK: &str = "▾";
const COLLAPSED_MARK: &str = "▸";
const DIFF_MARK: &str = "≠";
const KEY_SEPARATOR: &str = " · ";

/// Everything the terminal loop needs from the outside world.
pub trait AppRuntime {
    fn load_active_entities(&mut self) -> Result<Vec<String>>;
    fn save_active_entities(&mut self, names: &[String]) -> Result<()>;
    fn history_entities(&mut self) -> Result<Vec<String>>;
    fn load_history(&mut self, entity: &str) -> Result<Vec<VersionSnapshot>>;
    fn save_version(&mut self, entity: &str, payload: SnapshotPayload) -> Result<SaveOutcome>;
    fn source_label(&self) -> String;
    fn fetch_payload(&mut self, entity: &str, kind: PayloadKind) -> Result<Payload>;

    /// Fetches every payload for `entity` and reports each result on `tx`.
    /// The default runs inline; runtimes with a thread-safe source should
    /// override it to fetch in the background.
    fn spawn_fetch(&mut self, id: ColumnId, entity: &str, tx: Sender<InternalEvent>) -> Result<()> {
        for kind in PayloadKind::ALL {
            let result = self
                .fetch_payload(entity, kind)
                .map_err(|error| format!("{error:#}"));
            let failed_details = kind == PayloadKind::Details && result.is_err();
            tx.send(InternalEvent::Fetched { id, kind, result })
                .map_err(|_| anyhow!("fetch event channel closed"))?;
            if failed_details {
                break;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InternalEvent {
    ClearStatus {
        token: u64,
    },
    Fetched {
        id: ColumnId,
        kind: PayloadKind,
        result: std::result::Result<Payload, String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PromptKind {
    AddEntity,
    RemoveEntity,
    Search,
    QueryKey,
    QueryValue,
}

impl PromptKind {
    const fn label(self) -> &'static str {
        match self {
            Self::AddEntity => "add entity",
            Self::RemoveEntity => "remove entity",
            Self::Search => "search",
            Self::QueryKey => "key term",
            Self::QueryValue => "value term",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Prompt {
    kind: PromptKind,
    input: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
struct VersionsUiState {
    entities: Vec<String>,
    entity_index: usize,
    history: Vec<VersionSnapshot>,
    picks: Option<(usize, usize)>,
    collapse: CollapseState,
    selected_row: usize,
}

impl VersionsUiState {
    fn entity(&self) -> Option<&str> {
        self.entities.get(self.entity_index).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
struct QueryUiState {
    query: Query,
    outcome: Option<std::result::Result<QueryResult, String>>,
    selected_row: usize,
}

#[derive(Debug, Clone, PartialEq, Default)]
struct ViewData {
    source_label: String,
    selected_row: usize,
    prompt: Option<Prompt>,
    help_visible: bool,
    versions: VersionsUiState,
    query: QueryUiState,
    saved: BTreeSet<ColumnId>,
    status_token: u64,
}

pub fn run_app<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    extra_entities: &[String],
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData {
        source_label: runtime.source_label(),
        ..ViewData::default()
    };
    let (internal_tx, internal_rx) = mpsc::channel();

    open_startup_entities(state, runtime, &mut view_data, &internal_tx, extra_entities);

    let mut result = Ok(());
    loop {
        process_internal_events(state, runtime, &mut view_data, &internal_tx, &internal_rx);

        if let Err(error) = terminal.draw(|frame| render(frame, state, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = event::poll(Duration::from_millis(120)).context("poll event")?;
        if has_event {
            match event::read().context("read event")? {
                Event::Key(key) => {
                    if handle_key_event(state, runtime, &mut view_data, &internal_tx, key) {
                        break;
                    }
                }
                Event::Resize(_, _) => {}
                _ => {}
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn open_startup_entities<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    extra_entities: &[String],
) {
    let mut names = match runtime.load_active_entities() {
        Ok(names) => names,
        Err(error) => {
            emit_status(state, view_data, tx, format!("restore session failed: {error}"));
            Vec::new()
        }
    };
    names.extend(extra_entities.iter().map(|name| normalize_entity_name(name)));

    let mut seen = BTreeSet::new();
    for name in names {
        if name.is_empty() || !seen.insert(name.clone()) {
            continue;
        }
        add_entity(state, runtime, view_data, tx, &name);
    }
}

fn process_internal_events<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                state.dispatch(AppCommand::ClearStatus);
            }
            InternalEvent::ClearStatus { .. } => {}
            InternalEvent::Fetched { id, kind, result } => {
                let command = match result {
                    Ok(payload) => AppCommand::ApplyPayload { id, payload },
                    Err(reason) => AppCommand::FetchFailed { id, kind, reason },
                };
                dispatch_and_sync(state, runtime, view_data, tx, command);
                save_version_when_complete(state, runtime, view_data, tx, id);
            }
        }
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_secs(4));
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn emit_status(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    state.dispatch(AppCommand::SetStatus(message.into()));
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

fn dispatch_and_sync<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    command: AppCommand,
) -> Vec<AppEvent> {
    let events = state.dispatch(command);

    if events.iter().any(|event| {
        matches!(
            event,
            AppEvent::EntityAdded { .. } | AppEvent::EntityRemoved { .. }
        )
    }) && let Err(error) = runtime.save_active_entities(&state.entity_names())
    {
        emit_status(
            state,
            view_data,
            internal_tx,
            format!("save session failed: {error}"),
        );
    }

    for event in &events {
        if let AppEvent::EntityRemoved { id, .. } = event {
            view_data.saved.remove(id);
        }
    }

    if events
        .iter()
        .any(|event| matches!(event, AppEvent::TabChanged(TabKind::Versions)))
    {
        refresh_versions(state, runtime, view_data, internal_tx);
    }

    if events
        .iter()
        .any(|event| matches!(event, AppEvent::StatusUpdated(_)))
    {
        view_data.status_token = view_data.status_token.saturating_add(1);
        schedule_status_clear(internal_tx, view_data.status_token);
    }
    events
}

fn add_entity<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    name: &str,
) {
    let events = dispatch_and_sync(
        state,
        runtime,
        view_data,
        tx,
        AppCommand::AddEntity(name.to_owned()),
    );
    for event in events {
        if let AppEvent::EntityAdded { id, name } = event {
            tracing::info!(entity = %name, column = id.get(), "loading entity");
            if let Err(error) = runtime.spawn_fetch(id, &name, tx.clone()) {
                dispatch_and_sync(
                    state,
                    runtime,
                    view_data,
                    tx,
                    AppCommand::FetchFailed {
                        id,
                        kind: PayloadKind::Details,
                        reason: format!("{error:#}"),
                    },
                );
            }
        }
    }
}

fn reload_entities<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
) {
    let names = state.entity_names();
    if names.is_empty() {
        emit_status(state, view_data, tx, "nothing to reload -- press a to add an entity");
        return;
    }
    let ids = state
        .entities
        .iter()
        .map(|entity| entity.id())
        .collect::<Vec<_>>();
    for id in ids {
        dispatch_and_sync(state, runtime, view_data, tx, AppCommand::RemoveEntity(id));
    }
    for name in &names {
        add_entity(state, runtime, view_data, tx, name);
    }
}

/// Stores a snapshot once every payload of the entity has resolved.
fn save_version_when_complete<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    id: ColumnId,
) {
    if view_data.saved.contains(&id) {
        return;
    }
    let Some(entity) = state.entity(id) else {
        return;
    };
    if entity.status != EntityStatus::Active
        || SectionKind::ALL
            .iter()
            .any(|kind| entity.column.is_pending(*kind))
    {
        return;
    }
    let Some(payload) = SnapshotPayload::from_column(&entity.column) else {
        return;
    };
    let name = entity.name.clone();
    view_data.saved.insert(id);

    match runtime.save_version(&name, payload) {
        Ok(SaveOutcome::Saved) => {
            emit_status(state, view_data, tx, format!("{name}: new version saved"));
            if state.active_tab == TabKind::Versions {
                refresh_versions(state, runtime, view_data, tx);
            }
        }
        Ok(SaveOutcome::Unchanged) => {}
        Err(error) => {
            emit_status(
                state,
                view_data,
                tx,
                format!("{name}: save version failed: {error}"),
            );
        }
    }
}

fn refresh_versions<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
) {
    if let Err(error) = load_versions(runtime, &mut view_data.versions) {
        emit_status(state, view_data, tx, format!("load versions failed: {error}"));
    }
}

fn load_versions<R: AppRuntime>(runtime: &mut R, versions: &mut VersionsUiState) -> Result<()> {
    let previous = versions.entity().map(str::to_owned);
    versions.entities = runtime.history_entities()?;
    versions.entity_index = previous
        .as_deref()
        .and_then(|name| versions.entities.iter().position(|entity| entity == name))
        .unwrap_or(0);
    load_selected_history(runtime, versions, previous.as_deref())
}

fn load_selected_history<R: AppRuntime>(
    runtime: &mut R,
    versions: &mut VersionsUiState,
    previous: Option<&str>,
) -> Result<()> {
    let Some(entity) = versions.entity().map(str::to_owned) else {
        versions.history.clear();
        versions.picks = None;
        return Ok(());
    };
    versions.history = runtime.load_history(&entity)?;

    let keep_picks = previous == Some(entity.as_str())
        && versions
            .picks
            .is_some_and(|(first, second)| first.max(second) < versions.history.len());
    if !keep_picks {
        versions.picks = default_version_picks(&versions.history);
        versions.selected_row = 0;
    }
    Ok(())
}

fn cycle_version_entity<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    delta: isize,
) {
    let count = view_data.versions.entities.len();
    if count == 0 {
        emit_status(state, view_data, tx, "no stored versions yet");
        return;
    }
    let next = (view_data.versions.entity_index as isize + delta).rem_euclid(count as isize);
    view_data.versions.entity_index = next as usize;
    let versions = &mut view_data.versions;
    if let Err(error) = load_selected_history(runtime, versions, None) {
        emit_status(state, view_data, tx, format!("load versions failed: {error}"));
    }
}

fn shift_version_pick(versions: &mut VersionsUiState, second: bool, delta: isize) -> Option<String> {
    let (first_pick, second_pick) = versions.picks?;
    let count = versions.history.len();
    let current = if second { second_pick } else { first_pick };
    let next = (current as isize + delta).clamp(0, count.saturating_sub(1) as isize) as usize;
    versions.picks = Some(if second {
        (first_pick, next)
    } else {
        (next, second_pick)
    });
    versions.history.get(next).map(|snapshot| version_title(next, snapshot))
}

fn versions_table(state: &AppState, versions: &VersionsUiState) -> Result<Option<CompareTable>> {
    let Some((first, second)) = versions.picks else {
        return Ok(None);
    };
    let columns = version_columns(&versions.history, first, second)?;
    Ok(Some(CompareTable::build(&columns, state.options)))
}

fn versions_view(state: &AppState, versions: &VersionsUiState) -> Result<Option<CompareView>> {
    Ok(versions_table(state, versions)?.map(|table| {
        CompareView::project(&table, &versions.collapse, &state.search, state.show_keys)
    }))
}

fn active_view(state: &AppState, view_data: &ViewData) -> Option<CompareView> {
    match state.active_tab {
        TabKind::Compare => Some(state.compare_view()),
        TabKind::Versions => versions_view(state, &view_data.versions).ok().flatten(),
        TabKind::Query => None,
    }
}

fn handle_key_event<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.code == KeyCode::Char('q') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    if view_data.help_visible {
        if key.code == KeyCode::Esc || key.code == KeyCode::Char('?') {
            view_data.help_visible = false;
        }
        return false;
    }

    if view_data.prompt.is_some() {
        handle_prompt_key(state, runtime, view_data, internal_tx, key);
        return false;
    }

    match (key.code, key.modifiers) {
        (KeyCode::Char('q'), KeyModifiers::NONE) => return true,
        (KeyCode::Char('?'), _) => {
            view_data.help_visible = true;
            return false;
        }
        (KeyCode::Char('f'), KeyModifiers::NONE) | (KeyCode::Tab, _) => {
            dispatch_and_sync(state, runtime, view_data, internal_tx, AppCommand::NextTab);
            return false;
        }
        (KeyCode::Char('b'), KeyModifiers::NONE) | (KeyCode::BackTab, _) => {
            dispatch_and_sync(state, runtime, view_data, internal_tx, AppCommand::PrevTab);
            return false;
        }
        _ => {}
    }

    match state.active_tab {
        TabKind::Compare => {
            if !handle_compare_key(state, runtime, view_data, internal_tx, key) {
                handle_table_key(state, runtime, view_data, internal_tx, key);
            }
        }
        TabKind::Versions => {
            if !handle_versions_key(state, runtime, view_data, internal_tx, key) {
                handle_table_key(state, runtime, view_data, internal_tx, key);
            }
        }
        TabKind::Query => handle_query_key(state, view_data, internal_tx, key),
    }
    false
}

fn open_prompt(view_data: &mut ViewData, kind: PromptKind, input: &str) {
    view_data.prompt = Some(Prompt {
        kind,
        input: input.to_owned(),
    });
}

fn handle_prompt_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let Some(prompt) = view_data.prompt.as_mut() else {
        return;
    };
    let kind = prompt.kind;

    match key.code {
        KeyCode::Esc => {
            view_data.prompt = None;
            if kind == PromptKind::Search {
                state.dispatch(AppCommand::SetSearch(String::new()));
            }
        }
        KeyCode::Enter => {
            let input = std::mem::take(&mut prompt.input);
            view_data.prompt = None;
            submit_prompt(state, runtime, view_data, internal_tx, kind, &input);
        }
        KeyCode::Backspace => {
            prompt.input.pop();
            if kind == PromptKind::Search {
                let input = prompt.input.clone();
                state.dispatch(AppCommand::SetSearch(input));
            }
        }
        KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            prompt.input.push(ch);
            if kind == PromptKind::Search {
                let input = prompt.input.clone();
                state.dispatch(AppCommand::SetSearch(input));
            }
        }
        _ => {}
    }
}

fn submit_prompt<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    kind: PromptKind,
    input: &str,
) {
    match kind {
        PromptKind::AddEntity => {
            let names = input
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .collect::<Vec<_>>();
            if names.is_empty() {
                emit_status(
                    state,
                    view_data,
                    internal_tx,
                    "entity name is required -- type a name and retry",
                );
            }
            for name in names {
                add_entity(state, runtime, view_data, internal_tx, name);
            }
        }
        PromptKind::RemoveEntity => {
            let name = normalize_entity_name(input);
            match state
                .entities
                .iter()
                .find(|entity| entity.name == name)
                .map(|entity| entity.id())
            {
                Some(id) => {
                    dispatch_and_sync(
                        state,
                        runtime,
                        view_data,
                        internal_tx,
                        AppCommand::RemoveEntity(id),
                    );
                }
                None => emit_status(
                    state,
                    view_data,
                    internal_tx,
                    format!("{name} is not loaded -- check the column headers"),
                ),
            }
        }
        PromptKind::Search => {
            state.dispatch(AppCommand::SetSearch(input.to_owned()));
        }
        PromptKind::QueryKey => {
            view_data.query.query.key_term = input.trim().to_owned();
            run_active_query(state, view_data, internal_tx);
        }
        PromptKind::QueryValue => {
            view_data.query.query.value_term = input.trim().to_owned();
            if !view_data.query.query.value_op.takes_term() {
                view_data.query.query.value_op = ValueOp::Contains;
            }
            run_active_query(state, view_data, internal_tx);
        }
    }
}

/// Keys only meaningful on the live compare tab. Returns whether the key was
/// consumed.
fn handle_compare_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    match (key.code, key.modifiers) {
        (KeyCode::Char('a'), KeyModifiers::NONE) => {
            open_prompt(view_data, PromptKind::AddEntity, "");
            true
        }
        (KeyCode::Char('x'), KeyModifiers::NONE) => {
            if state.entities.is_empty() {
                emit_status(state, view_data, internal_tx, "no entities loaded");
            } else {
                open_prompt(view_data, PromptKind::RemoveEntity, "");
            }
            true
        }
        (KeyCode::Char('r'), KeyModifiers::NONE) => {
            reload_entities(state, runtime, view_data, internal_tx);
            true
        }
        _ => false,
    }
}

fn handle_versions_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    let shift = match key.code {
        KeyCode::Char('e') => {
            cycle_version_entity(state, runtime, view_data, internal_tx, 1);
            return true;
        }
        KeyCode::Char('E') => {
            cycle_version_entity(state, runtime, view_data, internal_tx, -1);
            return true;
        }
        KeyCode::Char('[') => Some((false, -1)),
        KeyCode::Char(']') => Some((false, 1)),
        KeyCode::Char('{') => Some((true, -1)),
        KeyCode::Char('}') => Some((true, 1)),
        _ => None,
    };
    let Some((second, delta)) = shift else {
        return false;
    };
    match shift_version_pick(&mut view_data.versions, second, delta) {
        Some(title) => {
            let which = if second { "second" } else { "first" };
            emit_status(state, view_data, internal_tx, format!("{which}: {title}"));
        }
        None => emit_status(state, view_data, internal_tx, "no stored versions yet"),
    }
    true
}

/// Navigation and display keys shared by the compare and versions tables.
fn handle_table_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let row_count = active_view(state, view_data).map_or(0, |view| view.rows.len());
    match (key.code, key.modifiers) {
        (KeyCode::Char('j'), KeyModifiers::NONE) | (KeyCode::Down, _) => {
            move_selection(selection_mut(state.active_tab, view_data), row_count, 1);
        }
        (KeyCode::Char('k'), KeyModifiers::NONE) | (KeyCode::Up, _) => {
            move_selection(selection_mut(state.active_tab, view_data), row_count, -1);
        }
        (KeyCode::Char('d'), KeyModifiers::CONTROL) | (KeyCode::PageDown, _) => {
            move_selection(
                selection_mut(state.active_tab, view_data),
                row_count,
                HALF_PAGE_ROWS,
            );
        }
        (KeyCode::Char('u'), KeyModifiers::CONTROL) | (KeyCode::PageUp, _) => {
            move_selection(
                selection_mut(state.active_tab, view_data),
                row_count,
                -HALF_PAGE_ROWS,
            );
        }
        (KeyCode::Char('g'), KeyModifiers::NONE) | (KeyCode::Home, _) => {
            *selection_mut(state.active_tab, view_data) = 0;
        }
        (KeyCode::Char('G'), _) | (KeyCode::End, _) => {
            *selection_mut(state.active_tab, view_data) = row_count.saturating_sub(1);
        }
        (KeyCode::Enter, _) | (KeyCode::Char(' '), _) => {
            toggle_selected(state, runtime, view_data, internal_tx);
        }
        (KeyCode::Char('R'), _) => {
            if state.active_tab == TabKind::Versions {
                view_data.versions.collapse.reset();
                emit_status(state, view_data, internal_tx, "collapse reset");
            } else {
                dispatch_and_sync(
                    state,
                    runtime,
                    view_data,
                    internal_tx,
                    AppCommand::ResetCollapse,
                );
            }
        }
        (KeyCode::Char('/'), KeyModifiers::NONE) => {
            let current = state.search.as_str().to_owned();
            open_prompt(view_data, PromptKind::Search, &current);
        }
        (KeyCode::Esc, _) if state.search.is_active() => {
            state.dispatch(AppCommand::SetSearch(String::new()));
        }
        (KeyCode::Char('d'), KeyModifiers::NONE) => {
            dispatch_and_sync(state, runtime, view_data, internal_tx, AppCommand::ToggleDiffOnly);
        }
        (KeyCode::Char('s'), KeyModifiers::NONE) => {
            dispatch_and_sync(state, runtime, view_data, internal_tx, AppCommand::ToggleShowKeys);
        }
        (KeyCode::Char(digit @ '0'..='6'), KeyModifiers::NONE) => {
            let filter = section_filter_for_digit(digit);
            dispatch_and_sync(
                state,
                runtime,
                view_data,
                internal_tx,
                AppCommand::SetSectionFilter(filter),
            );
        }
        _ => {}
    }
    let row_count = active_view(state, view_data).map_or(0, |view| view.rows.len());
    clamp_selection(selection_mut(state.active_tab, view_data), row_count);
}

fn section_filter_for_digit(digit: char) -> Option<SectionKind> {
    let index = digit.to_digit(10)? as usize;
    index
        .checked_sub(1)
        .and_then(|index| SectionKind::ALL.get(index).copied())
}

fn selection_mut(tab: TabKind, view_data: &mut ViewData) -> &mut usize {
    match tab {
        TabKind::Compare => &mut view_data.selected_row,
        TabKind::Versions => &mut view_data.versions.selected_row,
        TabKind::Query => &mut view_data.query.selected_row,
    }
}

fn move_selection(selected: &mut usize, row_count: usize, delta: isize) {
    if row_count == 0 {
        *selected = 0;
        return;
    }
    let next = (*selected as isize + delta).clamp(0, row_count as isize - 1);
    *selected = next as usize;
}

fn clamp_selection(selected: &mut usize, row_count: usize) {
    *selected = (*selected).min(row_count.saturating_sub(1));
}

/// Header to toggle for the row at `index`: the row itself when it is a
/// header, else the closest header above it at a shallower depth.
fn toggle_target(rows: &[ViewRow], index: usize) -> Option<NodeId> {
    let row = rows.get(index)?;
    if let Some(node) = &row.node {
        return Some(node.clone());
    }
    rows[..index]
        .iter()
        .rev()
        .find(|candidate| candidate.is_header() && candidate.depth < row.depth)
        .and_then(|candidate| candidate.node.clone())
}

fn toggle_selected<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    if state.search.is_active() {
        emit_status(
            state,
            view_data,
            internal_tx,
            "clear the search (esc) to collapse groups",
        );
        return;
    }
    let version_table = if state.active_tab == TabKind::Versions {
        match versions_table(state, &view_data.versions) {
            Ok(table) => table,
            Err(error) => {
                emit_status(state, view_data, internal_tx, format!("toggle failed: {error}"));
                return;
            }
        }
    } else {
        None
    };
    let Some(view) = active_view(state, view_data) else {
        return;
    };
    let selected = match state.active_tab {
        TabKind::Versions => view_data.versions.selected_row,
        _ => view_data.selected_row,
    };
    let Some(node) = toggle_target(&view.rows, selected) else {
        return;
    };

    if state.active_tab == TabKind::Versions {
        if let Some(table) = version_table {
            let descendants = table.descendant_headers(&node);
            view_data.versions.collapse.toggle(&node, &descendants);
        }
    } else {
        dispatch_and_sync(
            state,
            runtime,
            view_data,
            internal_tx,
            AppCommand::ToggleCollapse(node.clone()),
        );
    }

    let rows = active_view(state, view_data).map_or_else(Vec::new, |view| view.rows);
    if let Some(index) = rows.iter().position(|row| row.node.as_ref() == Some(&node)) {
        *selection_mut(state.active_tab, view_data) = index;
    }
}

fn handle_query_key(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let hit_count = match &view_data.query.outcome {
        Some(Ok(result)) => result.hits.len(),
        _ => 0,
    };
    match (key.code, key.modifiers) {
        (KeyCode::Char('/'), KeyModifiers::NONE) => {
            let current = view_data.query.query.key_term.clone();
            open_prompt(view_data, PromptKind::QueryKey, &current);
        }
        (KeyCode::Char('='), _) => {
            let current = view_data.query.query.value_term.clone();
            open_prompt(view_data, PromptKind::QueryValue, &current);
        }
        (KeyCode::Char('m'), KeyModifiers::NONE) => {
            view_data.query.query.key_op = next_key_op(view_data.query.query.key_op);
            let label = format!("key {}", view_data.query.query.key_op.as_str());
            emit_status(state, view_data, internal_tx, label);
        }
        (KeyCode::Char('v'), KeyModifiers::NONE) => {
            view_data.query.query.value_op = next_value_op(view_data.query.query.value_op);
            let label = format!("value {}", view_data.query.query.value_op.as_str());
            emit_status(state, view_data, internal_tx, label);
        }
        (KeyCode::Enter, _) => run_active_query(state, view_data, internal_tx),
        (KeyCode::Char('c'), KeyModifiers::NONE) => {
            view_data.query = QueryUiState::default();
            emit_status(state, view_data, internal_tx, "query cleared");
        }
        (KeyCode::Char('j'), KeyModifiers::NONE) | (KeyCode::Down, _) => {
            move_selection(&mut view_data.query.selected_row, hit_count, 1);
        }
        (KeyCode::Char('k'), KeyModifiers::NONE) | (KeyCode::Up, _) => {
            move_selection(&mut view_data.query.selected_row, hit_count, -1);
        }
        _ => {}
    }
}

fn next_key_op(current: KeyOp) -> KeyOp {
    let index = KeyOp::ALL
        .iter()
        .position(|op| *op == current)
        .unwrap_or(0);
    KeyOp::ALL[(index + 1) % KeyOp::ALL.len()]
}

fn next_value_op(current: ValueOp) -> ValueOp {
    let index = ValueOp::ALL
        .iter()
        .position(|op| *op == current)
        .unwrap_or(0);
    ValueOp::ALL[(index + 1) % ValueOp::ALL.len()]
}

fn run_active_query(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let outcome = run_query(&state.columns(), &view_data.query.query);
    let message = match &outcome {
        Ok(result) => result.summary(),
        Err(error) => error.to_string(),
    };
    view_data.query.outcome = Some(outcome.map_err(|error| error.to_string()));
    view_data.query.selected_row = 0;
    emit_status(state, view_data, internal_tx, message);
}

fn render(frame: &mut ratatui::Frame<'_>, state: &AppState, view_data: &ViewData) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let selected = TabKind::ALL
        .iter()
        .position(|tab| *tab == state.active_tab)
        .unwrap_or(0);
    let tab_titles = TabKind::ALL
        .iter()
        .map(|tab| tab_title(*tab, state))
        .collect::<Vec<String>>();
    let tabs = Tabs::new(tab_titles)
        .block(
            Block::default()
                .title(app_title(&view_data.source_label))
                .borders(Borders::ALL),
        )
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .select(selected);
    frame.render_widget(tabs, layout[0]);

    match state.active_tab {
        TabKind::Compare => {
            let view = state.compare_view();
            let title = compare_title(state, &view);
            render_compare_table(frame, layout[1], &view, view_data.selected_row, &title, state.show_keys);
        }
        TabKind::Versions => render_versions(frame, layout[1], state, view_data),
        TabKind::Query => render_query(frame, layout[1], state, view_data),
    }

    let status_widget = Paragraph::new(status_text(state, view_data))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status_widget, layout[2]);

    if view_data.help_visible {
        let area = centered_rect(80, 60, frame.area());
        frame.render_widget(Clear, area);
        let help = Paragraph::new(help_overlay_text())
            .block(Block::default().title("help").borders(Borders::ALL));
        frame.render_widget(help, area);
    }
}

fn app_title(source_label: &str) -> String {
    if source_label.is_empty() {
        "juxta".to_owned()
    } else {
        format!("juxta · {source_label}")
    }
}

fn tab_title(tab: TabKind, state: &AppState) -> String {
    if tab == TabKind::Compare && !state.entities.is_empty() {
        format!(" {} ({}) ", tab.label(), state.entities.len())
    } else {
        format!(" {} ", tab.label())
    }
}

fn compare_title(state: &AppState, view: &CompareView) -> String {
    let mut parts = vec!["compare".to_owned()];
    let loading = state
        .entities
        .iter()
        .filter(|entity| entity.status == EntityStatus::Loading)
        .map(|entity| entity.name.as_str())
        .collect::<Vec<_>>();
    if !loading.is_empty() {
        parts.push(format!("loading {}", loading.join(", ")));
    }
    parts.push(diff_summary(view));
    if let Some(kind) = state.options.section_filter {
        parts.push(kind.label().to_lowercase());
    }
    if state.options.diff_only {
        parts.push("diffs only".to_owned());
    }
    parts.join(" · ")
}

fn diff_summary(view: &CompareView) -> String {
    match view.total_diffs {
        Some(1) => "1 diff".to_owned(),
        Some(count) => format!("{count} diffs"),
        None => format!("{} matching fields", view.field_rows().count()),
    }
}

fn render_compare_table(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    view: &CompareView,
    selected_row: usize,
    title: &str,
    show_keys: bool,
) {
    if view.columns.is_empty() {
        let empty = Paragraph::new("no entities loaded -- press a to add one")
            .block(Block::default().borders(Borders::ALL).title(title.to_owned()));
        frame.render_widget(empty, area);
        return;
    }

    let mut widths = vec![Constraint::Length(LABEL_COLUMN_WIDTH)];
    widths.extend(view.columns.iter().map(|_| Constraint::Min(10)));

    let mut header_cells = vec![Cell::from("field")];
    header_cells.extend(view.columns.iter().map(column_header_cell));
    let header = Row::new(header_cells).style(Style::default().add_modifier(Modifier::BOLD));

    let rows = view
        .rows
        .iter()
        .map(|row| view_row(row, view.columns.len(), show_keys))
        .collect::<Vec<_>>();

    let table = Table::new(rows, widths)
        .header(header)
        .column_spacing(1)
        .row_highlight_style(Style::default().bg(Color::DarkGray))
        .block(Block::default().title(title.to_owned()).borders(Borders::ALL));
    let mut table_state = TableState::default().with_selected(Some(selected_row));
    frame.render_stateful_widget(table, area, &mut table_state);
}

fn column_header_cell(column: &ColumnHeader) -> Cell<'static> {
    let style = parse_hex_color(column.color)
        .map_or_else(Style::default, |color| Style::default().fg(color));
    Cell::from(column.label.clone()).style(style)
}

fn view_row(row: &ViewRow, column_count: usize, show_keys: bool) -> Row<'static> {
    let label = Line::from(row_label_spans(row, show_keys));
    let mut cells = vec![Cell::from(label)];
    match &row.kind {
        ViewRowKind::Field { row: field, .. } => {
            let baseline = field.record.values.first().and_then(juxta_app::Cell::compare_key);
            cells.extend(field.record.values.iter().map(|value| {
                let mut style = Style::default();
                if field.is_diff && value.compare_key() != baseline {
                    style = style.fg(Color::Magenta).add_modifier(Modifier::BOLD);
                } else if value.is_absent() {
                    style = style.fg(Color::DarkGray);
                }
                Cell::from(value.display()).style(style)
            }));
        }
        _ => cells.extend((0..column_count).map(|_| Cell::from(""))),
    }
    Row::new(cells)
}

fn indent(depth: u8) -> String {
    "  ".repeat(usize::from(depth))
}

fn prefix_display(prefix: &str) -> &str {
    if prefix == ROOT_PREFIX {
        "(general)"
    } else {
        prefix
    }
}

fn match_style() -> Style {
    Style::default()
        .fg(Color::Black)
        .bg(Color::Yellow)
        .add_modifier(Modifier::BOLD)
}

fn highlighted_spans(text: &str, range: Option<&Range<usize>>, style: Style) -> Vec<Span<'static>> {
    match range {
        Some(range)
            if range.start < range.end
                && range.end <= text.len()
                && text.is_char_boundary(range.start)
                && text.is_char_boundary(range.end) =>
        {
            vec![
                Span::styled(text[..range.start].to_owned(), style),
                Span::styled(text[range.clone()].to_owned(), style.patch(match_style())),
                Span::styled(text[range.end..].to_owned(), style),
            ]
        }
        _ => vec![Span::styled(text.to_owned(), style)],
    }
}

fn row_label_spans(row: &ViewRow, show_keys: bool) -> Vec<Span<'static>> {
    let mut spans = vec![Span::raw(indent(row.depth))];
    let mark = if row.collapsed {
        COLLAPSED_MARK
    } else {
        EXPANDED_MARK
    };
    let header_style = Style::default().add_modifier(Modifier::BOLD);

    let title = match &row.kind {
        ViewRowKind::Section { kind, loading, .. } => {
            if *loading {
                Some(format!("{} (loading)", kind.label()))
            } else {
                Some(kind.label().to_owned())
            }
        }
        ViewRowKind::Level { level, .. } => Some(level.clone()),
        ViewRowKind::Prefix { prefix, .. } => Some(prefix_display(prefix).to_owned()),
        ViewRowKind::Field {
            row: field,
            label_highlight,
            key_highlight,
            ..
        } => {
            let style = if field.is_diff {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default()
            };
            let mark = if field.is_diff { DIFF_MARK } else { " " };
            spans.push(Span::styled(format!("{mark} "), style));
            spans.extend(highlighted_spans(
                &field.record.label,
                label_highlight.as_ref(),
                style,
            ));
            if show_keys {
                let dim = Style::default().fg(Color::DarkGray);
                spans.push(Span::styled(KEY_SEPARATOR, dim));
                spans.extend(highlighted_spans(
                    &field.record.key,
                    key_highlight.as_ref(),
                    dim,
                ));
            }
            None
        }
        ViewRowKind::Loading { pending } => {
            let noun = if *pending == 1 { "column" } else { "columns" };
            spans.push(Span::styled(
                format!("loading {pending} {noun}…"),
                Style::default().fg(Color::DarkGray),
            ));
            None
        }
        ViewRowKind::Empty => {
            spans.push(Span::styled(
                "no settings",
                Style::default().fg(Color::DarkGray),
            ));
            None
        }
    };

    if let Some(title) = title {
        spans.push(Span::styled(format!("{mark} {title}"), header_style));
        if let Some(badge) = row.badge {
            spans.push(Span::styled(
                format!(" [{badge}]"),
                Style::default().fg(Color::Yellow),
            ));
        }
    }
    spans
}

fn row_label_text(row: &ViewRow, show_keys: bool) -> String {
    row_label_spans(row, show_keys)
        .iter()
        .map(|span| span.content.as_ref())
        .collect()
}

fn parse_hex_color(hex: &str) -> Option<Color> {
    let digits = hex.strip_prefix('#')?;
    if digits.len() != 6 {
        return None;
    }
    let value = u32::from_str_radix(digits, 16).ok()?;
    Some(Color::Rgb(
        ((value >> 16) & 0xFF) as u8,
        ((value >> 8) & 0xFF) as u8,
        (value & 0xFF) as u8,
    ))
}

fn versions_title(state: &AppState, versions: &VersionsUiState) -> String {
    let Some(entity) = versions.entity() else {
        return "versions".to_owned();
    };
    let mut title = format!("versions · {entity} · {} stored", versions.history.len());
    if let Some((first, second)) = versions.picks {
        if first == second {
            title.push_str(&format!(" · v{}", first + 1));
        } else {
            title.push_str(&format!(" · v{} vs v{}", first + 1, second + 1));
        }
    }
    if state.options.diff_only {
        title.push_str(" · diffs only");
    }
    title
}

fn render_versions(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    state: &AppState,
    view_data: &ViewData,
) {
    let versions = &view_data.versions;
    let title = versions_title(state, versions);
    match versions_view(state, versions) {
        Ok(Some(view)) => {
            let title = format!("{title} · {}", diff_summary(&view));
            render_compare_table(
                frame,
                area,
                &view,
                versions.selected_row,
                &title,
                state.show_keys,
            );
        }
        Ok(None) => {
            let body = Paragraph::new(
                "no stored versions -- load an entity on the compare tab to record one",
            )
            .block(Block::default().borders(Borders::ALL).title(title));
            frame.render_widget(body, area);
        }
        Err(error) => {
            let body = Paragraph::new(format!("{error}"))
                .block(Block::default().borders(Borders::ALL).title(title));
            frame.render_widget(body, area);
        }
    }
}

fn query_description(query: &Query) -> String {
    let key = if query.key_term.is_empty() {
        format!("key {} (any)", query.key_op.as_str())
    } else {
        format!("key {} {:?}", query.key_op.as_str(), query.key_term)
    };
    let value = if query.value_op.takes_term() {
        format!("value {} {:?}", query.value_op.as_str(), query.value_term)
    } else {
        format!("value {}", query.value_op.as_str())
    };
    format!("{key} · {value}")
}

fn render_query(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    state: &AppState,
    view_data: &ViewData,
) {
    let query = &view_data.query;
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(1)])
        .split(area);

    let form = Paragraph::new(query_description(&query.query))
        .block(Block::default().borders(Borders::ALL).title("query"));
    frame.render_widget(form, sections[0]);

    let result = match &query.outcome {
        None => {
            let hint = Paragraph::new("press / for a key term, = for a value term, enter to run")
                .block(Block::default().borders(Borders::ALL).title("results"));
            frame.render_widget(hint, sections[1]);
            return;
        }
        Some(Err(error)) => {
            let message = Paragraph::new(error.clone())
                .style(Style::default().fg(Color::Red))
                .block(Block::default().borders(Borders::ALL).title("results"));
            frame.render_widget(message, sections[1]);
            return;
        }
        Some(Ok(result)) => result,
    };

    let columns = state.columns();
    let mut widths = vec![
        Constraint::Length(LABEL_COLUMN_WIDTH),
        Constraint::Length(12),
    ];
    widths.extend(columns.iter().map(|_| Constraint::Min(10)));

    let mut header_cells = vec![Cell::from("key"), Cell::from("section")];
    header_cells.extend(columns.iter().map(|column| {
        let style = parse_hex_color(column.color)
            .map_or_else(Style::default, |color| Style::default().fg(color));
        Cell::from(column.label.clone()).style(style)
    }));
    let header = Row::new(header_cells).style(Style::default().add_modifier(Modifier::BOLD));

    let rows = result
        .hits
        .iter()
        .map(|hit| {
            let label_style = if hit.is_diff {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default()
            };
            let mark = if hit.is_diff { DIFF_MARK } else { " " };
            let mut cells = vec![
                Cell::from(format!("{mark} {} ({})", hit.label, hit.key)).style(label_style),
                Cell::from(hit.section.label()),
            ];
            cells.extend(hit.values.iter().zip(&hit.matched).map(|(value, matched)| {
                let style = if *matched {
                    Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };
                Cell::from(value.display()).style(style)
            }));
            Row::new(cells)
        })
        .collect::<Vec<_>>();

    let table = Table::new(rows, widths)
        .header(header)
        .column_spacing(1)
        .row_highlight_style(Style::default().bg(Color::DarkGray))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("results · {}", result.summary())),
        );
    let mut table_state = TableState::default().with_selected(Some(query.selected_row));
    frame.render_stateful_widget(table, sections[1], &mut table_state);
}

fn status_text(state: &AppState, view_data: &ViewData) -> String {
    if let Some(prompt) = &view_data.prompt {
        return format!(
            "{}: {}▏ | enter submit | esc cancel",
            prompt.kind.label(),
            prompt.input
        );
    }

    let hints = match state.active_tab {
        TabKind::Compare => {
            "j/k move | enter collapse | / search | d diffs | s keys | 0-6 section | a add | x remove | r reload | ? help"
        }
        TabKind::Versions => {
            "j/k move | enter collapse | e/E entity | [/] v1 | {/} v2 | / search | d diffs | ? help"
        }
        TabKind::Query => "/ key | = value | m key op | v value op | enter run | c clear | ? help",
    };
    let search = if state.search.is_active() {
        format!("search {:?} | ", state.search.as_str())
    } else {
        String::new()
    };
    match &state.status_line {
        Some(status) => format!("{status} | {search}{hints}"),
        None => format!("{search}{hints}"),
    }
}

fn help_overlay_text() -> &'static str {
    "global: q or ctrl+q quit | f/b or tab/shift+tab tabs | ? help\n\
table: j/k up/down | g/G top/bottom | ctrl+d/ctrl+u half page | enter or space collapse | R reset collapse\n\
table: / search | esc clear search | d diffs only | s show keys | 0 all sections | 1-6 one section\n\
compare: a add entity (comma separated) | x remove entity | r reload all\n\
versions: e/E next/prev entity | [/] first version | {/} second version\n\
query: / key term | = value term | m key match | v value match | enter run | c clear\n\
prompt: enter submit | esc cancel"
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
