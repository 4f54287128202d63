// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use khata_app::{
    AppCommand, AppEvent, AppMode, AppState, BooleanFlag, Category, CsvExport, CsvRecord,
    Customer, DateRange, EntityKind, FetchOutcome, FetchTicket, FilterPatch, FilterState,
    ListDataController, LoadPhase, Product, RemoteCollection, wire,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, Tabs};
use std::io;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use time::Date;
use tracing::{debug, warn};

const DATE_INPUT_HINT: &str = "dates look like 2024-01-01..2024-01-31";

/// Host services the terminal app calls out to.
pub trait AppRuntime {
    fn today(&self) -> Date;
    /// Persists an export and reports where it went.
    fn save_export(&mut self, export: &CsvExport) -> Result<PathBuf>;
}

/// How a row type appears in the list table.
pub trait TableRow: CsvRecord + Send + 'static {
    const COLUMNS: &'static [&'static str];

    fn cells(&self) -> Vec<String>;

    /// Short name used in prompts and status messages.
    fn display_name(&self) -> &str;

    fn fetched(ticket: FetchTicket, result: khata_app::Result<Vec<Self>>) -> FetchedRows;
}

fn date_cell(at: time::OffsetDateTime) -> String {
    wire::format_date(at.date())
}

impl TableRow for Customer {
    const COLUMNS: &'static [&'static str] =
        &["Name", "Mobile", "Address", "Loans", "Unpaid", "Last loan"];

    fn cells(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.mobile_number.clone(),
            self.address.clone(),
            self.total_loans.to_string(),
            self.unpaid_loans.to_string(),
            self.last_loan_date
                .map(wire::format_date)
                .unwrap_or_else(|| "-".to_owned()),
        ]
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn fetched(ticket: FetchTicket, result: khata_app::Result<Vec<Self>>) -> FetchedRows {
        FetchedRows::Customers(ticket, result)
    }
}

impl TableRow for Product {
    const COLUMNS: &'static [&'static str] = &["Name", "Unit", "Category", "Created"];

    fn cells(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.unit.clone(),
            self.category.to_string(),
            date_cell(self.created_at),
        ]
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn fetched(ticket: FetchTicket, result: khata_app::Result<Vec<Self>>) -> FetchedRows {
        FetchedRows::Products(ticket, result)
    }
}

impl TableRow for Category {
    const COLUMNS: &'static [&'static str] = &["Name", "Description", "Products", "Created"];

    fn cells(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.description.clone().unwrap_or_default(),
            self.products_count.to_string(),
            date_cell(self.created_at),
        ]
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn fetched(ticket: FetchTicket, result: khata_app::Result<Vec<Self>>) -> FetchedRows {
        FetchedRows::Categories(ticket, result)
    }
}

/// A fetch result on its way back from a worker thread.
#[derive(Debug)]
pub enum FetchedRows {
    Customers(FetchTicket, khata_app::Result<Vec<Customer>>),
    Products(FetchTicket, khata_app::Result<Vec<Product>>),
    Categories(FetchTicket, khata_app::Result<Vec<Category>>),
}

impl FetchedRows {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Customers(..) => EntityKind::Customers,
            Self::Products(..) => EntityKind::Products,
            Self::Categories(..) => EntityKind::Categories,
        }
    }
}

#[derive(Debug)]
pub enum InternalEvent {
    ClearStatus { token: u64 },
    Fetched(FetchedRows),
}

/// Remote handles that can be moved onto a fetch thread.
pub trait SharedRemote<E: TableRow>: RemoteCollection<E> + Clone + Send + 'static {}

impl<E: TableRow, T: RemoteCollection<E> + Clone + Send + 'static> SharedRemote<E> for T {}

/// Object-safe face of one list controller, so the key handler and renderer
/// can treat every tab alike.
pub trait TabView {
    fn kind(&self) -> EntityKind;
    fn columns(&self) -> &'static [&'static str];
    fn visible_cells(&self) -> Vec<Vec<String>>;
    fn visible_len(&self) -> usize;
    fn filtered_count(&self) -> usize;
    fn page_summary(&self) -> String;
    fn phase(&self) -> LoadPhase;
    fn last_error(&self) -> Option<&str>;
    fn is_submitting(&self) -> bool;

    /// Starts a fetch on a worker thread; the result arrives as
    /// [`InternalEvent::Fetched`].
    fn spawn_fetch(&mut self, tx: &Sender<InternalEvent>);

    fn search_query(&self) -> &str;
    fn set_search_query(&mut self, query: String);
    fn filters(&self) -> &FilterState;
    fn set_filter(&mut self, patch: FilterPatch);
    fn toggle_flag(&mut self, flag: BooleanFlag) -> bool;
    fn clear_filters(&mut self);

    fn current_page(&self) -> usize;
    fn total_pages(&self) -> usize;
    fn next_page(&mut self) -> bool;
    fn prev_page(&mut self) -> bool;

    /// Stages the `row`-th visible row for deletion and returns its name.
    fn stage_delete(&mut self, row: usize) -> Option<String>;
    fn pending_name(&self) -> Option<String>;
    fn cancel_delete(&mut self) -> Option<String>;
    fn confirm_delete(&mut self) -> khata_app::Result<Option<String>>;

    fn export(&self, today: Date) -> khata_app::Result<CsvExport>;
}

impl<E, R> TabView for ListDataController<E, R>
where
    E: TableRow,
    R: SharedRemote<E>,
{
    fn kind(&self) -> EntityKind {
        E::KIND
    }

    fn columns(&self) -> &'static [&'static str] {
        E::COLUMNS
    }

    fn visible_cells(&self) -> Vec<Vec<String>> {
        self.visible_items().into_iter().map(E::cells).collect()
    }

    fn visible_len(&self) -> usize {
        self.visible_items().len()
    }

    fn filtered_count(&self) -> usize {
        ListDataController::filtered_count(self)
    }

    fn page_summary(&self) -> String {
        match self.page_window() {
            Some(window) => format!(
                "Showing {} to {} of {} | page {}/{}",
                window.first,
                window.last,
                window.total,
                self.current_page(),
                self.total_pages()
            ),
            None => "no matching rows".to_owned(),
        }
    }

    fn phase(&self) -> LoadPhase {
        ListDataController::phase(self)
    }

    fn last_error(&self) -> Option<&str> {
        ListDataController::last_error(self)
    }

    fn is_submitting(&self) -> bool {
        ListDataController::is_submitting(self)
    }

    fn spawn_fetch(&mut self, tx: &Sender<InternalEvent>) {
        let pending = self.begin_fetch();
        let remote = self.remote().clone();
        let sender = tx.clone();
        thread::spawn(move || {
            let result = remote.list(&pending.criteria);
            let _ = sender.send(InternalEvent::Fetched(E::fetched(pending.ticket, result)));
        });
    }

    fn search_query(&self) -> &str {
        ListDataController::search_query(self)
    }

    fn set_search_query(&mut self, query: String) {
        ListDataController::set_search_query(self, query);
    }

    fn filters(&self) -> &FilterState {
        ListDataController::filters(self)
    }

    fn set_filter(&mut self, patch: FilterPatch) {
        ListDataController::set_filter(self, patch);
    }

    fn toggle_flag(&mut self, flag: BooleanFlag) -> bool {
        ListDataController::toggle_flag(self, flag)
    }

    fn clear_filters(&mut self) {
        ListDataController::clear_filters(self);
    }

    fn current_page(&self) -> usize {
        ListDataController::current_page(self)
    }

    fn total_pages(&self) -> usize {
        ListDataController::total_pages(self)
    }

    fn next_page(&mut self) -> bool {
        ListDataController::next_page(self)
    }

    fn prev_page(&mut self) -> bool {
        ListDataController::prev_page(self)
    }

    fn stage_delete(&mut self, row: usize) -> Option<String> {
        let entity = self.visible_items().get(row).map(|entity| (*entity).clone())?;
        let name = entity.display_name().to_owned();
        self.request_delete(entity);
        Some(name)
    }

    fn pending_name(&self) -> Option<String> {
        self.pending_deletion()
            .map(|entity| entity.display_name().to_owned())
    }

    fn cancel_delete(&mut self) -> Option<String> {
        ListDataController::cancel_delete(self).map(|entity| entity.display_name().to_owned())
    }

    fn confirm_delete(&mut self) -> khata_app::Result<Option<String>> {
        Ok(ListDataController::confirm_delete(self)?
            .map(|entity| entity.display_name().to_owned()))
    }

    fn export(&self, today: Date) -> khata_app::Result<CsvExport> {
        self.export_csv(None, today)
    }
}

/// The tabs the app can show.
pub trait Views {
    fn view(&self, kind: EntityKind) -> &dyn TabView;
    fn view_mut(&mut self, kind: EntityKind) -> &mut dyn TabView;
    /// Routes a worker result to its controller.
    fn apply_fetched(&mut self, rows: FetchedRows) -> khata_app::Result<FetchOutcome>;
    /// Maps a typed category name to its id; anything unknown passes through.
    fn resolve_category(&self, typed: &str) -> String;
}

/// One list controller per entity tab.
#[derive(Debug)]
pub struct Shop<C, P, K> {
    pub customers: ListDataController<Customer, C>,
    pub products: ListDataController<Product, P>,
    pub categories: ListDataController<Category, K>,
}

impl<C, P, K> Shop<C, P, K>
where
    C: SharedRemote<Customer>,
    P: SharedRemote<Product>,
    K: SharedRemote<Category>,
{
    pub fn new(
        customers: ListDataController<Customer, C>,
        products: ListDataController<Product, P>,
        categories: ListDataController<Category, K>,
    ) -> Self {
        Self {
            customers,
            products,
            categories,
        }
    }
}

impl<C, P, K> Views for Shop<C, P, K>
where
    C: SharedRemote<Customer>,
    P: SharedRemote<Product>,
    K: SharedRemote<Category>,
{
    fn view(&self, kind: EntityKind) -> &dyn TabView {
        match kind {
            EntityKind::Customers => &self.customers,
            EntityKind::Products => &self.products,
            EntityKind::Categories => &self.categories,
        }
    }

    fn view_mut(&mut self, kind: EntityKind) -> &mut dyn TabView {
        match kind {
            EntityKind::Customers => &mut self.customers,
            EntityKind::Products => &mut self.products,
            EntityKind::Categories => &mut self.categories,
        }
    }

    fn apply_fetched(&mut self, rows: FetchedRows) -> khata_app::Result<FetchOutcome> {
        match rows {
            FetchedRows::Customers(ticket, result) => self.customers.finish_fetch(ticket, result),
            FetchedRows::Products(ticket, result) => self.products.finish_fetch(ticket, result),
            FetchedRows::Categories(ticket, result) => {
                self.categories.finish_fetch(ticket, result)
            }
        }
    }

    fn resolve_category(&self, typed: &str) -> String {
        self.categories
            .items()
            .iter()
            .find(|category| {
                category.id.as_str() == typed || category.name.eq_ignore_ascii_case(typed)
            })
            .map_or_else(|| typed.to_owned(), |category| category.id.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct ViewData {
    /// Selected row within the visible page, per tab.
    cursor: [usize; 3],
    /// Line buffer for the text-entry modes.
    input: String,
    status_token: u64,
}

impl ViewData {
    fn cursor(&self, kind: EntityKind) -> usize {
        self.cursor[tab_index(kind)]
    }

    fn set_cursor(&mut self, kind: EntityKind, row: usize) {
        self.cursor[tab_index(kind)] = row;
    }
}

fn tab_index(kind: EntityKind) -> usize {
    EntityKind::ALL
        .iter()
        .position(|candidate| *candidate == kind)
        .unwrap_or(0)
}

pub fn run_app<V: Views, R: AppRuntime>(
    state: &mut AppState,
    views: &mut V,
    runtime: &mut R,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::default();
    let (internal_tx, internal_rx) = mpsc::channel();

    views.view_mut(state.active_tab).spawn_fetch(&internal_tx);

    let mut result = Ok(());
    loop {
        process_internal_events(state, views, &mut view_data, &internal_tx, &internal_rx);

        if let Err(error) = terminal.draw(|frame| render(frame, state, views, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = match event::poll(Duration::from_millis(120)).context("poll event") {
            Ok(has_event) => has_event,
            Err(error) => {
                result = Err(error);
                break;
            }
        };
        if has_event {
            match event::read().context("read event") {
                Ok(Event::Key(key)) => {
                    if handle_key_event(state, views, runtime, &mut view_data, &internal_tx, key)
                    {
                        break;
                    }
                }
                Ok(_) => {}
                Err(error) => {
                    result = Err(error);
                    break;
                }
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn process_internal_events<V: Views>(
    state: &mut AppState,
    views: &mut V,
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
            InternalEvent::Fetched(rows) => {
                let kind = rows.kind();
                match views.apply_fetched(rows) {
                    Ok(FetchOutcome::Applied { rows }) => {
                        debug!(entity = kind.label(), rows, "view refreshed");
                        clamp_cursor(views, view_data, kind);
                    }
                    Ok(FetchOutcome::Stale) => {}
                    Err(error) => {
                        emit_status(
                            state,
                            view_data,
                            tx,
                            format!("load {} failed: {error}", kind.label()),
                        );
                    }
                }
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
    state.set_status(message);
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

/// Runs a shell command and surfaces any status it produced.
fn dispatch<V: Views>(
    state: &mut AppState,
    views: &mut V,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    command: AppCommand,
) {
    for event in state.dispatch(command) {
        match event {
            AppEvent::StatusUpdated(message) => {
                emit_status(state, view_data, internal_tx, message);
            }
            AppEvent::TabChanged(kind) => {
                if views.view(kind).phase() == LoadPhase::Idle {
                    views.view_mut(kind).spawn_fetch(internal_tx);
                }
            }
            AppEvent::ModeChanged(_) | AppEvent::StatusCleared => {}
        }
    }
}

fn clamp_cursor<V: Views>(views: &V, view_data: &mut ViewData, kind: EntityKind) {
    let len = views.view(kind).visible_len();
    let cursor = view_data.cursor(kind).min(len.saturating_sub(1));
    view_data.set_cursor(kind, cursor);
}

/// Returns true when the app should quit.
fn handle_key_event<V: Views, R: AppRuntime>(
    state: &mut AppState,
    views: &mut V,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    match state.mode {
        AppMode::Search | AppMode::CategoryInput | AppMode::DateInput => {
            handle_text_key(state, views, view_data, internal_tx, key);
            false
        }
        AppMode::ConfirmDelete => {
            handle_confirm_key(state, views, view_data, internal_tx, key);
            false
        }
        AppMode::Nav => handle_nav_key(state, views, runtime, view_data, internal_tx, key),
    }
}

fn handle_nav_key<V: Views, R: AppRuntime>(
    state: &mut AppState,
    views: &mut V,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    let kind = state.active_tab;
    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Tab => dispatch(state, views, view_data, internal_tx, AppCommand::NextTab),
        KeyCode::BackTab => dispatch(state, views, view_data, internal_tx, AppCommand::PrevTab),
        KeyCode::Char('/') => {
            view_data.input = views.view(kind).search_query().to_owned();
            dispatch(state, views, view_data, internal_tx, AppCommand::EnterSearch);
        }
        KeyCode::Char('c') => {
            view_data.input = views
                .view(kind)
                .filters()
                .category
                .clone()
                .unwrap_or_default();
            dispatch(
                state,
                views,
                view_data,
                internal_tx,
                AppCommand::EnterCategoryInput,
            );
            // Names resolve against the categories tab.
            if state.mode == AppMode::CategoryInput
                && views.view(EntityKind::Categories).phase() == LoadPhase::Idle
            {
                views
                    .view_mut(EntityKind::Categories)
                    .spawn_fetch(internal_tx);
            }
        }
        KeyCode::Char('t') => {
            view_data.input = views
                .view(kind)
                .filters()
                .date_range
                .label()
                .unwrap_or_default();
            dispatch(state, views, view_data, internal_tx, AppCommand::EnterDateInput);
        }
        KeyCode::Char('u') => {
            if kind != EntityKind::Customers {
                emit_status(state, view_data, internal_tx, "unpaid filter applies to customers");
            } else {
                let enabled = views.view_mut(kind).toggle_flag(BooleanFlag::UnpaidOnly);
                view_data.set_cursor(kind, 0);
                let message = if enabled {
                    "showing customers with unpaid loans"
                } else {
                    "showing all customers"
                };
                emit_status(state, view_data, internal_tx, message);
            }
        }
        KeyCode::Esc => {
            if views.view(kind).filters().is_active() || !views.view(kind).search_query().is_empty()
            {
                views.view_mut(kind).clear_filters();
                view_data.set_cursor(kind, 0);
                emit_status(state, view_data, internal_tx, "filters cleared");
            }
        }
        KeyCode::Down | KeyCode::Char('j') => {
            let len = views.view(kind).visible_len();
            let cursor = view_data.cursor(kind);
            if cursor + 1 < len {
                view_data.set_cursor(kind, cursor + 1);
            }
        }
        KeyCode::Up | KeyCode::Char('k') => {
            let cursor = view_data.cursor(kind);
            view_data.set_cursor(kind, cursor.saturating_sub(1));
        }
        KeyCode::Right | KeyCode::Char('n') => {
            if views.view_mut(kind).next_page() {
                view_data.set_cursor(kind, 0);
            }
        }
        KeyCode::Left | KeyCode::Char('p') => {
            if views.view_mut(kind).prev_page() {
                view_data.set_cursor(kind, 0);
            }
        }
        KeyCode::Char('r') => {
            views.view_mut(kind).spawn_fetch(internal_tx);
            emit_status(state, view_data, internal_tx, format!("reloading {}", kind.label()));
        }
        KeyCode::Char('d') => {
            let row = view_data.cursor(kind);
            match views.view_mut(kind).stage_delete(row) {
                Some(name) => {
                    dispatch(
                        state,
                        views,
                        view_data,
                        internal_tx,
                        AppCommand::OpenConfirmDelete,
                    );
                    emit_status(state, view_data, internal_tx, format!("delete {name}? y/n"));
                }
                None => emit_status(state, view_data, internal_tx, "nothing selected"),
            }
        }
        KeyCode::Char('x') => {
            let message = match views.view(kind).export(runtime.today()) {
                Ok(export) => match runtime.save_export(&export) {
                    Ok(path) => format!(
                        "exported {} {} to {}",
                        export.rows,
                        kind.label(),
                        path.display()
                    ),
                    Err(error) => format!("save export failed: {error:#}"),
                },
                Err(error) => format!("export failed: {error}"),
            };
            emit_status(state, view_data, internal_tx, message);
        }
        _ => {}
    }
    false
}

fn handle_text_key<V: Views>(
    state: &mut AppState,
    views: &mut V,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let kind = state.active_tab;
    match key.code {
        KeyCode::Esc => {
            if state.mode == AppMode::Search {
                views.view_mut(kind).set_search_query(String::new());
                view_data.set_cursor(kind, 0);
            }
            view_data.input.clear();
            dispatch(state, views, view_data, internal_tx, AppCommand::ExitToNav);
        }
        KeyCode::Enter => submit_text_input(state, views, view_data, internal_tx),
        KeyCode::Backspace => {
            view_data.input.pop();
            live_search(state, views, view_data);
        }
        KeyCode::Char(ch) => {
            view_data.input.push(ch);
            live_search(state, views, view_data);
        }
        _ => {}
    }
}

/// Search narrows as the user types; the other prompts apply on enter.
fn live_search<V: Views>(state: &AppState, views: &mut V, view_data: &mut ViewData) {
    if state.mode != AppMode::Search {
        return;
    }
    let kind = state.active_tab;
    views
        .view_mut(kind)
        .set_search_query(view_data.input.clone());
    view_data.set_cursor(kind, 0);
}

fn submit_text_input<V: Views>(
    state: &mut AppState,
    views: &mut V,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let kind = state.active_tab;
    let input = view_data.input.trim().to_owned();
    match state.mode {
        AppMode::Search => {}
        AppMode::CategoryInput => {
            let patch = if input.is_empty() {
                FilterPatch::new().clear_category()
            } else {
                FilterPatch::new().category(views.resolve_category(&input))
            };
            views.view_mut(kind).set_filter(patch);
        }
        AppMode::DateInput => match DateRange::parse(&input) {
            Some(range) => views
                .view_mut(kind)
                .set_filter(FilterPatch::new().date_range(range)),
            None => {
                emit_status(state, view_data, internal_tx, DATE_INPUT_HINT);
                return;
            }
        },
        AppMode::Nav | AppMode::ConfirmDelete => return,
    }
    view_data.set_cursor(kind, 0);
    view_data.input.clear();
    dispatch(state, views, view_data, internal_tx, AppCommand::ExitToNav);
}

fn handle_confirm_key<V: Views>(
    state: &mut AppState,
    views: &mut V,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let kind = state.active_tab;
    match key.code {
        KeyCode::Char('y') | KeyCode::Enter => {
            match views.view_mut(kind).confirm_delete() {
                Ok(Some(name)) => {
                    clamp_cursor(views, view_data, kind);
                    dispatch(state, views, view_data, internal_tx, AppCommand::ExitToNav);
                    emit_status(state, view_data, internal_tx, format!("deleted {name}"));
                }
                Ok(None) => {
                    dispatch(state, views, view_data, internal_tx, AppCommand::ExitToNav);
                }
                // The row stays staged so the user can retry or back out.
                Err(error) => {
                    warn!(entity = kind.label(), %error, "delete from tui failed");
                    emit_status(
                        state,
                        view_data,
                        internal_tx,
                        format!("delete failed: {error} -- y to retry, n to cancel"),
                    );
                }
            }
        }
        KeyCode::Char('n') | KeyCode::Esc => {
            views.view_mut(kind).cancel_delete();
            dispatch(state, views, view_data, internal_tx, AppCommand::ExitToNav);
            emit_status(state, view_data, internal_tx, "delete canceled");
        }
        _ => {}
    }
}

fn render<V: Views>(
    frame: &mut ratatui::Frame<'_>,
    state: &AppState,
    views: &V,
    view_data: &ViewData,
) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(4),
        ])
        .split(frame.area());

    let selected = tab_index(state.active_tab);
    let titles = EntityKind::ALL
        .iter()
        .map(|kind| tab_title(views.view(*kind)))
        .collect::<Vec<String>>();
    let tabs = Tabs::new(titles)
        .block(Block::default().title("khata").borders(Borders::ALL))
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .select(selected);
    frame.render_widget(tabs, layout[0]);

    render_table(frame, layout[1], views.view(state.active_tab), view_data);

    let footer = Paragraph::new(footer_text(state, views.view(state.active_tab), view_data))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(footer, layout[2]);
}

fn tab_title(view: &dyn TabView) -> String {
    match view.phase() {
        LoadPhase::Idle => view.kind().label().to_owned(),
        LoadPhase::Loading => format!("{} ...", view.kind().label()),
        LoadPhase::Ready => format!("{} ({})", view.kind().label(), view.filtered_count()),
        LoadPhase::Error => format!("{} !", view.kind().label()),
    }
}

fn render_table(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    view: &dyn TabView,
    view_data: &ViewData,
) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(view.kind().label());
    let rows = view.visible_cells();
    if rows.is_empty() {
        let empty = Paragraph::new(empty_table_text(view)).block(block);
        frame.render_widget(empty, area);
        return;
    }

    let header = Row::new(view.columns().iter().map(|label| {
        Cell::from(*label).style(
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
    }));
    let cursor = view_data.cursor(view.kind());
    let body = rows.into_iter().enumerate().map(|(index, cells)| {
        let style = if index == cursor {
            Style::default().bg(Color::DarkGray)
        } else {
            Style::default()
        };
        Row::new(cells.into_iter().map(Cell::from)).style(style)
    });
    let widths = vec![Constraint::Min(8); view.columns().len()];
    let table = Table::new(body, widths).header(header).block(block);
    frame.render_widget(table, area);
}

fn empty_table_text(view: &dyn TabView) -> String {
    match view.phase() {
        LoadPhase::Idle | LoadPhase::Loading => format!("loading {}...", view.kind().label()),
        LoadPhase::Error if view.filtered_count() == 0 => format!(
            "could not load {}: {} -- press r to retry",
            view.kind().label(),
            view.last_error().unwrap_or("unknown error")
        ),
        _ if view.filters().is_active() || !view.search_query().is_empty() => {
            format!("no {} match the current filters (esc clears)", view.kind().label())
        }
        _ => format!("no {} yet", view.kind().label()),
    }
}

fn filter_summary(view: &dyn TabView) -> String {
    let mut parts = Vec::new();
    if !view.search_query().is_empty() {
        parts.push(format!("search {:?}", view.search_query()));
    }
    let filters = view.filters();
    if let Some(category) = filters.category_filter() {
        parts.push(format!("category {category}"));
    }
    if let Some(range) = filters.date_range.label() {
        parts.push(format!("dates {range}"));
    }
    for flag in &filters.flags {
        parts.push(flag.label().to_owned());
    }
    parts.join(", ")
}

fn footer_text(state: &AppState, view: &dyn TabView, view_data: &ViewData) -> String {
    let mut first = format!("{} | {}", state.mode.label(), view.page_summary());
    let filters = filter_summary(view);
    if !filters.is_empty() {
        first.push_str(&format!(" | {filters}"));
    }
    if view.is_submitting() {
        first.push_str(" | saving...");
    }

    let second = if state.mode.takes_text() {
        let prompt = match state.mode {
            AppMode::CategoryInput => "category (name or id)",
            AppMode::DateInput => "dates (from..to)",
            _ => "search",
        };
        format!("{prompt}: {}_", view_data.input)
    } else if let Some(status) = &state.status_line {
        status.clone()
    } else if view.phase() == LoadPhase::Error
        && let Some(error) = view.last_error()
    {
        format!("showing last loaded rows; refresh failed: {error}")
    } else {
        "tab switch | / search | u unpaid | c category | t dates | n/p page | d delete | r reload | x export | q quit"
            .to_owned()
    };
    format!("{first}\n{second}")
}
