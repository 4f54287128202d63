// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use time::Date;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::export::{CsvExport, CsvRecord, export_file_name, write_csv};
use crate::filter::{
    BooleanFlag, DateRange, FilterPatch, FilterState, ListCriteria, ListEntity, apply_filters,
    apply_text_search,
};
use crate::remote::RemoteCollection;

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    Idle,
    Loading,
    Ready,
    Error,
}

/// Identifies one issued fetch. Results are applied only if no newer fetch
/// has already resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FetchTicket {
    seq: u64,
}

impl FetchTicket {
    pub const fn seq(self) -> u64 {
        self.seq
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFetch {
    pub ticket: FetchTicket,
    pub criteria: ListCriteria,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied { rows: usize },
    Stale,
}

/// "Showing `first` to `last` of `total`", 1-based and inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub first: usize,
    pub last: usize,
    pub total: usize,
}

/// Owns one remote collection plus the search, filter, page, and delete
/// state layered over it.
#[derive(Debug)]
pub struct ListDataController<E: ListEntity, R> {
    remote: R,
    items: Vec<E>,
    search_query: String,
    filters: FilterState,
    current_page: usize,
    page_size: usize,
    fetch_limit: Option<u32>,
    phase: LoadPhase,
    last_error: Option<String>,
    pending_deletion: Option<E>,
    submitting: bool,
    issued_seq: u64,
    settled_seq: u64,
}

impl<E, R> ListDataController<E, R>
where
    E: ListEntity,
    R: RemoteCollection<E>,
{
    pub fn new(remote: R) -> Self {
        Self {
            remote,
            items: Vec::new(),
            search_query: String::new(),
            filters: FilterState::default(),
            current_page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            fetch_limit: None,
            phase: LoadPhase::Idle,
            last_error: None,
            pending_deletion: None,
            submitting: false,
            issued_seq: 0,
            settled_seq: 0,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Rows requested per page when fetching.
    pub fn with_fetch_limit(mut self, limit: Option<u32>) -> Self {
        self.fetch_limit = limit;
        self
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn items(&self) -> &[E] {
        &self.items
    }

    pub fn find(&self, id: &E::Id) -> Option<&E> {
        self.items.iter().find(|entity| entity.id() == id)
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn phase(&self) -> LoadPhase {
        self.phase
    }

    pub fn is_loading(&self) -> bool {
        self.phase == LoadPhase::Loading
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn pending_deletion(&self) -> Option<&E> {
        self.pending_deletion.as_ref()
    }

    /// Current search and filters as server-side hints, used by
    /// [`Self::export_csv_remote`].
    pub fn criteria(&self) -> ListCriteria {
        ListCriteria::from_state(&self.search_query, &self.filters)
    }

    /// What [`Self::fetch`] asks for: the whole collection, `fetch_limit`
    /// rows per page.
    ///
    /// Search and filters never narrow `items`, so widening them later
    /// cannot leave the controller holding a subset.
    pub fn fetch_criteria(&self) -> ListCriteria {
        ListCriteria::default().with_limit(self.fetch_limit)
    }

    // --- fetching ---

    pub fn fetch(&mut self) -> Result<usize> {
        let pending = self.begin_fetch();
        let result = self.remote.list(&pending.criteria);
        match self.finish_fetch(pending.ticket, result)? {
            FetchOutcome::Applied { rows } => Ok(rows),
            FetchOutcome::Stale => Ok(self.items.len()),
        }
    }

    /// Marks a fetch as in flight and snapshots the criteria it should use.
    pub fn begin_fetch(&mut self) -> PendingFetch {
        self.issued_seq += 1;
        self.phase = LoadPhase::Loading;
        debug!(
            entity = E::KIND.label(),
            seq = self.issued_seq,
            "fetch started"
        );
        PendingFetch {
            ticket: FetchTicket {
                seq: self.issued_seq,
            },
            criteria: self.fetch_criteria(),
        }
    }

    /// Applies a fetch result unless a newer fetch has already resolved.
    ///
    /// Stale results are dropped silently, errors included. A failure keeps
    /// the previous rows and is returned after being recorded.
    pub fn finish_fetch(
        &mut self,
        ticket: FetchTicket,
        result: Result<Vec<E>>,
    ) -> Result<FetchOutcome> {
        if ticket.seq <= self.settled_seq {
            debug!(
                entity = E::KIND.label(),
                seq = ticket.seq,
                settled = self.settled_seq,
                "dropping stale fetch result"
            );
            return Ok(FetchOutcome::Stale);
        }
        self.settled_seq = ticket.seq;
        let in_flight = self.settled_seq < self.issued_seq;
        match result {
            Ok(items) => {
                let rows = items.len();
                self.items = items;
                self.last_error = None;
                self.phase = if in_flight {
                    LoadPhase::Loading
                } else {
                    LoadPhase::Ready
                };
                self.clamp_page();
                info!(entity = E::KIND.label(), rows, "fetched");
                Ok(FetchOutcome::Applied { rows })
            }
            Err(error) => {
                warn!(entity = E::KIND.label(), %error, "fetch failed");
                self.last_error = Some(error.to_string());
                self.phase = if in_flight {
                    LoadPhase::Loading
                } else {
                    LoadPhase::Error
                };
                Err(error)
            }
        }
    }

    // --- search and filters ---

    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.search_query = query.into();
        self.current_page = 1;
    }

    pub fn set_filter(&mut self, patch: FilterPatch) {
        self.filters.apply(patch);
        self.current_page = 1;
    }

    pub fn toggle_flag(&mut self, flag: BooleanFlag) -> bool {
        let enabled = !self.filters.has_flag(flag);
        self.set_filter(FilterPatch::new().flag(flag, enabled));
        enabled
    }

    pub fn clear_filters(&mut self) {
        self.filters = FilterState::default();
        self.search_query.clear();
        self.current_page = 1;
    }

    // --- derived views ---

    /// Every row passing the filters and the search query, in fetch order.
    pub fn filtered_items(&self) -> Vec<&E> {
        apply_text_search(apply_filters(&self.items, &self.filters), &self.search_query)
    }

    pub fn filtered_count(&self) -> usize {
        self.filtered_items().len()
    }

    pub fn visible_items(&self) -> Vec<&E> {
        let start = (self.current_page - 1) * self.page_size;
        self.filtered_items()
            .into_iter()
            .skip(start)
            .take(self.page_size)
            .collect()
    }

    pub fn total_pages(&self) -> usize {
        self.filtered_count().div_ceil(self.page_size)
    }

    /// Moves to page `page`; out-of-range requests leave the page unchanged.
    pub fn set_page(&mut self, page: usize) -> bool {
        if page < 1 || page > self.total_pages() {
            return false;
        }
        self.current_page = page;
        true
    }

    pub fn next_page(&mut self) -> bool {
        self.set_page(self.current_page + 1)
    }

    pub fn prev_page(&mut self) -> bool {
        match self.current_page.checked_sub(1) {
            Some(page) => self.set_page(page),
            None => false,
        }
    }

    pub fn page_window(&self) -> Option<PageWindow> {
        let total = self.filtered_count();
        if total == 0 {
            return None;
        }
        let first = (self.current_page - 1) * self.page_size + 1;
        let last = (self.current_page * self.page_size).min(total);
        Some(PageWindow { first, last, total })
    }

    fn clamp_page(&mut self) {
        let total = self.total_pages();
        if self.current_page > total {
            self.current_page = total.max(1);
        }
    }

    // --- deletion ---

    pub fn request_delete(&mut self, entity: E) {
        self.pending_deletion = Some(entity);
    }

    /// Stages the loaded row with `id` for deletion.
    pub fn request_delete_id(&mut self, id: &E::Id) -> bool {
        match self.find(id).cloned() {
            Some(entity) => {
                self.request_delete(entity);
                true
            }
            None => false,
        }
    }

    pub fn cancel_delete(&mut self) -> Option<E> {
        self.pending_deletion.take()
    }

    /// Deletes the pending row remotely, then drops it from the local list.
    ///
    /// Returns `Ok(None)` when nothing is pending. On failure the pending row
    /// stays staged so the confirmation can be retried.
    pub fn confirm_delete(&mut self) -> Result<Option<E>> {
        let Some(id) = self.pending_deletion.as_ref().map(|entity| entity.id().clone()) else {
            return Ok(None);
        };
        self.submitting = true;
        let result = self.remote.delete(&id);
        self.submitting = false;
        if let Err(error) = result {
            warn!(entity = E::KIND.label(), %id, %error, "delete failed");
            return Err(error);
        }
        let pending = self.pending_deletion.take();
        let removed = self
            .items
            .iter()
            .position(|entity| entity.id() == &id)
            .map(|index| self.items.remove(index));
        self.clamp_page();
        info!(entity = E::KIND.label(), %id, "deleted");
        Ok(removed.or(pending))
    }

    // --- create / update ---

    /// Creates a row, or updates the row `id`, then refetches the list.
    ///
    /// The saved row is returned even if the follow-up refetch fails; that
    /// failure shows up in [`Self::last_error`].
    pub fn create_or_update(&mut self, draft: &E::Draft, id: Option<&E::Id>) -> Result<E> {
        self.submitting = true;
        let result = match id {
            Some(id) => self.remote.update(id, draft),
            None => self.remote.create(draft),
        };
        self.submitting = false;
        let saved = result.inspect_err(|error| {
            warn!(entity = E::KIND.label(), %error, "save failed");
        })?;
        info!(entity = E::KIND.label(), id = %saved.id(), "saved");
        if let Err(error) = self.fetch() {
            warn!(entity = E::KIND.label(), %error, "refresh after save failed");
        }
        Ok(saved)
    }

    // --- export ---

    /// Filtered rows further restricted to `range` when it is active.
    pub fn export_rows(&self, range: Option<DateRange>) -> Vec<&E> {
        let range = range.unwrap_or_default();
        self.filtered_items()
            .into_iter()
            .filter(|entity| range.contains(entity.created_at()))
            .collect()
    }

    pub fn export_csv(&self, range: Option<DateRange>, today: Date) -> Result<CsvExport>
    where
        E: CsvRecord,
    {
        let (content, rows) = write_csv(self.export_rows(range))?;
        let file_name = export_file_name(E::KIND, today);
        info!(entity = E::KIND.label(), rows, file = %file_name, "exported csv");
        Ok(CsvExport {
            file_name,
            content,
            rows,
        })
    }

    /// Asks the server to render the CSV for the current criteria.
    ///
    /// An active `range` replaces the date filter for this request.
    pub fn export_csv_remote(&self, range: Option<DateRange>, today: Date) -> Result<CsvExport> {
        let mut criteria = self.criteria();
        if let Some(range) = range.filter(DateRange::is_active) {
            criteria = criteria.with_date_range(range);
        }
        let content = self.remote.export_csv(&criteria)?;
        let mut reader = csv::ReaderBuilder::new().from_reader(content.as_slice());
        let mut rows = 0;
        for record in reader.records() {
            record?;
            rows += 1;
        }
        Ok(CsvExport {
            file_name: export_file_name(E::KIND, today),
            content,
            rows,
        })
    }
}
