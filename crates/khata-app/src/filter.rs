// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeSet;
use std::fmt;
use time::{Date, OffsetDateTime, UtcOffset};

use crate::model::{EntityKind, wire};

/// Field accessors the list controller needs from a row type.
pub trait ListEntity: Clone {
    type Id: Clone + Eq + fmt::Debug + fmt::Display;
    /// Form payload used to create or update a row.
    type Draft;
    const KIND: EntityKind;

    fn id(&self) -> &Self::Id;

    /// Fields matched by the free-text search box.
    fn searchable_fields(&self) -> Vec<&str>;

    fn category_field(&self) -> Option<&str> {
        None
    }

    fn created_at(&self) -> OffsetDateTime;

    /// Flags a row type does not define are inert and pass every row.
    fn satisfies_flag(&self, flag: BooleanFlag) -> bool {
        let _ = flag;
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BooleanFlag {
    UnpaidOnly,
}

impl BooleanFlag {
    pub const ALL: [Self; 1] = [Self::UnpaidOnly];

    pub const fn label(self) -> &'static str {
        match self {
            Self::UnpaidOnly => "unpaid only",
        }
    }

    pub const fn query_param(self) -> &'static str {
        match self {
            Self::UnpaidOnly => "show_unpaid_only",
        }
    }
}

/// Inclusive calendar-date window over creation timestamps.
///
/// The window only filters when both bounds are set; a half-open range passes
/// everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateRange {
    pub start: Option<Date>,
    pub end: Option<Date>,
}

impl DateRange {
    pub const fn new(start: Option<Date>, end: Option<Date>) -> Self {
        Self { start, end }
    }

    pub const fn between(start: Date, end: Date) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub const fn unbounded() -> Self {
        Self {
            start: None,
            end: None,
        }
    }

    pub const fn is_active(&self) -> bool {
        self.start.is_some() && self.end.is_some()
    }

    pub fn contains(&self, at: OffsetDateTime) -> bool {
        let (Some(start), Some(end)) = (self.start, self.end) else {
            return true;
        };
        let day = at.to_offset(UtcOffset::UTC).date();
        start <= day && day <= end
    }

    /// Parses `YYYY-MM-DD..YYYY-MM-DD`; an empty string clears the range.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Some(Self::unbounded());
        }
        let (start, end) = raw.split_once("..")?;
        Some(Self::between(wire::parse_date(start)?, wire::parse_date(end)?))
    }

    pub fn label(&self) -> Option<String> {
        let (Some(start), Some(end)) = (self.start, self.end) else {
            return None;
        };
        Some(format!(
            "{}..{}",
            wire::format_date(start),
            wire::format_date(end)
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterState {
    pub category: Option<String>,
    pub date_range: DateRange,
    pub flags: BTreeSet<BooleanFlag>,
}

impl FilterState {
    /// The category filter, ignoring blank values.
    pub fn category_filter(&self) -> Option<&str> {
        self.category
            .as_deref()
            .filter(|value| !value.trim().is_empty())
    }

    pub fn has_flag(&self, flag: BooleanFlag) -> bool {
        self.flags.contains(&flag)
    }

    pub fn is_active(&self) -> bool {
        self.category_filter().is_some() || self.date_range.is_active() || !self.flags.is_empty()
    }

    pub fn apply(&mut self, patch: FilterPatch) {
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(range) = patch.date_range {
            self.date_range = range;
        }
        for (flag, enabled) in patch.flags {
            if enabled {
                self.flags.insert(flag);
            } else {
                self.flags.remove(&flag);
            }
        }
    }
}

/// Partial update merged into a [`FilterState`]; untouched fields keep their value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterPatch {
    category: Option<Option<String>>,
    date_range: Option<DateRange>,
    flags: Vec<(BooleanFlag, bool)>,
}

impl FilterPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(Some(category.into()));
        self
    }

    pub fn clear_category(mut self) -> Self {
        self.category = Some(None);
        self
    }

    pub fn date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    pub fn flag(mut self, flag: BooleanFlag, enabled: bool) -> Self {
        self.flags.push((flag, enabled));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.category.is_none() && self.date_range.is_none() && self.flags.is_empty()
    }
}

pub fn matches_search<E: ListEntity>(entity: &E, query: &str) -> bool {
    if query.is_empty() {
        return true;
    }
    let needle = query.to_lowercase();
    entity
        .searchable_fields()
        .iter()
        .any(|field| field.to_lowercase().contains(&needle))
}

pub fn matches_filters<E: ListEntity>(entity: &E, filters: &FilterState) -> bool {
    if let Some(category) = filters.category_filter()
        && entity.category_field() != Some(category)
    {
        return false;
    }
    if !filters.date_range.contains(entity.created_at()) {
        return false;
    }
    filters
        .flags
        .iter()
        .all(|flag| entity.satisfies_flag(*flag))
}

pub fn apply_text_search<'a, E, I>(items: I, query: &str) -> Vec<&'a E>
where
    E: ListEntity + 'a,
    I: IntoIterator<Item = &'a E>,
{
    items
        .into_iter()
        .filter(|entity| matches_search(*entity, query))
        .collect()
}

pub fn apply_filters<'a, E, I>(items: I, filters: &FilterState) -> Vec<&'a E>
where
    E: ListEntity + 'a,
    I: IntoIterator<Item = &'a E>,
{
    items
        .into_iter()
        .filter(|entity| matches_filters(*entity, filters))
        .collect()
}

/// Query sent to the remote list and export endpoints.
///
/// Servers may ignore the filter hints; the controller filters locally
/// regardless. `limit` and `page` select one page of a paged listing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListCriteria {
    pub search: Option<String>,
    pub category: Option<String>,
    pub date_range: DateRange,
    pub flags: BTreeSet<BooleanFlag>,
    pub limit: Option<u32>,
    pub page: Option<u32>,
}

impl ListCriteria {
    pub fn from_state(query: &str, filters: &FilterState) -> Self {
        Self {
            search: (!query.is_empty()).then(|| query.to_owned()),
            category: filters.category_filter().map(str::to_owned),
            date_range: filters.date_range,
            flags: filters.flags.clone(),
            limit: None,
            page: None,
        }
    }

    pub fn with_date_range(mut self, range: DateRange) -> Self {
        self.date_range = range;
        self
    }

    pub fn with_limit(mut self, limit: Option<u32>) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_page(mut self, page: Option<u32>) -> Self {
        self.page = page;
        self
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(search) = &self.search {
            pairs.push(("search", search.clone()));
        }
        if let Some(category) = &self.category {
            pairs.push(("category", category.clone()));
        }
        if let (Some(start), Some(end)) = (self.date_range.start, self.date_range.end) {
            pairs.push(("start_date", wire::format_date(start)));
            pairs.push(("end_date", wire::format_date(end)));
        }
        for flag in &self.flags {
            pairs.push((flag.query_param(), "true".to_owned()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(page) = self.page {
            pairs.push(("page", page.to_string()));
        }
        pairs
    }
}
