// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::EntityKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    Nav,
    Search,
    CategoryInput,
    DateInput,
    ConfirmDelete,
}

impl AppMode {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Nav => "NAV",
            Self::Search => "SEARCH",
            Self::CategoryInput => "CATEGORY",
            Self::DateInput => "DATES",
            Self::ConfirmDelete => "DELETE?",
        }
    }

    /// Modes that capture typed characters into a line buffer.
    pub const fn takes_text(self) -> bool {
        matches!(self, Self::Search | Self::CategoryInput | Self::DateInput)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    pub mode: AppMode,
    pub active_tab: EntityKind,
    pub status_line: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            mode: AppMode::Nav,
            active_tab: EntityKind::Customers,
            status_line: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppCommand {
    NextTab,
    PrevTab,
    EnterSearch,
    EnterCategoryInput,
    EnterDateInput,
    OpenConfirmDelete,
    ExitToNav,
    ClearStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    ModeChanged(AppMode),
    TabChanged(EntityKind),
    StatusUpdated(String),
    StatusCleared,
}

impl AppState {
    pub fn dispatch(&mut self, command: AppCommand) -> Vec<AppEvent> {
        match command {
            AppCommand::NextTab => self.rotate_tab(1),
            AppCommand::PrevTab => self.rotate_tab(-1),
            AppCommand::EnterSearch => self.enter(AppMode::Search),
            AppCommand::EnterCategoryInput => {
                if self.active_tab != EntityKind::Products {
                    return vec![self.set_status("category filter applies to products")];
                }
                self.enter(AppMode::CategoryInput)
            }
            AppCommand::EnterDateInput => self.enter(AppMode::DateInput),
            AppCommand::OpenConfirmDelete => self.enter(AppMode::ConfirmDelete),
            AppCommand::ExitToNav => {
                self.mode = AppMode::Nav;
                vec![AppEvent::ModeChanged(self.mode)]
            }
            AppCommand::ClearStatus => {
                self.status_line = None;
                vec![AppEvent::StatusCleared]
            }
        }
    }

    pub fn set_status(&mut self, message: impl Into<String>) -> AppEvent {
        let message = message.into();
        self.status_line = Some(message.clone());
        AppEvent::StatusUpdated(message)
    }

    fn enter(&mut self, mode: AppMode) -> Vec<AppEvent> {
        self.mode = mode;
        vec![AppEvent::ModeChanged(mode)]
    }

    fn rotate_tab(&mut self, delta: isize) -> Vec<AppEvent> {
        // Tabs only switch from nav so a pending prompt is never orphaned.
        if self.mode != AppMode::Nav {
            return Vec::new();
        }
        let tabs = EntityKind::ALL;
        let current = tabs
            .iter()
            .position(|tab| *tab == self.active_tab)
            .unwrap_or(0) as isize;
        let len = tabs.len() as isize;
        let next = (current + delta).rem_euclid(len) as usize;
        self.active_tab = tabs[next];
        vec![AppEvent::TabChanged(self.active_tab)]
    }
}

#[cfg(test)]
mod tests {
    use super::{AppCommand, AppEvent, AppMode, AppState};
    use crate::EntityKind;

    #[test]
    fn tab_rotation_wraps() {
        let mut state = AppState {
            active_tab: EntityKind::Categories,
            ..AppState::default()
        };

        let events = state.dispatch(AppCommand::NextTab);
        assert_eq!(state.active_tab, EntityKind::Customers);
        assert_eq!(events, vec![AppEvent::TabChanged(EntityKind::Customers)]);

        state.dispatch(AppCommand::PrevTab);
        assert_eq!(state.active_tab, EntityKind::Categories);
    }

    #[test]
    fn tabs_do_not_switch_during_a_prompt() {
        let mut state = AppState::default();
        state.dispatch(AppCommand::OpenConfirmDelete);

        let events = state.dispatch(AppCommand::NextTab);
        assert!(events.is_empty());
        assert_eq!(state.active_tab, EntityKind::Customers);
    }

    #[test]
    fn category_input_only_on_products() {
        let mut state = AppState::default();
        let events = state.dispatch(AppCommand::EnterCategoryInput);
        assert_eq!(state.mode, AppMode::Nav);
        assert!(matches!(events.as_slice(), [AppEvent::StatusUpdated(_)]));

        state.active_tab = EntityKind::Products;
        state.dispatch(AppCommand::EnterCategoryInput);
        assert_eq!(state.mode, AppMode::CategoryInput);
        assert!(state.mode.takes_text());
    }

    #[test]
    fn mode_transitions() {
        let mut state = AppState::default();

        state.dispatch(AppCommand::EnterSearch);
        assert_eq!(state.mode, AppMode::Search);

        state.dispatch(AppCommand::EnterDateInput);
        assert_eq!(state.mode, AppMode::DateInput);

        let events = state.dispatch(AppCommand::ExitToNav);
        assert_eq!(state.mode, AppMode::Nav);
        assert_eq!(events, vec![AppEvent::ModeChanged(AppMode::Nav)]);
    }

    #[test]
    fn status_set_and_cleared() {
        let mut state = AppState::default();
        let event = state.set_status("deleted Priya Patel");
        assert_eq!(event, AppEvent::StatusUpdated("deleted Priya Patel".to_owned()));
        assert_eq!(state.status_line.as_deref(), Some("deleted Priya Patel"));

        state.dispatch(AppCommand::ClearStatus);
        assert_eq!(state.status_line, None);
    }
}
