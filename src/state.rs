// src/state.rs
use serde::Serialize;
use std::collections::HashSet;

use crate::filter::{self, FilterCriteria};
use crate::session::{RawSession, SessionRecord, SessionRepository};
use crate::sort;

/// Which of the three page states the display should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EmptyState {
    Results,
    NoResults,
    NoHistory,
}

/// Counts and filter labels that accompany every render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultSummary {
    pub shown: usize,
    pub total: usize,
    pub has_active_filters: bool,
    pub active_filters: Vec<String>,
}

impl ResultSummary {
    #[must_use]
    pub fn count_label(&self) -> String {
        if self.shown == self.total {
            format!("{} sessions found", self.shown)
        } else {
            format!("{} of {} sessions", self.shown, self.total)
        }
    }

    #[must_use]
    pub fn filters_label(&self) -> String {
        if self.active_filters.is_empty() {
            "No filters applied".to_string()
        } else {
            self.active_filters.join(", ")
        }
    }

    #[must_use]
    pub const fn empty_state(&self) -> EmptyState {
        if self.total == 0 {
            EmptyState::NoHistory
        } else if self.shown == 0 {
            EmptyState::NoResults
        } else {
            EmptyState::Results
        }
    }
}

/// Synchronous history core: repository, criteria and the displayed list.
/// Every mutation runs a full filter + sort pass.
#[derive(Debug, Default)]
pub struct HistoryView {
    repository: SessionRepository,
    criteria: FilterCriteria,
    displayed: Vec<SessionRecord>,
    expanded: HashSet<String>,
}

impl HistoryView {
    #[must_use]
    pub fn new(repository: SessionRepository, criteria: FilterCriteria) -> Self {
        let mut view = Self {
            repository,
            criteria,
            displayed: Vec::new(),
            expanded: HashSet::new(),
        };
        view.run_pipeline();
        view
    }

    #[must_use]
    pub const fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    #[must_use]
    pub fn displayed(&self) -> &[SessionRecord] {
        &self.displayed
    }

    #[must_use]
    pub const fn repository(&self) -> &SessionRepository {
        &self.repository
    }

    #[must_use]
    pub fn summary(&self) -> ResultSummary {
        ResultSummary {
            shown: self.displayed.len(),
            total: self.repository.len(),
            has_active_filters: self.criteria.has_active_filters(),
            active_filters: self.criteria.active_filter_labels(),
        }
    }

    /// Applies `update` to the criteria and re-runs the pipeline.
    pub fn update_criteria(&mut self, update: impl FnOnce(&mut FilterCriteria)) -> ResultSummary {
        update(&mut self.criteria);
        self.run_pipeline()
    }

    /// Resets criteria to the default tuple.
    pub fn reset_criteria(&mut self) -> ResultSummary {
        self.update_criteria(|criteria| *criteria = FilterCriteria::default())
    }

    /// Re-ingests the repository from scratch.
    pub fn replace_sessions(&mut self, raw: &[RawSession]) -> ResultSummary {
        self.repository.ingest(raw);
        self.expanded
            .retain(|id| self.repository.get(id).is_some());
        self.run_pipeline()
    }

    /// Empties the repository and resets the criteria.
    pub fn clear_sessions(&mut self) -> ResultSummary {
        self.repository.clear();
        self.expanded.clear();
        self.reset_criteria()
    }

    /// Flips the expanded flag of a session. `None` if the id is unknown.
    pub fn toggle_expanded(&mut self, id: &str) -> Option<bool> {
        self.repository.get(id)?;
        if self.expanded.remove(id) {
            Some(false)
        } else {
            self.expanded.insert(id.to_string());
            Some(true)
        }
    }

    #[must_use]
    pub fn is_expanded(&self, id: &str) -> bool {
        self.expanded.contains(id)
    }

    fn run_pipeline(&mut self) -> ResultSummary {
        let filtered = filter::apply(self.repository.sessions(), &self.criteria);
        self.displayed = sort::apply(&filtered, self.criteria.sort);
        self.summary()
    }
}
