use serde::Serialize;

use crate::filter::{self, Filterable, RiskSelector};
use crate::sort::{self, SortDirection, Sortable};

/// Page size the dashboard table shows.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// The operator's selection on one page. Never shared between views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    pub risk: RiskSelector,
    pub search: String,
    pub sort_field: String,
    pub direction: SortDirection,
}

impl ViewState {
    pub fn new(default_sort: &str) -> Self {
        Self {
            risk: RiskSelector::All,
            search: String::new(),
            sort_field: default_sort.to_string(),
            direction: SortDirection::Descending,
        }
    }

    pub fn apply(&mut self, mutation: ViewMutation) {
        match mutation {
            ViewMutation::Risk(risk) => self.risk = risk,
            ViewMutation::Search(search) => self.search = search,
            ViewMutation::SortField(field) => self.sort_field = field,
            ViewMutation::Direction(direction) => self.direction = direction,
            ViewMutation::ToggleSort(field) => {
                if self.sort_field == field {
                    self.direction = self.direction.toggled();
                } else {
                    self.sort_field = field;
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewMutation {
    Risk(RiskSelector),
    Search(String),
    SortField(String),
    Direction(SortDirection),
    /// Header click: flips the direction on the active field, otherwise
    /// switches field and keeps the direction.
    ToggleSort(String),
}

/// What the presentation layer gets to show.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Projection<T> {
    pub rows: Vec<T>,
    /// Records passing the filter before page truncation.
    pub matched: usize,
    /// Records in the underlying set.
    pub total: usize,
}

impl<T> Default for Projection<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            matched: 0,
            total: 0,
        }
    }
}

/// Filters, sorts, and truncates in one pass. Deterministic for identical
/// inputs.
pub fn project<T>(records: &[T], state: &ViewState, page_size: usize) -> Projection<T>
where
    T: Filterable + Sortable + Clone,
{
    let keep = filter::predicate::<T>(state.risk, &state.search);
    let mut rows: Vec<T> = records.iter().filter(|record| keep(*record)).cloned().collect();
    sort::sort_records(&mut rows, &state.sort_field, state.direction);

    let matched = rows.len();
    rows.truncate(page_size);
    Projection {
        rows,
        matched,
        total: records.len(),
    }
}
