//! Review session: the administrator's current working set — filter, sort,
//! page and selection — plus bulk-action dispatch.
//!
//! Selection is scoped to the currently visible page. "Select all" selects
//! the visible ids only, never the whole filtered set, so a destructive bulk
//! action can never touch records the administrator has not seen.

use std::collections::HashSet;

use crate::domain::{
    ExportFormat, Page, PageRequest, QueryFilter, RejectReason, SortSpec, TransactionRecord,
};
use crate::error::EngineError;
use crate::ports::ExportLocation;
use crate::query;
use crate::sync::SyncController;
use crate::validation::{self, ValidationError};

#[derive(Debug, Clone)]
pub enum BulkAction {
    Approve {
        note: Option<String>,
    },
    /// `reason` is optional at the type level so the missing-reason case is
    /// rejected by the engine with a ValidationError, before any network call.
    Reject {
        reason: Option<RejectReason>,
        note: Option<String>,
    },
    AddNote {
        note: String,
    },
    Export {
        format: ExportFormat,
    },
}

impl BulkAction {
    pub fn is_mutating(&self) -> bool {
        !matches!(self, BulkAction::Export { .. })
    }
}

#[derive(Debug)]
pub struct BulkFailure {
    pub id: String,
    pub error: EngineError,
}

/// Structured per-id outcome of a bulk action. A partially failed bulk call
/// is not a hard failure; the caller surfaces which ids failed and why.
#[derive(Debug, Default)]
pub struct BulkOutcome {
    pub succeeded: Vec<String>,
    pub failed: Vec<BulkFailure>,
    pub export: Option<ExportLocation>,
}

impl BulkOutcome {
    pub fn is_full_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty() && !self.succeeded.is_empty()
    }

    pub fn failure_for(&self, id: &str) -> Option<&EngineError> {
        self.failed
            .iter()
            .find(|failure| failure.id == id)
            .map(|failure| &failure.error)
    }
}

/// Ephemeral, per-UI-session state. Never persisted; dropped when the
/// administrator navigates away.
#[derive(Debug, Clone)]
pub struct ReviewSession {
    filter: QueryFilter,
    sort: SortSpec,
    page: PageRequest,
    selected: HashSet<String>,
}

impl Default for ReviewSession {
    fn default() -> Self {
        Self::new(PageRequest::default().limit)
    }
}

impl ReviewSession {
    pub fn new(limit: usize) -> Self {
        Self {
            filter: QueryFilter::default(),
            sort: SortSpec::default(),
            page: PageRequest::new(1, limit.max(1)),
            selected: HashSet::new(),
        }
    }

    pub fn filter(&self) -> &QueryFilter {
        &self.filter
    }

    pub fn sort(&self) -> SortSpec {
        self.sort
    }

    pub fn page(&self) -> PageRequest {
        self.page
    }

    /// Changing the view resets to the first page and drops the selection;
    /// selected ids are only meaningful on the page they were selected on.
    pub fn set_filter(&mut self, filter: QueryFilter) -> Result<(), EngineError> {
        filter.validate()?;
        self.filter = filter;
        self.page.page = 1;
        self.selected.clear();
        Ok(())
    }

    pub fn set_sort(&mut self, sort: SortSpec) {
        self.sort = sort;
        self.page.page = 1;
        self.selected.clear();
    }

    pub fn set_page(&mut self, page: usize) -> Result<(), EngineError> {
        validation::validate_page(page, self.page.limit)?;
        self.page.page = page;
        self.selected.clear();
        Ok(())
    }

    pub fn toggle(&mut self, id: &str) {
        if !self.selected.remove(id) {
            self.selected.insert(id.to_string());
        }
    }

    /// Replaces the selection with the visible page's ids.
    pub fn select_all_visible(&mut self, visible: &[String]) {
        self.selected = visible.iter().cloned().collect();
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.contains(id)
    }

    /// Sorted for deterministic dispatch order.
    pub fn selected(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.selected.iter().cloned().collect();
        ids.sort();
        ids
    }

    pub fn selection_len(&self) -> usize {
        self.selected.len()
    }

    /// Runs the session's current view over the given records through the
    /// pure query engine.
    pub fn visible_page(&self, records: &[TransactionRecord]) -> Page<TransactionRecord> {
        query::query(
            records,
            &self.filter,
            &self.sort,
            self.page.page,
            self.page.limit,
        )
    }

    /// Dispatches a bulk action over the current selection. Mutating actions
    /// clear the selection afterwards, even on partial failure; the caller is
    /// expected to re-run the view against refreshed data.
    pub async fn bulk_apply(
        &mut self,
        controller: &SyncController,
        action: BulkAction,
    ) -> Result<BulkOutcome, EngineError> {
        let ids = self.selected();
        if ids.is_empty() {
            return Err(ValidationError::new("selection", "no records selected").into());
        }

        let outcome = match action {
            BulkAction::Approve { note } => {
                controller.bulk_approve(&ids, note.as_deref()).await?
            }
            BulkAction::Reject { reason, note } => {
                let reason = reason.ok_or_else(|| {
                    ValidationError::new("reason", "required for bulk reject")
                })?;
                controller.bulk_reject(&ids, reason, note.as_deref()).await?
            }
            BulkAction::AddNote { note } => controller.bulk_note(&ids, &note).await?,
            BulkAction::Export { format } => {
                let location = controller.export(&ids, format).await?;
                return Ok(BulkOutcome {
                    succeeded: ids,
                    failed: Vec::new(),
                    export: Some(location),
                });
            }
        };

        // Mutating path: the selection no longer describes the refreshed view.
        self.clear();
        Ok(outcome)
    }
}
