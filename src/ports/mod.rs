//! Boundary contracts for the collaborators the engine talks to: the
//! transaction backend, the saved-view store and the exporter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    EditPatch, ExportFormat, Page, QueryFilter, RejectReason, SavedView, SortSpec,
    TransactionRecord, TransactionStatus,
};
use crate::error::EngineError;

/// Wire query for the listing endpoint: filter, sort and page in one value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionQuery {
    pub filter: QueryFilter,
    pub sort: SortSpec,
    pub page: usize,
    pub limit: usize,
}

impl Default for TransactionQuery {
    fn default() -> Self {
        Self {
            filter: QueryFilter::default(),
            sort: SortSpec::default(),
            page: 1,
            limit: 50,
        }
    }
}

/// Where an export landed; the caller retrieves it from here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportLocation {
    pub url: String,
}

/// Per-id result of a batch call. Bulk endpoints never fail wholesale on a
/// single bad id; each id reports its own outcome.
pub type PerIdResult = (String, Result<TransactionRecord, EngineError>);

/// The authoritative transaction backend. The engine never derives the
/// post-approval state itself; it republishes whatever this collaborator
/// returns.
#[async_trait]
pub trait TransactionGateway: Send + Sync {
    async fn fetch_transactions(
        &self,
        query: &TransactionQuery,
    ) -> Result<Page<TransactionRecord>, EngineError>;

    async fn fetch_transaction(&self, id: &str) -> Result<TransactionRecord, EngineError>;

    async fn apply_status(
        &self,
        id: &str,
        status: TransactionStatus,
        reason: Option<RejectReason>,
        note: Option<&str>,
    ) -> Result<TransactionRecord, EngineError>;

    async fn update_transaction(
        &self,
        id: &str,
        patch: &EditPatch,
    ) -> Result<TransactionRecord, EngineError>;

    /// Default implementations run the batch as independent per-id calls;
    /// backends with real batch endpoints override them.
    async fn bulk_approve(
        &self,
        ids: &[String],
        note: Option<&str>,
    ) -> Result<Vec<PerIdResult>, EngineError> {
        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            let result = self
                .apply_status(id, TransactionStatus::Completed, None, note)
                .await;
            results.push((id.clone(), result));
        }
        Ok(results)
    }

    async fn bulk_reject(
        &self,
        ids: &[String],
        reason: RejectReason,
        note: Option<&str>,
    ) -> Result<Vec<PerIdResult>, EngineError> {
        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            let result = self
                .apply_status(id, TransactionStatus::Rejected, Some(reason), note)
                .await;
            results.push((id.clone(), result));
        }
        Ok(results)
    }

    async fn bulk_note(
        &self,
        ids: &[String],
        note: &str,
    ) -> Result<Vec<PerIdResult>, EngineError> {
        let patch = EditPatch {
            admin_note: Some(note.to_string()),
            ..EditPatch::default()
        };
        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            let result = self.update_transaction(id, &patch).await;
            results.push((id.clone(), result));
        }
        Ok(results)
    }

    async fn export_transactions(
        &self,
        ids: &[String],
        format: ExportFormat,
    ) -> Result<ExportLocation, EngineError>;
}

/// Materializes records into a retrievable artifact. Split from the gateway
/// so deployments can export locally when the backend has no export endpoint.
#[async_trait]
pub trait Exporter: Send + Sync {
    async fn export(
        &self,
        records: &[TransactionRecord],
        format: ExportFormat,
    ) -> Result<ExportLocation, EngineError>;
}

/// CRUD against the saved-view store. Views belong to the requesting
/// administrator and never expire on their own.
#[async_trait]
pub trait SavedViewStore: Send + Sync {
    async fn list_views(&self, owner: Uuid) -> Result<Vec<SavedView>, EngineError>;

    async fn save_view(
        &self,
        owner: Uuid,
        name: &str,
        filter: QueryFilter,
    ) -> Result<SavedView, EngineError>;

    async fn delete_view(&self, id: Uuid) -> Result<(), EngineError>;
}
