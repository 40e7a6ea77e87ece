//! HTTP implementation of the transaction backend contracts.

use async_trait::async_trait;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::{
    EditPatch, ExportFormat, Page, Priority, QueryFilter, RejectReason, SavedView, SortDirection,
    SortField, TransactionRecord, TransactionStatus,
};
use crate::error::{EngineError, TransportError};
use crate::ports::{
    ExportLocation, PerIdResult, SavedViewStore, TransactionGateway, TransactionQuery,
};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// HTTP client for the transactions backend. Wraps every call in a
/// consecutive-failures circuit breaker so a dead backend fails fast instead
/// of piling up timeouts.
#[derive(Clone)]
pub struct HttpTransactionGateway {
    client: Client,
    base_url: String,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl HttpTransactionGateway {
    pub fn new(base_url: String) -> Self {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT_SECS)
    }

    pub fn with_timeout(base_url: String, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(Duration::from_secs(60), Duration::from_secs(120));
        let policy = failure_policy::consecutive_failures(3, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        HttpTransactionGateway {
            client,
            base_url,
            circuit_breaker,
        }
    }

    /// Custom circuit breaker configuration.
    pub fn with_circuit_breaker(
        base_url: String,
        failure_threshold: u32,
        reset_timeout_secs: u64,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(
            Duration::from_secs(reset_timeout_secs),
            Duration::from_secs(reset_timeout_secs * 2),
        );
        let policy = failure_policy::consecutive_failures(failure_threshold, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        HttpTransactionGateway {
            client,
            base_url,
            circuit_breaker,
        }
    }

    pub fn circuit_state(&self) -> &'static str {
        if self.circuit_breaker.is_call_permitted() {
            "closed"
        } else {
            "open"
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn guard<T, F>(&self, fut: F) -> Result<T, EngineError>
    where
        F: Future<Output = Result<T, EngineError>>,
    {
        match self.circuit_breaker.call(fut).await {
            Ok(value) => Ok(value),
            Err(FailsafeError::Rejected) => Err(TransportError::CircuitOpen(
                "transaction API circuit breaker is open".to_string(),
            )
            .into()),
            Err(FailsafeError::Inner(err)) => Err(err),
        }
    }
}

fn sort_field_param(field: SortField) -> &'static str {
    match field {
        SortField::Date => "date",
        SortField::CreatedAt => "createdAt",
        SortField::ProcessedAt => "processedAt",
        SortField::Amount => "amount",
        SortField::Status => "status",
        SortField::UserName => "userName",
        SortField::Id => "id",
    }
}

fn priority_param(priority: Priority) -> &'static str {
    match priority {
        Priority::High => "HIGH",
        Priority::Normal => "NORMAL",
    }
}

/// Flattens the query into URL parameters; multi-valued fields are
/// comma-joined the way the listing endpoint expects them.
fn query_pairs(query: &TransactionQuery) -> Vec<(&'static str, String)> {
    let mut pairs = vec![
        ("page", query.page.to_string()),
        ("limit", query.limit.to_string()),
        ("sortField", sort_field_param(query.sort.field).to_string()),
        (
            "sortDirection",
            match query.sort.direction {
                SortDirection::Asc => "asc".to_string(),
                SortDirection::Desc => "desc".to_string(),
            },
        ),
    ];

    let filter: &QueryFilter = &query.filter;
    if !filter.statuses.is_empty() {
        let joined = filter
            .statuses
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(",");
        pairs.push(("status", joined));
    }
    if !filter.kinds.is_empty() {
        let joined = filter
            .kinds
            .iter()
            .map(|k| k.to_string())
            .collect::<Vec<_>>()
            .join(",");
        pairs.push(("type", joined));
    }
    if !filter.priorities.is_empty() {
        let joined = filter
            .priorities
            .iter()
            .map(|p| priority_param(*p))
            .collect::<Vec<_>>()
            .join(",");
        pairs.push(("priority", joined));
    }
    if let Some(min) = &filter.min_amount {
        pairs.push(("minAmount", min.to_string()));
    }
    if let Some(max) = &filter.max_amount {
        pairs.push(("maxAmount", max.to_string()));
    }
    if let Some(from) = &filter.date_from {
        pairs.push(("dateFrom", from.to_rfc3339()));
    }
    if let Some(to) = &filter.date_to {
        pairs.push(("dateTo", to.to_rfc3339()));
    }
    if let Some(search) = &filter.search {
        pairs.push(("search", search.clone()));
    }
    if let Some(user) = &filter.user {
        pairs.push(("userId", user.clone()));
    }
    if let Some(account) = &filter.account {
        pairs.push(("accountId", account.clone()));
    }

    pairs
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusRequest {
    status: TransactionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<RejectReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BulkStatusRequest {
    ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<RejectReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportRequest {
    ids: Vec<String>,
    format: ExportFormat,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SaveViewRequest {
    owner: Uuid,
    name: String,
    filter: QueryFilter,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BulkResponse {
    results: Vec<BulkResultRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BulkResultRow {
    id: String,
    #[serde(default)]
    transaction: Option<TransactionRecord>,
    #[serde(default)]
    error: Option<String>,
}

impl BulkResultRow {
    fn into_per_id(self) -> PerIdResult {
        let BulkResultRow {
            id,
            transaction,
            error,
        } = self;
        match (transaction, error) {
            (Some(record), _) => (id, Ok(record)),
            (None, Some(message)) => (id, Err(TransportError::Remote(message).into())),
            (None, None) => (
                id,
                Err(TransportError::InvalidResponse(
                    "bulk result row carries neither transaction nor error".to_string(),
                )
                .into()),
            ),
        }
    }
}

#[async_trait]
impl TransactionGateway for HttpTransactionGateway {
    async fn fetch_transactions(
        &self,
        query: &TransactionQuery,
    ) -> Result<Page<TransactionRecord>, EngineError> {
        let client = self.client.clone();
        let url = self.url("/admin/transactions");
        let pairs = query_pairs(query);

        self.guard(async move {
            let response = client.get(&url).query(&pairs).send().await?;
            let response = response.error_for_status()?;
            let page = response.json::<Page<TransactionRecord>>().await?;
            Ok(page)
        })
        .await
    }

    async fn fetch_transaction(&self, id: &str) -> Result<TransactionRecord, EngineError> {
        let client = self.client.clone();
        let url = self.url(&format!("/admin/transactions/{}", id));
        let id = id.to_string();

        self.guard(async move {
            let response = client.get(&url).send().await?;
            if response.status() == StatusCode::NOT_FOUND {
                return Err(EngineError::NotFound(id));
            }
            let response = response.error_for_status()?;
            let record = response.json::<TransactionRecord>().await?;
            Ok(record)
        })
        .await
    }

    async fn apply_status(
        &self,
        id: &str,
        status: TransactionStatus,
        reason: Option<RejectReason>,
        note: Option<&str>,
    ) -> Result<TransactionRecord, EngineError> {
        let client = self.client.clone();
        let url = self.url(&format!("/admin/transactions/{}/status", id));
        let id = id.to_string();
        let body = StatusRequest {
            status,
            reason,
            note: note.map(str::to_string),
        };

        self.guard(async move {
            let response = client.post(&url).json(&body).send().await?;
            if response.status() == StatusCode::NOT_FOUND {
                return Err(EngineError::NotFound(id));
            }
            let response = response.error_for_status()?;
            let record = response.json::<TransactionRecord>().await?;
            Ok(record)
        })
        .await
    }

    async fn update_transaction(
        &self,
        id: &str,
        patch: &EditPatch,
    ) -> Result<TransactionRecord, EngineError> {
        let client = self.client.clone();
        let url = self.url(&format!("/admin/transactions/{}", id));
        let id = id.to_string();
        let body = patch.clone();

        self.guard(async move {
            let response = client.put(&url).json(&body).send().await?;
            if response.status() == StatusCode::NOT_FOUND {
                return Err(EngineError::NotFound(id));
            }
            let response = response.error_for_status()?;
            let record = response.json::<TransactionRecord>().await?;
            Ok(record)
        })
        .await
    }

    async fn bulk_approve(
        &self,
        ids: &[String],
        note: Option<&str>,
    ) -> Result<Vec<PerIdResult>, EngineError> {
        let client = self.client.clone();
        let url = self.url("/admin/transactions/bulk/approve");
        let body = BulkStatusRequest {
            ids: ids.to_vec(),
            reason: None,
            note: note.map(str::to_string),
        };

        self.guard(async move {
            let response = client.post(&url).json(&body).send().await?;
            let response = response.error_for_status()?;
            let parsed = response.json::<BulkResponse>().await?;
            Ok(parsed
                .results
                .into_iter()
                .map(BulkResultRow::into_per_id)
                .collect())
        })
        .await
    }

    async fn bulk_reject(
        &self,
        ids: &[String],
        reason: RejectReason,
        note: Option<&str>,
    ) -> Result<Vec<PerIdResult>, EngineError> {
        let client = self.client.clone();
        let url = self.url("/admin/transactions/bulk/reject");
        let body = BulkStatusRequest {
            ids: ids.to_vec(),
            reason: Some(reason),
            note: note.map(str::to_string),
        };

        self.guard(async move {
            let response = client.post(&url).json(&body).send().await?;
            let response = response.error_for_status()?;
            let parsed = response.json::<BulkResponse>().await?;
            Ok(parsed
                .results
                .into_iter()
                .map(BulkResultRow::into_per_id)
                .collect())
        })
        .await
    }

    async fn bulk_note(&self, ids: &[String], note: &str) -> Result<Vec<PerIdResult>, EngineError> {
        let client = self.client.clone();
        let url = self.url("/admin/transactions/bulk/note");
        let body = BulkStatusRequest {
            ids: ids.to_vec(),
            reason: None,
            note: Some(note.to_string()),
        };

        self.guard(async move {
            let response = client.post(&url).json(&body).send().await?;
            let response = response.error_for_status()?;
            let parsed = response.json::<BulkResponse>().await?;
            Ok(parsed
                .results
                .into_iter()
                .map(BulkResultRow::into_per_id)
                .collect())
        })
        .await
    }

    async fn export_transactions(
        &self,
        ids: &[String],
        format: ExportFormat,
    ) -> Result<ExportLocation, EngineError> {
        let client = self.client.clone();
        let url = self.url("/admin/transactions/export");
        let body = ExportRequest {
            ids: ids.to_vec(),
            format,
        };

        self.guard(async move {
            let response = client.post(&url).json(&body).send().await?;
            let response = response.error_for_status()?;
            let location = response.json::<ExportLocation>().await?;
            Ok(location)
        })
        .await
    }
}

#[async_trait]
impl SavedViewStore for HttpTransactionGateway {
    async fn list_views(&self, owner: Uuid) -> Result<Vec<SavedView>, EngineError> {
        let client = self.client.clone();
        let url = self.url("/admin/views");

        self.guard(async move {
            let response = client
                .get(&url)
                .query(&[("owner", owner.to_string())])
                .send()
                .await?;
            let response = response.error_for_status()?;
            let views = response.json::<Vec<SavedView>>().await?;
            Ok(views)
        })
        .await
    }

    async fn save_view(
        &self,
        owner: Uuid,
        name: &str,
        filter: QueryFilter,
    ) -> Result<SavedView, EngineError> {
        crate::validation::validate_required("name", name)?;
        filter.validate()?;

        let client = self.client.clone();
        let url = self.url("/admin/views");
        let body = SaveViewRequest {
            owner,
            name: name.to_string(),
            filter,
        };

        self.guard(async move {
            let response = client.post(&url).json(&body).send().await?;
            let response = response.error_for_status()?;
            let view = response.json::<SavedView>().await?;
            Ok(view)
        })
        .await
    }

    async fn delete_view(&self, id: Uuid) -> Result<(), EngineError> {
        let client = self.client.clone();
        let url = self.url(&format!("/admin/views/{}", id));

        self.guard(async move {
            let response = client.delete(&url).send().await?;
            if response.status() == StatusCode::NOT_FOUND {
                return Err(EngineError::NotFound(id.to_string()));
            }
            response.error_for_status()?;
            Ok(())
        })
        .await
    }
}
