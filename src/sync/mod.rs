//! Sync & polling controller: keeps the locally cached transaction set
//! consistent with the authoritative backend and keeps PENDING records live.
//!
//! The cache is a snapshot map behind an `ArcSwap`: readers always see a
//! coherent snapshot, writers publish whole-map copies in a single swap.
//! The authoritative fetch always wins; local copies are overwritten without
//! merging.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use bigdecimal::BigDecimal;
use tokio::sync::{watch, Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{
    EditPatch, ExportFormat, QueryFilter, RejectReason, TransactionRecord, TransactionStatus,
    TransitionContext, DEFAULT_HIGH_PRIORITY_THRESHOLD,
};
use crate::error::EngineError;
use crate::ports::{ExportLocation, Exporter, PerIdResult, TransactionGateway, TransactionQuery};
use crate::session::{BulkFailure, BulkOutcome};

/// Poll cadence for PENDING records in an open detail view.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Page size used when rebuilding the whole cache from the listing endpoint.
const SYNC_BATCH_LIMIT: usize = 500;

#[derive(Debug, Clone, Default)]
struct Snapshot {
    records: HashMap<String, TransactionRecord>,
    by_status: HashMap<TransactionStatus, BTreeSet<String>>,
}

impl Snapshot {
    fn rebuild_index(&mut self) {
        let mut by_status: HashMap<TransactionStatus, BTreeSet<String>> = HashMap::new();
        for (id, record) in &self.records {
            by_status.entry(record.status).or_default().insert(id.clone());
        }
        self.by_status = by_status;
    }

    fn reindex_one(&mut self, id: &str, old: Option<TransactionStatus>) {
        if let Some(old) = old {
            if let Some(ids) = self.by_status.get_mut(&old) {
                ids.remove(id);
            }
        }
        if let Some(record) = self.records.get(id) {
            self.by_status
                .entry(record.status)
                .or_default()
                .insert(id.to_string());
        }
    }
}

/// In-memory write-through cache of transaction records. Construct one per
/// session; it holds no global state and drops with its owner.
#[derive(Default)]
pub struct TransactionStore {
    inner: ArcSwap<Snapshot>,
}

impl TransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<TransactionRecord> {
        self.inner.load().records.get(id).cloned()
    }

    /// All cached records, ordered by id so downstream queries stay
    /// deterministic across runs.
    pub fn all(&self) -> Vec<TransactionRecord> {
        let snapshot = self.inner.load();
        let mut records: Vec<_> = snapshot.records.values().cloned().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }

    /// Ids currently in the given status, from the status index.
    pub fn ids_with_status(&self, status: TransactionStatus) -> Vec<String> {
        self.inner
            .load()
            .by_status
            .get(&status)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.inner.load().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.load().records.is_empty()
    }

    /// Replaces the whole cache in one swap.
    pub fn replace_all(&self, records: Vec<TransactionRecord>) {
        let mut snapshot = Snapshot {
            records: records.into_iter().map(|r| (r.id.clone(), r)).collect(),
            by_status: HashMap::new(),
        };
        snapshot.rebuild_index();
        self.inner.store(Arc::new(snapshot));
    }

    /// Inserts or overwrites one record. Readers see either the old snapshot
    /// or the new one, never a partially updated map.
    pub fn upsert(&self, record: TransactionRecord) {
        self.inner.rcu(|current| {
            let mut next = Snapshot::clone(current);
            let old_status = next.records.get(&record.id).map(|r| r.status);
            let id = record.id.clone();
            next.records.insert(id.clone(), record.clone());
            next.reindex_one(&id, old_status);
            next
        });
    }

    pub fn remove(&self, id: &str) {
        self.inner.rcu(|current| {
            let mut next = Snapshot::clone(current);
            let old_status = next.records.remove(id).map(|r| r.status);
            next.reindex_one(id, old_status);
            next
        });
    }
}

/// Cancellable handle for a per-record poll task. Cancel it explicitly or
/// drop it; either way the timer stops instead of leaking.
pub struct PollHandle {
    cancel: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl PollHandle {
    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map(JoinHandle::is_finished).unwrap_or(true)
    }

    /// Waits for the poll task to end, whether it settled or was cancelled.
    pub async fn stopped(mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        let _ = self.cancel.send(true);
    }
}

/// Reconciles the local cache with the authoritative backend and dispatches
/// transitions, edits and bulk actions through it.
#[derive(Clone)]
pub struct SyncController {
    gateway: Arc<dyn TransactionGateway>,
    store: Arc<TransactionStore>,
    exporter: Option<Arc<dyn Exporter>>,
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
    poll_interval: Duration,
    priority_threshold: BigDecimal,
}

impl SyncController {
    pub fn new(gateway: Arc<dyn TransactionGateway>) -> Self {
        Self {
            gateway,
            store: Arc::new(TransactionStore::new()),
            exporter: None,
            locks: Arc::new(Mutex::new(HashMap::new())),
            poll_interval: DEFAULT_POLL_INTERVAL,
            priority_threshold: BigDecimal::from(DEFAULT_HIGH_PRIORITY_THRESHOLD),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_priority_threshold(mut self, threshold: BigDecimal) -> Self {
        self.priority_threshold = threshold;
        self
    }

    /// Local exporter used for CSV; PDF/Excel still go to the backend.
    pub fn with_exporter(mut self, exporter: Arc<dyn Exporter>) -> Self {
        self.exporter = Some(exporter);
        self
    }

    pub fn store(&self) -> &TransactionStore {
        &self.store
    }

    pub fn records(&self) -> Vec<TransactionRecord> {
        self.store.all()
    }

    fn normalize(&self, mut record: TransactionRecord) -> TransactionRecord {
        record.priority = record.derived_priority(&self.priority_threshold);
        record
    }

    async fn lock_for(&self, id: &str) -> OwnedMutexGuard<()> {
        let cell = {
            let mut map = self.locks.lock().await;
            // Entries with no holder or waiter left are swept here, so the
            // map only ever tracks ids with a live lock user.
            map.retain(|_, cell| Arc::strong_count(cell) > 1);
            map.entry(id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        cell.lock_owned().await
    }

    /// Replaces the entire local cache with a fresh authoritative fetch.
    /// Used on initial load and explicit user refresh.
    pub async fn refresh_all(&self) -> Result<usize, EngineError> {
        let mut collected: Vec<TransactionRecord> = Vec::new();
        let mut page_no = 1;

        loop {
            let query = TransactionQuery {
                filter: QueryFilter::default(),
                page: page_no,
                limit: SYNC_BATCH_LIMIT,
                ..TransactionQuery::default()
            };
            let page = self.gateway.fetch_transactions(&query).await?;
            let fetched = page.items.len();
            collected.extend(page.items.into_iter().map(|r| self.normalize(r)));

            if fetched == 0 || collected.len() >= page.total {
                break;
            }
            page_no += 1;
        }

        let count = collected.len();
        self.store.replace_all(collected);
        debug!(count, "cache replaced from authoritative source");
        Ok(count)
    }

    /// Fetches one record's current state and overwrites the cached copy.
    /// A 404 removes the record from the cache before propagating. Holds the
    /// record's write lock across fetch and upsert so a stalled poll read
    /// cannot land after a transition and clobber the newer state.
    pub async fn refresh_one(&self, id: &str) -> Result<TransactionRecord, EngineError> {
        let _guard = self.lock_for(id).await;
        match self.gateway.fetch_transaction(id).await {
            Ok(record) => {
                let record = self.normalize(record);
                self.store.upsert(record.clone());
                Ok(record)
            }
            Err(EngineError::NotFound(id)) => {
                self.store.remove(&id);
                Err(EngineError::NotFound(id))
            }
            Err(err) => Err(err),
        }
    }

    /// Accepts a record pushed by the transport layer (e.g. a FAILED report)
    /// and records it without further validation.
    pub async fn accept_remote(&self, record: TransactionRecord) {
        let _guard = self.lock_for(&record.id).await;
        let record = self.normalize(record);
        if record.status == TransactionStatus::Failed {
            info!(id = %record.id, "recording system-reported failure");
        }
        self.store.upsert(record);
    }

    /// Validates the transition against the cached copy, performs it through
    /// the backend and stores the authoritative result. Local validation
    /// failures never reach the network.
    pub async fn transition(
        &self,
        id: &str,
        target: TransactionStatus,
        ctx: &TransitionContext,
    ) -> Result<TransactionRecord, EngineError> {
        let _guard = self.lock_for(id).await;

        let current = self
            .store
            .get(id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;

        // Result discarded: the backend's answer is authoritative, the local
        // application only serves as the fail-fast guard.
        current.apply_transition(target, ctx)?;

        let updated = self
            .gateway
            .apply_status(id, target, ctx.reason, ctx.note.as_deref())
            .await?;
        let updated = self.normalize(updated);
        self.store.upsert(updated.clone());

        info!(
            id = %id,
            from = %current.status,
            to = %updated.status,
            admin = ?ctx.admin,
            "transition applied"
        );
        Ok(updated)
    }

    pub async fn approve(
        &self,
        id: &str,
        admin: Uuid,
        note: Option<&str>,
    ) -> Result<TransactionRecord, EngineError> {
        let mut ctx = TransitionContext::by_admin(admin);
        if let Some(note) = note {
            ctx = ctx.with_note(note);
        }
        self.transition(id, TransactionStatus::Completed, &ctx).await
    }

    pub async fn reject(
        &self,
        id: &str,
        admin: Uuid,
        reason: RejectReason,
        note: Option<&str>,
    ) -> Result<TransactionRecord, EngineError> {
        let mut ctx = TransitionContext::by_admin(admin).with_reason(reason);
        if let Some(note) = note {
            ctx = ctx.with_note(note);
        }
        self.transition(id, TransactionStatus::Rejected, &ctx).await
    }

    pub async fn reopen(&self, id: &str, admin: Uuid) -> Result<TransactionRecord, EngineError> {
        self.transition(id, TransactionStatus::Pending, &TransitionContext::by_admin(admin))
            .await
    }

    pub async fn cancel(&self, id: &str, admin: Uuid) -> Result<TransactionRecord, EngineError> {
        self.transition(
            id,
            TransactionStatus::Cancelled,
            &TransitionContext::by_admin(admin),
        )
        .await
    }

    /// Edits a record still under review. The patch is validated against the
    /// cached copy before the backend is called; the authoritative response
    /// replaces the cache entry.
    pub async fn edit(
        &self,
        id: &str,
        patch: &EditPatch,
    ) -> Result<TransactionRecord, EngineError> {
        let _guard = self.lock_for(id).await;

        let current = self
            .store
            .get(id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        current.apply_edit(patch)?;

        let updated = self.gateway.update_transaction(id, patch).await?;
        let updated = self.normalize(updated);
        self.store.upsert(updated.clone());
        Ok(updated)
    }

    pub async fn bulk_approve(
        &self,
        ids: &[String],
        note: Option<&str>,
    ) -> Result<BulkOutcome, EngineError> {
        self.bulk_transition(ids, TransactionStatus::Completed, None, note)
            .await
    }

    pub async fn bulk_reject(
        &self,
        ids: &[String],
        reason: RejectReason,
        note: Option<&str>,
    ) -> Result<BulkOutcome, EngineError> {
        self.bulk_transition(ids, TransactionStatus::Rejected, Some(reason), note)
            .await
    }

    /// Shared bulk path: each id is vetted against the cached state machine
    /// first, then the survivors go to the backend in one batch. A failure on
    /// one id never aborts the others.
    async fn bulk_transition(
        &self,
        ids: &[String],
        target: TransactionStatus,
        reason: Option<RejectReason>,
        note: Option<&str>,
    ) -> Result<BulkOutcome, EngineError> {
        let mut ids: Vec<String> = ids.to_vec();
        ids.sort();
        ids.dedup();

        // Sorted acquisition keeps concurrent bulk calls deadlock-free.
        let mut guards = Vec::with_capacity(ids.len());
        for id in &ids {
            guards.push(self.lock_for(id).await);
        }

        let mut outcome = BulkOutcome::default();
        let mut eligible = Vec::new();

        for id in &ids {
            match self.store.get(id) {
                None => outcome.failed.push(BulkFailure {
                    id: id.clone(),
                    error: EngineError::NotFound(id.clone()),
                }),
                Some(record) if !record.status.can_transition_to(target) => {
                    outcome.failed.push(BulkFailure {
                        id: id.clone(),
                        error: EngineError::InvalidTransition {
                            from: record.status,
                            to: target,
                        },
                    })
                }
                Some(_) => eligible.push(id.clone()),
            }
        }

        if !eligible.is_empty() {
            let results = match target {
                TransactionStatus::Completed => {
                    self.gateway.bulk_approve(&eligible, note).await?
                }
                TransactionStatus::Rejected => {
                    // Reason presence is validated by the session before any
                    // network call; this guard covers direct callers.
                    let reason = reason.ok_or_else(|| {
                        crate::validation::ValidationError::new(
                            "reason",
                            "required for bulk reject",
                        )
                    })?;
                    self.gateway.bulk_reject(&eligible, reason, note).await?
                }
                _ => {
                    return Err(crate::validation::ValidationError::new(
                        "status",
                        format!("bulk transition to {} is not supported", target),
                    )
                    .into())
                }
            };
            self.absorb_results(results, &mut outcome);
        }

        info!(
            target = %target,
            succeeded = outcome.succeeded.len(),
            failed = outcome.failed.len(),
            "bulk transition finished"
        );
        Ok(outcome)
    }

    /// Applies a shared note to every selected record; Completed and other
    /// settled records fail per-id with EditNotAllowed.
    pub async fn bulk_note(&self, ids: &[String], note: &str) -> Result<BulkOutcome, EngineError> {
        crate::validation::validate_required("note", note)?;
        crate::validation::validate_max_len("note", note, crate::validation::NOTE_MAX_LEN)?;

        let mut ids: Vec<String> = ids.to_vec();
        ids.sort();
        ids.dedup();

        let mut guards = Vec::with_capacity(ids.len());
        for id in &ids {
            guards.push(self.lock_for(id).await);
        }

        let mut outcome = BulkOutcome::default();
        let mut eligible = Vec::new();

        for id in &ids {
            match self.store.get(id) {
                None => outcome.failed.push(BulkFailure {
                    id: id.clone(),
                    error: EngineError::NotFound(id.clone()),
                }),
                Some(record) if !record.status.is_editable() => {
                    outcome.failed.push(BulkFailure {
                        id: id.clone(),
                        error: EngineError::EditNotAllowed {
                            status: record.status,
                        },
                    })
                }
                Some(_) => eligible.push(id.clone()),
            }
        }

        if !eligible.is_empty() {
            let results = self.gateway.bulk_note(&eligible, note).await?;
            self.absorb_results(results, &mut outcome);
        }

        Ok(outcome)
    }

    fn absorb_results(&self, results: Vec<PerIdResult>, outcome: &mut BulkOutcome) {
        for (id, result) in results {
            match result {
                Ok(record) => {
                    self.store.upsert(self.normalize(record));
                    outcome.succeeded.push(id);
                }
                Err(error) => outcome.failed.push(BulkFailure { id, error }),
            }
        }
    }

    /// Materializes the given records. CSV goes through the local exporter
    /// when one is configured; everything else is delegated to the backend.
    pub async fn export(
        &self,
        ids: &[String],
        format: ExportFormat,
    ) -> Result<ExportLocation, EngineError> {
        if format == ExportFormat::Csv {
            if let Some(exporter) = &self.exporter {
                let mut records = Vec::with_capacity(ids.len());
                for id in ids {
                    let record = self
                        .store
                        .get(id)
                        .ok_or_else(|| EngineError::NotFound(id.clone()))?;
                    records.push(record);
                }
                return exporter.export(&records, format).await;
            }
        }
        self.gateway.export_transactions(ids, format).await
    }

    /// Starts a per-record poll loop: refresh the record every
    /// `poll_interval` while it stays PENDING. The loop self-terminates when
    /// the record settles or disappears, and stops promptly when the handle
    /// is cancelled or dropped.
    pub fn watch(&self, id: &str) -> PollHandle {
        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        let controller = self.clone();
        let id = id.to_string();
        let interval = self.poll_interval;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            debug!(id = %id, "poll loop started");

            loop {
                tokio::select! {
                    _ = cancel_rx.changed() => {
                        debug!(id = %id, "poll loop cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        match controller.refresh_one(&id).await {
                            Ok(record) if record.status != TransactionStatus::Pending => {
                                info!(id = %id, status = %record.status, "record settled, poll loop done");
                                break;
                            }
                            Ok(_) => {}
                            Err(EngineError::NotFound(_)) => {
                                info!(id = %id, "record gone upstream, poll loop done");
                                break;
                            }
                            Err(err) => {
                                // Transport hiccups are retryable; keep polling.
                                warn!(id = %id, error = %err, "poll refresh failed");
                            }
                        }
                    }
                }
            }
        });

        PollHandle {
            cancel: cancel_tx,
            task: Some(task),
        }
    }
}
