//! Review workflow engine for a money-transfer admin console: the transaction
//! status machine, a pure filter/sort/paginate query engine, multi-record
//! review sessions with bulk actions, and the sync/polling controller that
//! keeps the local cache consistent with the authoritative backend.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod ports;
pub mod query;
pub mod session;
pub mod sync;
pub mod validation;

pub use config::Config;
pub use domain::{
    AccountRef, EditPatch, ExportFormat, Page, PageRequest, Priority, QueryFilter, RejectReason,
    SavedView, SortDirection, SortField, SortSpec, TransactionKind, TransactionRecord,
    TransactionStatus, TransitionContext, UserRef,
};
pub use error::{EngineError, TransportError};
pub use ports::{
    ExportLocation, Exporter, SavedViewStore, TransactionGateway, TransactionQuery,
};
pub use query::query;
pub use session::{BulkAction, BulkFailure, BulkOutcome, ReviewSession};
pub use sync::{PollHandle, SyncController, TransactionStore, DEFAULT_POLL_INTERVAL};

/// Env-filtered tracing setup for binaries and tests. Safe to call more than
/// once; later calls are no-ops.
pub fn init_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
