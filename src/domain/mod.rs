pub mod transaction;
pub mod view;

pub use transaction::{
    AccountRef, EditPatch, Priority, RejectReason, TransactionKind, TransactionRecord,
    TransactionStatus, TransitionContext, UserRef, DEFAULT_HIGH_PRIORITY_THRESHOLD,
};
pub use view::{
    ExportFormat, Page, PageRequest, QueryFilter, SavedView, SortDirection, SortField, SortSpec,
};
