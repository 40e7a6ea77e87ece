//! Transaction domain entity and its review-status state machine.
//! Framework-agnostic representation of a money-movement record under review.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::EngineError;
use crate::validation::{self, ValidationError};

/// Default amount above which a record is flagged HIGH priority.
/// Deployments override this through `Config::high_priority_threshold`.
pub const DEFAULT_HIGH_PRIORITY_THRESHOLD: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    Transfer,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionKind::Deposit => "DEPOSIT",
            TransactionKind::Withdrawal => "WITHDRAWAL",
            TransactionKind::Transfer => "TRANSFER",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Rejected,
    Cancelled,
    Failed,
}

impl TransactionStatus {
    /// COMPLETED, CANCELLED and FAILED never leave their state through an
    /// administrator action. REJECTED is deliberately not terminal: it can be
    /// reopened back to PENDING.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TransactionStatus::Completed | TransactionStatus::Cancelled | TransactionStatus::Failed
        )
    }

    /// Amount/location/date/note edits are only permitted in these states.
    pub fn is_editable(self) -> bool {
        matches!(self, TransactionStatus::Pending | TransactionStatus::Rejected)
    }

    /// The legal-transition table. FAILED is reachable from anywhere because
    /// it is reported by the transport layer, not requested by an admin.
    pub fn can_transition_to(self, target: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!(
            (self, target),
            (_, Failed)
                | (Pending, Completed)
                | (Pending, Rejected)
                | (Rejected, Pending)
                | (Pending, Cancelled)
                | (Rejected, Cancelled)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Rejected => "REJECTED",
            TransactionStatus::Cancelled => "CANCELLED",
            TransactionStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    InsufficientFunds,
    SuspiciousActivity,
    InvalidAccountInformation,
    ExceedsTransactionLimit,
    DuplicateTransaction,
    Other,
}

impl RejectReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectReason::InsufficientFunds => "insufficient_funds",
            RejectReason::SuspiciousActivity => "suspicious_activity",
            RejectReason::InvalidAccountInformation => "invalid_account_information",
            RejectReason::ExceedsTransactionLimit => "exceeds_transaction_limit",
            RejectReason::DuplicateTransaction => "duplicate_transaction",
            RejectReason::Other => "other",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RejectReason {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "insufficient_funds" => Ok(RejectReason::InsufficientFunds),
            "suspicious_activity" => Ok(RejectReason::SuspiciousActivity),
            "invalid_account_information" => Ok(RejectReason::InvalidAccountInformation),
            "exceeds_transaction_limit" => Ok(RejectReason::ExceedsTransactionLimit),
            "duplicate_transaction" => Ok(RejectReason::DuplicateTransaction),
            "other" => Ok(RejectReason::Other),
            _ => Err(ValidationError::new(
                "reason",
                format!("unknown reject reason '{}'", s),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    High,
    Normal,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

/// Reference to an external account. Nullable on the record for external
/// counterparties; the display name feeds free-text search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRef {
    pub id: String,
    pub display_name: String,
}

/// The user who initiated the transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    pub id: String,
    pub name: String,
}

/// A money-movement record subject to review. Owned by the backend of
/// record; the engine only holds a write-through cached copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub id: String,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub amount: BigDecimal,
    pub currency: String,
    pub from_account: Option<AccountRef>,
    pub to_account: Option<AccountRef>,
    pub user: UserRef,
    pub created_at: DateTime<Utc>,
    /// Business date. May be edited by an administrator before settlement.
    pub occurred_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub admin_note: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub reject_reason: Option<RejectReason>,
    /// Balance reported by the ledger collaborator alongside an approval.
    /// Never computed locally; republished as received.
    #[serde(default)]
    pub balance_after: Option<BigDecimal>,
}

/// Carried with every administrator-driven transition, for audit and for the
/// collaborator-supplied side data (reject reason, note, post-approval balance).
#[derive(Debug, Clone, Default)]
pub struct TransitionContext {
    /// None for system-originated transitions (FAILED reports).
    pub admin: Option<Uuid>,
    pub reason: Option<RejectReason>,
    pub note: Option<String>,
    pub balance_after: Option<BigDecimal>,
}

impl TransitionContext {
    pub fn by_admin(admin: Uuid) -> Self {
        Self {
            admin: Some(admin),
            ..Self::default()
        }
    }

    pub fn with_reason(mut self, reason: RejectReason) -> Self {
        self.reason = Some(reason);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_balance_after(mut self, balance: BigDecimal) -> Self {
        self.balance_after = Some(balance);
        self
    }
}

/// Administrator edit of a record still under review. Touches only the
/// fields the console allows pre-settlement; never the status.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditPatch {
    #[serde(default)]
    pub amount: Option<BigDecimal>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub admin_note: Option<String>,
}

impl EditPatch {
    pub fn is_empty(&self) -> bool {
        self.amount.is_none()
            && self.location.is_none()
            && self.occurred_at.is_none()
            && self.admin_note.is_none()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(amount) = &self.amount {
            validation::validate_positive_amount(amount)?;
        }
        if let Some(location) = &self.location {
            validation::validate_max_len("location", location, validation::LOCATION_MAX_LEN)?;
        }
        if let Some(note) = &self.admin_note {
            validation::validate_max_len("admin_note", note, validation::NOTE_MAX_LEN)?;
        }
        Ok(())
    }
}

impl TransactionRecord {
    pub fn new(
        id: impl Into<String>,
        kind: TransactionKind,
        amount: BigDecimal,
        currency: impl Into<String>,
        user: UserRef,
    ) -> Self {
        let now = Utc::now();
        let mut record = Self {
            id: id.into(),
            kind,
            status: TransactionStatus::Pending,
            amount,
            currency: currency.into(),
            from_account: None,
            to_account: None,
            user,
            created_at: now,
            occurred_at: now,
            updated_at: now,
            processed_at: None,
            description: None,
            admin_note: None,
            location: None,
            priority: Priority::Normal,
            reject_reason: None,
            balance_after: None,
        };
        record.priority =
            record.derived_priority(&BigDecimal::from(DEFAULT_HIGH_PRIORITY_THRESHOLD));
        record
    }

    /// HIGH when the amount exceeds the configured threshold.
    pub fn derived_priority(&self, threshold: &BigDecimal) -> Priority {
        if self.amount > *threshold {
            Priority::High
        } else {
            Priority::Normal
        }
    }

    /// Validates the requested status change against the transition table and
    /// returns the mutated copy. The original is left untouched so the caller
    /// can swap the cached record atomically on success.
    pub fn apply_transition(
        &self,
        target: TransactionStatus,
        ctx: &TransitionContext,
    ) -> Result<TransactionRecord, EngineError> {
        if !self.status.can_transition_to(target) {
            return Err(EngineError::InvalidTransition {
                from: self.status,
                to: target,
            });
        }

        if target == TransactionStatus::Rejected && ctx.reason.is_none() {
            return Err(ValidationError::new("reason", "required when rejecting").into());
        }

        let now = Utc::now();
        let mut next = self.clone();
        next.status = target;

        match target {
            TransactionStatus::Completed => {
                next.processed_at = Some(now);
                next.balance_after = ctx.balance_after.clone();
            }
            TransactionStatus::Rejected => {
                next.reject_reason = ctx.reason;
            }
            // Reopening clears the previous rejection reason.
            TransactionStatus::Pending => {
                next.reject_reason = None;
            }
            TransactionStatus::Cancelled | TransactionStatus::Failed => {}
        }

        if let Some(note) = &ctx.note {
            next.admin_note = Some(note.clone());
        }

        next.updated_at = now;
        Ok(next)
    }

    /// Applies an administrator edit. Refused outright on settled records;
    /// validation runs before anything is touched, so a failed edit never
    /// partially applies.
    pub fn apply_edit(&self, patch: &EditPatch) -> Result<TransactionRecord, EngineError> {
        if !self.status.is_editable() {
            return Err(EngineError::EditNotAllowed {
                status: self.status,
            });
        }

        patch.validate()?;

        let mut next = self.clone();
        if let Some(amount) = &patch.amount {
            next.amount = amount.clone();
        }
        if let Some(location) = &patch.location {
            next.location = Some(validation::sanitize_string(location));
        }
        if let Some(occurred_at) = patch.occurred_at {
            next.occurred_at = occurred_at;
        }
        if let Some(note) = &patch.admin_note {
            next.admin_note = Some(note.clone());
        }
        next.updated_at = Utc::now();
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn record(id: &str, status: TransactionStatus) -> TransactionRecord {
        let mut r = TransactionRecord::new(
            id,
            TransactionKind::Transfer,
            BigDecimal::from(100),
            "USD",
            UserRef {
                id: "u-1".into(),
                name: "Ada Lovelace".into(),
            },
        );
        r.status = status;
        r
    }

    fn edge_is_legal(from: TransactionStatus, to: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!(
            (from, to),
            (_, Failed)
                | (Pending, Completed)
                | (Pending, Rejected)
                | (Rejected, Pending)
                | (Pending, Cancelled)
                | (Rejected, Cancelled)
        )
    }

    #[test]
    fn transition_table_is_exhaustive() {
        use TransactionStatus::*;
        let all = [Pending, Completed, Rejected, Cancelled, Failed];
        let ctx = TransitionContext::by_admin(Uuid::new_v4())
            .with_reason(RejectReason::Other);

        for from in all {
            for to in all {
                let rec = record("T0", from);
                let result = rec.apply_transition(to, &ctx);
                if edge_is_legal(from, to) {
                    assert!(result.is_ok(), "{from} -> {to} should be legal");
                } else {
                    assert!(
                        matches!(result, Err(EngineError::InvalidTransition { .. })),
                        "{from} -> {to} should be rejected"
                    );
                    // The source record must be unchanged on failure.
                    assert_eq!(rec.status, from);
                }
            }
        }
    }

    #[test]
    fn approve_sets_processed_at_and_republishes_balance() {
        let rec = record("T1", TransactionStatus::Pending);
        let ctx = TransitionContext::by_admin(Uuid::new_v4())
            .with_balance_after(BigDecimal::from_str("4200.50").expect("valid decimal"));

        let approved = rec
            .apply_transition(TransactionStatus::Completed, &ctx)
            .expect("legal transition");

        assert_eq!(approved.status, TransactionStatus::Completed);
        assert!(approved.processed_at.is_some());
        assert_eq!(
            approved.balance_after,
            Some(BigDecimal::from_str("4200.50").expect("valid decimal"))
        );
        assert!(approved.updated_at >= approved.created_at);
    }

    #[test]
    fn reject_requires_reason() {
        let rec = record("T1", TransactionStatus::Pending);
        let ctx = TransitionContext::by_admin(Uuid::new_v4());

        let result = rec.apply_transition(TransactionStatus::Rejected, &ctx);
        assert!(matches!(result, Err(EngineError::Validation(_))));
    }

    #[test]
    fn reject_records_reason_and_note() {
        let rec = record("T1", TransactionStatus::Pending);
        let ctx = TransitionContext::by_admin(Uuid::new_v4())
            .with_reason(RejectReason::SuspiciousActivity)
            .with_note("flagged by fraud desk");

        let rejected = rec
            .apply_transition(TransactionStatus::Rejected, &ctx)
            .expect("legal transition");

        assert_eq!(rejected.status, TransactionStatus::Rejected);
        assert_eq!(
            rejected.reject_reason,
            Some(RejectReason::SuspiciousActivity)
        );
        assert_eq!(rejected.admin_note.as_deref(), Some("flagged by fraud desk"));
    }

    #[test]
    fn reopen_clears_rejection_reason() {
        let mut rec = record("T1", TransactionStatus::Rejected);
        rec.reject_reason = Some(RejectReason::DuplicateTransaction);

        let reopened = rec
            .apply_transition(
                TransactionStatus::Pending,
                &TransitionContext::by_admin(Uuid::new_v4()),
            )
            .expect("rejected records can be reopened");

        assert_eq!(reopened.status, TransactionStatus::Pending);
        assert!(reopened.reject_reason.is_none());
    }

    #[test]
    fn failed_is_accepted_from_any_state_without_context() {
        for status in [
            TransactionStatus::Pending,
            TransactionStatus::Completed,
            TransactionStatus::Rejected,
            TransactionStatus::Cancelled,
        ] {
            let rec = record("T1", status);
            let failed = rec
                .apply_transition(TransactionStatus::Failed, &TransitionContext::default())
                .expect("FAILED is system-reported and always accepted");
            assert_eq!(failed.status, TransactionStatus::Failed);
        }
    }

    #[test]
    fn edit_allowed_only_while_editable() {
        let patch = EditPatch {
            amount: Some(BigDecimal::from(50)),
            ..EditPatch::default()
        };

        assert!(record("T1", TransactionStatus::Pending)
            .apply_edit(&patch)
            .is_ok());
        assert!(record("T1", TransactionStatus::Rejected)
            .apply_edit(&patch)
            .is_ok());

        for status in [
            TransactionStatus::Completed,
            TransactionStatus::Cancelled,
            TransactionStatus::Failed,
        ] {
            let result = record("T1", status).apply_edit(&patch);
            assert!(
                matches!(result, Err(EngineError::EditNotAllowed { .. })),
                "edit on {status} must be refused"
            );
        }
    }

    #[test]
    fn edit_rejects_non_positive_amount_before_applying() {
        let rec = record("T1", TransactionStatus::Pending);
        let patch = EditPatch {
            amount: Some(BigDecimal::from(0)),
            location: Some("Lagos".into()),
            ..EditPatch::default()
        };

        let result = rec.apply_edit(&patch);
        assert!(matches!(result, Err(EngineError::Validation(_))));
        // Nothing may have been applied.
        assert!(rec.location.is_none());
    }

    #[test]
    fn edit_does_not_change_status() {
        let rec = record("T1", TransactionStatus::Pending);
        let edited = rec
            .apply_edit(&EditPatch {
                location: Some("  Berlin \t HQ ".into()),
                ..EditPatch::default()
            })
            .expect("edit on pending record");

        assert_eq!(edited.status, TransactionStatus::Pending);
        assert_eq!(edited.location.as_deref(), Some("Berlin HQ"));
    }

    #[test]
    fn approve_then_edit_fails_scenario() {
        // Record {id:"T1", status:PENDING, amount:100} is approved, then an
        // amount edit must fail with EditNotAllowed.
        let rec = record("T1", TransactionStatus::Pending);
        let before = rec.updated_at;

        let approved = rec
            .apply_transition(
                TransactionStatus::Completed,
                &TransitionContext::by_admin(Uuid::new_v4()),
            )
            .expect("approve pending record");

        assert_eq!(approved.status, TransactionStatus::Completed);
        assert!(approved.updated_at >= before);

        let result = approved.apply_edit(&EditPatch {
            amount: Some(BigDecimal::from(50)),
            ..EditPatch::default()
        });
        assert!(matches!(result, Err(EngineError::EditNotAllowed { .. })));
    }

    #[test]
    fn priority_derived_from_threshold() {
        let threshold = BigDecimal::from(1000);
        let mut rec = record("T1", TransactionStatus::Pending);

        rec.amount = BigDecimal::from(1001);
        assert_eq!(rec.derived_priority(&threshold), Priority::High);

        rec.amount = BigDecimal::from(1000);
        assert_eq!(rec.derived_priority(&threshold), Priority::Normal);
    }

    #[test]
    fn reject_reason_round_trips_wire_strings() {
        for reason in [
            RejectReason::InsufficientFunds,
            RejectReason::SuspiciousActivity,
            RejectReason::InvalidAccountInformation,
            RejectReason::ExceedsTransactionLimit,
            RejectReason::DuplicateTransaction,
            RejectReason::Other,
        ] {
            assert_eq!(RejectReason::from_str(reason.as_str()), Ok(reason));
        }
        assert!(RejectReason::from_str("no_reason").is_err());
    }

    #[test]
    fn record_serializes_with_wire_field_names() {
        let rec = record("T1", TransactionStatus::Pending);
        let json = serde_json::to_value(&rec).expect("serializable");

        assert_eq!(json["id"], "T1");
        assert_eq!(json["status"], "PENDING");
        assert_eq!(json["kind"], "TRANSFER");
        assert!(json.get("createdAt").is_some());
        assert!(json.get("occurredAt").is_some());
    }
}
