//! View-layer value objects: filters, sort specs, pages and saved views.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::{Priority, TransactionKind, TransactionStatus};
use crate::validation::{self, ValidationError};

/// Describes one view over the transaction set. Fields compose with logical
/// AND; membership inside a multi-valued field is logical OR; unset fields
/// impose no constraint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryFilter {
    pub statuses: Vec<TransactionStatus>,
    pub kinds: Vec<TransactionKind>,
    pub priorities: Vec<Priority>,
    pub min_amount: Option<BigDecimal>,
    pub max_amount: Option<BigDecimal>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    /// Case-insensitive substring match against id, description and the two
    /// account display names.
    pub search: Option<String>,
    pub user: Option<String>,
    pub account: Option<String>,
}

impl QueryFilter {
    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
            && self.kinds.is_empty()
            && self.priorities.is_empty()
            && self.min_amount.is_none()
            && self.max_amount.is_none()
            && self.date_from.is_none()
            && self.date_to.is_none()
            && self.search.is_none()
            && self.user.is_none()
            && self.account.is_none()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::validate_amount_range(self.min_amount.as_ref(), self.max_amount.as_ref())?;
        validation::validate_date_range(self.date_from.as_ref(), self.date_to.as_ref())?;
        if let Some(search) = &self.search {
            validation::validate_max_len("search", search, validation::SEARCH_MAX_LEN)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    /// Business date (`occurred_at`).
    Date,
    CreatedAt,
    /// Settlement instant; unset while the record is still PENDING.
    ProcessedAt,
    Amount,
    Status,
    UserName,
    Id,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            field: SortField::Date,
            direction: SortDirection::Desc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    /// 1-indexed.
    pub page: usize,
    pub limit: usize,
}

impl PageRequest {
    pub fn new(page: usize, limit: usize) -> Self {
        Self { page, limit }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::validate_page(self.page, self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 1, limit: 10 }
    }
}

/// One page of results; `total` is the filtered, pre-pagination count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub limit: usize,
    pub total: usize,
}

impl<T> Page<T> {
    pub fn empty(page: usize, limit: usize) -> Self {
        Self {
            items: Vec::new(),
            page,
            limit,
            total: 0,
        }
    }

    pub fn page_count(&self) -> usize {
        if self.limit == 0 {
            0
        } else {
            self.total.div_ceil(self.limit)
        }
    }
}

/// A named, persisted filter configuration owned by an administrator.
/// Created on save, deleted explicitly, never auto-expires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedView {
    pub id: Uuid,
    pub owner: Uuid,
    pub name: String,
    pub filter: QueryFilter,
    pub created_at: DateTime<Utc>,
}

impl SavedView {
    pub fn new(owner: Uuid, name: impl Into<String>, filter: QueryFilter) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner,
            name: name.into(),
            filter,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Pdf,
    Excel,
}

impl ExportFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Pdf => "pdf",
            ExportFormat::Excel => "excel",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "pdf" => Ok(ExportFormat::Pdf),
            "excel" | "xlsx" => Ok(ExportFormat::Excel),
            _ => Err(ValidationError::new(
                "format",
                format!("unsupported export format '{}'", s),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_is_empty() {
        assert!(QueryFilter::default().is_empty());

        let filter = QueryFilter {
            statuses: vec![TransactionStatus::Pending],
            ..QueryFilter::default()
        };
        assert!(!filter.is_empty());
    }

    #[test]
    fn filter_validation_rejects_inverted_ranges() {
        let filter = QueryFilter {
            min_amount: Some(BigDecimal::from(100)),
            max_amount: Some(BigDecimal::from(10)),
            ..QueryFilter::default()
        };
        assert!(filter.validate().is_err());

        let now = Utc::now();
        let filter = QueryFilter {
            date_from: Some(now + chrono::Duration::days(1)),
            date_to: Some(now),
            ..QueryFilter::default()
        };
        assert!(filter.validate().is_err());
    }

    #[test]
    fn page_count_rounds_up() {
        let page = Page::<u8> {
            items: Vec::new(),
            page: 1,
            limit: 10,
            total: 41,
        };
        assert_eq!(page.page_count(), 5);
    }

    #[test]
    fn export_format_parses_case_insensitively() {
        assert_eq!("CSV".parse::<ExportFormat>(), Ok(ExportFormat::Csv));
        assert_eq!("pdf".parse::<ExportFormat>(), Ok(ExportFormat::Pdf));
        assert_eq!("xlsx".parse::<ExportFormat>(), Ok(ExportFormat::Excel));
        assert!("doc".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn filter_round_trips_through_json() {
        let filter = QueryFilter {
            statuses: vec![TransactionStatus::Pending, TransactionStatus::Rejected],
            search: Some("acme".into()),
            ..QueryFilter::default()
        };

        let json = serde_json::to_string(&filter).expect("serializable");
        let parsed: QueryFilter = serde_json::from_str(&json).expect("parseable");
        assert_eq!(parsed, filter);
    }
}
