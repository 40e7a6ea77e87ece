//! Pure filter/sort/paginate over an in-memory transaction set.
//!
//! `query` is deterministic and side-effect free: identical inputs always
//! produce an identical page, so it can be unit-tested without any backend.

use std::cmp::Ordering;

use crate::domain::{
    Page, QueryFilter, SortDirection, SortField, SortSpec, TransactionRecord,
};

pub fn query(
    records: &[TransactionRecord],
    filter: &QueryFilter,
    sort: &SortSpec,
    page: usize,
    limit: usize,
) -> Page<TransactionRecord> {
    let mut matched: Vec<&TransactionRecord> = records
        .iter()
        .filter(|record| matches_filter(record, filter))
        .collect();

    matched.sort_by(|a, b| compare_records(a, b, sort));

    let total = matched.len();
    let page = page.max(1);
    let limit = limit.max(1);
    let start = (page - 1).saturating_mul(limit);

    let items = matched
        .into_iter()
        .skip(start)
        .take(limit)
        .cloned()
        .collect();

    Page {
        items,
        page,
        limit,
        total,
    }
}

pub fn matches_filter(record: &TransactionRecord, filter: &QueryFilter) -> bool {
    if !filter.statuses.is_empty() && !filter.statuses.contains(&record.status) {
        return false;
    }

    if !filter.kinds.is_empty() && !filter.kinds.contains(&record.kind) {
        return false;
    }

    if !filter.priorities.is_empty() && !filter.priorities.contains(&record.priority) {
        return false;
    }

    if let Some(min) = &filter.min_amount {
        if record.amount < *min {
            return false;
        }
    }

    if let Some(max) = &filter.max_amount {
        if record.amount > *max {
            return false;
        }
    }

    if let Some(from) = &filter.date_from {
        if record.occurred_at < *from {
            return false;
        }
    }

    if let Some(to) = &filter.date_to {
        if record.occurred_at > *to {
            return false;
        }
    }

    if let Some(user) = &filter.user {
        if record.user.id != *user {
            return false;
        }
    }

    if let Some(account) = &filter.account {
        let from_matches = record
            .from_account
            .as_ref()
            .is_some_and(|a| a.id == *account);
        let to_matches = record.to_account.as_ref().is_some_and(|a| a.id == *account);
        if !from_matches && !to_matches {
            return false;
        }
    }

    if let Some(search) = &filter.search {
        if !matches_search(record, search) {
            return false;
        }
    }

    true
}

/// Case-insensitive substring match, OR across id, description and the two
/// account display names.
fn matches_search(record: &TransactionRecord, search: &str) -> bool {
    let needle = search.to_lowercase();
    if needle.is_empty() {
        return true;
    }

    let mut haystacks = vec![record.id.to_lowercase()];
    if let Some(description) = &record.description {
        haystacks.push(description.to_lowercase());
    }
    if let Some(account) = &record.from_account {
        haystacks.push(account.display_name.to_lowercase());
    }
    if let Some(account) = &record.to_account {
        haystacks.push(account.display_name.to_lowercase());
    }

    haystacks.iter().any(|hay| hay.contains(&needle))
}

fn compare_records(a: &TransactionRecord, b: &TransactionRecord, sort: &SortSpec) -> Ordering {
    let direction = sort.direction;
    match sort.field {
        SortField::Date => ordered(Some(&a.occurred_at), Some(&b.occurred_at), direction),
        SortField::CreatedAt => ordered(Some(&a.created_at), Some(&b.created_at), direction),
        SortField::ProcessedAt => {
            ordered(a.processed_at.as_ref(), b.processed_at.as_ref(), direction)
        }
        SortField::Amount => ordered(Some(&a.amount), Some(&b.amount), direction),
        SortField::Status => ordered(Some(a.status.as_str()), Some(b.status.as_str()), direction),
        SortField::UserName => ordered(
            Some(a.user.name.as_str()),
            Some(b.user.name.as_str()),
            direction,
        ),
        SortField::Id => ordered(Some(a.id.as_str()), Some(b.id.as_str()), direction),
    }
}

/// Null sort keys go last regardless of direction; the direction only flips
/// the ordering of present values. This mirrors the "pending record has no
/// processing time" case and must not be left to default Option ordering.
fn ordered<T: Ord + ?Sized>(
    a: Option<&T>,
    b: Option<&T>,
    direction: SortDirection,
) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => match direction {
            SortDirection::Asc => a.cmp(b),
            SortDirection::Desc => b.cmp(a),
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
