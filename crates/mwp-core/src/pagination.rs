//! Pagination and sort types for list queries

use serde::{Deserialize, Serialize};

/// Default page size when a caller does not ask for one
pub const DEFAULT_LIMIT: i64 = 20;

/// Upper bound on a single page
pub const MAX_LIMIT: i64 = 1000;

/// Pagination parameters for queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: i64,
    pub offset: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl Pagination {
    pub fn new(limit: i64, offset: i64) -> Self {
        Self {
            limit: limit.clamp(1, MAX_LIMIT),
            offset: offset.max(0),
        }
    }

    /// 1-indexed page
    pub fn page(page: i64, per_page: i64) -> Self {
        let per_page = per_page.clamp(1, MAX_LIMIT);
        Self {
            limit: per_page,
            offset: (page.max(1) - 1) * per_page,
        }
    }

    /// The largest page a single query may ask for
    pub fn largest() -> Self {
        Self {
            limit: MAX_LIMIT,
            offset: 0,
        }
    }
}

/// Query result with pagination metadata
#[derive(Debug, Clone, Serialize)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

impl<T> PaginatedResult<T> {
    pub fn new(items: Vec<T>, total: i64, pagination: Pagination) -> Self {
        Self {
            items,
            total,
            limit: pagination.limit,
            offset: pagination.offset,
        }
    }

    pub fn page(&self) -> i64 {
        if self.limit == 0 {
            1
        } else {
            (self.offset / self.limit) + 1
        }
    }

    pub fn total_pages(&self) -> i64 {
        if self.limit == 0 {
            1
        } else {
            (self.total + self.limit - 1) / self.limit
        }
    }

    pub fn has_next(&self) -> bool {
        self.offset + self.limit < self.total
    }

    pub fn has_prev(&self) -> bool {
        self.offset > 0
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PaginatedResult<U> {
        PaginatedResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            limit: self.limit,
            offset: self.offset,
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    /// Apply this direction to an ascending comparison
    pub fn apply(&self, ordering: std::cmp::Ordering) -> std::cmp::Ordering {
        match self {
            Self::Asc => ordering,
            Self::Desc => ordering.reverse(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    #[test]
    fn test_limits_are_clamped() {
        assert_eq!(Pagination::new(0, -3), Pagination { limit: 1, offset: 0 });
        assert_eq!(Pagination::new(5000, 40).limit, MAX_LIMIT);
        assert_eq!(Pagination::default().limit, DEFAULT_LIMIT);
    }

    #[test]
    fn test_page_to_offset() {
        assert_eq!(Pagination::page(4, 25), Pagination { limit: 25, offset: 75 });
        assert_eq!(Pagination::page(-1, 25).offset, 0);
    }

    #[test]
    fn test_last_page_metadata() {
        let plans = vec!["JANUARY WEEK_1", "JANUARY WEEK_2"];
        let last = PaginatedResult::new(plans, 12, Pagination::page(3, 5));

        assert_eq!(last.page(), 3);
        assert_eq!(last.total_pages(), 3);
        assert!(!last.has_next());
        assert!(last.has_prev());

        let lengths = last.map(str::len);
        assert_eq!(lengths.items, vec![14, 14]);
        assert_eq!(lengths.total, 12);
    }

    #[test]
    fn test_direction_reverses_comparison() {
        assert_eq!(SortDirection::Asc.apply(Ordering::Greater), Ordering::Greater);
        assert_eq!(SortDirection::Desc.apply(Ordering::Greater), Ordering::Less);
        assert_eq!(SortDirection::default().as_sql(), "ASC");
    }
}
