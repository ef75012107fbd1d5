//! Parsing for the `order_by` token accepted by the cycle listing.
//!
//! The token is a field name optionally prefixed with `-` for descending
//! order (`name`, `-created_at`). Only fields the listing can actually sort
//! on are accepted; anything else is rejected before a query is built.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::cycles::CycleStatsError;
use crate::models::CycleStats;

pub const DEFAULT_ORDER_BY: &str = "-created_at";

/// Sort direction for list endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Sort ascending.
    Asc,
    /// Sort descending.
    Desc,
}

impl SortOrder {
    /// Render the sort order as a SQL keyword.
    pub fn sql_keyword(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Fields a cycle listing can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleSortField {
    Id,
    Name,
    CreatedAt,
    UpdatedAt,
    StartDate,
    EndDate,
    SortOrder,
    TotalIssues,
    CompletedIssues,
    CancelledIssues,
    StartedIssues,
    UnstartedIssues,
    BacklogIssues,
    TotalEstimates,
    CompletedEstimates,
    StartedEstimates,
}

impl CycleSortField {
    const ALL: [CycleSortField; 16] = [
        CycleSortField::Id,
        CycleSortField::Name,
        CycleSortField::CreatedAt,
        CycleSortField::UpdatedAt,
        CycleSortField::StartDate,
        CycleSortField::EndDate,
        CycleSortField::SortOrder,
        CycleSortField::TotalIssues,
        CycleSortField::CompletedIssues,
        CycleSortField::CancelledIssues,
        CycleSortField::StartedIssues,
        CycleSortField::UnstartedIssues,
        CycleSortField::BacklogIssues,
        CycleSortField::TotalEstimates,
        CycleSortField::CompletedEstimates,
        CycleSortField::StartedEstimates,
    ];

    /// Token used in `order_by`.
    pub fn as_str(self) -> &'static str {
        match self {
            CycleSortField::Id => "id",
            CycleSortField::Name => "name",
            CycleSortField::CreatedAt => "created_at",
            CycleSortField::UpdatedAt => "updated_at",
            CycleSortField::StartDate => "start_date",
            CycleSortField::EndDate => "end_date",
            CycleSortField::SortOrder => "sort_order",
            CycleSortField::TotalIssues => "total_issues",
            CycleSortField::CompletedIssues => "completed_issues",
            CycleSortField::CancelledIssues => "cancelled_issues",
            CycleSortField::StartedIssues => "started_issues",
            CycleSortField::UnstartedIssues => "unstarted_issues",
            CycleSortField::BacklogIssues => "backlog_issues",
            CycleSortField::TotalEstimates => "total_estimates",
            CycleSortField::CompletedEstimates => "completed_estimates",
            CycleSortField::StartedEstimates => "started_estimates",
        }
    }

    /// Expression used in the `ORDER BY` clause of the listing query.
    pub fn sql_column(self) -> &'static str {
        match self {
            CycleSortField::Id => "c.id",
            // Byte-wise, matching `String` ordering whatever the database locale.
            CycleSortField::Name => "c.name COLLATE \"C\"",
            CycleSortField::CreatedAt => "c.created_at",
            CycleSortField::UpdatedAt => "c.updated_at",
            CycleSortField::StartDate => "c.start_date",
            CycleSortField::EndDate => "c.end_date",
            CycleSortField::SortOrder => "c.sort_order",
            // Aggregates are ordered by their output column name.
            other => other.as_str(),
        }
    }

    /// Ascending comparison with PostgreSQL null placement (nulls sort high).
    pub fn compare(self, a: &CycleStats, b: &CycleStats) -> Ordering {
        match self {
            CycleSortField::Id => a.id.cmp(&b.id),
            CycleSortField::Name => a.name.cmp(&b.name),
            CycleSortField::CreatedAt => a.created_at.cmp(&b.created_at),
            CycleSortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            CycleSortField::StartDate => nulls_last(&a.start_date, &b.start_date),
            CycleSortField::EndDate => nulls_last(&a.end_date, &b.end_date),
            CycleSortField::SortOrder => a.sort_order.total_cmp(&b.sort_order),
            CycleSortField::TotalIssues => a.stats.total_issues.cmp(&b.stats.total_issues),
            CycleSortField::CompletedIssues => {
                a.stats.completed_issues.cmp(&b.stats.completed_issues)
            }
            CycleSortField::CancelledIssues => {
                a.stats.cancelled_issues.cmp(&b.stats.cancelled_issues)
            }
            CycleSortField::StartedIssues => a.stats.started_issues.cmp(&b.stats.started_issues),
            CycleSortField::UnstartedIssues => {
                a.stats.unstarted_issues.cmp(&b.stats.unstarted_issues)
            }
            CycleSortField::BacklogIssues => a.stats.backlog_issues.cmp(&b.stats.backlog_issues),
            CycleSortField::TotalEstimates => {
                nulls_last(&a.stats.total_estimates, &b.stats.total_estimates)
            }
            CycleSortField::CompletedEstimates => {
                nulls_last(&a.stats.completed_estimates, &b.stats.completed_estimates)
            }
            CycleSortField::StartedEstimates => {
                nulls_last(&a.stats.started_estimates, &b.stats.started_estimates)
            }
        }
    }
}

fn nulls_last<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Parsed `order_by` token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleOrdering {
    pub field: CycleSortField,
    pub direction: SortOrder,
}

impl Default for CycleOrdering {
    fn default() -> Self {
        Self {
            field: CycleSortField::CreatedAt,
            direction: SortOrder::Desc,
        }
    }
}

impl CycleOrdering {
    /// Parse an optional token, falling back to newest-first.
    pub fn parse_or_default(token: Option<&str>) -> Result<Self, CycleStatsError> {
        match token.map(str::trim).filter(|value| !value.is_empty()) {
            Some(value) => value.parse(),
            None => Ok(Self::default()),
        }
    }

    /// `ORDER BY` clause body, e.g. `c.created_at DESC`.
    pub fn sql_clause(&self) -> String {
        format!(
            "{} {}",
            self.field.sql_column(),
            self.direction.sql_keyword()
        )
    }

    /// Comparator honouring the direction; descending is the exact reverse of
    /// ascending so nulls come first, as in PostgreSQL.
    pub fn compare(&self, a: &CycleStats, b: &CycleStats) -> Ordering {
        let ordering = self.field.compare(a, b);
        match self.direction {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }

    /// Stable in-place sort of listing rows.
    pub fn sort(&self, rows: &mut [CycleStats]) {
        rows.sort_by(|a, b| self.compare(a, b));
    }
}

impl FromStr for CycleOrdering {
    type Err = CycleStatsError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let (direction, name) = match token.strip_prefix('-') {
            Some(rest) => (SortOrder::Desc, rest),
            None => (SortOrder::Asc, token),
        };

        let field = CycleSortField::ALL
            .into_iter()
            .find(|field| field.as_str() == name)
            .ok_or_else(|| CycleStatsError::InvalidOrdering(token.to_string()))?;

        Ok(Self { field, direction })
    }
}

impl fmt::Display for CycleOrdering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.direction == SortOrder::Desc {
            f.write_str("-")?;
        }
        f.write_str(self.field.as_str())
    }
}
