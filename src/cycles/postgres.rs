//! PostgreSQL implementation of [`CycleStatsReader`].

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rocket_db_pools::sqlx::{self, FromRow, PgPool};
use uuid::Uuid;

use crate::cycles::{CycleOrdering, CycleStatsReader, CycleStatsResult};
use crate::models::{CycleIssueStats, CycleStats, ProjectLite, UserLite, WorkspaceLite};

// The per-cycle LATERAL subquery aggregates exactly one row per cycle, so the
// outer joins cannot multiply cycle rows. Every aggregate shares the
// archived/draft exclusion in the subquery's WHERE clause.
const LIST_CYCLE_STATS_SQL: &str = r#"
    SELECT
        c.id,
        c.name,
        c.description,
        c.start_date,
        c.end_date,
        c.sort_order,
        c.owned_by_id,
        c.project_id,
        c.workspace_id,
        c.created_at,
        c.updated_at,
        c.archived_at,
        u.display_name AS owner_display_name,
        u.avatar AS owner_avatar,
        p.name AS project_name,
        p.identifier AS project_identifier,
        w.slug AS workspace_slug,
        w.name AS workspace_name,
        agg.total_issues,
        agg.completed_issues,
        agg.cancelled_issues,
        agg.started_issues,
        agg.unstarted_issues,
        agg.backlog_issues,
        agg.total_estimates,
        agg.completed_estimates,
        agg.started_estimates
    FROM cycles c
    JOIN workspaces w ON w.id = c.workspace_id
    JOIN projects p ON p.id = c.project_id
    JOIN users u ON u.id = c.owned_by_id
    CROSS JOIN LATERAL (
        SELECT
            COUNT(i.id) AS total_issues,
            COUNT(i.id) FILTER (WHERE s.state_group = 'completed') AS completed_issues,
            COUNT(i.id) FILTER (WHERE s.state_group = 'cancelled') AS cancelled_issues,
            COUNT(i.id) FILTER (WHERE s.state_group = 'started') AS started_issues,
            COUNT(i.id) FILTER (WHERE s.state_group = 'unstarted') AS unstarted_issues,
            COUNT(i.id) FILTER (WHERE s.state_group = 'backlog') AS backlog_issues,
            SUM(i.estimate_point) AS total_estimates,
            SUM(i.estimate_point) FILTER (WHERE s.state_group = 'completed') AS completed_estimates,
            SUM(i.estimate_point) FILTER (WHERE s.state_group = 'started') AS started_estimates
        FROM cycle_issues ci
        JOIN issues i ON i.id = ci.issue_id
        LEFT JOIN states s ON s.id = i.state_id
        WHERE ci.cycle_id = c.id
          AND i.archived_at IS NULL
          AND i.is_draft = FALSE
    ) agg
    WHERE w.slug = $1
      AND c.archived_at IS NULL
"#;

#[derive(Debug, FromRow)]
struct CycleStatsRecord {
    id: Uuid,
    name: String,
    description: String,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    sort_order: f64,
    owned_by_id: Uuid,
    project_id: Uuid,
    workspace_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    archived_at: Option<DateTime<Utc>>,
    owner_display_name: String,
    owner_avatar: Option<String>,
    project_name: String,
    project_identifier: String,
    workspace_slug: String,
    workspace_name: String,
    total_issues: i64,
    completed_issues: i64,
    cancelled_issues: i64,
    started_issues: i64,
    unstarted_issues: i64,
    backlog_issues: i64,
    total_estimates: Option<i64>,
    completed_estimates: Option<i64>,
    started_estimates: Option<i64>,
}

impl From<CycleStatsRecord> for CycleStats {
    fn from(record: CycleStatsRecord) -> Self {
        CycleStats {
            id: record.id,
            name: record.name,
            description: record.description,
            start_date: record.start_date,
            end_date: record.end_date,
            sort_order: record.sort_order,
            owned_by_id: record.owned_by_id,
            owned_by: UserLite {
                id: record.owned_by_id,
                display_name: record.owner_display_name,
                avatar: record.owner_avatar,
            },
            project: record.project_id,
            project_detail: ProjectLite {
                id: record.project_id,
                name: record.project_name,
                identifier: record.project_identifier,
            },
            workspace: record.workspace_id,
            workspace_detail: WorkspaceLite {
                id: record.workspace_id,
                slug: record.workspace_slug,
                name: record.workspace_name,
            },
            created_at: record.created_at,
            updated_at: record.updated_at,
            archived_at: record.archived_at,
            stats: CycleIssueStats {
                total_issues: record.total_issues,
                completed_issues: record.completed_issues,
                cancelled_issues: record.cancelled_issues,
                started_issues: record.started_issues,
                unstarted_issues: record.unstarted_issues,
                backlog_issues: record.backlog_issues,
                total_estimates: record.total_estimates,
                completed_estimates: record.completed_estimates,
                started_estimates: record.started_estimates,
            },
        }
    }
}

/// Build the full listing query for `ordering`.
///
/// Only whitelisted column expressions are interpolated; the slug is bound.
pub fn list_cycle_stats_query(ordering: &CycleOrdering) -> String {
    format!("{LIST_CYCLE_STATS_SQL}    ORDER BY {}\n", ordering.sql_clause())
}

/// Reads cycle statistics from the shared connection pool.
#[derive(Clone)]
pub struct PgCycleStatsReader {
    pool: PgPool,
}

impl PgCycleStatsReader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CycleStatsReader for PgCycleStatsReader {
    async fn list_cycle_stats(
        &self,
        workspace_slug: &str,
        ordering: CycleOrdering,
    ) -> CycleStatsResult<Vec<CycleStats>> {
        let query = list_cycle_stats_query(&ordering);

        let records = sqlx::query_as::<_, CycleStatsRecord>(&query)
            .bind(workspace_slug)
            .fetch_all(&self.pool)
            .await?;

        log::debug!(
            "loaded {} cycles for workspace '{}' ordered by {}",
            records.len(),
            workspace_slug,
            ordering
        );

        Ok(records.into_iter().map(CycleStats::from).collect())
    }
}
