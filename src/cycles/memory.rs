//! In-memory implementation of [`CycleStatsReader`].
//!
//! Holds a fixture of workspaces, users, projects, states, issues, cycles and
//! cycle/issue links, and computes the listing with a single pass over each
//! cycle's linked issues. Route tests use it to exercise the HTTP surface
//! without a database.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::cycles::{CycleOrdering, CycleStatsReader, CycleStatsResult};
use crate::models::{
    CycleIssueStats, CycleStats, ProjectLite, StateGroup, UserLite, WorkspaceLite,
};

#[derive(Debug, Clone)]
pub struct StateRecord {
    pub id: Uuid,
    pub name: String,
    pub group: StateGroup,
}

#[derive(Debug, Clone)]
pub struct IssueRecord {
    pub id: Uuid,
    pub state_id: Option<Uuid>,
    pub estimate_point: Option<i32>,
    pub is_draft: bool,
    pub archived_at: Option<DateTime<Utc>>,
}

impl IssueRecord {
    /// Archived and draft issues are excluded from every aggregate.
    pub fn is_countable(&self) -> bool {
        self.archived_at.is_none() && !self.is_draft
    }
}

#[derive(Debug, Clone)]
pub struct CycleRecord {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub project_id: Uuid,
    pub owned_by_id: Uuid,
    pub name: String,
    pub description: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub sort_order: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub archived_at: Option<DateTime<Utc>>,
}

/// Immutable fixture answering cycle statistics queries.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCycleStore {
    workspaces: HashMap<Uuid, WorkspaceLite>,
    users: HashMap<Uuid, UserLite>,
    projects: HashMap<Uuid, ProjectLite>,
    states: HashMap<Uuid, StateRecord>,
    issues: HashMap<Uuid, IssueRecord>,
    cycles: Vec<CycleRecord>,
    links: Vec<(Uuid, Uuid)>,
}

impl InMemoryCycleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workspace(mut self, workspace: WorkspaceLite) -> Self {
        self.workspaces.insert(workspace.id, workspace);
        self
    }

    pub fn with_user(mut self, user: UserLite) -> Self {
        self.users.insert(user.id, user);
        self
    }

    pub fn with_project(mut self, project: ProjectLite) -> Self {
        self.projects.insert(project.id, project);
        self
    }

    pub fn with_state(mut self, state: StateRecord) -> Self {
        self.states.insert(state.id, state);
        self
    }

    pub fn with_issue(mut self, issue: IssueRecord) -> Self {
        self.issues.insert(issue.id, issue);
        self
    }

    pub fn with_cycle(mut self, cycle: CycleRecord) -> Self {
        self.cycles.push(cycle);
        self
    }

    /// Link an issue to a cycle. Linking the same pair twice has no effect.
    pub fn with_link(mut self, cycle_id: Uuid, issue_id: Uuid) -> Self {
        if !self.links.contains(&(cycle_id, issue_id)) {
            self.links.push((cycle_id, issue_id));
        }
        self
    }

    /// Aggregate the qualifying issues linked to `cycle_id`.
    pub fn issue_stats(&self, cycle_id: Uuid) -> CycleIssueStats {
        let mut stats = CycleIssueStats::default();
        let mut seen = HashSet::new();

        let linked = self
            .links
            .iter()
            .filter(|(cycle, _)| *cycle == cycle_id)
            .filter(|(_, issue)| seen.insert(*issue))
            .filter_map(|(_, issue)| self.issues.get(issue));

        for issue in linked.filter(|issue| issue.is_countable()) {
            let group = issue
                .state_id
                .and_then(|state_id| self.states.get(&state_id))
                .map(|state| state.group);
            stats.record(group, issue.estimate_point);
        }

        stats
    }

    // Mirrors the inner joins of the SQL reader: a cycle whose owner or
    // project is missing from the fixture is not listed.
    fn project_row(&self, cycle: &CycleRecord, workspace: &WorkspaceLite) -> Option<CycleStats> {
        let owner = self.users.get(&cycle.owned_by_id)?;
        let project = self.projects.get(&cycle.project_id)?;

        Some(CycleStats {
            id: cycle.id,
            name: cycle.name.clone(),
            description: cycle.description.clone(),
            start_date: cycle.start_date,
            end_date: cycle.end_date,
            sort_order: cycle.sort_order,
            owned_by_id: cycle.owned_by_id,
            owned_by: owner.clone(),
            project: cycle.project_id,
            project_detail: project.clone(),
            workspace: workspace.id,
            workspace_detail: workspace.clone(),
            created_at: cycle.created_at,
            updated_at: cycle.updated_at,
            archived_at: cycle.archived_at,
            stats: self.issue_stats(cycle.id),
        })
    }
}

#[async_trait]
impl CycleStatsReader for InMemoryCycleStore {
    async fn list_cycle_stats(
        &self,
        workspace_slug: &str,
        ordering: CycleOrdering,
    ) -> CycleStatsResult<Vec<CycleStats>> {
        let Some(workspace) = self
            .workspaces
            .values()
            .find(|workspace| workspace.slug == workspace_slug)
        else {
            return Ok(Vec::new());
        };

        let mut rows: Vec<CycleStats> = self
            .cycles
            .iter()
            .filter(|cycle| cycle.workspace_id == workspace.id && cycle.archived_at.is_none())
            .filter_map(|cycle| self.project_row(cycle, workspace))
            .collect();

        ordering.sort(&mut rows);
        Ok(rows)
    }
}
