use chrono::{DateTime, NaiveDate, Utc};
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ===== Workflow State Groups =====

/// Fixed category every workflow state belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum StateGroup {
    Backlog,
    Unstarted,
    Started,
    Completed,
    Cancelled,
}

impl StateGroup {
    pub const ALL: [StateGroup; 5] = [
        StateGroup::Backlog,
        StateGroup::Unstarted,
        StateGroup::Started,
        StateGroup::Completed,
        StateGroup::Cancelled,
    ];

    /// Value stored in `states.state_group`.
    pub fn as_str(self) -> &'static str {
        match self {
            StateGroup::Backlog => "backlog",
            StateGroup::Unstarted => "unstarted",
            StateGroup::Started => "started",
            StateGroup::Completed => "completed",
            StateGroup::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for StateGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StateGroup {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        StateGroup::ALL
            .into_iter()
            .find(|group| group.as_str() == value)
            .ok_or_else(|| format!("unknown state group '{value}'"))
    }
}

// ===== Lite Relations Embedded In Cycle Rows =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct UserLite {
    pub id: Uuid,
    pub display_name: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProjectLite {
    pub id: Uuid,
    pub name: String,
    pub identifier: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WorkspaceLite {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
}

// ===== Cycle Statistics =====

/// Issue aggregates for a single cycle.
///
/// Only linked issues that are neither archived nor drafts are counted.
/// Estimate sums stay `None` when no qualifying issue carries an estimate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CycleIssueStats {
    pub total_issues: i64,
    pub completed_issues: i64,
    pub cancelled_issues: i64,
    pub started_issues: i64,
    pub unstarted_issues: i64,
    pub backlog_issues: i64,
    pub total_estimates: Option<i64>,
    pub completed_estimates: Option<i64>,
    pub started_estimates: Option<i64>,
}

impl CycleIssueStats {
    /// Issue count for a single state group.
    pub fn issues_in(&self, group: StateGroup) -> i64 {
        match group {
            StateGroup::Backlog => self.backlog_issues,
            StateGroup::Unstarted => self.unstarted_issues,
            StateGroup::Started => self.started_issues,
            StateGroup::Completed => self.completed_issues,
            StateGroup::Cancelled => self.cancelled_issues,
        }
    }

    /// Record one qualifying issue.
    pub fn record(&mut self, group: Option<StateGroup>, estimate_point: Option<i32>) {
        let estimate = estimate_point.map(i64::from);

        self.total_issues += 1;
        add_estimate(&mut self.total_estimates, estimate);

        match group {
            Some(StateGroup::Completed) => {
                self.completed_issues += 1;
                add_estimate(&mut self.completed_estimates, estimate);
            }
            Some(StateGroup::Started) => {
                self.started_issues += 1;
                add_estimate(&mut self.started_estimates, estimate);
            }
            Some(StateGroup::Cancelled) => self.cancelled_issues += 1,
            Some(StateGroup::Unstarted) => self.unstarted_issues += 1,
            Some(StateGroup::Backlog) => self.backlog_issues += 1,
            None => {}
        }
    }
}

// SQL SUM semantics: NULL inputs are skipped, all-NULL yields NULL.
fn add_estimate(sum: &mut Option<i64>, estimate: Option<i64>) {
    if let Some(value) = estimate {
        *sum = Some(sum.unwrap_or(0) + value);
    }
}

/// One active cycle of a workspace together with its issue statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CycleStats {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub sort_order: f64,
    pub owned_by_id: Uuid,
    pub owned_by: UserLite,
    pub project: Uuid,
    pub project_detail: ProjectLite,
    pub workspace: Uuid,
    pub workspace_detail: WorkspaceLite,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub archived_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub stats: CycleIssueStats,
}
