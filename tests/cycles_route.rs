use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use cycles_api::auth::{AccessDecision, AuthorizationResult, WorkspaceAuthorizer};
use cycles_api::cycles::memory::{CycleRecord, IssueRecord, StateRecord};
use cycles_api::cycles::{
    CycleOrdering, CycleStatsReader, CycleStatsResult, InMemoryCycleStore,
};
use cycles_api::models::{CycleStats, ProjectLite, StateGroup, UserLite, WorkspaceLite};
use cycles_api::routes::cycles::list_workspace_cycles;
use cycles_api::test_support::TestRocketBuilder;
use rocket::http::{Header, Status};
use rocket::local::blocking::Client;
use rocket::routes;
use uuid::Uuid;

fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, day, 12, 0, 0)
        .single()
        .expect("valid timestamp")
}

struct AcmeFixture {
    workspace_id: Uuid,
    project_id: Uuid,
    owner_id: Uuid,
    completed: Uuid,
    started: Uuid,
    store: InMemoryCycleStore,
}

impl AcmeFixture {
    fn new() -> Self {
        let workspace_id = Uuid::new_v4();
        let project_id = Uuid::new_v4();
        let owner_id = Uuid::new_v4();
        let completed = Uuid::new_v4();
        let started = Uuid::new_v4();

        let store = InMemoryCycleStore::new()
            .with_workspace(WorkspaceLite {
                id: workspace_id,
                slug: "acme".into(),
                name: "Acme Corp".into(),
            })
            .with_user(UserLite {
                id: owner_id,
                display_name: "ada".into(),
                avatar: None,
            })
            .with_project(ProjectLite {
                id: project_id,
                name: "Launchpad".into(),
                identifier: "LP".into(),
            })
            .with_state(StateRecord {
                id: completed,
                name: "Done".into(),
                group: StateGroup::Completed,
            })
            .with_state(StateRecord {
                id: started,
                name: "In Progress".into(),
                group: StateGroup::Started,
            });

        Self {
            workspace_id,
            project_id,
            owner_id,
            completed,
            started,
            store,
        }
    }

    fn cycle(mut self, name: &str, created_at: DateTime<Utc>, issues: Vec<IssueRecord>) -> Self {
        let cycle_id = Uuid::new_v4();
        self.store = self.store.with_cycle(CycleRecord {
            id: cycle_id,
            workspace_id: self.workspace_id,
            project_id: self.project_id,
            owned_by_id: self.owner_id,
            name: name.into(),
            description: String::new(),
            start_date: None,
            end_date: None,
            sort_order: 65535.0,
            created_at,
            updated_at: created_at,
            archived_at: None,
        });
        for issue in issues {
            let issue_id = issue.id;
            self.store = self.store.with_issue(issue).with_link(cycle_id, issue_id);
        }
        self
    }

    fn issue(state_id: Uuid, estimate_point: Option<i32>) -> IssueRecord {
        IssueRecord {
            id: Uuid::new_v4(),
            state_id: Some(state_id),
            estimate_point,
            is_draft: false,
            archived_at: None,
        }
    }

    fn sprint_store() -> InMemoryCycleStore {
        let fx = Self::new();
        let mut archived = Self::issue(fx.completed, Some(8));
        archived.archived_at = Some(at(2));
        let issues = vec![
            Self::issue(fx.completed, Some(5)),
            Self::issue(fx.started, Some(3)),
            archived,
        ];
        fx.cycle("Sprint 1", at(1), issues).store
    }
}

fn client_for(store: InMemoryCycleStore) -> Client {
    TestRocketBuilder::new()
        .manage_reader(Arc::new(store))
        .mount_api_routes(routes![list_workspace_cycles])
        .blocking_client()
}

fn names(rows: &[CycleStats]) -> Vec<&str> {
    rows.iter().map(|row| row.name.as_str()).collect()
}

#[test]
fn lists_cycle_statistics_for_workspace() {
    let client = client_for(AcmeFixture::sprint_store());

    let response = client.get("/api/v1/workspaces/acme/cycles/").dispatch();
    assert_eq!(response.status(), Status::Ok);

    let body: serde_json::Value = response.into_json().expect("JSON array");
    let rows = body.as_array().expect("array payload");
    assert_eq!(rows.len(), 1);

    let row = &rows[0];
    assert_eq!(row["name"], "Sprint 1");
    assert_eq!(row["total_issues"], 2);
    assert_eq!(row["completed_issues"], 1);
    assert_eq!(row["started_issues"], 1);
    assert_eq!(row["cancelled_issues"], 0);
    assert_eq!(row["unstarted_issues"], 0);
    assert_eq!(row["backlog_issues"], 0);
    assert_eq!(row["total_estimates"], 8);
    assert_eq!(row["completed_estimates"], 5);
    assert_eq!(row["started_estimates"], 3);
    assert_eq!(row["workspace_detail"]["slug"], "acme");
    assert_eq!(row["project_detail"]["identifier"], "LP");
    assert_eq!(row["owned_by"]["display_name"], "ada");
}

#[test]
fn serves_listing_with_and_without_trailing_slash() {
    let client = client_for(AcmeFixture::sprint_store());

    for uri in [
        "/api/v1/workspaces/acme/cycles",
        "/api/v1/workspaces/acme/cycles/",
        "/api/v1/workspaces/acme/cycles?order_by=-total_issues",
    ] {
        let response = client.get(uri).dispatch();
        assert_eq!(response.status(), Status::Ok, "GET {uri}");
        let rows: Vec<CycleStats> = response.into_json().expect("JSON array");
        assert_eq!(names(&rows), ["Sprint 1"], "GET {uri}");
    }
}

#[test]
fn orders_by_requested_field_and_defaults_to_newest_first() {
    let fx = AcmeFixture::new();
    let store = fx
        .cycle("Bravo", at(1), Vec::new())
        .cycle("Charlie", at(3), Vec::new())
        .cycle("Alpha", at(2), Vec::new())
        .store;
    let client = client_for(store);

    let newest_first: Vec<CycleStats> = client
        .get("/api/v1/workspaces/acme/cycles/")
        .dispatch()
        .into_json()
        .expect("JSON array");
    assert_eq!(names(&newest_first), ["Charlie", "Alpha", "Bravo"]);

    let by_name: Vec<CycleStats> = client
        .get("/api/v1/workspaces/acme/cycles/?order_by=name")
        .dispatch()
        .into_json()
        .expect("JSON array");
    assert_eq!(names(&by_name), ["Alpha", "Bravo", "Charlie"]);

    let by_name_desc: Vec<CycleStats> = client
        .get("/api/v1/workspaces/acme/cycles/?order_by=-name")
        .dispatch()
        .into_json()
        .expect("JSON array");
    assert_eq!(names(&by_name_desc), ["Charlie", "Bravo", "Alpha"]);
}

#[test]
fn unknown_order_field_is_bad_request() {
    let client = client_for(AcmeFixture::sprint_store());

    let response = client
        .get("/api/v1/workspaces/acme/cycles/?order_by=-owner")
        .dispatch();
    assert_eq!(response.status(), Status::BadRequest);

    let body: serde_json::Value = response.into_json().expect("JSON error body");
    assert_eq!(body["error"], "BadRequest");
    assert!(
        body["message"]
            .as_str()
            .is_some_and(|message| message.contains("-owner"))
    );
}

#[test]
fn unknown_workspace_returns_empty_list() {
    let client = client_for(AcmeFixture::sprint_store());

    let response = client.get("/api/v1/workspaces/globex/cycles/").dispatch();
    assert_eq!(response.status(), Status::Ok);

    let rows: Vec<CycleStats> = response.into_json().expect("JSON array");
    assert!(rows.is_empty());
}

/// Reader that counts calls and returns nothing.
#[derive(Default)]
struct CountingReader {
    calls: AtomicUsize,
}

#[async_trait]
impl CycleStatsReader for CountingReader {
    async fn list_cycle_stats(
        &self,
        _workspace_slug: &str,
        _ordering: CycleOrdering,
    ) -> CycleStatsResult<Vec<CycleStats>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Vec::new())
    }
}

/// Allows only the listed principal.
struct MemberAuthorizer {
    member: &'static str,
}

#[async_trait]
impl WorkspaceAuthorizer for MemberAuthorizer {
    async fn can_view_workspace(
        &self,
        principal: Option<&str>,
        _workspace_slug: &str,
    ) -> AuthorizationResult<AccessDecision> {
        if principal == Some(self.member) {
            Ok(AccessDecision::Allowed)
        } else {
            Ok(AccessDecision::Denied("not a workspace viewer".into()))
        }
    }
}

#[test]
fn denied_callers_never_reach_the_reader() {
    let reader = Arc::new(CountingReader::default());
    let client = TestRocketBuilder::new()
        .manage_reader(reader.clone())
        .manage_authorizer(Arc::new(MemberAuthorizer { member: "ada" }))
        .mount_api_routes(routes![list_workspace_cycles])
        .blocking_client();

    let response = client.get("/api/v1/workspaces/acme/cycles/").dispatch();
    assert_eq!(response.status(), Status::Forbidden);

    let response = client
        .get("/api/v1/workspaces/acme/cycles/")
        .header(Header::new("X-Forwarded-User", "mallory"))
        .dispatch();
    assert_eq!(response.status(), Status::Forbidden);
    let body: serde_json::Value = response.into_json().expect("JSON error body");
    assert_eq!(body["error"], "Forbidden");
    assert_eq!(body["message"], "forbidden: not a workspace viewer");
    assert_eq!(reader.calls.load(Ordering::SeqCst), 0);

    let response = client
        .get("/api/v1/workspaces/acme/cycles/")
        .header(Header::new("X-Forwarded-User", "ada"))
        .dispatch();
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(reader.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn archived_cycles_are_not_listed() {
    let fx = AcmeFixture::new();
    let fx = fx.cycle("Active", at(1), Vec::new());
    let archived_id = Uuid::new_v4();
    let store = fx.store.with_cycle(CycleRecord {
        id: archived_id,
        workspace_id: fx.workspace_id,
        project_id: fx.project_id,
        owned_by_id: fx.owner_id,
        name: "Archived".into(),
        description: String::new(),
        start_date: None,
        end_date: None,
        sort_order: 65535.0,
        created_at: at(1) + Duration::hours(1),
        updated_at: at(1),
        archived_at: Some(at(4)),
    });
    let client = client_for(store);

    let rows: Vec<CycleStats> = client
        .get("/api/v1/workspaces/acme/cycles/")
        .dispatch()
        .into_json()
        .expect("JSON array");
    assert_eq!(names(&rows), ["Active"]);
}
