use std::sync::Arc;

use cycles_api::cycles::InMemoryCycleStore;
use cycles_api::routes::cycles::{list_workspace_cycles, okapi_add_operation_for_list_workspace_cycles_};
use cycles_api::routes::health::{
    HealthResponse, health_check, live_health, okapi_add_operation_for_health_check_,
    okapi_add_operation_for_live_health_,
};
use cycles_api::test_support::TestRocketBuilder;
use rocket::http::Status;
use rocket::routes;
use rocket_okapi::openapi_get_routes;

#[test]
fn health_endpoint_returns_ok() {
    let client = TestRocketBuilder::new()
        .mount_api_routes(routes![health_check])
        .blocking_client();

    let response = client.get("/api/v1/health").dispatch();
    assert_eq!(response.status(), Status::Ok);

    let payload: HealthResponse = response.into_json().expect("valid JSON payload");
    assert_eq!(payload.status, "ok");
}

#[test]
fn live_endpoint_returns_ok() {
    let client = TestRocketBuilder::new()
        .mount_api_routes(routes![live_health])
        .blocking_client();

    let response = client.get("/api/v1/health/live").dispatch();
    assert_eq!(response.status(), Status::Ok);

    let payload: HealthResponse = response.into_json().expect("valid JSON payload");
    assert_eq!(payload.status, "ok");
}

#[test]
fn openapi_document_lists_cycle_route() {
    let client = TestRocketBuilder::new()
        .manage_reader(Arc::new(InMemoryCycleStore::new()))
        .mount_api_routes(openapi_get_routes![health_check, live_health, list_workspace_cycles])
        .blocking_client();

    let response = client.get("/api/v1/openapi.json").dispatch();
    assert_eq!(response.status(), Status::Ok);

    let document: serde_json::Value = response.into_json().expect("valid OpenAPI JSON");
    let paths = document["paths"].as_object().expect("paths object");
    assert!(
        paths
            .keys()
            .any(|path| path.contains("/workspaces/{slug}/cycles"))
    );
    assert!(paths.keys().any(|path| path.ends_with("/health/live")));
    assert!(paths.keys().any(|path| path.ends_with("/health")));
}
