//! Integration tests for the Issues API
//!
//! Tests listing, status transitions, assignment, comments and the activity
//! log of issues.

use actix_web::{test, web, App};
use faultline::auth::ACTOR_HEADER;
use faultline::routes;
use faultline::services::FingerprintPolicy;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::common::{create_project, ingest_event, test_config, EventBuilder, TestDb};

const NOON: f64 = 1704801600.0;

macro_rules! api_app {
    ($pool:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($pool.clone()))
                .app_data(web::Data::new(test_config()))
                .app_data(web::Data::new(FingerprintPolicy::default()))
                .configure(routes::configure),
        )
        .await
    };
}

async fn seed_issue(pool: &sqlx::PgPool, project_id: i32, exc_type: &str, offset: f64) -> Uuid {
    let event = EventBuilder::new()
        .with_timestamp(NOON + offset)
        .with_exception(exc_type, "failure")
        .build();
    ingest_event(pool, project_id, &event)
        .await
        .expect("Failed to ingest event")
        .issue_id
}

// =============================================================================
// Listing
// =============================================================================

#[actix_web::test]
async fn test_list_issues_most_recent_first() {
    let db = TestDb::new().await;
    let project = create_project(&db.pool, "Listing").await;

    let oldest = seed_issue(&db.pool, project.id, "OldError", 0.0).await;
    let newest = seed_issue(&db.pool, project.id, "NewError", 600.0).await;
    let middle = seed_issue(&db.pool, project.id, "MidError", 300.0).await;

    let app = api_app!(db.pool);
    let req = test::TestRequest::get()
        .uri(&format!("/api/projects/{}/issues?limit=2", project.id))
        .to_request();
    let page: Value = test::call_and_read_body_json(&app, req).await;

    let ids: Vec<String> = page["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec![newest.to_string(), middle.to_string()]);
    assert_eq!(page["has_more"], true);
    assert_eq!(page["limit"], 2);

    let req = test::TestRequest::get()
        .uri(&format!("/api/projects/{}/issues?limit=2&offset=2", project.id))
        .to_request();
    let page: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(page["items"][0]["id"], oldest.to_string());
    assert_eq!(page["has_more"], false);
}

#[actix_web::test]
async fn test_list_issues_unknown_project() {
    let db = TestDb::new().await;
    let app = api_app!(db.pool);

    let req = test::TestRequest::get()
        .uri("/api/projects/4242/issues")
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status().as_u16(), 404);
}

#[actix_web::test]
async fn test_get_issue_from_other_project_is_not_found() {
    let db = TestDb::new().await;
    let owner = create_project(&db.pool, "Owner").await;
    let other = create_project(&db.pool, "Other").await;
    let issue_id = seed_issue(&db.pool, owner.id, "SecretError", 0.0).await;

    let app = api_app!(db.pool);

    let req = test::TestRequest::get()
        .uri(&format!("/api/projects/{}/issues/{}", owner.id, issue_id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let req = test::TestRequest::get()
        .uri(&format!("/api/projects/{}/issues/{}", other.id, issue_id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 404);
}

// =============================================================================
// Status Transitions
// =============================================================================

#[actix_web::test]
async fn test_status_transitions_record_activity() {
    let db = TestDb::new().await;
    let project = create_project(&db.pool, "Lifecycle").await;
    let issue_id = seed_issue(&db.pool, project.id, "LifecycleError", 0.0).await;
    let app = api_app!(db.pool);

    let status_uri = format!("/api/projects/{}/issues/{}/status", project.id, issue_id);

    // unresolved -> resolved
    let req = test::TestRequest::put()
        .uri(&status_uri)
        .insert_header((ACTOR_HEADER, "alice"))
        .set_json(json!({ "status": "resolved" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["issue"]["status"], "resolved");
    assert_eq!(body["activity"]["kind"], "resolve");
    assert_eq!(body["activity"]["actor"], "alice");
    assert_eq!(
        body["activity"]["payload"],
        json!({ "from": "unresolved", "to": "resolved" })
    );

    // resolved -> ignored is not an arc
    let req = test::TestRequest::put()
        .uri(&status_uri)
        .set_json(json!({ "status": "ignored" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 409);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["type"], "Conflict");

    // resolved -> unresolved (reopen)
    let req = test::TestRequest::put()
        .uri(&status_uri)
        .insert_header((ACTOR_HEADER, "bob"))
        .set_json(json!({ "status": "unresolved" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["issue"]["status"], "unresolved");
    assert_eq!(body["activity"]["kind"], "status_change");

    // unresolved -> ignored
    let req = test::TestRequest::put()
        .uri(&status_uri)
        .set_json(json!({ "status": "ignored" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["activity"]["kind"], "ignore");
    assert!(body["activity"]["actor"].is_null());

    // The rejected transition left no trace
    let req = test::TestRequest::get()
        .uri(&format!(
            "/api/projects/{}/issues/{}/activity",
            project.id, issue_id
        ))
        .to_request();
    let activity: Value = test::call_and_read_body_json(&app, req).await;
    let kinds: Vec<&str> = activity
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["kind"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["resolve", "status_change", "ignore"]);
}

#[actix_web::test]
async fn test_same_status_is_a_conflict() {
    let db = TestDb::new().await;
    let project = create_project(&db.pool, "Same Status").await;
    let issue_id = seed_issue(&db.pool, project.id, "SameError", 0.0).await;
    let app = api_app!(db.pool);

    let req = test::TestRequest::put()
        .uri(&format!(
            "/api/projects/{}/issues/{}/status",
            project.id, issue_id
        ))
        .set_json(json!({ "status": "unresolved" }))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status().as_u16(), 409);
}

// =============================================================================
// Assignment
// =============================================================================

#[actix_web::test]
async fn test_assign_and_unassign() {
    let db = TestDb::new().await;
    let project = create_project(&db.pool, "Assignment").await;
    let issue_id = seed_issue(&db.pool, project.id, "AssignedError", 0.0).await;
    let app = api_app!(db.pool);

    let assignee_uri = format!(
        "/api/projects/{}/issues/{}/assignee",
        project.id, issue_id
    );

    let req = test::TestRequest::put()
        .uri(&assignee_uri)
        .insert_header((ACTOR_HEADER, "lead"))
        .set_json(json!({ "assignee": "  carol  " }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["issue"]["assignee"], "carol");
    assert_eq!(body["activity"]["kind"], "assignment");
    assert_eq!(
        body["activity"]["payload"],
        json!({ "from": null, "to": "carol" })
    );

    // Same assignee again
    let req = test::TestRequest::put()
        .uri(&assignee_uri)
        .set_json(json!({ "assignee": "carol" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 409);

    // Clearing
    let req = test::TestRequest::put()
        .uri(&assignee_uri)
        .set_json(json!({ "assignee": null }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert!(body["issue"]["assignee"].is_null());
    assert_eq!(
        body["activity"]["payload"],
        json!({ "from": "carol", "to": null })
    );
}

// =============================================================================
// Comments
// =============================================================================

#[actix_web::test]
async fn test_comments_are_stored_with_activity() {
    let db = TestDb::new().await;
    let project = create_project(&db.pool, "Comments").await;
    let issue_id = seed_issue(&db.pool, project.id, "CommentedError", 0.0).await;
    let app = api_app!(db.pool);

    let comments_uri = format!(
        "/api/projects/{}/issues/{}/comments",
        project.id, issue_id
    );

    let req = test::TestRequest::post()
        .uri(&comments_uri)
        .insert_header((ACTOR_HEADER, "dave"))
        .set_json(json!({ "content": "  Looking into this  " }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 201);

    let comment: Value = test::read_body_json(resp).await;
    assert_eq!(comment["content"], "Looking into this");
    assert_eq!(comment["author"], "dave");

    // Blank comments are rejected
    let req = test::TestRequest::post()
        .uri(&comments_uri)
        .set_json(json!({ "content": "   " }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 422);

    let req = test::TestRequest::get().uri(&comments_uri).to_request();
    let comments: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(comments.as_array().unwrap().len(), 1);

    let req = test::TestRequest::get()
        .uri(&format!(
            "/api/projects/{}/issues/{}/activity",
            project.id, issue_id
        ))
        .to_request();
    let activity: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(activity[0]["kind"], "comment");
    assert_eq!(activity[0]["actor"], "dave");
    assert_eq!(activity[0]["payload"]["comment_id"], comment["id"]);
}

#[actix_web::test]
async fn test_comment_on_unknown_issue() {
    let db = TestDb::new().await;
    let project = create_project(&db.pool, "Missing").await;
    let app = api_app!(db.pool);

    let req = test::TestRequest::post()
        .uri(&format!(
            "/api/projects/{}/issues/{}/comments",
            project.id,
            Uuid::new_v4()
        ))
        .set_json(json!({ "content": "hello?" }))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status().as_u16(), 404);
}
