mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use serde_json::{json, Value};

async fn seed_schedules(app: &TestApp, token: &str) {
    for name in ["Team", "Gym"] {
        let (status, body) = app.post("/api/schedule", Some(token), json!({"name": name})).await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }
    for (schedule_id, description) in [(1, "standup"), (1, "retro"), (2, "legs")] {
        let detail = json!({
            "time": "2024-05-01T09:00:00Z",
            "description": description,
            "members": [1],
            "schedule_id": schedule_id,
        });
        let (status, body) = app.post("/api/schedule-detail", Some(token), detail).await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }
}

#[tokio::test]
async fn protected_routes_require_a_session() {
    let app = TestApp::new();

    let (status, body) = app.send(Method::GET, "/api/schedule", None, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["result"], json!([]));

    let (status, _) = app.get("/api/schedule", "not-a-token").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn logout_without_token_succeeds_and_unknown_token_fails() {
    let app = TestApp::new();

    let (status, body) = app.send(Method::POST, "/api/logout", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"result": [], "errors": []}));

    let (status, _) = app.send(Method::POST, "/api/logout", Some("stale"), None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn login_session_reflects_admin_flag() {
    let app = TestApp::new();
    let admin = app.login_admin().await;
    let user = app.login_new_user("ann", "secret").await;
    assert_ne!(admin, user);

    let (_, body) = app.post("/api/login", None, json!({"login": "root", "password": "root-password"})).await;
    assert_eq!(body["result"]["flags"], json!(-4));
    assert_eq!(body["result"]["login"], json!("root"));
    assert!(body["result"].get("password_hash").is_none());
}

#[tokio::test]
async fn schedules_are_filtered_projected_and_owned() {
    let app = TestApp::new();
    let token = app.login_new_user("ann", "secret").await;
    seed_schedules(&app, &token).await;

    let (status, body) = app.get("/api/schedule?ids=2,7&fields=id,name,owner_id", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "result": [{"id": 2, "name": "Gym", "owner_id": 1}],
            "errors": [{"selector": "id", "reason": "Schedule is not found", "value": 7}],
        })
    );

    let (_, body) = app.get("/api/schedule?name=ea&fields=name", &token).await;
    assert_eq!(body["result"], json!([{"name": "Team"}]));
}

#[tokio::test]
async fn details_are_grouped_by_schedule() {
    let app = TestApp::new();
    let token = app.login_new_user("ann", "secret").await;
    seed_schedules(&app, &token).await;

    let (status, body) = app.get("/api/schedule-detail?fields=id,description&schedules=1", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["result"],
        json!([{"1": [{"id": 1, "description": "standup"}, {"id": 2, "description": "retro"}]}])
    );
    assert_eq!(body["errors"], json!([]));
}

#[tokio::test]
async fn missing_schedule_and_detail_are_soft_errors() {
    let app = TestApp::new();
    let token = app.login_new_user("ann", "secret").await;
    seed_schedules(&app, &token).await;

    let (status, body) = app.get("/api/schedule-detail?ids=10&schedules=5", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "result": [{}],
            "errors": [
                {"selector": "id", "reason": "Schedule not found", "value": 5},
                {"selector": "id", "reason": "Schedule or schedule-detail is not found", "value": 10},
            ],
        })
    );
}

#[tokio::test]
async fn malformed_query_parameters_are_rejected() {
    let app = TestApp::new();
    let token = app.login_new_user("ann", "secret").await;

    let (status, body) = app.get("/api/schedule-detail?ids=1,abc", &token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"], json!([{"selector": "ids", "reason": "Not a valid integer.", "value": "abc"}]));

    let (status, body) = app.get("/api/user?fields=password_hash", &token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["selector"], json!("fields"));
}

#[tokio::test]
async fn invalid_writes_return_field_errors() {
    let app = TestApp::new();
    let token = app.login_new_user("ann", "secret").await;

    let (status, body) = app
        .post("/api/schedule-detail", Some(&token), json!({"time": "soon", "schedule_id": 1}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"], json!([{"selector": "time", "reason": "Not a valid datetime."}]));

    let (status, body) = app
        .post("/api/schedule-detail", Some(&token), json!({"time": "2024-05-01T09:00:00Z", "schedule_id": 1}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0], json!({"selector": "schedule_id", "reason": "Schedule not found", "value": 1}));
}

#[tokio::test]
async fn updates_change_records_or_report_unknown_ids() {
    let app = TestApp::new();
    let token = app.login_new_user("ann", "secret").await;
    seed_schedules(&app, &token).await;

    let (status, body) = app.put("/api/schedule-detail", &token, json!({"id": 3, "description": "arms"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["description"], json!("arms"));
    assert_eq!(body["result"]["schedule_id"], json!(2));

    let (status, body) = app.put("/api/schedule", &token, json!({"id": 40, "name": "x"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], Value::Null);
    assert_eq!(body["errors"][0]["value"], json!(40));
}

#[tokio::test]
async fn user_writes_need_an_administrator() {
    let app = TestApp::new();
    let user = app.login_new_user("ann", "secret").await;
    let admin = app.login_admin().await;

    let (status, _) = app.post("/api/user", Some(&user), json!({"login": "bob"})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.post("/api/user", Some(&admin), json!({"login": "bob", "name": "Bob"})).await;
    assert_eq!(status, StatusCode::OK);
    let bob_id = body["result"]["id"].as_i64().unwrap();

    let (status, body) = app.put("/api/user", &admin, json!({"id": bob_id, "email": "bob@example.com"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["email"], json!("bob@example.com"));

    let (_, body) = app.get(&format!("/api/user?ids={bob_id}&fields=login,email"), &user).await;
    assert_eq!(body["result"], json!([{"login": "bob", "email": "bob@example.com"}]));
}

#[tokio::test]
async fn duplicate_registration_is_a_soft_error() {
    let app = TestApp::new();
    app.login_new_user("ann", "secret").await;

    let (status, body) = app
        .post(
            "/api/registration",
            None,
            json!({"login": "ann", "password": "other", "email": "ann@example.com", "phone": "555-0100"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], Value::Null);
    assert_eq!(body["errors"], json!([{"selector": "login", "reason": "Login already exists.", "value": "ann"}]));
}

#[tokio::test]
async fn registration_requires_every_contact_field() {
    let app = TestApp::new();
    let (status, body) = app
        .post("/api/registration", None, json!({"login": "ann", "password": "secret", "email": "ann@example.com"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"], json!([{"selector": "phone", "reason": "Missing data for required field."}]));
}

#[tokio::test]
async fn login_with_missing_fields_is_a_validation_error() {
    let app = TestApp::new();
    app.login_new_user("ann", "secret").await;

    let (status, body) = app.post("/api/login", None, json!({"login": "ann"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["selector"], json!("password"));

    let (status, body) = app.post("/api/login", None, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"].as_array().map(Vec::len), Some(2));

    let (status, _) = app.post("/api/login", None, json!({"login": "ann", "password": "wrong"})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn administrator_created_users_can_log_in() {
    let app = TestApp::new();
    let admin = app.login_admin().await;

    let (status, body) = app
        .post("/api/user", Some(&admin), json!({"login": "bob", "password": "bob-secret", "name": "Bob"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["result"].get("password").is_none());
    let bob_id = body["result"]["id"].as_i64().unwrap();
    app.login("bob", "bob-secret").await;

    let (status, _) = app.put("/api/user", &admin, json!({"id": bob_id, "password": "rotated"})).await;
    assert_eq!(status, StatusCode::OK);
    app.login("bob", "rotated").await;
    let (status, _) = app.post("/api/login", None, json!({"login": "bob", "password": "bob-secret"})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
