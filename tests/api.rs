#![cfg(feature = "web")]

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use chrono::NaiveDate;
use serde_json::{Value, json};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use floor_dashboard::app::{AppState, router};
use floor_dashboard::clock::{Clock, FixedClock};
use floor_dashboard::login::register_user;
use floor_dashboard::store::ReportStore;

struct TestApp {
    _dir: TempDir,
    state: Arc<AppState>,
    app: Router,
    cookie: String,
}

impl TestApp {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let clock: Arc<dyn Clock> =
            Arc::new(FixedClock::on(NaiveDate::from_ymd_opt(2025, 11, 22).unwrap()));
        let store = ReportStore::open_with_clock(dir.path().join("db"), clock.clone()).unwrap();
        let state = Arc::new(AppState::new(store, clock.clone()));
        let session = state.sessions.create("supervisor", clock.now());
        let app = router(state.clone(), dir.path());

        TestApp {
            _dir: dir,
            state,
            app,
            cookie: format!("session={}", session),
        }
    }

    async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::COOKIE, &self.cookie);
        let body = match body {
            Some(json) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self.app.clone().oneshot(request.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }
}

#[tokio::test]
async fn api_requires_a_session() {
    let test = TestApp::new();
    let response = test
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/dashboard-view")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = test
        .app
        .clone()
        .oneshot(Request::builder().uri("/dashboard").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert!(response.status().is_redirection());
}

#[tokio::test]
async fn login_sets_session_cookie() {
    let test = TestApp::new();
    register_user(&test.state.store, "lead", "pa55").unwrap();

    let login = |password: &str| {
        Request::builder()
            .method(Method::POST)
            .uri("/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(format!("username=lead&password={}", password)))
            .unwrap()
    };

    let response = test.app.clone().oneshot(login("pa55")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let cookie = response.headers().get(header::SET_COOKIE).unwrap();
    assert!(cookie.to_str().unwrap().starts_with("session="));

    let response = test.app.clone().oneshot(login("wrong")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn floor_report_lifecycle() {
    let test = TestApp::new();
    let report = json!({
        "date": "2025-11-21",
        "data": [{ "floor": "A2", "regular": 5, "mini": "2", "short": 1, "dayValue": 1500 }]
    });

    let (status, body) = test.send(Method::POST, "/api/floor-report", Some(report.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Saved successfully");
    // Floor reports are keyed by short label.
    assert_eq!(body["report"]["date"], "11/21");

    let (status, _) = test.send(Method::POST, "/api/floor-report", Some(report)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, view) = test.send(Method::GET, "/api/dashboard-view", None).await;
    assert_eq!(view["summary"]["grand_total"], 8.0);
    assert_eq!(view["summary"]["totals"]["days_display"][8], "$1,500");

    let (status, body) = test
        .send(
            Method::PATCH,
            "/api/floor-report",
            Some(json!({ "date": "11/21", "data": [{ "floor": "A2", "regular": 9 }] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Updated successfully");

    let (_, view) = test.send(Method::GET, "/api/dashboard-view", None).await;
    assert_eq!(view["summary"]["grand_total"], 9.0);

    let (status, _) = test
        .send(Method::PATCH, "/api/floor-report", Some(json!({ "date": "10/01", "data": [] })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = test.send(Method::DELETE, "/api/floor-report", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = test.send(Method::DELETE, "/api/floor-report?date=11/21", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Deleted successfully");
    assert!(test.state.store.floor_reports().is_empty());
}

#[tokio::test]
async fn malformed_bodies_are_bad_requests() {
    let test = TestApp::new();

    let (status, body) = test
        .send(Method::POST, "/api/floor-report", Some(json!({ "date": "11/21" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = test
        .send(Method::POST, "/api/floor-report", Some(json!("not an object")))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn fob_reports_need_every_field() {
    let test = TestApp::new();

    let (status, _) = test
        .send(
            Method::POST,
            "/api/fobreport",
            Some(json!({ "date": "2025-11-22", "monthlyUptoFOB": 1234.5, "yearlyUptoFOB": 0, "runday": 21 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = test
        .send(
            Method::POST,
            "/api/fobreport",
            Some(json!({ "date": "11/22", "monthlyUptoFOB": 1234.5, "yearlyUptoFOB": 98000, "runday": 21 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    // Stored under the ISO label.
    assert!(test.state.store.find_fob("2025-11-22").is_some());

    let (_, view) = test.send(Method::GET, "/api/dashboard-view", None).await;
    assert_eq!(view["fob"]["monthly_display"], "$1,235");
    assert_eq!(view["fob"]["runday_display"], "21");

    let (status, body) = test
        .send(Method::PATCH, "/api/fobreport", Some(json!({ "date": "2025-11-22", "runday": 22 })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updated"]["runday"], 22);
    assert_eq!(body["updated"]["yearlyUptoFOB"], 98000);
}

#[tokio::test]
async fn hourly_reports_update_by_id() {
    let test = TestApp::new();

    let (status, body) = test
        .send(
            Method::POST,
            "/api/hourlyreport",
            Some(json!({ "date": "11/21", "data": { "12H": 12, "10H": 10, "8H": 8 } })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["report"]["date"], "2025-11-21");
    let id = body["report"]["_id"].as_str().unwrap().to_string();

    let (status, _) = test
        .send(
            Method::PATCH,
            &format!("/api/hourlyreport?id={}", id),
            Some(json!({ "data": { "12H": 20, "10H": 10, "8H": 8 } })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, view) = test.send(Method::GET, "/api/dashboard-view", None).await;
    assert_eq!(view["summary"]["hourly"][8]["12H"], 20.0);

    let (status, _) = test
        .send(Method::PATCH, "/api/hourlyreport?id=missing", Some(json!({ "data": {} })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn dashboard_data_lists_users_without_hashes() {
    let test = TestApp::new();
    register_user(&test.state.store, "lead", "pa55").unwrap();

    let (status, body) = test.send(Method::GET, "/api/dashboard-data", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["users"], json!([{ "username": "lead" }]));
    assert_eq!(body["floorReports"], json!([]));
}

#[tokio::test]
async fn csv_export_uses_the_requested_view() {
    let test = TestApp::new();

    let response = test
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/export.csv?view=editor")
                .header(header::COOKIE, &test.cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let csv = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(csv.starts_with("Floor,Regular,Mini,Short,Total,11/16,"));

    let (status, _) = test.send(Method::GET, "/api/export.csv?view=weekly", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn entry_page_is_behind_login() {
    let test = TestApp::new();

    let response = test
        .app
        .clone()
        .oneshot(Request::builder().uri("/entry").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert!(response.status().is_redirection());

    let response = test
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/entry")
                .header(header::COOKIE, &test.cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let html = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(html.contains("editor-table"));
    assert!(html.contains("/static/entry.js"));
}

#[tokio::test]
async fn conflicting_create_is_followed_by_an_update() {
    let test = TestApp::new();
    let hourly = json!({ "date": "2025-11-21", "data": { "12H": 1, "10H": 1, "8H": 1 } });

    let (status, _) = test.send(Method::POST, "/api/hourlyreport", Some(hourly.clone())).await;
    assert_eq!(status, StatusCode::CREATED);

    // A second create is refused and changes nothing.
    let (status, body) = test.send(Method::POST, "/api/hourlyreport", Some(hourly)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("already exists"));
    assert_eq!(test.state.store.hourly_reports().len(), 1);

    // The update goes to the existing document's id.
    let (_, data) = test.send(Method::GET, "/api/dashboard-data", None).await;
    let id = data["hourlyReports"][0]["_id"].as_str().unwrap().to_string();
    let (status, _) = test
        .send(
            Method::PATCH,
            &format!("/api/hourlyreport?id={}", id),
            Some(json!({ "data": { "12H": 7, "10H": 1, "8H": 1 } })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, view) = test.send(Method::GET, "/api/dashboard-view", None).await;
    assert_eq!(view["editor"]["hourly"][5]["12H"], 7.0);
}

#[tokio::test]
async fn writes_stay_visible_after_the_timer_rebuilds() {
    let test = TestApp::new();
    let stale = test.state.build_view();

    let (status, _) = test
        .send(
            Method::POST,
            "/api/floor-report",
            Some(json!({ "date": "11/22", "data": [{ "floor": "B3", "regular": 4, "short": 1 }] })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    assert!(!test.state.publish(stale));
    let (_, view) = test.send(Method::GET, "/api/dashboard-view", None).await;
    assert_eq!(view["editor"]["grand_total"], 5.0);
}
