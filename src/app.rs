use axum::{
    Json, Router,
    extract::{Query, State, rejection::JsonRejection},
    http::{StatusCode, header},
    middleware,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::dashboard::{DashboardView, FloorTable};
use crate::date_label::normalize_label;
use crate::downloader::{self, ExportError};
use crate::login::{self, SessionStore};
use crate::refresh;
use crate::report::{FloorEntry, Quantity, ReportKind};
use crate::store::{ReportStore, StoreError};

/// A dashboard view together with the store revision it was built from.
#[derive(Debug, Clone)]
pub struct BuiltView {
    pub revision: u64,
    pub view: DashboardView,
}

impl BuiltView {
    fn from_store(store: &ReportStore, clock: &dyn Clock) -> Self {
        let snapshot = store.snapshot();
        BuiltView {
            revision: snapshot.revision,
            view: DashboardView::build(clock, &snapshot.floor, &snapshot.hourly, &snapshot.fob),
        }
    }
}

struct Published {
    revision: u64,
    view: Arc<DashboardView>,
}

/// Shared server state.
pub struct AppState {
    pub store: ReportStore,
    pub sessions: SessionStore,
    pub clock: Arc<dyn Clock>,
    published: RwLock<Published>,
}

impl AppState {
    pub fn new(store: ReportStore, clock: Arc<dyn Clock>) -> Self {
        let built = BuiltView::from_store(&store, clock.as_ref());
        AppState {
            store,
            sessions: SessionStore::new(),
            clock,
            published: RwLock::new(Published {
                revision: built.revision,
                view: Arc::new(built.view),
            }),
        }
    }

    /// The last fully built dashboard snapshot.
    pub fn current_view(&self) -> Arc<DashboardView> {
        self.published.read().unwrap_or_else(|e| e.into_inner()).view.clone()
    }

    /// Store revision of the published snapshot.
    pub fn published_revision(&self) -> u64 {
        self.published.read().unwrap_or_else(|e| e.into_inner()).revision
    }

    /// Build a fresh snapshot from the store without publishing it.
    pub fn build_view(&self) -> BuiltView {
        BuiltView::from_store(&self.store, self.clock.as_ref())
    }

    /// Swap `built` in as the published snapshot
    ///
    /// A build from an older store revision than the published one is
    /// dropped, so a slow rebuild cannot hide a write that a later rebuild
    /// already shows. Equal revisions replace, which picks up date rollover.
    ///
    /// # Returns
    /// * `bool` - Whether `built` was published
    pub fn publish(&self, built: BuiltView) -> bool {
        let mut slot = self.published.write().unwrap_or_else(|e| e.into_inner());
        if built.revision < slot.revision {
            log::debug!(
                "dropping dashboard view for revision {} (published {})",
                built.revision,
                slot.revision
            );
            return false;
        }
        *slot = Published {
            revision: built.revision,
            view: Arc::new(built.view),
        };
        true
    }

    fn storage_key(&self, kind: ReportKind, date: &str) -> String {
        normalize_label(date, kind.storage_format(), self.clock.today())
    }
}

/// Errors a handler can return, rendered as `{ "error": ... }`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Store(StoreError::AlreadyExists { .. } | StoreError::UserExists(_)) => {
                StatusCode::CONFLICT
            }
            ApiError::Store(StoreError::NotFound { .. }) => StatusCode::NOT_FOUND,
            ApiError::Store(StoreError::Io { .. } | StoreError::Json { .. })
            | ApiError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            log::error!("request failed: {}", self);
            "Server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[derive(Deserialize)]
struct FloorReportBody {
    date: Option<String>,
    data: Option<Vec<FloorEntry>>,
}

#[derive(Deserialize)]
struct HourlyReportBody {
    date: Option<String>,
    data: Option<BTreeMap<String, Quantity>>,
}

#[derive(Deserialize)]
struct FobReportBody {
    date: Option<String>,
    #[serde(rename = "monthlyUptoFOB")]
    monthly_upto_fob: Option<Quantity>,
    #[serde(rename = "yearlyUptoFOB")]
    yearly_upto_fob: Option<Quantity>,
    runday: Option<Quantity>,
}

#[derive(Deserialize)]
struct DateQuery {
    date: Option<String>,
}

#[derive(Deserialize)]
struct IdQuery {
    id: Option<String>,
}

#[derive(Deserialize)]
struct ExportQuery {
    view: Option<String>,
}

#[derive(Serialize)]
struct UserSummary {
    username: String,
}

pub fn router(state: Arc<AppState>, static_dir: &Path) -> Router {
    let protected = Router::new()
        .route("/dashboard", get(serve_dashboard))
        .route("/entry", get(serve_entry))
        .route("/api/dashboard-data", get(get_dashboard_data))
        .route("/api/dashboard-view", get(get_dashboard_view))
        .route(
            "/api/floor-report",
            get(list_floor_reports)
                .post(create_floor_report)
                .patch(update_floor_report)
                .delete(delete_floor_report),
        )
        .route(
            "/api/hourlyreport",
            get(list_hourly_reports)
                .post(create_hourly_report)
                .patch(update_hourly_report),
        )
        .route(
            "/api/fobreport",
            get(list_fob_reports)
                .post(create_fob_report)
                .patch(update_fob_report),
        )
        .route("/api/export.csv", get(export_csv))
        .route("/api/export.xlsx", get(export_xlsx))
        .route_layer(middleware::from_fn_with_state(state.clone(), login::require_auth));

    Router::new()
        .route("/", get(login::serve_login_page))
        .route("/login", post(login::handle_login))
        .route("/logout", post(login::handle_logout))
        .merge(protected)
        .nest_service("/static", ServeDir::new(static_dir))
        .with_state(state)
}

pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = ReportStore::open_with_clock(&config.data_dir, clock.clone())?;

    if let Some(seed) = &config.seed_user {
        if store.users().is_empty() {
            login::register_user(&store, &seed.username, &seed.password)?;
        }
    }

    let state = Arc::new(AppState::new(store, clock));
    refresh::spawn_refresher(state.clone(), config.refresh_interval());

    let app = router(state, &config.static_dir);

    let listener = TcpListener::bind(config.bind).await?;
    log::info!("Listening on http://{}", config.bind);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn serve_dashboard() -> Html<&'static str> {
    Html(include_str!("./static/dashboard.html"))
}

async fn serve_entry() -> Html<&'static str> {
    Html(include_str!("./static/entry.html"))
}

async fn get_dashboard_data(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.store.snapshot();
    let users: Vec<UserSummary> = state
        .store
        .users()
        .into_iter()
        .map(|u| UserSummary { username: u.username })
        .collect();

    Json(json!({
        "floorReports": snapshot.floor,
        "fobReports": snapshot.fob,
        "hourlyReports": snapshot.hourly,
        "users": users,
    }))
}

async fn get_dashboard_view(State(state): State<Arc<AppState>>) -> Json<Arc<DashboardView>> {
    Json(state.current_view())
}

async fn list_floor_reports(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({ "reports": state.store.floor_reports() }))
}

async fn create_floor_report(
    State(state): State<Arc<AppState>>,
    body: Result<Json<FloorReportBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body?;
    let (Some(date), Some(data)) = (non_empty(body.date), body.data) else {
        return Err(ApiError::BadRequest("Date and data are required".to_string()));
    };

    let key = state.storage_key(ReportKind::Floor, &date);
    let report = state.store.create_floor(&key, data)?;
    refresh::rebuild(&state).await;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Saved successfully", "report": report })),
    ))
}

async fn update_floor_report(
    State(state): State<Arc<AppState>>,
    body: Result<Json<FloorReportBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body?;
    let date = non_empty(body.date).ok_or_else(|| ApiError::BadRequest("Date is required".to_string()))?;
    let data = body
        .data
        .ok_or_else(|| ApiError::BadRequest("Data is required".to_string()))?;

    let key = state.storage_key(ReportKind::Floor, &date);
    let updated = state.store.update_floor(&key, data)?;
    refresh::rebuild(&state).await;

    Ok(Json(json!({ "message": "Updated successfully", "updated": updated })))
}

async fn delete_floor_report(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DateQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let date = non_empty(query.date).ok_or_else(|| ApiError::BadRequest("Date is required".to_string()))?;

    let key = state.storage_key(ReportKind::Floor, &date);
    state.store.delete_floor(&key)?;
    refresh::rebuild(&state).await;

    Ok(Json(json!({ "message": "Deleted successfully" })))
}

async fn list_hourly_reports(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({ "reports": state.store.hourly_reports() }))
}

async fn create_hourly_report(
    State(state): State<Arc<AppState>>,
    body: Result<Json<HourlyReportBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body?;
    let (Some(date), Some(data)) = (non_empty(body.date), body.data) else {
        return Err(ApiError::BadRequest("Date and data required".to_string()));
    };

    let key = state.storage_key(ReportKind::Hourly, &date);
    let report = state.store.create_hourly(&key, data)?;
    refresh::rebuild(&state).await;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Saved successfully", "report": report })),
    ))
}

async fn update_hourly_report(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IdQuery>,
    body: Result<Json<HourlyReportBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body?;
    let (Some(id), Some(data)) = (non_empty(query.id), body.data) else {
        return Err(ApiError::BadRequest("ID and data required".to_string()));
    };

    let updated = state.store.update_hourly(&id, data)?;
    refresh::rebuild(&state).await;

    Ok(Json(json!({ "message": "Updated successfully", "updated": updated })))
}

async fn list_fob_reports(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({ "reports": state.store.fob_reports() }))
}

async fn create_fob_report(
    State(state): State<Arc<AppState>>,
    body: Result<Json<FobReportBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body?;
    // Zero counts as missing for a new FOB report.
    let present = |q: Option<Quantity>| q.filter(|q| !q.is_zero());
    let (Some(date), Some(monthly), Some(yearly), Some(runday)) = (
        non_empty(body.date),
        present(body.monthly_upto_fob),
        present(body.yearly_upto_fob),
        present(body.runday),
    ) else {
        return Err(ApiError::BadRequest("All fields are required".to_string()));
    };

    let key = state.storage_key(ReportKind::Fob, &date);
    let report = state.store.create_fob(&key, monthly, yearly, runday)?;
    refresh::rebuild(&state).await;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Saved successfully", "report": report })),
    ))
}

async fn update_fob_report(
    State(state): State<Arc<AppState>>,
    body: Result<Json<FobReportBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body?;
    let date = non_empty(body.date).ok_or_else(|| ApiError::BadRequest("Date is required".to_string()))?;

    let key = state.storage_key(ReportKind::Fob, &date);
    let updated = state.store.update_fob(
        &key,
        body.monthly_upto_fob,
        body.yearly_upto_fob,
        body.runday,
    )?;
    refresh::rebuild(&state).await;

    Ok(Json(json!({ "message": "Updated successfully", "updated": updated })))
}

async fn export_csv(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let view = state.current_view();
    let table = select_table(&view, query.view.as_deref())?;
    let csv = downloader::to_csv(table);

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"floor-table.csv\""),
        ],
        csv,
    )
        .into_response())
}

async fn export_xlsx(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let view = state.current_view();
    let table = select_table(&view, query.view.as_deref())?;

    let bytes = downloader::to_xlsx(table)?;

    Ok((
        [
            (
                header::CONTENT_TYPE,
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            ),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"floor-table.xlsx\""),
        ],
        bytes,
    )
        .into_response())
}

fn select_table<'a>(view: &'a DashboardView, name: Option<&str>) -> Result<&'a FloorTable, ApiError> {
    match name.unwrap_or("summary").to_lowercase().as_str() {
        "summary" => Ok(&view.summary),
        "editor" => Ok(&view.editor),
        other => Err(ApiError::BadRequest(format!("Unknown view: {}", other))),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
