use axum::{
    Router,
    extract::{
        Json, Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{delete, get},
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::core::{SavingsProgress, SavingsSchedule, day_span, generate, summarize};

mod store;

pub use store::{PlanConfig, SavedDayRecord, SavingsStore, StoreError};

/// Longest plan the API will compute, roughly a century of daily deposits.
pub const MAX_PLAN_DAYS: i64 = 36_600;

const MAX_USERNAME_LEN: usize = 64;

#[derive(Clone, Default)]
pub struct AppState {
    store: Arc<SavingsStore>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SchedulePayload {
    target_amount: Option<i64>,
    start_date: Option<String>,
    end_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MarkSavedPayload {
    day: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScheduleRequest {
    target_amount: i64,
    start_date: NaiveDate,
    end_date: NaiveDate,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    has_config: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfigSavedResponse {
    success: bool,
    config: PlanConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SavedDaysResponse {
    saved_days: Vec<u32>,
    records: Vec<SavedDayRecord>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MarkSavedResponse {
    success: bool,
    record: SavedDayRecord,
}

#[derive(Debug, Serialize)]
struct SuccessResponse {
    success: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlanDay {
    day: u32,
    date: NaiveDate,
    amount: i64,
    saved: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlanResponse {
    config: PlanConfig,
    step_increment: i64,
    first_day_amount: i64,
    days: Vec<PlanDay>,
    progress: SavingsProgress,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/api/schedule",
            get(schedule_get_handler).post(schedule_post_handler),
        )
        .route("/api/users/:user/status", get(status_handler))
        .route(
            "/api/users/:user/config",
            get(config_get_handler).put(config_put_handler),
        )
        .route(
            "/api/users/:user/saved-days",
            get(saved_days_get_handler).post(saved_days_post_handler),
        )
        .route(
            "/api/users/:user/saved-days/:day",
            delete(saved_day_delete_handler),
        )
        .route("/api/users/:user/plan", get(plan_handler))
        .fallback(not_found_handler)
        .with_state(state)
}

pub async fn run_http_server(config: &ServerConfig) -> std::io::Result<()> {
    let app = build_router(AppState::new());
    let listener = TcpListener::bind(config.addr).await?;
    tracing::info!(address = %config.addr, "savings planner API listening");
    tracing::info!("Local access: http://127.0.0.1:{}/", config.addr.port());

    axum::serve(listener, app).await
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, HealthResponse { status: "ok" })
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn schedule_get_handler(query: Result<Query<SchedulePayload>, QueryRejection>) -> Response {
    match query {
        Ok(Query(payload)) => schedule_handler_impl(payload),
        Err(rejection) => rejection_response(&rejection.body_text()),
    }
}

async fn schedule_post_handler(body: Result<Json<SchedulePayload>, JsonRejection>) -> Response {
    match body {
        Ok(Json(payload)) => schedule_handler_impl(payload),
        Err(rejection) => rejection_response(&rejection.body_text()),
    }
}

fn schedule_handler_impl(payload: SchedulePayload) -> Response {
    let request = match schedule_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => {
            tracing::warn!(error = %msg, "rejected schedule request");
            return error_response(StatusCode::BAD_REQUEST, &msg);
        }
    };

    match generate(request.target_amount, request.start_date, request.end_date) {
        Ok(schedule) => {
            tracing::info!(
                days = schedule.day_count(),
                step_increment = schedule.step_increment,
                "computed schedule"
            );
            json_response(StatusCode::OK, schedule)
        }
        Err(err) => {
            tracing::warn!(error = %err, "rejected schedule request");
            error_response(StatusCode::BAD_REQUEST, &err.to_string())
        }
    }
}

async fn status_handler(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Response {
    let user = match user_or_error(path) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let has_config = state.store.has_config(&user).await;
    json_response(StatusCode::OK, StatusResponse { has_config })
}

async fn config_get_handler(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Response {
    let user = match user_or_error(path) {
        Ok(user) => user,
        Err(response) => return response,
    };
    match state.store.config(&user).await {
        Some(config) => json_response(StatusCode::OK, config),
        None => store_error_response(StoreError::NoConfig),
    }
}

async fn config_put_handler(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    body: Result<Json<SchedulePayload>, JsonRejection>,
) -> Response {
    let user = match user_or_error(path) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let payload = match body {
        Ok(Json(payload)) => payload,
        Err(rejection) => return rejection_response(&rejection.body_text()),
    };
    let request = match schedule_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => {
            tracing::warn!(user = %user, error = %msg, "rejected plan config");
            return error_response(StatusCode::BAD_REQUEST, &msg);
        }
    };

    let saved = state
        .store
        .save_config(
            &user,
            request.start_date,
            request.end_date,
            request.target_amount,
            Utc::now(),
        )
        .await;
    match saved {
        Ok(config) => {
            tracing::info!(
                user = %user,
                start_date = %config.start_date,
                end_date = %config.end_date,
                target_amount = config.target_amount,
                "saved plan config"
            );
            json_response(
                StatusCode::OK,
                ConfigSavedResponse {
                    success: true,
                    config,
                },
            )
        }
        Err(err) => store_error_response(err),
    }
}

async fn saved_days_get_handler(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Response {
    let user = match user_or_error(path) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let records = state.store.saved_records(&user).await;
    let saved_days = records.iter().map(|record| record.day).collect();
    json_response(StatusCode::OK, SavedDaysResponse { saved_days, records })
}

async fn saved_days_post_handler(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    body: Result<Json<MarkSavedPayload>, JsonRejection>,
) -> Response {
    let user = match user_or_error(path) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let payload = match body {
        Ok(Json(payload)) => payload,
        Err(rejection) => return rejection_response(&rejection.body_text()),
    };
    let Some(day) = payload.day else {
        return error_response(StatusCode::BAD_REQUEST, "day is required");
    };

    match state.store.mark_saved(&user, day, Utc::now()).await {
        Ok(record) => {
            tracing::info!(user = %user, day, amount = record.amount, "marked day as saved");
            json_response(
                StatusCode::OK,
                MarkSavedResponse {
                    success: true,
                    record,
                },
            )
        }
        Err(err) => store_error_response(err),
    }
}

async fn saved_day_delete_handler(
    State(state): State<AppState>,
    path: Result<Path<(String, u32)>, PathRejection>,
) -> Response {
    let (raw_user, day) = match path {
        Ok(Path(segments)) => segments,
        Err(rejection) => return rejection_response(&rejection.body_text()),
    };
    let user = match normalize_username(&raw_user) {
        Ok(user) => user,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };
    let removed = state.store.unmark_saved(&user, day).await;
    tracing::info!(user = %user, day, removed, "unmarked saved day");
    json_response(StatusCode::OK, SuccessResponse { success: true })
}

async fn plan_handler(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Response {
    let user = match user_or_error(path) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let (config, saved_days) = state.store.plan_snapshot(&user).await;
    let Some(config) = config else {
        return store_error_response(StoreError::NoConfig);
    };

    match config.schedule() {
        Ok(schedule) => json_response(
            StatusCode::OK,
            build_plan_response(config, &schedule, &saved_days),
        ),
        Err(err) => {
            tracing::error!(user = %user, error = %err, "stored plan no longer produces a schedule");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string())
        }
    }
}

fn build_plan_response(
    config: PlanConfig,
    schedule: &SavingsSchedule,
    saved_days: &BTreeSet<u32>,
) -> PlanResponse {
    let progress = summarize(schedule, config.target_amount, saved_days);
    let days = schedule
        .daily_amounts
        .iter()
        .map(|entry| PlanDay {
            day: entry.day,
            date: entry.date,
            amount: entry.amount,
            saved: saved_days.contains(&entry.day),
        })
        .collect();

    PlanResponse {
        config,
        step_increment: schedule.step_increment,
        first_day_amount: schedule.first_day_amount,
        days,
        progress,
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

fn store_error_response(err: StoreError) -> Response {
    let status = match err {
        StoreError::NoConfig => StatusCode::NOT_FOUND,
        StoreError::DayOutOfRange { .. } | StoreError::Schedule(_) => StatusCode::BAD_REQUEST,
    };
    if status == StatusCode::BAD_REQUEST {
        tracing::warn!(error = %err, "rejected store request");
    }
    error_response(status, &err.to_string())
}

/// Malformed bodies, query strings and path segments share the JSON error shape.
fn rejection_response(msg: &str) -> Response {
    tracing::warn!(error = %msg, "rejected malformed request");
    error_response(StatusCode::BAD_REQUEST, msg)
}

fn user_or_error(path: Result<Path<String>, PathRejection>) -> Result<String, Response> {
    let Path(raw) = path.map_err(|rejection| rejection_response(&rejection.body_text()))?;
    normalize_username(&raw).map_err(|msg| error_response(StatusCode::BAD_REQUEST, &msg))
}

fn normalize_username(raw: &str) -> Result<String, String> {
    let user = raw.trim();
    if user.is_empty() {
        return Err("username must not be empty".to_string());
    }
    if user.chars().count() > MAX_USERNAME_LEN {
        return Err(format!(
            "username must be at most {MAX_USERNAME_LEN} characters"
        ));
    }
    if user.contains('/') {
        return Err("username must not contain '/'".to_string());
    }
    Ok(user.to_string())
}

/// Accepts ISO `2024-01-31` as well as the `31/01/2024` display format.
fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, String> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d/%m/%Y"))
        .map_err(|_| format!("{field} must be a date like 2024-01-31, got {raw:?}"))
}

/// Rejects plans shorter than 2 days or longer than `MAX_PLAN_DAYS`.
pub fn check_plan_span(start_date: NaiveDate, end_date: NaiveDate) -> Result<i64, String> {
    let span = day_span(start_date, end_date);
    if span <= 1 {
        return Err("endDate must be at least 2 days after startDate".to_string());
    }
    if span > MAX_PLAN_DAYS {
        return Err(format!("plan may span at most {MAX_PLAN_DAYS} days"));
    }
    Ok(span)
}

#[cfg(test)]
fn schedule_request_from_json(json: &str) -> Result<ScheduleRequest, String> {
    let payload = serde_json::from_str::<SchedulePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    schedule_request_from_payload(payload)
}

fn schedule_request_from_payload(payload: SchedulePayload) -> Result<ScheduleRequest, String> {
    let Some(target_amount) = payload.target_amount else {
        return Err("targetAmount is required".to_string());
    };
    let Some(start_date) = payload.start_date else {
        return Err("startDate is required".to_string());
    };
    let Some(end_date) = payload.end_date else {
        return Err("endDate is required".to_string());
    };

    if target_amount <= 0 {
        return Err("targetAmount must be > 0".to_string());
    }

    let start_date = parse_date("startDate", &start_date)?;
    let end_date = parse_date("endDate", &end_date)?;

    check_plan_span(start_date, end_date)?;

    Ok(ScheduleRequest {
        target_amount,
        start_date,
        end_date,
    })
}
