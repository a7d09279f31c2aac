use crate::error::AppError;
use crate::infra::{deserialize_date, ApiState, AppState};
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Extension, Json, Router};
use chrono::NaiveDate;
use kpi_rewards::workflows::integrity::{IntegrityReport, SweepMode};
use kpi_rewards::workflows::records::lifecycle::parse_actual;
use kpi_rewards::workflows::records::{
    EmployeeId, KpiId, KpiRecord, KpiRecordStatus, RecordFilter, RecordId, RecordServiceError,
};
use kpi_rewards::workflows::rewards::{CalculationId, Frequency, RewardCalculation};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub(crate) fn api_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route(
            "/api/v1/kpi-records",
            post(assign_record).get(list_records),
        )
        .route("/api/v1/kpi-records/:record_id", get(get_record))
        .route("/api/v1/kpi-records/:record_id/actual", put(update_actual))
        .route("/api/v1/kpi-records/:record_id/submit", post(submit_report))
        .route("/api/v1/kpi-records/:record_id/approve", post(approve_record))
        .route("/api/v1/kpi-records/:record_id/reject", post(reject_record))
        .route("/api/v1/reward-calculations", post(calculate_rewards))
        .route(
            "/api/v1/reward-calculations/:calculation_id",
            get(get_calculation),
        )
        .route(
            "/api/v1/reward-calculations/:calculation_id/approve",
            post(approve_calculation),
        )
        .route(
            "/api/v1/reward-calculations/:calculation_id/reject",
            post(reject_calculation),
        )
        .route(
            "/api/v1/employees/:employee_id/reward-calculations",
            get(calculation_history),
        )
        .route(
            "/api/v1/employees/:employee_id/reward-calculations/latest",
            get(latest_calculation),
        )
        .route("/api/v1/integrity-sweeps", post(run_integrity_sweep))
        .with_state(state)
}

pub(crate) async fn healthcheck() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AssignRequest {
    pub(crate) kpi_id: String,
    pub(crate) employee_id: String,
    pub(crate) target: Decimal,
    #[serde(deserialize_with = "deserialize_date")]
    pub(crate) start_date: NaiveDate,
    #[serde(deserialize_with = "deserialize_date")]
    pub(crate) end_date: NaiveDate,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RecordQuery {
    #[serde(default)]
    pub(crate) employee_id: Option<String>,
    #[serde(default)]
    pub(crate) status: Option<String>,
}

/// `actual` arrives as a JSON number or string; anything non-numeric is a validation error.
#[derive(Debug, Deserialize)]
pub(crate) struct ActualRequest {
    pub(crate) actual: Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReportRequest {
    pub(crate) report: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RejectRequest {
    #[serde(default)]
    pub(crate) reason: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CalculateRequest {
    pub(crate) employee_id: String,
    pub(crate) period: String,
    pub(crate) frequency: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ApproveCalculationRequest {
    #[serde(default)]
    pub(crate) approved_by: String,
    #[serde(default)]
    pub(crate) notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PeriodQuery {
    pub(crate) period: String,
    pub(crate) frequency: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SweepRequest {
    #[serde(default)]
    pub(crate) apply: bool,
}

/// Calculation as served over HTTP, with the payout after the configured clamp.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CalculationView {
    #[serde(flatten)]
    pub(crate) calculation: RewardCalculation,
    pub(crate) payable_amount: Decimal,
}

fn calculation_view(state: &ApiState, calculation: RewardCalculation) -> CalculationView {
    let payable_amount =
        calculation.payable_amount(state.rewards.settings().clamp_net_at_zero);
    CalculationView {
        calculation,
        payable_amount,
    }
}

fn frequency(raw: &str) -> Result<Frequency, AppError> {
    Frequency::parse(raw).ok_or_else(|| {
        AppError::InvalidRequest(format!(
            "frequency '{raw}' must be monthly, quarterly or annually"
        ))
    })
}

pub(crate) async fn assign_record(
    State(state): State<ApiState>,
    Json(request): Json<AssignRequest>,
) -> Result<impl IntoResponse, AppError> {
    let record = state.records.assign(
        KpiId(request.kpi_id),
        EmployeeId(request.employee_id),
        request.target,
        request.start_date,
        request.end_date,
    )?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub(crate) async fn list_records(
    State(state): State<ApiState>,
    Query(query): Query<RecordQuery>,
) -> Result<Json<Vec<KpiRecord>>, AppError> {
    let mut filter = RecordFilter::default();
    if let Some(employee_id) = query.employee_id {
        filter.employee_id = Some(EmployeeId(employee_id));
    }
    if let Some(raw) = query.status {
        let status = KpiRecordStatus::parse(&raw)
            .ok_or_else(|| AppError::InvalidRequest(format!("unknown status '{raw}'")))?;
        filter = filter.with_status(status);
    }
    Ok(Json(state.records.list(&filter)?))
}

pub(crate) async fn get_record(
    State(state): State<ApiState>,
    Path(record_id): Path<String>,
) -> Result<Json<KpiRecord>, AppError> {
    Ok(Json(state.records.get(&RecordId(record_id))?))
}

pub(crate) async fn update_actual(
    State(state): State<ApiState>,
    Path(record_id): Path<String>,
    Json(request): Json<ActualRequest>,
) -> Result<Json<KpiRecord>, AppError> {
    let raw = match request.actual {
        Value::String(raw) => raw,
        Value::Number(number) => number.to_string(),
        other => other.to_string(),
    };
    let actual = parse_actual(&raw).map_err(RecordServiceError::from)?;
    Ok(Json(state.records.update_actual(&RecordId(record_id), actual)?))
}

pub(crate) async fn submit_report(
    State(state): State<ApiState>,
    Path(record_id): Path<String>,
    Json(request): Json<ReportRequest>,
) -> Result<Json<KpiRecord>, AppError> {
    Ok(Json(
        state
            .records
            .submit_report(&RecordId(record_id), request.report)?,
    ))
}

pub(crate) async fn approve_record(
    State(state): State<ApiState>,
    Path(record_id): Path<String>,
) -> Result<Json<KpiRecord>, AppError> {
    Ok(Json(state.records.approve(&RecordId(record_id))?))
}

pub(crate) async fn reject_record(
    State(state): State<ApiState>,
    Path(record_id): Path<String>,
    Json(request): Json<RejectRequest>,
) -> Result<Json<KpiRecord>, AppError> {
    Ok(Json(
        state
            .records
            .reject(&RecordId(record_id), request.reason)?,
    ))
}

pub(crate) async fn calculate_rewards(
    State(state): State<ApiState>,
    Json(request): Json<CalculateRequest>,
) -> Result<impl IntoResponse, AppError> {
    let frequency = frequency(&request.frequency)?;
    let calculation = state.rewards.calculate(
        &EmployeeId(request.employee_id),
        &request.period,
        frequency,
    )?;
    Ok((StatusCode::CREATED, Json(calculation_view(&state, calculation))))
}

pub(crate) async fn get_calculation(
    State(state): State<ApiState>,
    Path(calculation_id): Path<String>,
) -> Result<Json<CalculationView>, AppError> {
    let calculation = state.rewards.get(&CalculationId(calculation_id))?;
    Ok(Json(calculation_view(&state, calculation)))
}

pub(crate) async fn approve_calculation(
    State(state): State<ApiState>,
    Path(calculation_id): Path<String>,
    Json(request): Json<ApproveCalculationRequest>,
) -> Result<Json<CalculationView>, AppError> {
    let calculation = state.rewards.approve(
        &CalculationId(calculation_id),
        &request.approved_by,
        request.notes,
    )?;
    Ok(Json(calculation_view(&state, calculation)))
}

pub(crate) async fn reject_calculation(
    State(state): State<ApiState>,
    Path(calculation_id): Path<String>,
    Json(request): Json<RejectRequest>,
) -> Result<Json<CalculationView>, AppError> {
    let calculation = state
        .rewards
        .reject(&CalculationId(calculation_id), &request.reason)?;
    Ok(Json(calculation_view(&state, calculation)))
}

pub(crate) async fn calculation_history(
    State(state): State<ApiState>,
    Path(employee_id): Path<String>,
) -> Result<Json<Vec<CalculationView>>, AppError> {
    let history = state.rewards.history(&EmployeeId(employee_id))?;
    Ok(Json(
        history
            .into_iter()
            .map(|calculation| calculation_view(&state, calculation))
            .collect(),
    ))
}

pub(crate) async fn latest_calculation(
    State(state): State<ApiState>,
    Path(employee_id): Path<String>,
    Query(query): Query<PeriodQuery>,
) -> Result<impl IntoResponse, AppError> {
    let frequency = frequency(&query.frequency)?;
    let latest = state
        .rewards
        .latest(&EmployeeId(employee_id), &query.period, frequency)?;
    Ok(match latest {
        Some(calculation) => (
            StatusCode::OK,
            Json(json!(calculation_view(&state, calculation))),
        ),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "no calculation for this period" })),
        ),
    })
}

pub(crate) async fn run_integrity_sweep(
    State(state): State<ApiState>,
    Json(request): Json<SweepRequest>,
) -> Result<Json<IntegrityReport>, AppError> {
    let mode = if request.apply {
        SweepMode::Apply
    } else {
        SweepMode::ReportOnly
    };
    Ok(Json(state.sweep.run(mode)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{DirectorySeed, InMemoryDirectory, InMemoryProgramStore, Stores};
    use axum::body::Body;
    use axum::http::Request;
    use kpi_rewards::config::RewardSettings;
    use kpi_rewards::workflows::records::{EmployeeProfile, KpiDefinition, KpiRecordRepository};
    use kpi_rewards::workflows::rewards::{
        ConditionRule, ConditionSpec, CriterionType, MetricSource, RewardCriterion, RewardProgram,
    };
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    fn program() -> RewardProgram {
        RewardProgram {
            id: "prog-sales".to_string(),
            name: "Sales incentives".to_string(),
            version: 1,
            position: "Sales Associate".to_string(),
            year: 2025,
            monthly_rewards: vec![RewardCriterion {
                name: "target bonus".to_string(),
                description: String::new(),
                criterion_type: CriterionType::Fixed,
                value: Decimal::new(2_000_000, 0),
                max_value: None,
                base_value: None,
                metric: MetricSource::TotalActual,
                conditions: vec![ConditionSpec {
                    description: "all targets met".to_string(),
                    rule: ConditionRule::AllTargetsMet,
                }],
            }],
            quarterly_rewards: Vec::new(),
            annual_rewards: Vec::new(),
            penalties: Vec::new(),
        }
    }

    fn stores() -> Stores {
        let stores = Stores {
            directory: InMemoryDirectory::from_seed(DirectorySeed {
                employees: vec![EmployeeProfile {
                    id: EmployeeId("emp-001".to_string()),
                    name: "Dana Rivera".to_string(),
                    position: "Sales Associate".to_string(),
                    department_id: None,
                }],
                kpis: vec![KpiDefinition {
                    id: KpiId("kpi-sales".to_string()),
                    name: "Revenue".to_string(),
                    unit: "IDR".to_string(),
                }],
            }),
            programs: InMemoryProgramStore::from_programs(vec![program()]),
            ..Stores::default()
        };

        let mut awaiting = KpiRecord::assigned(
            RecordId("r-awaiting".to_string()),
            KpiId("kpi-sales".to_string()),
            EmployeeId("emp-001".to_string()),
            Decimal::new(100, 0),
            date(2025, 1, 1),
            date(2025, 1, 31),
        );
        awaiting.actual = Decimal::new(120, 0);
        awaiting.status = KpiRecordStatus::AwaitingApproval;
        stores.records.insert(awaiting).expect("seed");

        let pending = KpiRecord::assigned(
            RecordId("r-pending".to_string()),
            KpiId("kpi-sales".to_string()),
            EmployeeId("emp-001".to_string()),
            Decimal::new(100, 0),
            date(2025, 1, 1),
            date(2025, 1, 31),
        );
        stores.records.insert(pending).expect("seed");
        stores
    }

    fn router(stores: &Stores) -> Router {
        let app_state = AppState {
            readiness: Arc::new(AtomicBool::new(true)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        };
        api_router(stores.api_state(RewardSettings::default())).layer(Extension(app_state))
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    #[tokio::test]
    async fn health_and_readiness_respond() {
        let stores = stores();
        let (status, body) = send(
            router(&stores),
            Request::get("/health").body(Body::empty()).expect("request"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, body) = send(
            router(&stores),
            Request::get("/ready").body(Body::empty()).expect("request"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ready");
    }

    #[tokio::test]
    async fn approving_a_pending_record_is_a_conflict() {
        let stores = stores();
        let (status, body) = send(
            router(&stores),
            json_request("POST", "/api/v1/kpi-records/r-pending/approve", json!({})),
        )
        .await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["kind"], "guard_violation");
    }

    #[tokio::test]
    async fn empty_rejection_reason_is_unprocessable() {
        let stores = stores();
        let (status, body) = send(
            router(&stores),
            json_request(
                "POST",
                "/api/v1/kpi-records/r-awaiting/reject",
                json!({ "reason": "  " }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["kind"], "validation");
    }

    #[tokio::test]
    async fn non_numeric_actual_is_unprocessable() {
        let stores = stores();
        let (status, body) = send(
            router(&stores),
            json_request(
                "PUT",
                "/api/v1/kpi-records/r-pending/actual",
                json!({ "actual": "fifty" }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["kind"], "validation");

        let (status, body) = send(
            router(&stores),
            json_request(
                "PUT",
                "/api/v1/kpi-records/r-pending/actual",
                json!({ "actual": 50 }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "pending");
    }

    #[tokio::test]
    async fn unknown_record_is_not_found() {
        let stores = stores();
        let (status, _) = send(
            router(&stores),
            Request::get("/api/v1/kpi-records/r-missing")
                .body(Body::empty())
                .expect("request"),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn approved_record_feeds_a_calculation() {
        let stores = stores();
        let (status, _) = send(
            router(&stores),
            json_request("POST", "/api/v1/kpi-records/r-awaiting/approve", json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            router(&stores),
            json_request(
                "POST",
                "/api/v1/reward-calculations",
                json!({ "employeeId": "emp-001", "period": "2025-01", "frequency": "monthly" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "calculated");
        assert_eq!(body["totalReward"], "2000000");
        assert_eq!(body["payableAmount"], "2000000");
        assert_eq!(body["breakdown"][0]["rewardAmount"], "2000000");

        let id = body["id"].as_str().expect("id").to_string();
        let (status, body) = send(
            router(&stores),
            json_request(
                "POST",
                &format!("/api/v1/reward-calculations/{id}/approve"),
                json!({ "approvedBy": "hr-admin" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "approved");
        assert_eq!(body["approvedBy"], "hr-admin");

        let (status, body) = send(
            router(&stores),
            Request::get("/api/v1/employees/emp-001/reward-calculations/latest?period=2025-01&frequency=monthly")
                .body(Body::empty())
                .expect("request"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], id.as_str());
    }

    #[tokio::test]
    async fn malformed_period_is_unprocessable() {
        let stores = stores();
        let (status, body) = send(
            router(&stores),
            json_request(
                "POST",
                "/api/v1/reward-calculations",
                json!({ "employeeId": "emp-001", "period": "2025-03", "frequency": "quarterly" }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["kind"], "configuration");
    }

    #[tokio::test]
    async fn integrity_sweep_reports_dangling_records() {
        let stores = stores();
        let mut orphan = KpiRecord::assigned(
            RecordId("r-orphan".to_string()),
            KpiId("kpi-retired".to_string()),
            EmployeeId("emp-001".to_string()),
            Decimal::new(100, 0),
            date(2025, 1, 1),
            date(2025, 1, 31),
        );
        orphan.status = KpiRecordStatus::Approved;
        stores.records.insert(orphan).expect("seed");

        let (status, body) = send(
            router(&stores),
            json_request("POST", "/api/v1/integrity-sweeps", json!({ "apply": true })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["scanned"], 3);
        assert_eq!(body["issues"][0]["recordId"], "r-orphan");
        assert_eq!(body["issues"][0]["problem"], "dangling_kpi");
        assert_eq!(body["issues"][0]["softDeleted"], true);
    }
}
