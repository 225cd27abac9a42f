#![forbid(unsafe_code)]

use std::{
    collections::HashMap,
    env,
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use pythia_adapter::{
    AdapterRuntime, ClaimMatchRunAdapterRequest, ClaimMatchRunAdapterResponse,
    CompleteMatchRunAdapterRequest, CreateVersionAdapterRequest, CreateVersionAdapterResponse,
    EnqueueMatchRunAdapterRequest, ExplainAdapterResponse, GateCheckAdapterRequest,
    GateCheckAdapterResponse, MatchRunStatusAdapterResponse, RuntimeConfigAdapterResponse,
    TopMatchesAdapterResponse, WorkerPassAdapterResponse,
};

type SharedRuntime = Arc<Mutex<AdapterRuntime>>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let bind = env::var("PYTHIA_HTTP_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    let addr: SocketAddr = bind.parse()?;
    let worker_pass_enabled = parse_worker_pass_enabled_from_env();
    let worker_pass_interval_ms = parse_worker_pass_interval_ms_from_env();

    let runtime = Arc::new(Mutex::new(AdapterRuntime::default_from_env()?));
    if worker_pass_enabled {
        let runtime_for_worker = runtime.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(worker_pass_interval_ms));
            loop {
                ticker.tick().await;
                let pass_result = match runtime_for_worker.lock() {
                    Ok(mut runtime) => runtime.run_worker_pass(),
                    Err(_) => Err("adapter runtime lock poisoned".to_string()),
                };
                if let Err(err) = pass_result {
                    eprintln!("pythia_adapter_http worker pass failed: {err}");
                }
            }
        });
    }
    let app = Router::new()
        .route("/v1/weights/versions", post(create_version))
        .route("/v1/runtime-config", get(runtime_config))
        .route("/v1/explain/:startup_id", get(explain))
        .route("/v1/ml/gate-check", post(gate_check))
        .route("/v1/match-runs/enqueue", post(enqueue_match_run))
        .route("/v1/match-runs/claim", post(claim_match_run))
        .route("/v1/match-runs/complete", post(complete_match_run))
        .route("/v1/match-runs/top-matches", get(top_matches))
        .route("/v1/worker/pass", post(worker_pass))
        .with_state(runtime);

    println!(
        "pythia_adapter_http listening on http://{addr} (worker_pass_enabled={worker_pass_enabled} interval_ms={worker_pass_interval_ms})"
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn parse_worker_pass_enabled_from_env() -> bool {
    match env::var("PYTHIA_WORKER_PASS_ENABLED") {
        Ok(v) => !matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "0" | "false" | "off" | "no"
        ),
        Err(_) => true,
    }
}

fn parse_worker_pass_interval_ms_from_env() -> u64 {
    env::var("PYTHIA_WORKER_PASS_INTERVAL_MS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| (1_000..=600_000).contains(v))
        .unwrap_or(10_000)
}

async fn create_version(
    State(runtime): State<SharedRuntime>,
    Json(request): Json<CreateVersionAdapterRequest>,
) -> (StatusCode, Json<CreateVersionAdapterResponse>) {
    let mut runtime = match runtime.lock() {
        Ok(runtime) => runtime,
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(CreateVersionAdapterResponse {
                    status: "error".to_string(),
                    version_id: None,
                    content_hash_sha256: None,
                    reason: Some("adapter runtime lock poisoned".to_string()),
                }),
            )
        }
    };
    match runtime.create_version(request) {
        Ok(response) if response.status == "ok" => (StatusCode::OK, Json(response)),
        Ok(response) => (StatusCode::BAD_REQUEST, Json(response)),
        Err(reason) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(CreateVersionAdapterResponse {
                status: "error".to_string(),
                version_id: None,
                content_hash_sha256: None,
                reason: Some(reason),
            }),
        ),
    }
}

async fn runtime_config(
    State(runtime): State<SharedRuntime>,
) -> (StatusCode, Json<RuntimeConfigAdapterResponse>) {
    match runtime.lock() {
        Ok(runtime) => {
            let report = runtime.runtime_config_report();
            let code = if report.status == "ok" {
                StatusCode::OK
            } else {
                StatusCode::SERVICE_UNAVAILABLE
            };
            (code, Json(report))
        }
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(RuntimeConfigAdapterResponse {
                status: "error".to_string(),
                active_weights_version: None,
                override_weights_version: None,
                effective_weights_version: None,
                freeze: None,
                updated_at_ns: None,
                reason: Some("adapter runtime lock poisoned".to_string()),
            }),
        ),
    }
}

async fn explain(
    State(runtime): State<SharedRuntime>,
    Path(startup_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Json<ExplainAdapterResponse>) {
    let error_response = |reason: String| ExplainAdapterResponse {
        status: "error".to_string(),
        found: false,
        weights_version: None,
        explain: None,
        reason: Some(reason),
    };
    let runtime = match runtime.lock() {
        Ok(runtime) => runtime,
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(error_response("adapter runtime lock poisoned".to_string())),
            )
        }
    };
    match runtime.explain_report(&startup_id, params.get("weights_version").map(String::as_str)) {
        Ok(response) => (StatusCode::OK, Json(response)),
        Err(reason) => (StatusCode::BAD_REQUEST, Json(error_response(reason))),
    }
}

async fn gate_check(
    State(runtime): State<SharedRuntime>,
    Json(request): Json<GateCheckAdapterRequest>,
) -> (StatusCode, Json<GateCheckAdapterResponse>) {
    let error_response = |reason: String| GateCheckAdapterResponse {
        status: "error".to_string(),
        passed: None,
        gates: None,
        summary: None,
        reason: Some(reason),
    };
    let runtime = match runtime.lock() {
        Ok(runtime) => runtime,
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(error_response("adapter runtime lock poisoned".to_string())),
            )
        }
    };
    match runtime.gate_check(request) {
        Ok(response) => (StatusCode::OK, Json(response)),
        Err(reason) => (StatusCode::BAD_REQUEST, Json(error_response(reason))),
    }
}

async fn enqueue_match_run(
    State(runtime): State<SharedRuntime>,
    Json(request): Json<EnqueueMatchRunAdapterRequest>,
) -> (StatusCode, Json<MatchRunStatusAdapterResponse>) {
    run_match_run_op(runtime, move |rt| rt.enqueue_match_run(request))
}

async fn complete_match_run(
    State(runtime): State<SharedRuntime>,
    Json(request): Json<CompleteMatchRunAdapterRequest>,
) -> (StatusCode, Json<MatchRunStatusAdapterResponse>) {
    run_match_run_op(runtime, move |rt| rt.complete_match_run(request))
}

fn run_match_run_op(
    runtime: SharedRuntime,
    op: impl FnOnce(&mut AdapterRuntime) -> Result<MatchRunStatusAdapterResponse, String>,
) -> (StatusCode, Json<MatchRunStatusAdapterResponse>) {
    let error_response = |reason: String| MatchRunStatusAdapterResponse {
        status: "error".to_string(),
        run_id: None,
        run_status: None,
        match_count: None,
        error_code: None,
        reason: Some(reason),
    };
    let mut runtime = match runtime.lock() {
        Ok(runtime) => runtime,
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(error_response("adapter runtime lock poisoned".to_string())),
            )
        }
    };
    match op(&mut runtime) {
        Ok(response) => (StatusCode::OK, Json(response)),
        Err(reason) => (StatusCode::BAD_REQUEST, Json(error_response(reason))),
    }
}

async fn claim_match_run(
    State(runtime): State<SharedRuntime>,
    Json(request): Json<ClaimMatchRunAdapterRequest>,
) -> (StatusCode, Json<ClaimMatchRunAdapterResponse>) {
    let error_response = |reason: String| ClaimMatchRunAdapterResponse {
        status: "error".to_string(),
        claimed: false,
        run_id: None,
        startup_id: None,
        reason: Some(reason),
    };
    let mut runtime = match runtime.lock() {
        Ok(runtime) => runtime,
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(error_response("adapter runtime lock poisoned".to_string())),
            )
        }
    };
    match runtime.claim_match_run(request) {
        Ok(response) => (StatusCode::OK, Json(response)),
        Err(reason) => (StatusCode::BAD_REQUEST, Json(error_response(reason))),
    }
}

async fn top_matches(
    State(runtime): State<SharedRuntime>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Json<TopMatchesAdapterResponse>) {
    let error_response = |reason: String| TopMatchesAdapterResponse {
        status: "error".to_string(),
        rows: vec![],
        reason: Some(reason),
    };
    let runtime = match runtime.lock() {
        Ok(runtime) => runtime,
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(error_response("adapter runtime lock poisoned".to_string())),
            )
        }
    };
    let Some(startup_id) = params.get("startup_id") else {
        return (
            StatusCode::BAD_REQUEST,
            Json(error_response("startup_id query param required".to_string())),
        );
    };
    let limit = params.get("limit").and_then(|v| v.parse::<usize>().ok());
    match runtime.top_matches(startup_id, limit) {
        Ok(response) => (StatusCode::OK, Json(response)),
        Err(reason) => (StatusCode::BAD_REQUEST, Json(error_response(reason))),
    }
}

async fn worker_pass(
    State(runtime): State<SharedRuntime>,
) -> (StatusCode, Json<WorkerPassAdapterResponse>) {
    let error_response = |reason: String| WorkerPassAdapterResponse {
        status: "error".to_string(),
        outcome: "FAILED".to_string(),
        reclaimed: 0,
        runs: vec![],
        reason: Some(reason),
    };
    let mut runtime = match runtime.lock() {
        Ok(runtime) => runtime,
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(error_response("adapter runtime lock poisoned".to_string())),
            )
        }
    };
    match runtime.run_worker_pass() {
        Ok(response) => (StatusCode::OK, Json(response)),
        Err(reason) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(error_response(reason)),
        ),
    }
}
