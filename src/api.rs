//! JSON inspection surface: read-only snapshots, manual unblock, and
//! event injection for demos and testing.

use anyhow::Context;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::firewall::FirewallBackend;
use crate::simulator::Simulator;
use crate::store::{Alert, Service, Store};
use crate::utils::rfc3339;

/// Default number of events staged by /api/simulate.
const DEFAULT_SIM_COUNT: u64 = 10;

/// Upper bound accepted for a single injection.
const MAX_SIM_COUNT: u64 = 1000;

/// Shared handles for the request handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub simulator: Arc<Simulator>,
    pub firewall: Arc<dyn FirewallBackend>,
}

/// Aggregated payload returned by /api/dashboard.
#[derive(Debug, Serialize)]
struct DashboardSnapshot {
    status: StatusSnapshot,
    stats: StatsSnapshot,
    logs: Vec<String>,
    alerts: Vec<Alert>,
    blocked: Vec<String>,
}

#[derive(Debug, Serialize)]
struct StatusSnapshot {
    status: &'static str,
    msg: &'static str,
}

#[derive(Debug, Serialize)]
struct StatsSnapshot {
    ssh: u64,
    ftp: u64,
    apache: u64,
}

fn status_snapshot() -> StatusSnapshot {
    StatusSnapshot {
        status: "OK",
        msg: "SecureMonitor is running",
    }
}

fn stats_snapshot(store: &Store) -> StatsSnapshot {
    StatsSnapshot {
        ssh: store.count(Service::Ssh),
        ftp: store.count(Service::Ftp),
        apache: store.count(Service::Apache),
    }
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/status", get(handle_status))
        .route("/api/logs", get(handle_logs))
        .route("/api/alerts", get(handle_alerts))
        .route("/api/stats", get(handle_stats))
        .route("/api/blocked", get(handle_blocked))
        .route("/api/dashboard", get(handle_dashboard))
        .route("/api/unblock", post(handle_unblock))
        .route("/api/simulate", get(handle_simulate).post(handle_simulate))
        .with_state(state)
}

/// Bind the listener and serve the API in a background task.
pub async fn serve(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind api listener on {}", addr))?;
    info!("api listening on {}", addr);

    tokio::spawn(async move {
        let app = router(state).into_make_service_with_connect_info::<SocketAddr>();
        if let Err(e) = axum::serve(listener, app).await {
            error!("api server error: {}", e);
        }
    });

    Ok(())
}

async fn handle_status() -> Json<StatusSnapshot> {
    Json(status_snapshot())
}

async fn handle_logs(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.store.logs())
}

async fn handle_alerts(State(state): State<AppState>) -> Json<Vec<Alert>> {
    Json(state.store.alerts())
}

async fn handle_stats(State(state): State<AppState>) -> Json<StatsSnapshot> {
    Json(stats_snapshot(&state.store))
}

async fn handle_blocked(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.store.blocked_ips())
}

async fn handle_dashboard(State(state): State<AppState>) -> Json<DashboardSnapshot> {
    Json(DashboardSnapshot {
        status: status_snapshot(),
        stats: stats_snapshot(&state.store),
        logs: state.store.logs(),
        alerts: state.store.alerts(),
        blocked: state.store.blocked_ips(),
    })
}

#[derive(Debug, Deserialize)]
struct UnblockParams {
    ip: Option<String>,
}

async fn handle_unblock(
    State(state): State<AppState>,
    Query(params): Query<UnblockParams>,
) -> Response {
    let Some(ip) = params.ip.filter(|ip| !ip.trim().is_empty()) else {
        return (StatusCode::BAD_REQUEST, "missing ip parameter").into_response();
    };

    if let Err(e) = state.firewall.unblock(&ip).await {
        warn!("firewall: failed to unblock {}: {:#}", ip, e);
    }
    state.store.remove_blocked(&ip);
    state
        .store
        .add_log(format!("[FIREWALL] unblocked via dashboard: {}", ip));

    StatusCode::NO_CONTENT.into_response()
}

#[derive(Debug, Deserialize)]
struct SimulateParams {
    kind: Option<String>,
    n: Option<String>,
}

#[derive(Debug, Serialize)]
struct SimulateResponse {
    ok: bool,
    kind: Service,
    count: u64,
    ip: String,
    timestamp: String,
}

async fn handle_simulate(
    State(state): State<AppState>,
    Query(params): Query<SimulateParams>,
    headers: HeaderMap,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> Response {
    let kind = params.kind.as_deref().unwrap_or("ssh");
    let Ok(service) = kind.parse::<Service>() else {
        return (
            StatusCode::BAD_REQUEST,
            "invalid kind (use ssh|ftp|apache)",
        )
            .into_response();
    };

    let count = parse_sim_count(params.n.as_deref());
    let ip = client_ip(&headers, peer);

    state.simulator.add(service, &ip, count);
    state.store.add_log(format!(
        "[SIM] scheduled {} {} events from {}",
        count, service, ip
    ));

    Json(SimulateResponse {
        ok: true,
        kind: service,
        count,
        ip,
        timestamp: rfc3339(&Utc::now()),
    })
    .into_response()
}

/// Parse the injection count, falling back to the default for anything
/// non-numeric or outside the accepted range.
fn parse_sim_count(raw: Option<&str>) -> u64 {
    raw.and_then(|s| s.parse::<u64>().ok())
        .filter(|&n| n >= 1 && n <= MAX_SIM_COUNT)
        .unwrap_or(DEFAULT_SIM_COUNT)
}

/// Resolve the requesting client address: the first X-Forwarded-For entry
/// when present, the socket peer otherwise.
fn client_ip(headers: &HeaderMap, peer: SocketAddr) -> String {
    if let Some(xff) = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
    {
        if let Some(first) = xff.split(',').next() {
            let trimmed = first.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
    }
    peer.ip().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> SocketAddr {
        "192.0.2.10:45678".parse().unwrap()
    }

    #[test]
    fn test_parse_sim_count_defaults_and_bounds() {
        assert_eq!(parse_sim_count(None), 10);
        assert_eq!(parse_sim_count(Some("25")), 25);
        assert_eq!(parse_sim_count(Some("1")), 1);
        assert_eq!(parse_sim_count(Some("1000")), 1000);
        assert_eq!(parse_sim_count(Some("0")), 10);
        assert_eq!(parse_sim_count(Some("1001")), 10);
        assert_eq!(parse_sim_count(Some("many")), 10);
        assert_eq!(parse_sim_count(Some("-3")), 10);
    }

    #[test]
    fn test_client_ip_prefers_forwarded_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            "203.0.113.9, 198.51.100.7".parse().unwrap(),
        );
        assert_eq!(client_ip(&headers, peer()), "203.0.113.9");
    }

    #[test]
    fn test_client_ip_falls_back_to_peer() {
        assert_eq!(client_ip(&HeaderMap::new(), peer()), "192.0.2.10");

        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "".parse().unwrap());
        assert_eq!(client_ip(&headers, peer()), "192.0.2.10");
    }

    #[test]
    fn test_status_snapshot_shape() {
        let json = serde_json::to_value(status_snapshot()).unwrap();
        assert_eq!(json["status"], "OK");
        assert_eq!(json["msg"], "SecureMonitor is running");
    }

    #[test]
    fn test_router_builds() {
        let state = AppState {
            store: Arc::new(Store::new()),
            simulator: Arc::new(Simulator::new()),
            firewall: Arc::new(crate::firewall::mock::MockFirewall::new()),
        };
        let _ = router(state);
    }
}
