use axum::{extract::State, Json};
use serde::Serialize;

use crate::admin::AdminState;
use crate::memory::SessionSummary;

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub routes: usize,
    pub stores: Vec<StoreStatus>,
    pub memory_sessions: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct StoreStatus {
    pub key: String,
    pub kind: &'static str,
}

#[derive(Debug, Serialize)]
pub struct RouteStatus {
    pub pattern: String,
    pub handler: String,
    pub params: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionsStatus {
    pub enabled: bool,
    pub cookie_name: Option<String>,
    pub max_lifetime_secs: Option<u64>,
    pub count: usize,
    pub sessions: Vec<SessionSummary>,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let mut stores: Vec<StoreStatus> = state
        .services
        .stores
        .iter()
        .map(|(key, store)| StoreStatus {
            key: key.clone(),
            kind: store.kind(),
        })
        .collect();
    stores.sort_by(|a, b| a.key.cmp(&b.key));

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        uptime_secs: state.started_at.elapsed().as_secs(),
        routes: state.routes.len(),
        stores,
        memory_sessions: state.services.memory.as_ref().map(|m| m.len()),
    })
}

/// Routes in dispatch order.
pub async fn get_routes(State(state): State<AdminState>) -> Json<Vec<RouteStatus>> {
    let routes = state
        .routes
        .routes()
        .map(|route| RouteStatus {
            pattern: route.pattern().as_str().to_string(),
            handler: route.target().name().to_string(),
            params: route.pattern().param_names().to_vec(),
        })
        .collect();
    Json(routes)
}

pub async fn get_sessions(State(state): State<AdminState>) -> Json<SessionsStatus> {
    let status = match &state.services.memory {
        Some(manager) => {
            let sessions = manager.summaries();
            SessionsStatus {
                enabled: true,
                cookie_name: Some(manager.cookie_name().to_string()),
                max_lifetime_secs: Some(manager.max_lifetime().as_secs()),
                count: sessions.len(),
                sessions,
            }
        }
        None => SessionsStatus {
            enabled: false,
            cookie_name: None,
            max_lifetime_secs: None,
            count: 0,
            sessions: Vec::new(),
        },
    };
    Json(status)
}
