/// Liveness and readiness endpoints
use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Instant;

use crate::state::AppState;

#[derive(Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum ComponentStatus {
    Healthy,
    Unhealthy,
}

#[derive(Serialize)]
struct ComponentCheck {
    status: ComponentStatus,
    message: String,
    latency_ms: u64,
}

#[derive(Serialize)]
struct ReadinessResponse {
    ready: bool,
    status: ComponentStatus,
    checks: HashMap<String, ComponentCheck>,
    timestamp: String,
}

pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    match state.repo.health_check().await {
        Ok(_) => HttpResponse::Ok().json(serde_json::json!({
            "status": "ok",
            "service": "yatube-service",
            "version": env!("CARGO_PKG_VERSION")
        })),
        Err(e) => HttpResponse::ServiceUnavailable().json(serde_json::json!({
            "status": "unhealthy",
            "error": format!("Database check failed: {}", e),
            "service": "yatube-service"
        })),
    }
}

pub async fn readiness(state: web::Data<AppState>) -> HttpResponse {
    let mut checks = HashMap::new();

    let start = Instant::now();
    let database = match state.repo.health_check().await {
        Ok(_) => ComponentCheck {
            status: ComponentStatus::Healthy,
            message: "Database reachable".to_string(),
            latency_ms: start.elapsed().as_millis() as u64,
        },
        Err(e) => ComponentCheck {
            status: ComponentStatus::Unhealthy,
            message: format!("Database check failed: {}", e),
            latency_ms: start.elapsed().as_millis() as u64,
        },
    };
    checks.insert("database".to_string(), database);

    let start = Instant::now();
    let cache = match state.cache.get("health:probe").await {
        Ok(_) => ComponentCheck {
            status: ComponentStatus::Healthy,
            message: "Page cache reachable".to_string(),
            latency_ms: start.elapsed().as_millis() as u64,
        },
        Err(e) => ComponentCheck {
            status: ComponentStatus::Unhealthy,
            message: format!("Page cache check failed: {}", e),
            latency_ms: start.elapsed().as_millis() as u64,
        },
    };
    checks.insert("cache".to_string(), cache);

    let ready = checks
        .values()
        .all(|check| check.status == ComponentStatus::Healthy);
    let response = ReadinessResponse {
        ready,
        status: if ready {
            ComponentStatus::Healthy
        } else {
            ComponentStatus::Unhealthy
        },
        checks,
        timestamp: Utc::now().to_rfc3339(),
    };

    if ready {
        HttpResponse::Ok().json(response)
    } else {
        HttpResponse::ServiceUnavailable().json(response)
    }
}
