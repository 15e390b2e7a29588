use actix_web::{get, web, HttpResponse, Responder};
use serde::Serialize;

use crate::api::ingest::IngestService;

/// Health check response
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    accepting_jobs: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    jobs_tracked: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    jobs_in_flight: Option<usize>,
}

/// Health check endpoint
///
/// Reports job pool state. Use for uptime monitors.
#[get("/health")]
async fn health_check(service: web::Data<IngestService>) -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy",
        accepting_jobs: service.pool().is_accepting(),
        jobs_tracked: Some(service.ledger().len()),
        jobs_in_flight: Some(service.pool().in_flight()),
    })
}

/// Readiness check endpoint
///
/// Returns 503 once the job pool is draining so load balancers stop routing here.
#[get("/ready")]
async fn readiness_check(service: web::Data<IngestService>) -> impl Responder {
    if service.pool().is_accepting() {
        HttpResponse::Ok().json(HealthResponse {
            status: "ready",
            accepting_jobs: true,
            jobs_tracked: None,
            jobs_in_flight: None,
        })
    } else {
        HttpResponse::ServiceUnavailable().json(HealthResponse {
            status: "not_ready",
            accepting_jobs: false,
            jobs_tracked: None,
            jobs_in_flight: None,
        })
    }
}

/// Liveness check endpoint
///
/// Simple check that the process is alive. Does not check dependencies.
#[get("/live")]
async fn liveness_check() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "alive",
        accepting_jobs: true,
        jobs_tracked: None,
        jobs_in_flight: None,
    })
}

pub fn health_config(config: &mut web::ServiceConfig) {
    config
        .service(health_check)
        .service(readiness_check)
        .service(liveness_check);
}
