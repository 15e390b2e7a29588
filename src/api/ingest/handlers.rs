use actix_web::{
    get, post,
    web::{scope, Data, Path, ServiceConfig},
    HttpResponse,
};
use actix_web_validator::Json;
use tracing::debug;

use super::service::{IngestService, ServiceError};
use crate::ingest::IngestRequest;

#[post("")]
async fn start_ingest(
    service: Data<IngestService>,
    request: Json<IngestRequest>,
) -> Result<HttpResponse, ServiceError> {
    let started = service.submit(&request)?;
    Ok(HttpResponse::Accepted().json(started))
}

#[get("/{id}/status")]
async fn ingest_status(
    service: Data<IngestService>,
    id: Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let id = id.into_inner();
    let view = service.status(&id)?;
    debug!(
        "Ingestion status: id={}, status={:?}, filesProcessed={}/{}",
        id, view.status, view.files_processed, view.files_discovered
    );
    Ok(HttpResponse::Ok().json(view))
}

pub fn ingest_config(config: &mut ServiceConfig) {
    config.service(scope("/admin/ingest").service(start_ingest).service(ingest_status));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::validation;
    use crate::ingest::options::PRODUCTS_FILE;
    use crate::ingest::{IngestOrchestrator, JobLedger, MemoryLineSource};
    use crate::sink::LocalSink;
    use crate::worker::JobPool;
    use actix_web::{http::StatusCode, test, App};
    use std::sync::Arc;

    fn service() -> Data<IngestService> {
        let source = MemoryLineSource::new()
            .with_file(PRODUCTS_FILE, [r#"{"id":"p1","name":"A","basePrice":3.0,"country":"Germany"}"#]);
        let orchestrator = IngestOrchestrator::new(Arc::new(source), Arc::new(LocalSink::default()));
        Data::new(IngestService::new(
            Arc::new(JobLedger::default()),
            Arc::new(orchestrator),
            Arc::new(JobPool::new(2)),
        ))
    }

    #[actix_web::test]
    async fn start_then_poll_status() {
        let service = service();
        let app = test::init_service(
            App::new()
                .app_data(service.clone())
                .app_data(validation::json_config())
                .configure(ingest_config),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/admin/ingest")
            .set_json(serde_json::json!({"mode": "products", "chunkSize": 10}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "started");
        let id = body["ingestionId"].as_str().unwrap().to_string();

        service.pool().drain().await;

        let req = test::TestRequest::get()
            .uri(&format!("/admin/ingest/{}/status", id))
            .to_request();
        let view: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(view["ingestionId"], id.as_str());
        assert_eq!(view["status"], "completed");
        assert_eq!(view["filesDiscovered"], 1);
        assert_eq!(view["products"]["ingested"], 1);
    }

    #[actix_web::test]
    async fn unknown_job_returns_404() {
        let app = test::init_service(App::new().app_data(service()).configure(ingest_config)).await;

        let req = test::TestRequest::get()
            .uri("/admin/ingest/ing-missing/status")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn zero_chunk_size_is_rejected() {
        let service = service();
        let app = test::init_service(
            App::new()
                .app_data(service.clone())
                .app_data(validation::json_config())
                .configure(ingest_config),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/admin/ingest")
            .set_json(serde_json::json!({"chunkSize": 0}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(service.ledger().len(), 0);
    }
}
