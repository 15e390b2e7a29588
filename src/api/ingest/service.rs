use actix_web::{HttpResponse, ResponseError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use super::dto::IngestStarted;
use crate::api::validation::ErrorResponse;
use crate::ingest::ledger::new_job_id;
use crate::ingest::{IngestOptions, IngestOrchestrator, IngestRequest, JobLedger, JobView};
use crate::worker::JobPool;

/// Service-level errors
#[derive(Debug, Error)]
pub enum ServiceError {
    /// No job with this id
    #[error("Ingestion not found: {0}")]
    NotFound(String),

    /// The job pool is draining
    #[error("Service is shutting down")]
    ShuttingDown,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ResponseError for ServiceError {
    fn error_response(&self) -> HttpResponse {
        match self {
            ServiceError::NotFound(id) => {
                warn!("Ingestion not found: id={}", id);
                HttpResponse::NotFound().json(ErrorResponse::new(
                    "Not found",
                    format!("Ingestion with id {} not found", id),
                ))
            }
            ServiceError::ShuttingDown => {
                warn!("Rejecting ingestion request during shutdown");
                HttpResponse::ServiceUnavailable().json(ErrorResponse::new(
                    "Service unavailable",
                    "Service is shutting down",
                ))
            }
            ServiceError::Internal(msg) => {
                error!("Internal error: {}", msg);
                HttpResponse::InternalServerError().json(ErrorResponse::new(
                    "Failed to process request",
                    "Internal error occurred",
                ))
            }
        }
    }
}

/// Ingestion service: submits jobs to the pool and answers status polls
pub struct IngestService {
    ledger: Arc<JobLedger>,
    orchestrator: Arc<IngestOrchestrator>,
    pool: Arc<JobPool>,
}

impl IngestService {
    pub fn new(ledger: Arc<JobLedger>, orchestrator: Arc<IngestOrchestrator>, pool: Arc<JobPool>) -> Self {
        Self {
            ledger,
            orchestrator,
            pool,
        }
    }

    /// Submit an ingestion job
    ///
    /// # Business Logic
    /// - Registers the job and moves it to `running` before returning
    /// - Hands the job to the pool; never waits for it to finish
    ///
    /// # Returns
    /// - `Ok(IngestStarted)` - Job accepted, poll `status` with the id
    /// - `Err(ServiceError::ShuttingDown)` - Pool no longer accepts jobs
    pub fn submit(&self, request: &IngestRequest) -> Result<IngestStarted, ServiceError> {
        if !self.pool.is_accepting() {
            return Err(ServiceError::ShuttingDown);
        }

        let options = IngestOptions::from(request);
        let job_id = new_job_id();
        let job = self
            .ledger
            .register(&job_id, &options.mode.kinds())
            .ok_or_else(|| ServiceError::Internal(format!("job id collision: {}", job_id)))?;
        job.start();

        info!(
            "Service: Starting ingestion: id={}, mode={:?}, dryRun={}, chunkSize={}, retries={}, failFast={}",
            job_id, options.mode, options.dry_run, options.chunk_size, options.retries, options.fail_fast
        );

        let orchestrator = self.orchestrator.clone();
        let worker_job = job.clone();
        if self
            .pool
            .spawn(&job_id, async move {
                orchestrator.run(worker_job, options).await;
            })
            .is_err()
        {
            job.fail("service shutting down before job started".to_string());
            return Err(ServiceError::ShuttingDown);
        }

        Ok(IngestStarted::new(job_id))
    }

    /// Current view of a job
    pub fn status(&self, job_id: &str) -> Result<JobView, ServiceError> {
        self.ledger
            .snapshot(job_id)
            .ok_or_else(|| ServiceError::NotFound(job_id.to_string()))
    }

    pub fn ledger(&self) -> &JobLedger {
        &self.ledger
    }

    pub fn pool(&self) -> &JobPool {
        &self.pool
    }
}
