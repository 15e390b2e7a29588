use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::ledger::{JobHandle, JobStatus};
use super::options::IngestOptions;
use super::scheduler::ChunkScheduler;
use super::source::LineSource;
use crate::error::JobFault;
use crate::sink::RecordSink;

/// Drives one ingestion job from `running` to a terminal status
pub struct IngestOrchestrator {
    source: Arc<dyn LineSource>,
    sink: Arc<dyn RecordSink>,
}

impl IngestOrchestrator {
    pub fn new(source: Arc<dyn LineSource>, sink: Arc<dyn RecordSink>) -> Self {
        Self { source, sink }
    }

    /// Run `job` to completion.
    ///
    /// The job must already be `running`. Per-record errors leave it
    /// `completed`; only a fault escaping file processing (read error,
    /// panic) makes it `failed`.
    pub async fn run(&self, job: JobHandle, options: IngestOptions) -> JobStatus {
        info!(
            job_id = job.id(),
            mode = ?options.mode,
            chunk_size = options.chunk_size,
            retries = options.retries,
            dry_run = options.dry_run,
            fail_fast = options.fail_fast,
            "Ingestion started"
        );

        let outcome = AssertUnwindSafe(self.process(&job, &options))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(JobFault::Panicked(panic_message(panic.as_ref()))));

        match outcome {
            Ok(()) => job.complete(),
            Err(fault) => {
                error!(job_id = job.id(), error = %fault, "Ingestion job failed");
                job.fail(fault.to_string());
            }
        }

        let view = job.snapshot();
        info!(
            job_id = job.id(),
            status = ?view.status,
            files_processed = view.files_processed,
            files_discovered = view.files_discovered,
            errors = view.error_sample.len() as u64 + view.errors_dropped,
            "Ingestion finished"
        );
        view.status
    }

    async fn process(&self, job: &JobHandle, options: &IngestOptions) -> Result<(), JobFault> {
        if options.chunk_size == 0 {
            return Err(JobFault::InvalidOptions("chunk size must be at least 1".into()));
        }

        let files = options.mode.files();
        job.set_files_discovered(files.len() as u32);
        let scheduler = ChunkScheduler::new(options);

        for (file, kind) in files {
            let lines = self.source.open(file).await.map_err(|source| JobFault::Io {
                file: file.to_string(),
                source,
            })?;
            let Some(lines) = lines else {
                warn!(job_id = job.id(), file, "Input file missing, skipping");
                job.file_processed();
                continue;
            };

            let report = scheduler.run(job, file, kind, lines, self.sink.clone()).await?;
            info!(
                job_id = job.id(),
                file,
                records = report.records,
                failures = report.failures,
                halted = report.halted,
                "File finished"
            );

            if report.halted {
                info!(job_id = job.id(), file, "Fail-fast triggered, aborting remaining work");
                break;
            }
            job.file_processed();

            if options.fail_fast && report.failures > 0 {
                info!(job_id = job.id(), file, "Fail-fast triggered, skipping remaining files");
                break;
            }
        }
        Ok(())
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SinkError;
    use crate::ingest::ledger::JobLedger;
    use crate::ingest::options::{IngestMode, DISCOUNTS_FILE, PRODUCTS_FILE};
    use crate::ingest::record::{Discount, Product};
    use crate::ingest::source::{LineStream, MemoryLineSource};
    use crate::sink::{DiscountApplyResponse, LocalSink};
    use async_trait::async_trait;
    use std::io;

    const P1: &str = r#"{"id":"p1","name":"Chair","basePrice":100.0,"country":"Sweden"}"#;
    const P2: &str = r#"{"id":"p2","name":"Lamp","basePrice":40.0,"country":"Mars"}"#;
    const D1: &str = r#"{"productId":"p1","discountId":"d1","percent":10.0}"#;
    const D_BAD: &str = r#"{"productId":"p1","discountId":"d2","percent":150.0}"#;

    fn opts(mode: IngestMode) -> IngestOptions {
        IngestOptions {
            mode,
            retries: 0,
            ..IngestOptions::default()
        }
    }

    fn start(ledger: &JobLedger, options: &IngestOptions) -> JobHandle {
        let job = ledger.register("ing-test", &options.mode.kinds()).unwrap();
        job.start();
        job
    }

    async fn run_job(
        source: impl LineSource + 'static,
        sink: LocalSink,
        options: IngestOptions,
    ) -> crate::ingest::ledger::JobView {
        let ledger = JobLedger::default();
        let job = start(&ledger, &options);
        IngestOrchestrator::new(Arc::new(source), Arc::new(sink))
            .run(job.clone(), options)
            .await;
        job.snapshot()
    }

    #[tokio::test]
    async fn all_mode_processes_both_files_in_order() {
        let source = MemoryLineSource::new()
            .with_file(PRODUCTS_FILE, [P1, P2])
            .with_file(DISCOUNTS_FILE, [D1, D1]);
        let sink = LocalSink::default();

        let view = run_job(source, sink.clone(), opts(IngestMode::All)).await;

        assert_eq!(view.status, JobStatus::Completed);
        assert_eq!((view.files_discovered, view.files_processed), (2, 2));
        let products = view.products.unwrap();
        assert_eq!((products.parsed, products.ingested, products.failed), (2, 1, 1));
        let discounts = view.discounts.unwrap();
        assert_eq!(discounts.parsed, discounts.ingested + discounts.failed + discounts.deduplicated.unwrap());
        assert_eq!(sink.catalog.len(), 1);
        assert_eq!(sink.discounts.len(), 1);
        assert_eq!(view.error_sample.len(), 1);
        assert_eq!(view.error_sample[0].file, PRODUCTS_FILE);
        assert_eq!(view.error_sample[0].line, 2);
    }

    #[tokio::test]
    async fn single_mode_selects_one_file() {
        let source = MemoryLineSource::new()
            .with_file(PRODUCTS_FILE, [P1])
            .with_file(DISCOUNTS_FILE, [D1]);
        let sink = LocalSink::default();

        let view = run_job(source, sink.clone(), opts(IngestMode::Discounts)).await;

        assert_eq!(view.files_discovered, 1);
        assert!(view.products.is_none());
        assert_eq!(view.discounts.unwrap().ingested, 1);
        assert!(sink.catalog.is_empty());
    }

    #[tokio::test]
    async fn missing_file_is_skipped_not_failed() {
        let source = MemoryLineSource::new().with_file(DISCOUNTS_FILE, [D1]);

        let view = run_job(source, LocalSink::default(), opts(IngestMode::All)).await;

        assert_eq!(view.status, JobStatus::Completed);
        assert_eq!((view.files_discovered, view.files_processed), (2, 2));
        assert_eq!(view.products.unwrap().parsed, 0);
        assert!(view.error_sample.is_empty());
    }

    #[tokio::test]
    async fn fail_fast_halts_file_and_completes() {
        let source = MemoryLineSource::new().with_file(DISCOUNTS_FILE, [D_BAD, D1]);
        let options = IngestOptions {
            chunk_size: 1,
            fail_fast: true,
            ..opts(IngestMode::Discounts)
        };

        let view = run_job(source, LocalSink::default(), options).await;

        assert_eq!(view.status, JobStatus::Completed);
        assert!(view.files_processed < view.files_discovered);
        let discounts = view.discounts.unwrap();
        assert_eq!(discounts.parsed, 1);
        assert_eq!(discounts.failed, 1);
        assert_eq!(view.error_sample[0].line, 1);
    }

    #[tokio::test]
    async fn fail_fast_skips_later_files() {
        let source = MemoryLineSource::new()
            .with_file(PRODUCTS_FILE, [P2])
            .with_file(DISCOUNTS_FILE, [D1]);
        let sink = LocalSink::default();
        let options = IngestOptions {
            fail_fast: true,
            ..opts(IngestMode::All)
        };

        let view = run_job(source, sink.clone(), options).await;

        assert_eq!(view.status, JobStatus::Completed);
        assert_eq!((view.files_discovered, view.files_processed), (2, 1));
        assert_eq!(view.discounts.unwrap().parsed, 0);
        assert!(sink.discounts.is_empty());
    }

    #[tokio::test]
    async fn dry_run_leaves_stores_untouched() {
        let source = MemoryLineSource::new()
            .with_file(PRODUCTS_FILE, [P1, P2])
            .with_file(DISCOUNTS_FILE, [D1, D_BAD]);
        let sink = LocalSink::default();
        let options = IngestOptions {
            dry_run: true,
            ..opts(IngestMode::All)
        };

        let view = run_job(source, sink.clone(), options).await;

        assert!(sink.catalog.is_empty());
        assert!(sink.discounts.is_empty());
        let products = view.products.unwrap();
        assert_eq!((products.parsed, products.ingested, products.failed), (2, 0, 1));
        let discounts = view.discounts.unwrap();
        assert_eq!((discounts.parsed, discounts.ingested, discounts.failed), (2, 0, 1));
        assert_eq!(discounts.deduplicated, Some(0));
    }

    struct FailingSource;

    #[async_trait]
    impl LineSource for FailingSource {
        async fn open(&self, _file: &str) -> io::Result<Option<LineStream>> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"))
        }
    }

    #[tokio::test]
    async fn io_fault_fails_the_job() {
        let view = run_job(FailingSource, LocalSink::default(), opts(IngestMode::All)).await;

        assert_eq!(view.status, JobStatus::Failed);
        assert_eq!(view.error_sample.len(), 1);
        assert_eq!(view.error_sample[0].file, "unknown");
        assert!(view.error_sample[0].reason.contains("permission denied"));
    }

    struct PanickingSink;

    #[async_trait]
    impl RecordSink for PanickingSink {
        async fn apply_catalog_record(&self, _product: &Product) -> Result<(), SinkError> {
            panic!("catalog exploded");
        }

        async fn apply_discount(&self, _discount: &Discount) -> Result<DiscountApplyResponse, SinkError> {
            panic!("registry exploded");
        }
    }

    #[tokio::test]
    async fn panicking_record_fails_only_that_line() {
        let ledger = JobLedger::default();
        let options = opts(IngestMode::Products);
        let job = start(&ledger, &options);
        let source = MemoryLineSource::new().with_file(PRODUCTS_FILE, [P1]);

        let status = IngestOrchestrator::new(Arc::new(source), Arc::new(PanickingSink))
            .run(job.clone(), options)
            .await;

        assert_eq!(status, JobStatus::Completed);
        let view = job.snapshot();
        assert_eq!(view.products.unwrap().failed, 1);
        assert_eq!(view.error_sample[0].reason, "record worker panicked");
    }

    #[test]
    fn panic_message_extracts_payload() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
    }
}
