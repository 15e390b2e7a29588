//! Chunked, bounded-parallel processing of one input file.
//!
//! Lines are pulled from the source one chunk at a time. Every line of a
//! chunk runs as its own task; the chunk is finished only once every task
//! has reported an outcome, and chunk K+1 is not started before that. Peak
//! concurrency against the sink is therefore `chunk_size`.

use futures_util::{FutureExt, StreamExt};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::ledger::{JobHandle, LineOutcome};
use super::options::IngestOptions;
use super::record::{self, Record, RecordKind};
use super::retry::run_with_retry;
use super::source::LineStream;
use crate::error::{JobFault, RecordError};
use crate::sink::RecordSink;

/// Upper bound on chunk buffer preallocation; larger chunks grow as lines arrive
const MAX_PREALLOCATED_LINES: usize = 1024;

/// Summary of one file run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileReport {
    pub chunks: u64,
    pub records: u64,
    pub failures: u64,
    /// Stopped early by fail-fast; later lines were never read into a chunk
    pub halted: bool,
}

pub struct ChunkScheduler {
    chunk_size: usize,
    retries: u32,
    dry_run: bool,
    fail_fast: bool,
}

impl ChunkScheduler {
    pub fn new(options: &IngestOptions) -> Self {
        Self {
            chunk_size: options.chunk_size.max(1),
            retries: options.retries,
            dry_run: options.dry_run,
            fail_fast: options.fail_fast,
        }
    }

    /// Process every line of `lines`, recording each outcome on `job`.
    ///
    /// Per-line failures are counted, never returned. An `Err` means the
    /// file itself could not be read.
    pub async fn run(
        &self,
        job: &JobHandle,
        file: &str,
        kind: RecordKind,
        mut lines: LineStream,
        sink: Arc<dyn RecordSink>,
    ) -> Result<FileReport, JobFault> {
        let mut report = FileReport::default();
        let mut line_number: u64 = 0;
        let mut halt = false;

        loop {
            if halt {
                // look past the failed chunk only to tell a halt from end of input
                report.halted = self.has_more_lines(&mut lines, file).await;
                if report.halted {
                    info!(job_id = job.id(), file, after_line = line_number, "Fail-fast: stopping before next chunk");
                }
                break;
            }

            let chunk = self.next_chunk(&mut lines, &mut line_number, file).await?;
            if chunk.is_empty() {
                break;
            }

            let size = chunk.len() as u64;
            let failures = self.run_chunk(job, file, kind, chunk, &sink).await;
            report.chunks += 1;
            report.records += size;
            report.failures += failures;
            debug!(job_id = job.id(), file, chunk = report.chunks, size, failures, "Chunk complete");

            if self.fail_fast && failures > 0 {
                halt = true;
            }
        }

        Ok(report)
    }

    /// Read up to `chunk_size` non-blank lines, tagged with 1-based line numbers
    async fn next_chunk(
        &self,
        lines: &mut LineStream,
        line_number: &mut u64,
        file: &str,
    ) -> Result<Vec<(u64, String)>, JobFault> {
        let mut chunk = Vec::with_capacity(self.chunk_size.min(MAX_PREALLOCATED_LINES));
        while chunk.len() < self.chunk_size {
            match lines.next().await {
                Some(Ok(line)) => {
                    *line_number += 1;
                    if line.trim().is_empty() {
                        continue;
                    }
                    chunk.push((*line_number, line));
                }
                Some(Err(source)) => {
                    return Err(JobFault::Io {
                        file: file.to_string(),
                        source,
                    })
                }
                None => break,
            }
        }
        Ok(chunk)
    }

    /// Whether any non-blank line remains. A read error here counts as
    /// remaining input: the file is abandoned either way.
    async fn has_more_lines(&self, lines: &mut LineStream, file: &str) -> bool {
        while let Some(next) = lines.next().await {
            match next {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(_) => return true,
                Err(e) => {
                    debug!(file, error = %e, "Read error after fail-fast halt ignored");
                    return true;
                }
            }
        }
        false
    }

    /// Run one chunk to completion; returns the number of failed lines
    async fn run_chunk(
        &self,
        job: &JobHandle,
        file: &str,
        kind: RecordKind,
        chunk: Vec<(u64, String)>,
        sink: &Arc<dyn RecordSink>,
    ) -> u64 {
        let mut tasks = JoinSet::new();
        for (line_number, line) in chunk {
            let sink = sink.clone();
            let retries = self.retries;
            let dry_run = self.dry_run;
            tasks.spawn(async move {
                let outcome = AssertUnwindSafe(process_line(kind, &line, retries, dry_run, sink.as_ref()))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| LineOutcome::Failed("record worker panicked".to_string()));
                (line_number, outcome)
            });
        }

        let mut failures = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((line_number, outcome)) => {
                    if let LineOutcome::Failed(reason) = &outcome {
                        failures += 1;
                        warn!(job_id = job.id(), file, line = line_number, reason = %reason, "Record failed");
                    }
                    job.record(kind, file, line_number, outcome);
                }
                // tasks are never aborted and panics are caught inside the task
                Err(e) => error!(job_id = job.id(), file, error = ?e, "Record task did not complete"),
            }
        }
        failures
    }
}

async fn process_line(
    kind: RecordKind,
    line: &str,
    retries: u32,
    dry_run: bool,
    sink: &dyn RecordSink,
) -> LineOutcome {
    match run_with_retry(retries, move || apply_line(kind, line, dry_run, sink)).await {
        Ok(outcome) => outcome,
        Err(e) => LineOutcome::Failed(e.to_string()),
    }
}

/// One attempt: decode, validate and (unless dry run) apply
async fn apply_line(
    kind: RecordKind,
    line: &str,
    dry_run: bool,
    sink: &dyn RecordSink,
) -> Result<LineOutcome, RecordError> {
    let record = record::decode(kind, line)?;
    if dry_run {
        return Ok(LineOutcome::Validated);
    }
    match record {
        Record::Product(product) => {
            sink.apply_catalog_record(&product).await?;
            Ok(LineOutcome::Ingested)
        }
        Record::Discount(discount) => {
            let response = sink.apply_discount(&discount).await?;
            if !response.applied && response.already_applied {
                Ok(LineOutcome::Deduplicated)
            } else {
                Ok(LineOutcome::Ingested)
            }
        }
    }
}
