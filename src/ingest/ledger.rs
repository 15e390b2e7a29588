//! In-memory registry of ingestion jobs and their progress.
//!
//! Every job owns one mutex-guarded [`JobState`]. A line outcome is applied
//! under that lock in a single step (`parsed` plus exactly one of
//! `ingested` / `failed` / `deduplicated`, plus the error entry), so a
//! snapshot never observes a half-applied outcome.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use super::record::RecordKind;

/// Default number of error entries retained per job
pub const DEFAULT_ERROR_SAMPLE_CAP: usize = 100;

/// Job lifecycle; only ever moves forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Per-category progress counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    pub parsed: u64,
    pub ingested: u64,
    pub failed: u64,
    /// Only tracked for discounts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deduplicated: Option<u64>,
}

impl Counters {
    pub fn for_kind(kind: RecordKind) -> Self {
        match kind {
            RecordKind::Product => Self::default(),
            RecordKind::Discount => Self {
                deduplicated: Some(0),
                ..Self::default()
            },
        }
    }
}

/// Final outcome of one input line
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    /// Written to the sink
    Ingested,
    /// Sink reported the effect was already applied
    Deduplicated,
    /// Valid, but not written (dry run)
    Validated,
    /// Terminal failure with a human-readable reason
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorEntry {
    pub file: String,
    pub line: u64,
    pub reason: String,
}

/// Read-only snapshot of a job
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
    #[serde(rename = "ingestionId")]
    pub job_id: String,
    pub status: JobStatus,
    pub files_discovered: u32,
    pub files_processed: u32,
    pub products: Option<Counters>,
    pub discounts: Option<Counters>,
    #[serde(rename = "errorsSample")]
    pub error_sample: Vec<ErrorEntry>,
    /// Errors counted but not retained in `error_sample`
    pub errors_dropped: u64,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug)]
struct JobState {
    status: JobStatus,
    files_discovered: u32,
    files_processed: u32,
    products: Option<Counters>,
    discounts: Option<Counters>,
    errors: Vec<ErrorEntry>,
    errors_dropped: u64,
    started_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl JobState {
    fn new(kinds: &[RecordKind]) -> Self {
        let now = Utc::now();
        let has = |k| kinds.contains(&k);
        Self {
            status: JobStatus::Pending,
            files_discovered: 0,
            files_processed: 0,
            products: has(RecordKind::Product).then(|| Counters::for_kind(RecordKind::Product)),
            discounts: has(RecordKind::Discount).then(|| Counters::for_kind(RecordKind::Discount)),
            errors: Vec::new(),
            errors_dropped: 0,
            started_at: now,
            updated_at: now,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    fn push_error(&mut self, cap: usize, entry: ErrorEntry) {
        if self.errors.len() < cap {
            self.errors.push(entry);
        } else {
            self.errors_dropped += 1;
        }
    }

    fn view(&self, job_id: &str) -> JobView {
        JobView {
            job_id: job_id.to_string(),
            status: self.status,
            files_discovered: self.files_discovered,
            files_processed: self.files_processed,
            products: self.products.clone(),
            discounts: self.discounts.clone(),
            error_sample: self.errors.clone(),
            errors_dropped: self.errors_dropped,
            started_at: self.started_at,
            updated_at: self.updated_at,
        }
    }
}

/// Generate a fresh job identifier
pub fn new_job_id() -> String {
    format!("ing-{}", Uuid::new_v4())
}

/// Process-lifetime registry of jobs
pub struct JobLedger {
    jobs: RwLock<HashMap<String, Arc<Mutex<JobState>>>>,
    error_sample_cap: usize,
}

impl Default for JobLedger {
    fn default() -> Self {
        Self::new(DEFAULT_ERROR_SAMPLE_CAP)
    }
}

impl JobLedger {
    pub fn new(error_sample_cap: usize) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            error_sample_cap,
        }
    }

    /// Register a `pending` job tracking counters for `kinds`.
    ///
    /// Returns `None` if `job_id` is already registered.
    pub fn register(&self, job_id: &str, kinds: &[RecordKind]) -> Option<JobHandle> {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        if jobs.contains_key(job_id) {
            warn!(job_id, "Job id already registered");
            return None;
        }
        let state = Arc::new(Mutex::new(JobState::new(kinds)));
        jobs.insert(job_id.to_string(), state.clone());
        debug!(job_id, "Job registered");
        Some(JobHandle {
            job_id: job_id.to_string(),
            state,
            error_sample_cap: self.error_sample_cap,
        })
    }

    pub fn snapshot(&self, job_id: &str) -> Option<JobView> {
        let state = {
            let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
            jobs.get(job_id)?.clone()
        };
        let state = state.lock().unwrap_or_else(PoisonError::into_inner);
        Some(state.view(job_id))
    }

    pub fn len(&self) -> usize {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Mutating handle to one job, held by the orchestrator running it.
///
/// Counters and file progress only change while the job is `running`;
/// once terminal every mutator is a no-op.
#[derive(Clone)]
pub struct JobHandle {
    job_id: String,
    state: Arc<Mutex<JobState>>,
    error_sample_cap: usize,
}

impl JobHandle {
    pub fn id(&self) -> &str {
        &self.job_id
    }

    fn lock(&self) -> MutexGuard<'_, JobState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock the state if the job is running
    fn lock_running(&self) -> Option<MutexGuard<'_, JobState>> {
        let state = self.lock();
        if state.status == JobStatus::Running {
            Some(state)
        } else {
            debug!(job_id = %self.job_id, status = ?state.status, "Ignoring update to job that is not running");
            None
        }
    }

    /// `pending -> running`
    pub fn start(&self) {
        let mut state = self.lock();
        if state.status == JobStatus::Pending {
            state.status = JobStatus::Running;
            state.started_at = Utc::now();
            state.touch();
        }
    }

    pub fn set_files_discovered(&self, count: u32) {
        if let Some(mut state) = self.lock_running() {
            state.files_discovered = count;
            state.touch();
        }
    }

    pub fn file_processed(&self) {
        if let Some(mut state) = self.lock_running() {
            state.files_processed += 1;
            state.touch();
        }
    }

    /// Apply one line's outcome to the category counters
    pub fn record(&self, kind: RecordKind, file: &str, line: u64, outcome: LineOutcome) {
        let cap = self.error_sample_cap;
        let Some(mut state) = self.lock_running() else {
            return;
        };
        let state = &mut *state;
        let counters = match kind {
            RecordKind::Product => state.products.get_or_insert_with(|| Counters::for_kind(kind)),
            RecordKind::Discount => state.discounts.get_or_insert_with(|| Counters::for_kind(kind)),
        };
        counters.parsed += 1;
        match outcome {
            LineOutcome::Ingested => counters.ingested += 1,
            LineOutcome::Deduplicated => {
                *counters.deduplicated.get_or_insert(0) += 1;
            }
            LineOutcome::Validated => {}
            LineOutcome::Failed(reason) => {
                counters.failed += 1;
                state.push_error(
                    cap,
                    ErrorEntry {
                        file: file.to_string(),
                        line,
                        reason,
                    },
                );
            }
        }
        state.touch();
    }

    /// `running -> completed`
    pub fn complete(&self) {
        if let Some(mut state) = self.lock_running() {
            state.status = JobStatus::Completed;
            state.touch();
        }
    }

    /// `running -> failed`, recording `reason` as a single synthetic error entry.
    ///
    /// The fault entry is always kept, even past the sample cap.
    pub fn fail(&self, reason: String) {
        if let Some(mut state) = self.lock_running() {
            state.errors.push(ErrorEntry {
                file: "unknown".to_string(),
                line: 0,
                reason,
            });
            state.status = JobStatus::Failed;
            state.touch();
        }
    }

    pub fn snapshot(&self) -> JobView {
        self.lock().view(&self.job_id)
    }
}
