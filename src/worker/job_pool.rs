use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

/// Returned when a job is submitted after draining has begun
#[derive(Debug, thiserror::Error)]
#[error("job pool is draining and no longer accepts jobs")]
pub struct PoolClosed;

/// Managed pool for background ingestion jobs
///
/// # Concurrency Model
/// - Submitting never blocks: the job task is spawned immediately
/// - A job task waits for a semaphore permit before doing any work, so at
///   most `max_concurrent_jobs` jobs run at once; the rest queue
/// - All tasks live in one `JoinSet` on the runtime the pool was created on,
///   so they outlive the HTTP workers that submitted them
/// - `drain` stops intake and waits for every queued and running job
pub struct JobPool {
    runtime: Handle,
    semaphore: Arc<Semaphore>,
    tasks: Mutex<JoinSet<()>>,
    accepting: AtomicBool,
}

impl JobPool {
    /// Create a pool bound to the current tokio runtime.
    ///
    /// Must be called from within a runtime.
    pub fn new(max_concurrent_jobs: usize) -> Self {
        Self::with_runtime(Handle::current(), max_concurrent_jobs)
    }

    pub fn with_runtime(runtime: Handle, max_concurrent_jobs: usize) -> Self {
        Self {
            runtime,
            semaphore: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
            tasks: Mutex::new(JoinSet::new()),
            accepting: AtomicBool::new(true),
        }
    }

    fn tasks(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue `job` for execution
    pub fn spawn<F>(&self, job_id: &str, job: F) -> Result<(), PoolClosed>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        // intake is checked under the tasks lock so drain cannot miss this job
        let mut tasks = self.tasks();
        if !self.is_accepting() {
            return Err(PoolClosed);
        }

        // reap finished jobs so the set only holds live ones
        while let Some(finished) = tasks.try_join_next() {
            if let Err(e) = finished {
                error!("Ingestion job task ended abnormally: {:?}", e);
            }
        }

        let semaphore = self.semaphore.clone();
        let job_id = job_id.to_string();
        tasks.spawn_on(
            async move {
                let permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        error!(job_id = %job_id, "Failed to acquire job permit: {:?}", e);
                        return;
                    }
                };
                debug!(job_id = %job_id, "Job acquired permit");
                job.await;
                // Permit is dropped here, releasing the slot for the next queued job
                drop(permit);
                debug!(job_id = %job_id, "Job released permit");
            },
            &self.runtime,
        );
        Ok(())
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    /// Jobs queued or running
    pub fn in_flight(&self) -> usize {
        let mut tasks = self.tasks();
        while tasks.try_join_next().is_some() {}
        tasks.len()
    }

    /// Stop accepting jobs and wait for every submitted job to finish
    pub async fn drain(&self) {
        let mut tasks = {
            let mut guard = self.tasks();
            self.accepting.store(false, Ordering::SeqCst);
            std::mem::take(&mut *guard)
        };
        let pending = tasks.len();
        info!("Waiting for {} ingestion jobs to complete...", pending);

        let mut completed = 0;
        while let Some(finished) = tasks.join_next().await {
            completed += 1;
            match finished {
                Ok(()) => info!("Ingestion job finished ({}/{})", completed, pending),
                Err(e) => error!("Ingestion job task failed during drain: {:?}", e),
            }
        }
        info!("All ingestion jobs drained");
    }
}
