pub mod ledger;
pub mod options;
pub mod orchestrator;
pub mod record;
pub mod retry;
pub mod scheduler;
pub mod source;

// Re-export commonly used types
pub use ledger::{JobLedger, JobStatus, JobView};
pub use options::{IngestMode, IngestOptions, IngestRequest};
pub use orchestrator::IngestOrchestrator;
pub use source::DirLineSource;
#[cfg(test)]
pub use source::MemoryLineSource;
