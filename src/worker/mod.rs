pub mod job_pool;

pub use job_pool::JobPool;
