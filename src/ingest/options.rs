use serde::{Deserialize, Serialize};
use validator::Validate;

use super::record::RecordKind;

pub const PRODUCTS_FILE: &str = "products.ndjson";
pub const DISCOUNTS_FILE: &str = "discounts.ndjson";

pub const DEFAULT_CHUNK_SIZE: usize = 100;
pub const DEFAULT_RETRIES: u32 = 2;
pub const MAX_RETRIES: u32 = 10;

/// Which input files a job reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IngestMode {
    Products,
    Discounts,
    #[default]
    All,
}

impl IngestMode {
    /// Anything other than `products` or `discounts` (including absent) means both files
    pub fn parse(mode: Option<&str>) -> Self {
        match mode {
            Some("products") => IngestMode::Products,
            Some("discounts") => IngestMode::Discounts,
            _ => IngestMode::All,
        }
    }

    /// Files to process, in order
    pub fn files(self) -> Vec<(&'static str, RecordKind)> {
        match self {
            IngestMode::Products => vec![(PRODUCTS_FILE, RecordKind::Product)],
            IngestMode::Discounts => vec![(DISCOUNTS_FILE, RecordKind::Discount)],
            IngestMode::All => vec![
                (PRODUCTS_FILE, RecordKind::Product),
                (DISCOUNTS_FILE, RecordKind::Discount),
            ],
        }
    }

    pub fn kinds(self) -> Vec<RecordKind> {
        self.files().into_iter().map(|(_, kind)| kind).collect()
    }
}

/// Body of an ingestion request. Absent fields take defaults; unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct IngestRequest {
    /// Accepted for compatibility; concurrency is governed by `chunk_size`
    pub workers: Option<u32>,
    #[validate(range(min = 1, message = "chunkSize must be a positive integer"))]
    pub chunk_size: Option<usize>,
    pub mode: Option<String>,
    pub fail_fast: Option<bool>,
    #[validate(range(max = 10, message = "retries must be at most 10"))]
    pub retries: Option<u32>,
    pub dry_run: Option<bool>,
}

/// Resolved job configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOptions {
    pub mode: IngestMode,
    pub chunk_size: usize,
    pub retries: u32,
    pub dry_run: bool,
    pub fail_fast: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            mode: IngestMode::All,
            chunk_size: DEFAULT_CHUNK_SIZE,
            retries: DEFAULT_RETRIES,
            dry_run: false,
            fail_fast: false,
        }
    }
}

impl From<&IngestRequest> for IngestOptions {
    fn from(req: &IngestRequest) -> Self {
        Self {
            mode: IngestMode::parse(req.mode.as_deref()),
            chunk_size: req.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE),
            retries: req.retries.unwrap_or(DEFAULT_RETRIES),
            dry_run: req.dry_run.unwrap_or(false),
            fail_fast: req.fail_fast.unwrap_or(false),
        }
    }
}
