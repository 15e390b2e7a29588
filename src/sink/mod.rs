//! Record sinks: the stores a validated record is applied to.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SinkError;
use crate::ingest::record::{Discount, Product};

pub mod catalog;
pub mod discount;
pub mod local;

pub use catalog::ProductCatalog;
pub use discount::DiscountRegistry;
pub use local::LocalSink;

/// Response to a discount application, keyed by `(product_id, discount_id)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountApplyResponse {
    pub applied: bool,
    pub already_applied: bool,
}

impl DiscountApplyResponse {
    pub const APPLIED: Self = Self {
        applied: true,
        already_applied: false,
    };
    pub const ALREADY_APPLIED: Self = Self {
        applied: false,
        already_applied: true,
    };
}

/// Downstream stores for both record categories.
///
/// Implementations must be safe for concurrent use: a chunk applies up to
/// `chunk_size` records at once.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Upsert by id, last write wins
    async fn apply_catalog_record(&self, product: &Product) -> Result<(), SinkError>;

    /// Apply a discount once per `(product_id, discount_id)`; repeats report `already_applied`
    async fn apply_discount(&self, discount: &Discount) -> Result<DiscountApplyResponse, SinkError>;
}
