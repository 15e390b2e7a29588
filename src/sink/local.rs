use async_trait::async_trait;
use std::sync::Arc;

use super::{DiscountApplyResponse, DiscountRegistry, ProductCatalog, RecordSink};
use crate::error::SinkError;
use crate::ingest::record::{Discount, Product};

/// Sink backed by the in-process catalog and discount registry
#[derive(Clone, Default)]
pub struct LocalSink {
    pub catalog: Arc<ProductCatalog>,
    pub discounts: Arc<DiscountRegistry>,
}

impl LocalSink {
    pub fn new(catalog: Arc<ProductCatalog>, discounts: Arc<DiscountRegistry>) -> Self {
        Self { catalog, discounts }
    }
}

#[async_trait]
impl RecordSink for LocalSink {
    async fn apply_catalog_record(&self, product: &Product) -> Result<(), SinkError> {
        self.catalog.upsert(product.clone());
        Ok(())
    }

    async fn apply_discount(&self, discount: &Discount) -> Result<DiscountApplyResponse, SinkError> {
        Ok(self.discounts.apply(discount))
    }
}
