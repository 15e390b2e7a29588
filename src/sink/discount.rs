use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};

use super::DiscountApplyResponse;
use crate::ingest::record::Discount;

/// In-memory discounts per product. Applying the same
/// `(product_id, discount_id)` twice never re-applies it.
#[derive(Default)]
pub struct DiscountRegistry {
    by_product: Mutex<HashMap<String, Vec<Discount>>>,
}

impl DiscountRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&self, discount: &Discount) -> DiscountApplyResponse {
        let mut by_product = self.by_product.lock().unwrap_or_else(PoisonError::into_inner);
        let list = by_product.entry(discount.product_id.clone()).or_default();
        if list.iter().any(|d| d.discount_id == discount.discount_id) {
            debug!(
                product_id = %discount.product_id,
                discount_id = %discount.discount_id,
                "Discount already applied"
            );
            return DiscountApplyResponse::ALREADY_APPLIED;
        }
        list.push(discount.clone());
        info!(
            product_id = %discount.product_id,
            discount_id = %discount.discount_id,
            percent = discount.percent,
            "Discount applied"
        );
        DiscountApplyResponse::APPLIED
    }

    pub fn for_product(&self, product_id: &str) -> Vec<Discount> {
        self.by_product
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(product_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Total discounts across all products
    pub fn len(&self) -> usize {
        self.by_product
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(Vec::len)
            .sum()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
