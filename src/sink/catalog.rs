use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tracing::debug;

use crate::ingest::record::{Country, Product};

/// In-memory product catalog keyed by product id
#[derive(Default)]
pub struct ProductCatalog {
    products: RwLock<HashMap<String, Product>>,
}

impl ProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace; returns the previous entry if any
    pub fn upsert(&self, product: Product) -> Option<Product> {
        debug!(product_id = %product.id, "Upserting product");
        self.products
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(product.id.clone(), product)
    }

    #[cfg(test)]
    pub fn get(&self, id: &str) -> Option<Product> {
        self.products
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Products sold in `country`, ordered by id
    pub fn in_country(&self, country: Country) -> Vec<Product> {
        let mut found: Vec<Product> = self
            .products
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|p| p.resolved_country() == Some(country))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        found
    }

    pub fn len(&self) -> usize {
        self.products.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: &str, name: &str, country: &str) -> Product {
        Product {
            id: id.into(),
            name: name.into(),
            base_price: 10.0,
            country: country.into(),
        }
    }

    #[test]
    fn last_write_wins() {
        let catalog = ProductCatalog::new();
        assert!(catalog.upsert(product("p1", "Old", "Sweden")).is_none());
        assert!(catalog.upsert(product("p1", "New", "Sweden")).is_some());
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("p1").unwrap().name, "New");
    }

    #[test]
    fn filters_by_country_case_insensitively() {
        let catalog = ProductCatalog::new();
        catalog.upsert(product("p2", "B", "sweden"));
        catalog.upsert(product("p1", "A", "Sweden"));
        catalog.upsert(product("p3", "C", "France"));

        let ids: Vec<String> = catalog
            .in_country(Country::Sweden)
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["p1", "p2"]);
    }
}
