pub mod catalog;
pub mod health;
pub mod ingest;
pub mod validation;
