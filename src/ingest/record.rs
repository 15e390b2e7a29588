//! Record decoding for the two NDJSON input formats.
//!
//! Decoding is pure: a line goes in, a validated record or a classified
//! [`RecordError`] comes out. Nothing here touches a sink or the ledger.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::error::RecordError;

/// Countries a catalog entry may be sold in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Country {
    Sweden,
    Germany,
    France,
}

impl Country {
    pub const ALL: [Country; 3] = [Country::Sweden, Country::Germany, Country::France];

    /// VAT rate as a fraction (0.25 = 25%)
    pub fn vat_rate(self) -> f64 {
        match self {
            Country::Sweden => 0.25,
            Country::Germany => 0.19,
            Country::France => 0.20,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Country::Sweden => "Sweden",
            Country::Germany => "Germany",
            Country::France => "France",
        }
    }
}

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Country {
    type Err = String;

    /// Case-insensitive lookup by name
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Country::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown country: {}", s))
    }
}

/// Record category; selects the counters and the sink operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Product,
    Discount,
}

/// Catalog entry as it appears on the wire and in the catalog store
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[validate(length(min = 1, message = "id must not be empty"))]
    pub id: String,
    pub name: String,
    #[validate(range(exclusive_min = 0.0, message = "basePrice must be positive"))]
    pub base_price: f64,
    #[validate(custom(function = "validate_country"))]
    pub country: String,
}

impl Product {
    /// Resolved country. Only meaningful on a validated product.
    pub fn resolved_country(&self) -> Option<Country> {
        self.country.parse().ok()
    }
}

/// Discount entry; identity is the `(product_id, discount_id)` pair
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Discount {
    #[validate(length(min = 1, message = "productId must not be empty"))]
    pub product_id: String,
    #[validate(length(min = 1, message = "discountId must not be empty"))]
    pub discount_id: String,
    #[validate(range(
        exclusive_min = 0.0,
        exclusive_max = 100.0,
        message = "percent must be greater than 0 and less than 100"
    ))]
    pub percent: f64,
}

/// A decoded, validated line
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Product(Product),
    Discount(Discount),
}

fn validate_country(country: &str) -> Result<(), ValidationError> {
    country.parse::<Country>().map(|_| ()).map_err(|msg| {
        let mut err = ValidationError::new("unknown_country");
        err.message = Some(msg.into());
        err
    })
}

/// Flatten validator output into one human-readable reason
fn describe(errors: &ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("invalid value for {}", field))
            })
        })
        .collect();
    messages.sort();
    messages.join("; ")
}

fn decode_validated<T>(line: &str) -> Result<T, RecordError>
where
    T: for<'de> Deserialize<'de> + Validate,
{
    let value: T =
        serde_json::from_str(line).map_err(|e| RecordError::Decode(e.to_string()))?;
    value
        .validate()
        .map_err(|e| RecordError::Validation(describe(&e)))?;
    Ok(value)
}

/// Decode one line of the given category
pub fn decode(kind: RecordKind, line: &str) -> Result<Record, RecordError> {
    match kind {
        RecordKind::Product => decode_validated(line).map(Record::Product),
        RecordKind::Discount => decode_validated(line).map(Record::Discount),
    }
}
