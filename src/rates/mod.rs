//! Rate provider client and conversion records.

pub mod api_types;
pub mod client;
mod records;
pub mod types;

pub use client::{Endpoints, RatesClient};
pub use types::{normalize_amount, Conversion, Currency, RatePair};
