//! `tally-processing`
//!
//! **Responsibility:** turn a delimited tabular input into per-group totals and
//! render those totals back out as tabular text.
//!
//! This crate is intentionally synchronous and storage-agnostic: callers hand it
//! any `std::io::Read` / `std::io::Write` and decide where it runs.

pub mod aggregator;
pub mod columns;
pub mod encoder;
pub mod error;
pub mod totals;

pub use aggregator::{Aggregation, AggregationStats, Aggregator};
pub use columns::{ColumnLayout, HeaderPolicy};
pub use encoder::{OUTPUT_HEADER, encode};
pub use error::ProcessingError;
pub use totals::GroupTotals;
