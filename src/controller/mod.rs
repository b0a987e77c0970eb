//! # Controller
//!
//! Core reconciliation modules for encrypted SSM parameters.
//!
//! - `backoff`: Fibonacci backoff for polling
//! - `retry`: Deadline-bounded retry combinator
//! - `comparator`: Decrypt-and-compare of declared and stored values
//! - `plan`: Create/update/replace decision
//! - `reconciler`: Put, read, delete and the apply flows built on them

pub mod backoff;
pub mod comparator;
pub mod plan;
pub mod reconciler;
pub mod retry;
