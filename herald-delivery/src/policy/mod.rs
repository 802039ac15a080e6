//! Retry budget and backoff schedule shared by both delivery paths.

mod retry;

pub use retry::{Backoff, RetryBudget, backoff_units};
