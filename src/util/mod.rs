//! Utility functions.

pub mod time;

pub use time::{format_reset_in, format_utilization};
