//! Database query operations.

pub mod jobs;
