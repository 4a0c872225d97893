//! Greenbench workspace-level test utilities.
//!
//! This crate exists solely to support workspace-level integration tests,
//! particularly the BDD/cucumber tests in `tests/cucumber.rs`.
//!
//! The actual greenbench functionality is in the workspace member crates:
//! - `greenbench-types`: Shared record, score, and config types
//! - `greenbench-store`: Append-only CSV run store
//! - `greenbench-adapters`: Allocator, profiler, and process adapters
//! - `greenbench-significance`: Statistical tests over run records
//! - `greenbench-domain`: Aggregation and scoring logic
//! - `greenbench-app`: Application use cases
//! - `greenbench-tasks`: Built-in benchmark task suite
//! - `greenbench` (greenbench-cli): CLI interface
