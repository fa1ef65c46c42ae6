//! Integration tests module
//!
//! End-to-end tests for the port coordinator:
//! - Allocation, release and sweep through the coordinator context
//! - The HTTP API driven through the axum router
//! - The reqwest client against a mock server

pub mod allocation_test;
pub mod api_test;
pub mod client_test;
