//! Integration test entry point for the Drive adapter
//!
//! Tests run against a wiremock-based mock of the Drive API; no network
//! access or credentials are required.

mod common;
mod test_changes;
mod test_listing;
