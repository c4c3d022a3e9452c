//! Integration test entry point for zkwire-client.
//!
//! Run with: cargo test --test integration

mod dispatch;
mod failures;
mod harness;
mod watches;
