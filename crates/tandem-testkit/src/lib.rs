//! # Tandem Testkit
//!
//! Shared fixtures for integration tests: pre-populated stores, servers
//! with in-memory peers, and persistence wrappers that fail on demand.

pub mod fixtures;
pub mod persistence;

pub use fixtures::{plain_spec, server_fixture, store_with_game, ServerFixture};
pub use persistence::FlakyPersistence;
