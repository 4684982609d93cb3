//! Shared storage integration tests.
//!
//! Tests the SagaStorage, SubscriptionStorage and SagaSnapshotStorage
//! interfaces against all implementations. Each implementation module imports
//! these test functions and runs them.

pub mod saga_store_tests;
