//! Saga persistence - optimistic-concurrency saga storage
//!
//! Stores long-running saga state in a relational database, with a
//! correlation index for lookups by business key. Supports SQLite and
//! PostgreSQL, plus in-memory providers for tests.

pub mod config;
pub mod saga;
pub mod storage;
pub mod utils;
