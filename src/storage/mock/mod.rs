//! Mock storage implementations for testing.
//!
//! In-memory providers with the same observable semantics as the SQL
//! engine: revision checks, correlation uniqueness, all-or-nothing writes.

mod saga_store;
mod snapshot_store;
mod subscription_store;

pub use saga_store::MockSagaStorage;
pub use snapshot_store::MockSagaSnapshotStorage;
pub use subscription_store::MockSubscriptionStorage;
