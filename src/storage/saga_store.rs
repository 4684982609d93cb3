//! SagaStorage trait definition.

use async_trait::async_trait;

use super::{Result, StorageError};
use crate::saga::{downcast, CorrelationProperty, NamedSaga, SagaData};

/// Interface for saga persistence.
///
/// Saga data is stored as `(id, revision, payload)` rows with a derived
/// correlation index `(saga_type, key, value) -> id`. Every operation runs in
/// exactly one transaction and commits before returning.
///
/// # Concurrency
///
/// Writers present the revision they loaded. A stale revision, a duplicate id,
/// or a correlation value already owned by another saga of the same type
/// fails with `StorageError::ConcurrencyConflict` and leaves storage exactly
/// as it was. Nothing is retried internally.
///
/// # Implementations
///
/// - `PostgresSagaStorage`: PostgreSQL storage
/// - `SqliteSagaStorage`: SQLite storage
/// - `MockSagaStorage`: In-memory mock for testing
#[async_trait]
pub trait SagaStorage: Send + Sync {
    /// Create the data and index tables if neither exists.
    ///
    /// Fails with `SchemaInconsistency` if only one of them exists.
    async fn ensure_schema(&self) -> Result<()>;

    /// Find saga data of `saga_type` whose `property` equals `value`.
    ///
    /// `ID_PROPERTY` looks up the primary key; `value` must then parse as a
    /// UUID. Any other property goes through the correlation index, with a
    /// `None` value matched as the empty string. Returns `None` when nothing
    /// matches or the stored saga is of a different type.
    async fn find(
        &self,
        saga_type: &str,
        property: &str,
        value: Option<&str>,
    ) -> Result<Option<Box<dyn SagaData>>>;

    /// Store a new saga at revision 0 and index its correlation properties.
    async fn insert(&self, data: &dyn SagaData, correlation: &[CorrelationProperty])
        -> Result<()>;

    /// Store a new revision of an existing saga and rebuild its index entries.
    ///
    /// On success `data.revision()` has grown by one. On failure it is
    /// unchanged.
    async fn update(
        &self,
        data: &mut dyn SagaData,
        correlation: &[CorrelationProperty],
    ) -> Result<()>;

    /// Delete a saga and its index entries.
    ///
    /// On success `data.revision()` has grown by one, marking the in-memory
    /// copy stale.
    async fn delete(&self, data: &mut dyn SagaData) -> Result<()>;
}

/// Typed lookups on top of `SagaStorage`.
#[async_trait]
pub trait SagaStorageExt: SagaStorage {
    /// `find` for a concrete saga type.
    async fn find_typed<T: NamedSaga>(
        &self,
        property: &str,
        value: Option<&str>,
    ) -> Result<Option<T>> {
        let found = self.find(T::SAGA_TYPE, property, value).await?;
        Ok(found.and_then(downcast::<T>))
    }
}

impl<S: SagaStorage + ?Sized> SagaStorageExt for S {}

/// Reject insert attempts that indicate a bug in the caller.
pub(crate) fn validate_insert(data: &dyn SagaData) -> Result<()> {
    if data.id().is_nil() {
        return Err(StorageError::ContractViolation(format!(
            "{} data must be assigned an id before it is inserted",
            data.saga_type()
        )));
    }
    if data.revision() != 0 {
        return Err(StorageError::ContractViolation(format!(
            "{} data {} must be inserted at revision 0, found revision {}",
            data.saga_type(),
            data.id(),
            data.revision()
        )));
    }
    Ok(())
}
