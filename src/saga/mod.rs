//! Saga state model.
//!
//! This module contains:
//! - `SagaData` trait: the capability interface every saga state type implements
//! - `NamedSaga` trait: compile-time saga type tag used for registration
//! - `CorrelationProperty`: caller-declared alternate lookup keys
//! - Correlation index computation (`correlation`)
//! - Payload encoding keyed by saga type (`registry`)

use std::any::Any;
use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

pub mod correlation;
pub mod registry;

pub use correlation::{index_entries, IndexEntry};
pub use registry::SagaRegistry;

/// Name of the identity property. Lookups on this property go straight to
/// the primary key instead of the correlation index.
pub const ID_PROPERTY: &str = "Id";

/// Upcast helper so boxed saga data can be turned back into its concrete type.
///
/// Blanket-implemented for every `'static` type; implementors of `SagaData`
/// never write this by hand.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Persistent workflow state.
///
/// Every saga instance carries an immutable id and a revision counter used
/// for optimistic concurrency. Correlation values are exposed explicitly per
/// property name rather than discovered at runtime.
pub trait SagaData: AsAny + Debug + Send + Sync {
    /// Saga type tag; identical to `NamedSaga::SAGA_TYPE` for registered types.
    fn saga_type(&self) -> &'static str;

    /// Globally unique instance id. `Uuid::nil()` means "not yet assigned".
    fn id(&self) -> Uuid;

    /// Current revision. Starts at 0 and grows by one per successful update.
    fn revision(&self) -> i32;

    fn set_revision(&mut self, revision: i32);

    /// Stringified value of a correlation property, `None` when the property
    /// is unset or unknown to this saga type.
    fn correlation_value(&self, property: &str) -> Option<String>;
}

/// Saga state type with a stable type tag and a serde representation.
pub trait NamedSaga: SagaData + Serialize + DeserializeOwned + Sized + 'static {
    /// Type tag written alongside the payload and into the correlation index.
    const SAGA_TYPE: &'static str;
}

/// Recover the concrete saga type from boxed saga data.
///
/// Returns `None` when the boxed value is of a different type.
pub fn downcast<T: NamedSaga>(data: Box<dyn SagaData>) -> Option<T> {
    data.into_any().downcast::<T>().ok().map(|boxed| *boxed)
}

/// A saga property the caller wants indexed for correlation lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationProperty {
    pub property_name: String,
}

impl CorrelationProperty {
    pub fn new(property_name: impl Into<String>) -> Self {
        Self {
            property_name: property_name.into(),
        }
    }
}

impl From<&str> for CorrelationProperty {
    fn from(property_name: &str) -> Self {
        Self::new(property_name)
    }
}
