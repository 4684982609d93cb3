//! Saga payload encoding.
//!
//! Payloads are stored as a JSON envelope carrying the saga type tag next to
//! the serialized state:
//!
//! ```text
//! {"type": "OrderSaga", "data": { ...state... }}
//! ```
//!
//! Decoding dispatches on the stored tag through the codecs registered for
//! each saga type, so storage never needs to know concrete types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{NamedSaga, SagaData};
use crate::storage::{Result, StorageError};

type EncodeFn = fn(&dyn SagaData) -> Result<Value>;
type DecodeFn = fn(Value) -> serde_json::Result<Box<dyn SagaData>>;

#[derive(Clone, Copy)]
struct Codec {
    encode: EncodeFn,
    decode: DecodeFn,
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    #[serde(rename = "type")]
    saga_type: &'a str,
    data: Value,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    saga_type: String,
    data: Value,
}

fn encode_as<T: NamedSaga>(data: &dyn SagaData) -> Result<Value> {
    let typed = data
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| StorageError::UnknownSagaType(data.saga_type().to_string()))?;
    Ok(serde_json::to_value(typed)?)
}

fn decode_as<T: NamedSaga>(value: Value) -> serde_json::Result<Box<dyn SagaData>> {
    let typed: T = serde_json::from_value(value)?;
    Ok(Box::new(typed))
}

/// Registry of saga types known to a storage instance.
///
/// Built once at startup and handed to each storage provider.
#[derive(Clone, Default)]
pub struct SagaRegistry {
    codecs: HashMap<&'static str, Codec>,
}

impl SagaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a saga type. Re-registering the same type is a no-op.
    pub fn register<T: NamedSaga>(&mut self) -> &mut Self {
        self.codecs.insert(
            T::SAGA_TYPE,
            Codec {
                encode: encode_as::<T>,
                decode: decode_as::<T>,
            },
        );
        self
    }

    /// Builder-style `register`.
    pub fn with<T: NamedSaga>(mut self) -> Self {
        self.register::<T>();
        self
    }

    pub fn is_registered(&self, saga_type: &str) -> bool {
        self.codecs.contains_key(saga_type)
    }

    /// Serialize saga data into its stored payload.
    pub fn encode(&self, data: &dyn SagaData) -> Result<Vec<u8>> {
        let codec = self
            .codecs
            .get(data.saga_type())
            .ok_or_else(|| StorageError::UnknownSagaType(data.saga_type().to_string()))?;

        let envelope = EnvelopeRef {
            saga_type: data.saga_type(),
            data: (codec.encode)(data)?,
        };
        Ok(serde_json::to_vec(&envelope)?)
    }

    /// Deserialize a stored payload, whatever its saga type.
    pub fn decode(&self, saga_id: &str, payload: &[u8]) -> Result<Box<dyn SagaData>> {
        let envelope = Self::open(saga_id, payload)?;
        self.decode_envelope(saga_id, payload, envelope)
    }

    /// Deserialize a stored payload only if it holds `saga_type`.
    ///
    /// A payload of another saga type yields `Ok(None)`.
    pub fn decode_as_type(
        &self,
        saga_type: &str,
        saga_id: &str,
        payload: &[u8],
    ) -> Result<Option<Box<dyn SagaData>>> {
        let envelope = Self::open(saga_id, payload)?;
        if envelope.saga_type != saga_type {
            return Ok(None);
        }
        self.decode_envelope(saga_id, payload, envelope).map(Some)
    }

    fn open(saga_id: &str, payload: &[u8]) -> Result<Envelope> {
        serde_json::from_slice(payload).map_err(|e| StorageError::Corrupt {
            saga_id: saga_id.to_string(),
            payload: payload.to_vec(),
            reason: e.to_string(),
        })
    }

    fn decode_envelope(
        &self,
        saga_id: &str,
        payload: &[u8],
        envelope: Envelope,
    ) -> Result<Box<dyn SagaData>> {
        let codec = self
            .codecs
            .get(envelope.saga_type.as_str())
            .ok_or_else(|| StorageError::UnknownSagaType(envelope.saga_type.clone()))?;

        (codec.decode)(envelope.data).map_err(|e| StorageError::Corrupt {
            saga_id: saga_id.to_string(),
            payload: payload.to_vec(),
            reason: e.to_string(),
        })
    }
}

impl std::fmt::Debug for SagaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<_> = self.codecs.keys().collect();
        types.sort();
        f.debug_struct("SagaRegistry").field("types", &types).finish()
    }
}
