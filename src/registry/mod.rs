//! Name to type mapping for events and snapshots.
//!
//! Stored records only carry a string name next to their bytes. A `Registry`
//! remembers which Rust type each name decodes into, so replay can rebuild the
//! original domain value without knowing it statically.

mod named;

use std::any::Any;
use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};

pub use named::Named;

/// Anything that can be stored as an event or snapshot payload.
pub trait Payload: Named + Serialize + DeserializeOwned + Any + Send + Sync {}

impl<T> Payload for T where T: Named + Serialize + DeserializeOwned + Any + Send + Sync {}

/// A decoded payload whose concrete type is only known through its name.
pub type Value = Box<dyn Any + Send + Sync>;

type EncodeFn = fn(&dyn Any) -> Result<Vec<u8>>;
type DecodeFn = fn(&[u8]) -> Result<Value>;

struct Codec {
    encode: EncodeFn,
    decode: DecodeFn,
}

fn encode<T: Payload>(value: &dyn Any) -> Result<Vec<u8>> {
    let value = value.downcast_ref::<T>().ok_or_else(|| {
        Error::Encoding(format!("value is not a {}", T::NAME))
    })?;
    Ok(serde_json::to_vec(value)?)
}

fn decode<T: Payload>(bytes: &[u8]) -> Result<Value> {
    let value: T = serde_json::from_slice(bytes)?;
    Ok(Box::new(value))
}

/// Registered payload types, keyed by name. Payloads are JSON encoded.
#[derive(Default)]
pub struct Registry {
    codecs: BTreeMap<&'static str, Codec>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `T` under `T::NAME`. A name can only be taken once.
    pub fn register<T: Payload>(&mut self) -> Result<&mut Self> {
        if self.codecs.contains_key(T::NAME) {
            return Err(Error::AlreadyRegistered(T::NAME.to_string()));
        }
        self.codecs.insert(
            T::NAME,
            Codec {
                encode: encode::<T>,
                decode: decode::<T>,
            },
        );
        Ok(self)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.codecs.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.codecs.keys().copied()
    }

    pub fn marshal(&self, name: &str, value: &dyn Any) -> Result<Vec<u8>> {
        let codec = self.codec(name)?;
        (codec.encode)(value)
    }

    /// Decodes `bytes` into a fresh instance of the type registered as `name`.
    pub fn unmarshal(&self, name: &str, bytes: &[u8]) -> Result<Value> {
        let codec = self.codec(name)?;
        (codec.decode)(bytes)
    }

    pub fn unmarshal_as<T: Payload>(&self, bytes: &[u8]) -> Result<T> {
        let value = self.unmarshal(T::NAME, bytes)?;
        value
            .downcast::<T>()
            .map(|value| *value)
            .map_err(|_| Error::Encoding(format!("{} decoded into another type", T::NAME)))
    }

    fn codec(&self, name: &str) -> Result<&Codec> {
        self.codecs
            .get(name)
            .ok_or_else(|| Error::UnregisteredType(name.to_string()))
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.codecs.keys()).finish()
    }
}
