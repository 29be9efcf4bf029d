//! Pluggable producers of synthetic field values.
//!
//! A [`ValueGenerator`] is identified by a stable string id (`"snowflake"`,
//! `"uuid"`, ...) and is looked up through a [`ValueGeneratorRegistry`]. The
//! registry is an ordinary value: build one at startup, wrap it in an `Arc`,
//! and hand it to whatever constructs field mappers. Reads are safe from many
//! concurrent runs; registration is expected to happen once, up front.
//!
//! # Example
//!
//! ```
//! use sheetpipe::generator::ValueGeneratorRegistry;
//! use sheetpipe::ProcessContext;
//!
//! let registry = ValueGeneratorRegistry::with_builtins();
//! let uuid = registry.get("uuid-no-dashes").unwrap();
//! let value = uuid.generate(&ProcessContext::new())?;
//! assert_eq!(value.to_string().len(), 32);
//! # Ok::<(), sheetpipe::EtlError>(())
//! ```

mod snowflake;
#[cfg(feature = "timestamp-generator")]
mod timestamp;
mod uuid;

pub use snowflake::SnowflakeGenerator;
#[cfg(feature = "timestamp-generator")]
pub use timestamp::TimestampGenerator;
pub use uuid::UuidGenerator;

use crate::context::ProcessContext;
use crate::error::Result;
use crate::value::{Value, ValueKind};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A producer of one value per invocation.
///
/// Implementations must be stateless or synchronize their own state, since a
/// single instance is shared by every run in the process.
pub trait ValueGenerator: Send + Sync {
    /// Stable identifier used in configuration.
    fn id(&self) -> &str;

    /// Human-readable name.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Kind of value returned by [`generate`](Self::generate).
    fn value_type(&self) -> ValueKind;

    /// Produce the next value.
    ///
    /// # Errors
    ///
    /// Returns an error if the generator cannot produce a value right now.
    fn generate(&self, ctx: &ProcessContext) -> Result<Value>;
}

/// Serializable summary of a registered generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorDescriptor {
    pub id: String,
    pub name: String,
    pub description: String,
    pub value_type: ValueKind,
}

/// Concurrent map of generator id to generator.
#[derive(Default)]
pub struct ValueGeneratorRegistry {
    generators: RwLock<HashMap<String, Arc<dyn ValueGenerator>>>,
}

impl ValueGeneratorRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every built-in generator.
    ///
    /// Always registers `snowflake`, `uuid` and `uuid-no-dashes`; `timestamp`
    /// is added when the `timestamp-generator` feature is enabled.
    #[must_use]
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register(Arc::new(SnowflakeGenerator::default()));
        registry.register(Arc::new(UuidGenerator::new()));
        registry.register(Arc::new(UuidGenerator::without_dashes()));
        #[cfg(feature = "timestamp-generator")]
        registry.register(Arc::new(TimestampGenerator));
        registry
    }

    /// Register a generator under its id, returning the one it replaced.
    pub fn register(&self, generator: Arc<dyn ValueGenerator>) -> Option<Arc<dyn ValueGenerator>> {
        let id = generator.id().to_string();
        self.generators.write().insert(id, generator)
    }

    /// Remove a generator, returning it if it was registered.
    pub fn unregister(&self, id: &str) -> Option<Arc<dyn ValueGenerator>> {
        self.generators.write().remove(id)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<dyn ValueGenerator>> {
        self.generators.read().get(id).cloned()
    }

    #[must_use]
    pub fn has(&self, id: &str) -> bool {
        self.generators.read().contains_key(id)
    }

    /// Every registered generator, sorted by id.
    #[must_use]
    pub fn all(&self) -> Vec<Arc<dyn ValueGenerator>> {
        let mut all: Vec<_> = self.generators.read().values().cloned().collect();
        all.sort_by(|a, b| a.id().cmp(b.id()));
        all
    }

    /// Descriptors for every registered generator, sorted by id.
    #[must_use]
    pub fn descriptors(&self) -> Vec<GeneratorDescriptor> {
        self.all()
            .iter()
            .map(|g| GeneratorDescriptor {
                id: g.id().to_string(),
                name: g.name().to_string(),
                description: g.description().to_string(),
                value_type: g.value_type(),
            })
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.generators.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.generators.read().is_empty()
    }
}

impl fmt::Debug for ValueGeneratorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<String> = self.all().iter().map(|g| g.id().to_string()).collect();
        f.debug_struct("ValueGeneratorRegistry").field("generators", &ids).finish()
    }
}
