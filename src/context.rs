//! Per-run shared state and the cooperative abort signal.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

/// Mutable state shared by every processor stage of one pipeline run.
///
/// Stages may stash arbitrary attributes here and may call [`abort`](Self::abort)
/// to reject the record currently being processed. The pipeline calls
/// [`clear`](Self::clear) right after consuming an aborted record, so abort
/// state never leaks into the next record.
///
/// # Example
///
/// ```
/// use sheetpipe::ProcessContext;
///
/// let mut ctx = ProcessContext::new();
/// ctx.set("tenant", 42_u32);
/// assert_eq!(ctx.get::<u32>("tenant"), Some(&42));
///
/// ctx.abort("duplicate key");
/// assert!(ctx.is_aborted());
/// assert_eq!(ctx.abort_reason(), Some("duplicate key"));
///
/// ctx.clear();
/// assert!(!ctx.is_aborted());
/// assert!(!ctx.has("tenant"));
/// ```
#[derive(Default)]
pub struct ProcessContext {
    attributes: HashMap<String, Box<dyn Any + Send + Sync>>,
    aborted: bool,
    abort_reason: Option<String>,
}

impl ProcessContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an attribute, replacing any previous value under `key`.
    pub fn set<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.attributes.insert(key.into(), Box::new(value));
    }

    /// Fetch an attribute by key, if present and of type `T`.
    #[must_use]
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.attributes.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    /// Remove an attribute, returning whether it existed.
    pub fn remove(&mut self, key: &str) -> bool {
        self.attributes.remove(key).is_some()
    }

    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    /// Mark the current record as rejected.
    pub fn abort(&mut self, reason: impl Into<String>) {
        self.aborted = true;
        self.abort_reason = Some(reason.into());
    }

    #[must_use]
    pub const fn is_aborted(&self) -> bool {
        self.aborted
    }

    #[must_use]
    pub fn abort_reason(&self) -> Option<&str> {
        self.abort_reason.as_deref()
    }

    /// Reset the abort flag and drop every attribute.
    pub fn clear(&mut self) {
        self.attributes.clear();
        self.aborted = false;
        self.abort_reason = None;
    }
}

impl fmt::Debug for ProcessContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&String> = self.attributes.keys().collect();
        keys.sort();
        f.debug_struct("ProcessContext")
            .field("attributes", &keys)
            .field("aborted", &self.aborted)
            .field("abort_reason", &self.abort_reason)
            .finish()
    }
}
