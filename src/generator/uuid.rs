use super::ValueGenerator;
use crate::context::ProcessContext;
use crate::error::Result;
use crate::value::{Value, ValueKind};
use ::uuid::Uuid;

/// Random (v4) UUIDs as text, hyphenated or in simple 32-digit form.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator {
    strip_dashes: bool,
}

impl UuidGenerator {
    /// Hyphenated form, id `uuid`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            strip_dashes: false,
        }
    }

    /// 32 hex digits with no separators, id `uuid-no-dashes`.
    #[must_use]
    pub const fn without_dashes() -> Self {
        Self { strip_dashes: true }
    }
}

impl ValueGenerator for UuidGenerator {
    fn id(&self) -> &str {
        if self.strip_dashes {
            "uuid-no-dashes"
        } else {
            "uuid"
        }
    }

    fn name(&self) -> &str {
        if self.strip_dashes {
            "UUID (no dashes)"
        } else {
            "UUID"
        }
    }

    fn description(&self) -> &str {
        if self.strip_dashes {
            "Random UUID rendered as 32 hex digits"
        } else {
            "Random UUID in 8-4-4-4-12 hyphenated form"
        }
    }

    fn value_type(&self) -> ValueKind {
        ValueKind::Text
    }

    fn generate(&self, _ctx: &ProcessContext) -> Result<Value> {
        let id = Uuid::new_v4();
        let text = if self.strip_dashes {
            id.simple().to_string()
        } else {
            id.hyphenated().to_string()
        };
        Ok(Value::Text(text))
    }
}
