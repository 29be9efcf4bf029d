use super::ValueGenerator;
use crate::context::ProcessContext;
use crate::error::Result;
use crate::value::{Value, ValueKind};
use chrono::Utc;

/// The current UTC time, id `timestamp`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampGenerator;

impl ValueGenerator for TimestampGenerator {
    fn id(&self) -> &str {
        "timestamp"
    }

    fn name(&self) -> &str {
        "Timestamp"
    }

    fn description(&self) -> &str {
        "Current UTC date and time at the moment the record is mapped"
    }

    fn value_type(&self) -> ValueKind {
        ValueKind::Timestamp
    }

    fn generate(&self, _ctx: &ProcessContext) -> Result<Value> {
        Ok(Value::Timestamp(Utc::now().naive_utc()))
    }
}
