use super::ValueGenerator;
use crate::context::ProcessContext;
use crate::error::{EtlError, Result};
use crate::value::{Value, ValueKind};
use chrono::Utc;
use parking_lot::Mutex;

/// 2020-01-01T00:00:00Z in milliseconds.
const EPOCH_MS: i64 = 1_577_836_800_000;

const WORKER_BITS: u32 = 5;
const DATACENTER_BITS: u32 = 5;
const SEQUENCE_BITS: u32 = 12;

const MAX_WORKER_ID: i64 = (1 << WORKER_BITS) - 1;
const MAX_DATACENTER_ID: i64 = (1 << DATACENTER_BITS) - 1;
const SEQUENCE_MASK: i64 = (1 << SEQUENCE_BITS) - 1;

const WORKER_SHIFT: u32 = SEQUENCE_BITS;
const DATACENTER_SHIFT: u32 = SEQUENCE_BITS + WORKER_BITS;
const TIMESTAMP_SHIFT: u32 = SEQUENCE_BITS + WORKER_BITS + DATACENTER_BITS;

#[derive(Debug, Default)]
struct State {
    last_ms: i64,
    sequence: i64,
}

/// Time-ordered 64-bit ids, id `snowflake`.
///
/// Layout from high to low bits: 41 bits of milliseconds since 2020-01-01,
/// 5 bits datacenter, 5 bits worker, 12 bits per-millisecond sequence.
#[derive(Debug)]
pub struct SnowflakeGenerator {
    worker_id: i64,
    datacenter_id: i64,
    state: Mutex<State>,
}

impl SnowflakeGenerator {
    /// Create a generator for the given worker and datacenter.
    ///
    /// # Errors
    ///
    /// Returns [`EtlError::Configuration`] if either id does not fit in 5 bits.
    pub fn new(worker_id: i64, datacenter_id: i64) -> Result<Self> {
        if !(0..=MAX_WORKER_ID).contains(&worker_id) {
            return Err(EtlError::Configuration(format!(
                "snowflake worker id must be between 0 and {MAX_WORKER_ID}, got {worker_id}"
            )));
        }
        if !(0..=MAX_DATACENTER_ID).contains(&datacenter_id) {
            return Err(EtlError::Configuration(format!(
                "snowflake datacenter id must be between 0 and {MAX_DATACENTER_ID}, got {datacenter_id}"
            )));
        }
        Ok(Self {
            worker_id,
            datacenter_id,
            state: Mutex::new(State::default()),
        })
    }

    /// Produce the next id.
    ///
    /// # Errors
    ///
    /// Fails if the system clock moved backwards since the previous id.
    pub fn next_id(&self) -> Result<i64> {
        let mut state = self.state.lock();
        let mut now = current_ms();

        if now < state.last_ms {
            return Err(EtlError::Configuration(format!(
                "clock moved backwards by {} ms, refusing to generate id",
                state.last_ms - now
            )));
        }

        if now == state.last_ms {
            state.sequence = (state.sequence + 1) & SEQUENCE_MASK;
            if state.sequence == 0 {
                // Sequence exhausted for this millisecond.
                while now <= state.last_ms {
                    std::hint::spin_loop();
                    now = current_ms();
                }
            }
        } else {
            state.sequence = 0;
        }

        state.last_ms = now;
        Ok(((now - EPOCH_MS) << TIMESTAMP_SHIFT)
            | (self.datacenter_id << DATACENTER_SHIFT)
            | (self.worker_id << WORKER_SHIFT)
            | state.sequence)
    }

    /// Split an id back into `(milliseconds since epoch, datacenter, worker, sequence)`.
    #[must_use]
    pub const fn decompose(id: i64) -> (i64, i64, i64, i64) {
        (
            (id >> TIMESTAMP_SHIFT) + EPOCH_MS,
            (id >> DATACENTER_SHIFT) & MAX_DATACENTER_ID,
            (id >> WORKER_SHIFT) & MAX_WORKER_ID,
            id & SEQUENCE_MASK,
        )
    }
}

impl Default for SnowflakeGenerator {
    fn default() -> Self {
        Self {
            worker_id: 1,
            datacenter_id: 1,
            state: Mutex::new(State::default()),
        }
    }
}

fn current_ms() -> i64 {
    Utc::now().timestamp_millis()
}

impl ValueGenerator for SnowflakeGenerator {
    fn id(&self) -> &str {
        "snowflake"
    }

    fn name(&self) -> &str {
        "Snowflake ID"
    }

    fn description(&self) -> &str {
        "Distributed, time-ordered 64-bit unique id"
    }

    fn value_type(&self) -> ValueKind {
        ValueKind::Long
    }

    fn generate(&self, _ctx: &ProcessContext) -> Result<Value> {
        self.next_id().map(Value::Long)
    }
}
