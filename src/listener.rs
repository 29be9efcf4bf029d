//! Lifecycle callbacks for pipeline runs.

use crate::pipeline::PipelineResult;
use tracing::{debug, info, warn};

/// Observer of one pipeline run. Every method defaults to a no-op.
///
/// `index` is the zero-based position of the record in the source stream.
pub trait PipelineListener: Send {
    fn on_pipeline_start(&mut self, _source: &str, _sink: &str) {}

    fn on_record_start(&mut self, _index: usize) {}

    fn on_record_success(&mut self, _index: usize) {}

    fn on_record_error(&mut self, _index: usize, _message: &str) {}

    /// Called after a batch reached the sink, with the number of records written.
    fn on_batch_complete(&mut self, _size: usize) {}

    fn on_pipeline_complete(&mut self, _result: &PipelineResult) {}
}

/// Reports lifecycle events through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingListener;

impl PipelineListener for TracingListener {
    fn on_pipeline_start(&mut self, source: &str, sink: &str) {
        info!(source, sink, "import started");
    }

    fn on_record_error(&mut self, index: usize, message: &str) {
        warn!(record = index, error = message, "record failed");
    }

    fn on_batch_complete(&mut self, size: usize) {
        debug!(size, "batch complete");
    }

    fn on_pipeline_complete(&mut self, result: &PipelineResult) {
        info!(
            total = result.total_records,
            success = result.success_records,
            failure = result.failure_records,
            skipped = result.skipped_records,
            "import finished"
        );
    }
}
