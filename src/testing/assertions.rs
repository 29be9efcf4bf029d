//! Assertion functions for pipeline results.

use crate::pipeline::{FailureKind, PipelineResult};

/// Assert the total, success and failure counts of a run.
///
/// # Panics
///
/// Panics if any count differs.
pub fn assert_counts(result: &PipelineResult, total: usize, success: usize, failure: usize) {
    assert_eq!(
        (result.total_records, result.success_records, result.failure_records),
        (total, success, failure),
        "count mismatch (total, success, failure)\n  errors: {:?}",
        result.errors
    );
}

/// Assert which 1-based rows failed, in order.
///
/// # Panics
///
/// Panics if the failed rows differ.
pub fn assert_error_rows(result: &PipelineResult, rows: &[usize]) {
    let actual: Vec<usize> = result.errors.iter().map(|e| e.row_number()).collect();
    assert_eq!(actual, rows, "failed rows differ\n  errors: {:?}", result.errors);
}

/// Assert that every failure was of the given kind.
///
/// # Panics
///
/// Panics if any failure has a different kind.
pub fn assert_all_failures(result: &PipelineResult, kind: FailureKind) {
    for error in &result.errors {
        assert_eq!(error.kind, kind, "unexpected failure kind for {error:?}");
    }
}

/// Assert that every error message contains `needle`.
///
/// # Panics
///
/// Panics if a message does not contain `needle`, or there are no errors.
pub fn assert_errors_mention(result: &PipelineResult, needle: &str) {
    assert!(!result.errors.is_empty(), "expected at least one error");
    for error in &result.errors {
        assert!(
            error.message.contains(needle),
            "error message {:?} does not mention {needle:?}",
            error.message
        );
    }
}
