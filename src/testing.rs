//! Testing utilities for import pipelines.
//!
//! - **Mock sink**: [`RecordingSink`] remembers every write call and can be
//!   told to fail a given write, emulating a transaction that rolls back
//! - **Builders**: [`RowBuilder`] and [`fields`] for raw rows and field maps
//! - **Fixtures**: the small orders dataset used throughout the test suite
//! - **Temporary databases**: [`TempDatabase`] creates a SQLite file from DDL
//! - **Assertions**: counts and error-row checks for [`PipelineResult`]s
//!
//! # Quick Start
//!
//! ```
//! use sheetpipe::pipeline::Pipeline;
//! use sheetpipe::testing::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let (source, processor) = orders_fixture(true);
//! let mut pipeline = Pipeline::new(source, RecordingSink::new())
//!     .processor(processor)
//!     .batch_size(2);
//!
//! let result = pipeline.run()?;
//! assert_counts(&result, 3, 2, 1);
//! assert_error_rows(&result, &[4]);
//! # Ok(())
//! # }
//! ```
//!
//! [`PipelineResult`]: crate::pipeline::PipelineResult

pub mod assertions;
pub mod builders;
pub mod fixtures;
pub mod mock_io;
pub mod mock_sink;

pub use assertions::*;
pub use builders::*;
pub use fixtures::*;
pub use mock_io::*;
pub use mock_sink::*;
