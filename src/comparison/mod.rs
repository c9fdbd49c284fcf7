pub mod batch;
pub mod engine;
pub mod report;
pub mod row;

pub use batch::{BatchResult, BatchRunner, FailurePolicy, SweepFailure, SweepOptions};
pub use engine::{CompareOptions, ComparisonEngine};
pub use report::{ComparisonReport, RowDifference};
pub use row::{CellDifference, RowComparator, RowDiff, ValueEquality};
