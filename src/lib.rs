pub mod comparison;
pub mod config;
pub mod error;
pub mod executor;
pub mod output;
pub mod tabular;

pub use comparison::{BatchResult, BatchRunner, ComparisonEngine, ComparisonReport};
pub use error::{ComparerError, ComparerResult};
pub use executor::{QueryBackend, QueryExecutor, RetryPolicy, SqliteBackend};
pub use tabular::{ParameterSet, Row, ScalarValue, TabularResult};
