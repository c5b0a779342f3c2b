//! The parallel map/reduce subsystem: a persistent worker pool with one
//! thread-affine script runtime per worker, the fan-out/merge executor
//! that runs a view task across a database's shard snapshot, and the
//! query-option-aware results wrapper.

pub mod executor;
pub mod pool;
pub mod results;
pub mod task;

pub use executor::{MapReduceExecutor, MapReduceOutcome};
pub use pool::MapReduceThreadPool;
pub use results::{MapReduceResults, ViewRow};
pub use task::{wrap_source, MapReduceTask};
