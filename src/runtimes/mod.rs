//! Runtime execution: the pass-looping executor.

mod executor;

pub use executor::{Executor, ExecutorError};
