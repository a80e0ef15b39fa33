//! Parallel fan-out execution across cluster nodes.

mod fanout;
mod result;

pub use fanout::Fanout;
pub use result::TaskResult;
