//! Command glue: each module builds a target selection and an operation,
//! hands them to the executor or a transport, and reports per-host outcomes.

pub mod debug;
pub mod exec;
pub mod logs;
pub mod query;
pub mod rules;
pub mod server;
pub mod warmup;
