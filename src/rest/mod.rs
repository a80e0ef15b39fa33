//! HTTP transports: the raw REST session plus the engine (`v1`) and
//! acceleration-layer (`v1/ext/varada`) clients built on it.

pub mod client;
pub mod engine;
pub mod varada;

pub use client::RestSession;
pub use engine::{EngineRest, EngineTransport};
pub use varada::{VaradaRest, VaradaTransport};
