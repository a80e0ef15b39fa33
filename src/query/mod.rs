//! Engine statement-protocol client.

pub mod client;

pub use client::{QueryClient, QueryOutcome};
