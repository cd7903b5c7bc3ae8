//! Infrastructure adapters and runtime bootstrap.

pub mod cloudflare;
pub mod error;
pub mod http;
pub mod telemetry;
pub mod warmer;
