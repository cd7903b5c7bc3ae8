//! Domain layer types and invariants.

pub mod content;
pub mod credentials;
pub mod error;
pub mod nocache;
pub mod purge;
