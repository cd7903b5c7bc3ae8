//! Application services: purge workflow and link rewriting.

pub mod cdn;
pub mod error;
pub mod links;
pub mod purge;
