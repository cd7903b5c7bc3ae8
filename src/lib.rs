//! Cloudflare cache-purge bridge.
//!
//! Receives save events from a publishing host, purges the affected URLs at
//! the Cloudflare edge, and rewrites links for logged-in visitors so they
//! bypass the edge cache.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
