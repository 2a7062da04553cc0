//! # Integration Tests
//!
//! Whole nodes talking over the in-memory hub and chain. Every scenario
//! goes through the public method API; store internals are read only to
//! compare replicas.

#[cfg(test)]
pub mod harness;

pub mod concurrency;
pub mod direct_channel;
pub mod node_surface;
pub mod virtual_routing;
