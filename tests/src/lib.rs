//! # State Channel Node Test Suite
//!
//! Multi-node scenarios run over the in-memory chain and messaging hub.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── harness.rs          # Network of nodes, request helpers
//!     ├── direct_channel.rs   # Two-party install / update / uninstall
//!     ├── virtual_routing.rs  # Apps routed through an intermediary
//!     └── node_surface.rs     # Deposits, failures, events, restarts
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p sc-tests
//! cargo test -p sc-tests integration::virtual_routing
//! ```

#![allow(dead_code)]

pub mod integration;
