//! # Virtual-Channel Router (Subsystem 4)
//!
//! Lets two parties without a shared channel run an app through one or more
//! intermediaries. Each hop channel on the route holds its own copy of the
//! app with collateral committed by that hop's two participants; the
//! intermediaries never touch app state, they only lock and release
//! collateral and forward updates unchanged.
//!
//! Install is all-or-nothing across hops. Uninstall walks the same route
//! and maps the ends' final balances onto every hop.

pub mod domain;
pub mod ports;
pub mod service;

pub use domain::RouterError;
pub use ports::VirtualRoutingApi;
pub use service::VirtualRouter;
