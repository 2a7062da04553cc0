//! Ports for the Virtual-Channel Router.

pub mod inbound;

pub use inbound::VirtualRoutingApi;
