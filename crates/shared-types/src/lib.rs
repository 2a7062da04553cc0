//! # Shared Types Crate
//!
//! Domain entities, the caller-facing method API and stable error codes
//! shared by every state channel subsystem.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All cross-subsystem types are defined here.
//! - **Closed Method Set**: Requests are a tagged enum; dispatch is an
//!   exhaustive match, never a string lookup.
//! - **Stable Error Identifiers**: Every failure surfaces as an [`ApiError`]
//!   with an [`ErrorCode`] and its [`ErrorClass`].

pub mod api;
pub mod entities;
pub mod errors;

pub use api::*;
pub use entities::*;
pub use errors::*;
