//! Single import surface for this crate's error types.
//!
//! Mirrors the teacher's convention of centralizing error enums behind
//! one module even though each is defined alongside the type it guards.

pub use crate::dispatch::DispatchError;
pub use crate::schema::SchemaError;
pub use crate::transition::CancelReason;
