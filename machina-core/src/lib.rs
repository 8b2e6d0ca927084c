//! # machina-core — schema, clock, and handler-phase vocabulary
//!
//! This crate defines the data model shared by every other `machina-*`
//! crate: the declarative [`Schema`] of states and relations, the
//! [`Resolver`] built over one, the per-state [`Clock`], the [`Mutation`]
//! an external caller submits, the [`Transition`] a scheduler commits, the
//! five-phase [`HandlerPhase`] vocabulary a dispatcher invokes, and the
//! [`Group`]/[`Condition`] vocabulary higher layers gate on.
//!
//! None of these types run anything — `machina-scheduler` drives
//! [`Mutation`]s into [`Transition`]s, `machina-dispatch` invokes handlers
//! per [`HandlerPhase`], and `machina-actor` composes both into a usable
//! unit. This crate only defines what they agree on.
//!
//! ## Dependency Notes
//!
//! Like the crate this workspace is grounded on, argument payloads use
//! `serde_json::Value` rather than a generic `T: Serialize` — JSON is the
//! universal interchange format here, and a generic parameter would
//! complicate passing a [`Mutation`] across an object-safe trait boundary
//! (the scheduler and dispatcher both operate on trait objects).

#![deny(missing_docs)]

pub mod args;
pub mod clock;
pub mod dispatch;
pub mod duration;
pub mod error;
pub mod group;
pub mod id;
pub mod mutation;
pub mod phase;
pub mod resolver;
pub mod schema;
pub mod transition;

pub use args::{ArgBag, TransportArgs};
pub use clock::{Clock, Snapshot};
pub use dispatch::{DispatchError, Dispatcher, NullDispatcher};
pub use duration::DurationMs;
pub use group::{Condition, Group};
pub use id::{ActorId, ScopeId, SessionId};
pub use mutation::{Mutation, MutationKind, MutationWire};
pub use phase::{Event, HandlerPhase};
pub use resolver::{Relation, Resolver};
pub use schema::{Schema, SchemaError, State, EXCEPTION};
pub use transition::{CancelReason, HandlerCall, MutationResult, Transition};
