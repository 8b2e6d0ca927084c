#![deny(missing_docs)]
//! # machina — umbrella crate
//!
//! A single import surface over the `machina-*` workspace: a declarative
//! schema of states and relations, a transactional scheduler that
//! commits or cancels mutations atomically, an ordered handler
//! dispatcher, pluggable transition history, and an actor facade tying
//! all of it together. Re-exports each crate behind a feature flag, plus
//! a [`prelude`] for the happy path.

#[cfg(feature = "core")]
pub use machina_core;
#[cfg(feature = "scheduler")]
pub use machina_scheduler;
#[cfg(feature = "dispatch")]
pub use machina_dispatch;
#[cfg(feature = "history")]
pub use machina_history;
#[cfg(feature = "history-sqlite")]
pub use machina_history_sqlite;
#[cfg(feature = "history-sled")]
pub use machina_history_sled;
#[cfg(feature = "actor")]
pub use machina_actor;
#[cfg(feature = "repl")]
pub use machina_repl;

/// Happy-path imports for composing a machina actor.
pub mod prelude {
    #[cfg(feature = "core")]
    pub use machina_core::{
        ArgBag, CancelReason, Clock, Condition, Dispatcher, Event, Group, HandlerCall,
        HandlerPhase, Mutation, MutationKind, MutationResult, MutationWire, NullDispatcher,
        Resolver, Schema, SchemaError, Snapshot, State, Transition, TransportArgs, EXCEPTION,
    };

    #[cfg(feature = "core")]
    pub use machina_core::{ActorId, ScopeId, SessionId};

    #[cfg(feature = "scheduler")]
    pub use machina_scheduler::{resolve_candidate, ChangeCallback, Scheduler};

    #[cfg(feature = "dispatch")]
    pub use machina_dispatch::{effect_fn, handler_fn, HandlerFn, HandlerRegistry};

    #[cfg(feature = "history")]
    pub use machina_history::{History, HistoryError, HistoryRecord, InMemoryHistory};

    #[cfg(feature = "history-sqlite")]
    pub use machina_history_sqlite::SqliteHistory;

    #[cfg(feature = "history-sled")]
    pub use machina_history_sled::SledHistory;

    #[cfg(feature = "actor")]
    pub use machina_actor::{
        tool_contract_schema, Actor, ActorConfig, ActorHandle, ActorStatus, StatusError,
        SubscriptionRegistry,
    };

    #[cfg(feature = "repl")]
    pub use machina_repl::{Opcode, ReplError, Request, Response, Server};
}
