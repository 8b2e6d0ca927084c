//! The seam between a scheduler and a handler dispatcher.
//!
//! `machina-scheduler` calls a [`Dispatcher`] to run negotiation and effect
//! handlers; `machina-dispatch` provides the implementation backed by its
//! `HandlerRegistry`. Defining the trait here (rather than in either crate)
//! keeps both as leaves over `machina-core` instead of depending on one
//! another.

use crate::phase::{Event, HandlerPhase};
use async_trait::async_trait;
use std::fmt;

/// A handler panicked or otherwise failed irrecoverably. The scheduler
/// converts this into an `Exception` activation rather than propagating it.
#[derive(Debug)]
pub struct DispatchError(pub String);

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler failed: {}", self.0)
    }
}

impl std::error::Error for DispatchError {}

/// Invokes the handler bound to a single `(state, phase)` pair, if any.
///
/// For negotiation phases (`Enter`/`Exit`) the returned `bool` decides
/// whether the transition proceeds. For effect phases (`State`/`End`/`Any`)
/// the return value is ignored by callers but must still be `Ok(true)` when
/// no handler is bound, so a scheduler never has to special-case "unbound".
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Run the handler for `state` at `phase` against `event`. Returns
    /// `Ok(true)` to proceed (including when no handler is bound), `Ok(false)`
    /// to veto (negotiation phases only — effect phases should never return
    /// this), `Err` if the handler itself failed.
    async fn invoke(
        &self,
        state: &str,
        phase: HandlerPhase,
        event: &Event,
    ) -> Result<bool, DispatchError>;
}

/// A dispatcher with no handlers bound — every phase is a no-op that
/// always proceeds. Useful for exercising the scheduler in isolation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDispatcher;

#[async_trait]
impl Dispatcher for NullDispatcher {
    async fn invoke(
        &self,
        _state: &str,
        _phase: HandlerPhase,
        _event: &Event,
    ) -> Result<bool, DispatchError> {
        Ok(true)
    }
}
