//! # machina-dispatch — the ordered, short-circuiting handler registry
//!
//! [`HandlerRegistry`] binds closures to `(state, phase)` pairs and
//! implements [`machina_core::Dispatcher`] over the binding, so a
//! `machina-scheduler::Scheduler` can drive it directly. Handlers bound to
//! the same pair run in registration order; a negotiation phase
//! (`Enter`/`Exit`) short-circuits on the first handler that returns
//! `false`, mirroring an ordered pipeline with early-exit rather than a
//! reflection-based dispatch table.

#![deny(missing_docs)]

use async_trait::async_trait;
use machina_core::{DispatchError, Dispatcher, Event, HandlerPhase};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// The boxed future a handler returns.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<bool, DispatchError>> + Send>>;

/// A registered handler: takes an owned [`Event`] (owned, not borrowed, so
/// it can be moved into the boxed future without fighting lifetimes) and
/// returns whether the transition should proceed.
pub type HandlerFn = Arc<dyn Fn(Event) -> HandlerFuture + Send + Sync>;

/// Wrap a plain async closure into a [`HandlerFn`].
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<bool, DispatchError>> + Send + 'static,
{
    Arc::new(move |event| Box::pin(f(event)))
}

/// Wrap an infallible, always-proceeding effect closure into a [`HandlerFn`].
/// Intended for `State`/`End`/`Any` handlers that have no veto power.
pub fn effect_fn<F>(f: F) -> HandlerFn
where
    F: Fn(&Event) + Send + Sync + 'static,
{
    Arc::new(move |event| {
        f(&event);
        Box::pin(async { Ok(true) })
    })
}

/// An ordered, per-`(state, phase)` pipeline of handlers.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<(String, HandlerPhase), Vec<HandlerFn>>,
}

impl HandlerRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a handler to `(state, phase)`, appending to any already bound.
    pub fn on(&mut self, state: impl Into<String>, phase: HandlerPhase, handler: HandlerFn) -> &mut Self {
        self.handlers
            .entry((state.into(), phase))
            .or_default()
            .push(handler);
        self
    }

    /// Number of handlers bound to `(state, phase)`.
    pub fn len_for(&self, state: &str, phase: HandlerPhase) -> usize {
        self.handlers
            .get(&(state.to_string(), phase))
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl Dispatcher for HandlerRegistry {
    async fn invoke(
        &self,
        state: &str,
        phase: HandlerPhase,
        event: &Event,
    ) -> Result<bool, DispatchError> {
        let Some(bound) = self.handlers.get(&(state.to_string(), phase)) else {
            return Ok(true);
        };
        for handler in bound {
            let proceed = run_isolated(handler(event.clone())).await?;
            if phase.is_negotiation() && !proceed {
                tracing::debug!(state, ?phase, "handler vetoed transition");
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Run a handler's future on its own task so a panic inside it unwinds that
/// task instead of the scheduler's, surfacing here as an ordinary
/// [`DispatchError`] the scheduler escalates into an `Exception` activation.
async fn run_isolated(fut: HandlerFuture) -> Result<bool, DispatchError> {
    match tokio::spawn(fut).await {
        Ok(result) => result,
        Err(join_err) if join_err.is_panic() => {
            let payload = join_err.into_panic();
            Err(DispatchError(panic_message(payload)))
        }
        Err(join_err) => Err(DispatchError(format!("handler task cancelled: {join_err}"))),
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}
