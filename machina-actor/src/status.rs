//! The actor's public lifecycle status, independent of its domain schema's
//! active set.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// `created --Start--> booting --Ready--> live <-Interrupted/Resume-> suspended`,
/// either of which disposes into the terminal `disposed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorStatus {
    /// Constructed but not yet started.
    Created,
    /// `start()` called, awaiting `ready()`.
    Booting,
    /// Running normally.
    Live,
    /// Interrupted: the interruptable group's active member was forced out.
    Suspended,
    /// Terminal. Context cancelled, history closed, pipes unsubscribed.
    Disposed,
}

/// An illegal status transition was attempted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("cannot {action} while {current:?}")]
pub struct StatusError {
    /// The transition that was attempted (`start`, `ready`, `interrupt`, `resume`, `dispose`).
    pub action: &'static str,
    /// The status the actor was actually in.
    pub current: ActorStatus,
}

impl ActorStatus {
    /// Validate and return the next status for `action`, or an error
    /// naming the illegal transition.
    pub fn advance(self, action: &'static str) -> Result<ActorStatus, StatusError> {
        use ActorStatus::*;
        let next = match (self, action) {
            (Created, "start") => Booting,
            (Booting, "ready") => Live,
            (Live, "interrupt") => Suspended,
            (Suspended, "resume") => Live,
            (Live, "dispose") | (Suspended, "dispose") => Disposed,
            (Disposed, "dispose") => Disposed,
            _ => {
                return Err(StatusError {
                    action,
                    current: self,
                })
            }
        };
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_reaches_live() {
        let status = ActorStatus::Created;
        let status = status.advance("start").unwrap();
        assert_eq!(status, ActorStatus::Booting);
        let status = status.advance("ready").unwrap();
        assert_eq!(status, ActorStatus::Live);
    }

    #[test]
    fn ready_before_start_is_rejected() {
        assert!(ActorStatus::Created.advance("ready").is_err());
    }

    #[test]
    fn dispose_is_idempotent() {
        assert_eq!(
            ActorStatus::Disposed.advance("dispose").unwrap(),
            ActorStatus::Disposed
        );
    }
}
