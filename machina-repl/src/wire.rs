//! The request/response wire format: numeric opcodes, JSON bodies, the
//! same typed-arg conventions used in-process (non-transportable fields
//! stripped via [`machina_core::MutationWire`]).

use machina_core::{MutationResult, MutationWire};
use serde::{Deserialize, Serialize};

/// A REPL command, addressed by number rather than name so the wire
/// format is stable across renames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// Return every state name in the actor's schema, declaration order.
    InspectSchema,
    /// Return the currently active state names.
    ListActive,
    /// Submit a mutation and return its result.
    PushMutation,
    /// Stream one response per committed transition until disconnect.
    Subscribe,
}

impl Opcode {
    /// The numeric code this opcode serialises to on the wire.
    pub fn code(self) -> u8 {
        match self {
            Opcode::InspectSchema => 1,
            Opcode::ListActive => 2,
            Opcode::PushMutation => 3,
            Opcode::Subscribe => 4,
        }
    }

    /// Parse a numeric code back into an opcode, `None` if unrecognised.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Opcode::InspectSchema),
            2 => Some(Opcode::ListActive),
            3 => Some(Opcode::PushMutation),
            4 => Some(Opcode::Subscribe),
            _ => None,
        }
    }
}

/// One request line: which actor, which opcode, and an opcode-dependent
/// body. `actor` addresses one of the names a [`crate::Server`] was bound
/// with; `mutation` is only read for [`Opcode::PushMutation`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// The numeric opcode, see [`Opcode::from_code`].
    pub opcode: u8,
    /// The actor this request targets.
    pub actor: String,
    /// The mutation to submit, required only for `PushMutation`.
    #[serde(default)]
    pub mutation: Option<MutationWire>,
}

/// One response line. Exactly one of the optional fields is populated,
/// depending on which opcode produced it; `error` is set instead of any
/// of them on failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Response {
    /// Whether the request succeeded.
    pub ok: bool,
    /// Populated by `InspectSchema`.
    #[serde(default)]
    pub schema_names: Option<Vec<String>>,
    /// Populated by `ListActive`, and by every `Subscribe` tick.
    #[serde(default)]
    pub active: Option<Vec<String>>,
    /// Populated by `PushMutation`.
    #[serde(default)]
    pub result: Option<MutationResult>,
    /// Populated on failure instead of any of the above.
    #[serde(default)]
    pub error: Option<String>,
}

impl Response {
    /// An error response carrying `message`.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(message.into()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_round_trips_through_its_numeric_code() {
        for opcode in [
            Opcode::InspectSchema,
            Opcode::ListActive,
            Opcode::PushMutation,
            Opcode::Subscribe,
        ] {
            assert_eq!(Opcode::from_code(opcode.code()), Some(opcode));
        }
    }

    #[test]
    fn unknown_code_is_rejected() {
        assert_eq!(Opcode::from_code(0), None);
        assert_eq!(Opcode::from_code(255), None);
    }

    #[test]
    fn request_deserialises_without_a_mutation_body() {
        let request: Request =
            serde_json::from_str(r#"{"opcode":2,"actor":"a1"}"#).unwrap();
        assert_eq!(request.opcode, 2);
        assert!(request.mutation.is_none());
    }
}
