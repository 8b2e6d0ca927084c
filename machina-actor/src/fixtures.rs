//! Small reusable schema fixtures, useful in tests and as starting points.

use machina_core::{Schema, State};

/// A minimal tool-contract schema: `Start` boots the tool, `Ready` follows
/// it, and `Working`/`Idle` toggle mutually exclusively once ready, with
/// `Idle` auto-activating whenever `Ready` is active and `Working` isn't.
pub fn tool_contract_schema() -> Schema {
    Schema::build([
        ("Start", State::new()),
        ("Ready", State::new().require(["Start"])),
        (
            "Working",
            State::new().require(["Ready"]).remove(["Idle"]),
        ),
        (
            "Idle",
            State::new()
                .auto()
                .require(["Ready"])
                .remove(["Working"]),
        ),
    ])
    .expect("tool contract schema is internally consistent")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_contract_builds() {
        let schema = tool_contract_schema();
        assert!(schema.contains("Working"));
        assert!(schema.contains("Idle"));
    }
}
