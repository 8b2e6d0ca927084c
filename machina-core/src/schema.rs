//! The schema — a declarative set of states and the relations between them.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// The name every schema implicitly carries. Required to always exist;
/// construction fails if a schema tries to remove or redefine it away.
pub const EXCEPTION: &str = "Exception";

/// A named behavioural flag with declarative relations to other states.
///
/// `require` and `remove` are binding — the scheduler enforces them when
/// computing a candidate set. `add` is advisory — a best-effort pull-in
/// that a transition may cancel without failing the whole mutation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct State {
    /// May be re-activated while already active, producing a new tick
    /// without passing through inactive.
    #[serde(default)]
    pub multi: bool,
    /// The scheduler should attempt to add this state whenever it
    /// becomes addable (see the fixed-point resolution in §4.3).
    #[serde(default)]
    pub auto: bool,
    /// All of these must be active for this state to be active.
    #[serde(default)]
    pub require: BTreeSet<String>,
    /// Activating this state implicitly (best-effort) adds these.
    #[serde(default)]
    pub add: BTreeSet<String>,
    /// Activating this state deactivates these.
    #[serde(default)]
    pub remove: BTreeSet<String>,
    /// If both this state and a name in `after` are mutated in the same
    /// transition, this state's handlers run after that name's.
    #[serde(default)]
    pub after: BTreeSet<String>,
    /// Free-form markers consulted by collaborators only — never binding.
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl State {
    /// A state with no relations — the empty default, spelled out for
    /// readability at call sites.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: mark as `multi`.
    pub fn multi(mut self) -> Self {
        self.multi = true;
        self
    }

    /// Builder: mark as `auto`.
    pub fn auto(mut self) -> Self {
        self.auto = true;
        self
    }

    /// Builder: set `require`.
    pub fn require(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.require = names.into_iter().map(Into::into).collect();
        self
    }

    /// Builder: set `add`.
    pub fn add(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.add = names.into_iter().map(Into::into).collect();
        self
    }

    /// Builder: set `remove`.
    pub fn remove(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.remove = names.into_iter().map(Into::into).collect();
        self
    }

    /// Builder: set `after`.
    pub fn after(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.after = names.into_iter().map(Into::into).collect();
        self
    }

    /// Builder: set `tags`.
    pub fn tags(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags = names.into_iter().map(Into::into).collect();
        self
    }

    /// A state-specific error sub-state: `Multi`, requiring `Exception`
    /// plus whatever additional dependencies the caller names. Mirrors
    /// the original `ErrLLM`/`ErrDB`/`ErrMem` pattern of requiring
    /// `Exception` and being re-enterable.
    pub fn error_substate(extra_require: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut require: BTreeSet<String> = extra_require.into_iter().map(Into::into).collect();
        require.insert(EXCEPTION.to_string());
        Self {
            multi: true,
            require,
            ..Default::default()
        }
    }
}

/// A validated, immutable-once-built mapping from state name to [`State`].
///
/// Declaration order is preserved (not hashed away) because it is the
/// tie-break for topological ordering (§4.1) and for deterministic
/// `auto` fixed-point resolution (§4.3, §9).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    order: Vec<String>,
    states: HashMap<String, State>,
}

/// Errors raised building a [`Schema`] or a [`crate::resolver::Resolver`] over one.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// A relation set referenced a name with no declared [`State`].
    #[error("state {state:?} references unknown state {unknown:?} via {relation}")]
    UnknownState {
        /// The state whose relation set contains the unknown name.
        state: String,
        /// The relation (`require`, `remove`, `add`, `after`) that references it.
        relation: &'static str,
        /// The unknown name.
        unknown: String,
    },
    /// A state names itself in `require`.
    #[error("state {0:?} requires itself")]
    SelfRequire(String),
    /// `after` contains a cycle.
    #[error("cycle in `after` relation involving {0:?}")]
    AfterCycle(String),
    /// The schema tried to remove or redefine `Exception` away.
    #[error("the implicit Exception state cannot be removed or redefined")]
    ExceptionRedefined,
}

impl Schema {
    /// Start building a schema from `(name, state)` pairs, in declaration
    /// order. `Exception` is added automatically if absent.
    pub fn build(
        states: impl IntoIterator<Item = (impl Into<String>, State)>,
    ) -> Result<Self, SchemaError> {
        let mut order = Vec::new();
        let mut map = HashMap::new();
        for (name, state) in states {
            let name = name.into();
            if map.insert(name.clone(), state).is_some() {
                // Re-declaration overwrites in place but keeps original order.
                continue;
            }
            order.push(name);
        }
        if !map.contains_key(EXCEPTION) {
            map.insert(EXCEPTION.to_string(), State::new());
            order.push(EXCEPTION.to_string());
        }
        let schema = Self { order, states: map };
        schema.validate()?;
        Ok(schema)
    }

    fn validate(&self) -> Result<(), SchemaError> {
        for name in &self.order {
            let state = &self.states[name];
            if state.require.contains(name) {
                return Err(SchemaError::SelfRequire(name.clone()));
            }
            for (relation, set) in [
                ("require", &state.require),
                ("add", &state.add),
                ("remove", &state.remove),
                ("after", &state.after),
            ] {
                for target in set {
                    if !self.states.contains_key(target) {
                        return Err(SchemaError::UnknownState {
                            state: name.clone(),
                            relation,
                            unknown: target.clone(),
                        });
                    }
                }
            }
        }
        self.check_after_acyclic()?;
        Ok(())
    }

    fn check_after_acyclic(&self) -> Result<(), SchemaError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            Visiting,
            Done,
        }
        let mut marks: HashMap<&str, Mark> = self
            .order
            .iter()
            .map(|n| (n.as_str(), Mark::Unvisited))
            .collect();

        fn visit<'a>(
            name: &'a str,
            schema: &'a Schema,
            marks: &mut HashMap<&'a str, Mark>,
        ) -> Result<(), SchemaError> {
            match marks.get(name).copied() {
                Some(Mark::Done) => return Ok(()),
                Some(Mark::Visiting) => return Err(SchemaError::AfterCycle(name.to_string())),
                _ => {}
            }
            marks.insert(name, Mark::Visiting);
            if let Some(state) = schema.states.get(name) {
                for after in &state.after {
                    visit(after.as_str(), schema, marks)?;
                }
            }
            marks.insert(name, Mark::Done);
            Ok(())
        }

        for name in &self.order {
            visit(name.as_str(), self, &mut marks)?;
        }
        Ok(())
    }

    /// Attempt to replace this schema in place (live extension), preserving
    /// all currently-active ticks. The new schema is validated fresh; the
    /// caller is responsible for carrying forward a [`crate::clock::Clock`]
    /// unchanged (replacing only the schema it is checked against).
    pub fn set_schema(
        new_states: impl IntoIterator<Item = (impl Into<String>, State)>,
    ) -> Result<Self, SchemaError> {
        Self::build(new_states)
    }

    /// Look up a state's declaration by name.
    pub fn get(&self, name: &str) -> Option<&State> {
        self.states.get(name)
    }

    /// True if `name` has a declared [`State`] (including the implicit `Exception`).
    pub fn contains(&self, name: &str) -> bool {
        self.states.contains_key(name)
    }

    /// All state names, in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Index of `name` in declaration order, used for deterministic
    /// tie-breaks. Returns `usize::MAX` for a name not in the schema, so an
    /// unknown name sorts last instead of panicking — callers such as
    /// [`crate::resolver::Resolver::topo_order`] sort candidate names that
    /// are already known to come from this schema, but the fallback keeps
    /// the tie-break total even if that ever stops being true.
    pub fn declaration_index(&self, name: &str) -> usize {
        self.order
            .iter()
            .position(|n| n == name)
            .unwrap_or(usize::MAX)
    }

    /// Names carrying the given free-form tag, in declaration order.
    /// Read-only and non-binding — consulted by collaborators, never by
    /// the scheduler itself.
    pub fn by_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.order
            .iter()
            .filter(move |n| self.states[*n].tags.contains(tag))
            .map(String::as_str)
    }
}
