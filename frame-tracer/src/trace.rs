//! Data structures for the mutation log.

use serde::{Deserialize, Serialize};

use crate::stack::StackEntry;
use crate::value::Value;

/// What a mutation changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MutationTarget {
    /// A named local or global slot.
    Name(String),
    /// The object whose attribute was stored into.
    Object(Value),
}

/// One recorded value-change event.
///
/// `value` is always a deep snapshot taken when the record was created;
/// later in-place mutation of the live object never alters it. `source` is
/// the shadow-stack entry that produced the change, kept for provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mutation {
    pub target: MutationTarget,
    pub value: Value,
    pub source: Option<StackEntry>,
}

impl Mutation {
    /// The changed name, for store-local mutations.
    pub fn target_name(&self) -> Option<&str> {
        match &self.target {
            MutationTarget::Name(name) => Some(name),
            MutationTarget::Object(_) => None,
        }
    }
}

/// Append-only sequence of mutations, in execution order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MutationLog {
    mutations: Vec<Mutation>,
}

impl MutationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mutation: Mutation) {
        self.mutations.push(mutation);
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    pub fn as_slice(&self) -> &[Mutation] {
        &self.mutations
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mutation> {
        self.mutations.iter()
    }

    /// Serializes the log to JSON for downstream consumers.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
