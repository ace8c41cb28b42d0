//! The frame handle: what the trace-hook installer must expose.
//!
//! The tracer never reaches into VM internals. Everything it needs from the
//! traced frame comes through [`FrameView`]: the current instruction
//! pointer, the decoded instruction stream, and the three name-resolution
//! scopes in priority order.

use std::collections::{BTreeMap, HashMap};

use crate::error::{Result, TraceError};
use crate::instruction::Instruction;
use crate::value::Value;

/// One name-resolution scope.
pub trait Scope {
    /// The current binding of `name` in this scope, if any.
    fn get(&self, name: &str) -> Option<Value>;
}

impl Scope for HashMap<String, Value> {
    fn get(&self, name: &str) -> Option<Value> {
        HashMap::get(self, name).cloned()
    }
}

impl Scope for BTreeMap<String, Value> {
    fn get(&self, name: &str) -> Option<Value> {
        BTreeMap::get(self, name).cloned()
    }
}

/// Read-only view of one call frame.
pub trait FrameView {
    /// Offset of the most recently executed instruction.
    fn last_instruction(&self) -> usize;

    /// The full decoded instruction stream of the frame's code unit.
    fn instructions(&self) -> &[Instruction];

    /// Name scopes in fixed priority order: local, global, builtin.
    fn scopes(&self) -> [&dyn Scope; 3];
}

/// Resolves `name` through the frame's scopes, first hit wins.
///
/// # Errors
///
/// [`TraceError::UnresolvedName`] if the name is absent from all three
/// scopes. Callers treat this as recoverable for the trace.
pub fn resolve(frame: &dyn FrameView, name: &str) -> Result<Value> {
    frame
        .scopes()
        .iter()
        .find_map(|scope| scope.get(name))
        .ok_or_else(|| TraceError::UnresolvedName {
            name: name.to_owned(),
        })
}

/// A concrete in-memory frame, used by embedders and tests.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    instructions: Vec<Instruction>,
    pub locals: HashMap<String, Value>,
    pub globals: HashMap<String, Value>,
    pub builtins: HashMap<String, Value>,
    last_instruction: usize,
}

impl Frame {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self {
            instructions,
            ..Self::default()
        }
    }

    /// Moves the instruction pointer to `offset`.
    pub fn advance_to(&mut self, offset: usize) {
        self.last_instruction = offset;
    }

    pub fn set_local(&mut self, name: impl Into<String>, value: Value) {
        self.locals.insert(name.into(), value);
    }

    pub fn set_global(&mut self, name: impl Into<String>, value: Value) {
        self.globals.insert(name.into(), value);
    }

    pub fn set_builtin(&mut self, name: impl Into<String>, value: Value) {
        self.builtins.insert(name.into(), value);
    }
}

impl FrameView for Frame {
    fn last_instruction(&self) -> usize {
        self.last_instruction
    }

    fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    fn scopes(&self) -> [&dyn Scope; 3] {
        [&self.locals, &self.globals, &self.builtins]
    }
}
