//! Error types for the frame tracer.

use thiserror::Error;

/// Errors raised while scanning a frame's executed instructions.
///
/// The scan driver treats [`TraceError::UnresolvedName`] as recoverable
/// (the offending mutation is skipped and reported as a warning); everything
/// else invalidates the cursor state and aborts the trace for that frame.
/// None of these are ever surfaced as panics into the traced program.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum TraceError {
    /// The shadow stack held fewer entries than an instruction's declared
    /// effect required. Indicates an effect-modeling bug, not a user error.
    #[error("operand stack holds {depth} entries but {required} were required")]
    StackUnderflow { required: usize, depth: usize },

    /// An offset landed between instruction boundaries. Only possible with a
    /// corrupted cursor or a malformed instruction stream.
    #[error("offset {offset} is not an instruction boundary")]
    UnknownOffset { offset: usize },

    /// A store target's name was absent from the local, global and builtin
    /// scopes.
    #[error("name {name:?} was not found in any scope")]
    UnresolvedName { name: String },
}

/// The result type for tracer operations.
pub type Result<T, E = TraceError> = std::result::Result<T, E>;
