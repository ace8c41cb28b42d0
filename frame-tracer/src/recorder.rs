//! Turns store-class instructions into mutation records.

use tracing::debug;

use crate::error::Result;
use crate::frame::{resolve, FrameView};
use crate::instruction::{Instruction, Opcode};
use crate::stack::{OperandStack, StackEntry};
use crate::trace::{Mutation, MutationTarget};
use crate::value::Value;

/// Inspects one instruction and produces its mutation record, if any.
///
/// Must be called before the instruction is replayed on the shadow stack,
/// while its operands are still present. Non-store instructions yield
/// `None`; the caller still has to feed them to the simulator.
///
/// # Errors
///
/// [`crate::TraceError::UnresolvedName`] if a store target cannot be found
/// in any scope (recoverable), [`crate::TraceError::StackUnderflow`] if the
/// shadow stack is out of sync with the stream (fatal).
pub fn record(
    frame: &dyn FrameView,
    instr: &Instruction,
    stack: &OperandStack,
) -> Result<Option<Mutation>> {
    if instr.opcode.is_store_local() {
        let Some(name) = instr.name() else {
            debug!(offset = instr.offset, "store without a name operand, skipped");
            return Ok(None);
        };
        // The frame's scopes already hold the post-store binding, so the new
        // value is read from there and snapshotted immediately.
        let value = resolve(frame, name)?.snapshot();
        return Ok(Some(Mutation {
            target: MutationTarget::Name(name.to_owned()),
            value,
            source: Some(stack.top()?.clone()),
        }));
    }

    if instr.opcode == Opcode::StoreAttr {
        // TOS is the owning object, TOS1 the value being assigned to the
        // attribute. The owner is both the target and the snapshot.
        let Some(owner) = owning_object(frame, stack.top()?)? else {
            debug!(
                offset = instr.offset,
                "attribute store on an entry the simulator cannot identify, skipped"
            );
            return Ok(None);
        };
        return Ok(Some(Mutation {
            value: owner.snapshot(),
            target: MutationTarget::Object(owner),
            source: Some(stack.second()?.clone()),
        }));
    }

    Ok(None)
}

/// Resolves the shadow entry holding an attribute store's owning object.
fn owning_object(frame: &dyn FrameView, entry: &StackEntry) -> Result<Option<Value>> {
    match entry {
        StackEntry::Value(value) => Ok(Some(value.clone())),
        StackEntry::Name(name) => resolve(frame, name).map(Some),
        StackEntry::Computed => Ok(None),
    }
}
