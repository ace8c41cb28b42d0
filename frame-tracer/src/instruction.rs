//! Decoded instructions and the per-frame instruction table.
//!
//! The tracer consumes an already-decoded stream; nothing here touches raw
//! bytes. Instructions use a fixed-width word encoding, so offsets advance
//! in steps of [`INSTRUCTION_WIDTH`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TraceError};
use crate::value::Value;

/// Width in offset units of every instruction in the stream.
pub const INSTRUCTION_WIDTH: usize = 2;

/// The word-code instruction set understood by the tracer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Opcode {
    // Loads
    LoadConst,
    LoadName,
    LoadFast,
    LoadGlobal,
    LoadAttr,
    // Stores
    StoreName,
    StoreFast,
    StoreAttr,
    // Stack shuffles
    PopTop,
    DupTop,
    RotTwo,
    RotThree,
    // Operators
    BinaryAdd,
    BinarySubtract,
    BinaryMultiply,
    CompareOp,
    // Calls and returns
    CallFunction,
    ReturnValue,
    // Control flow
    JumpForward,
    JumpAbsolute,
    PopJumpIfFalse,
    PopJumpIfTrue,
    Nop,
}

/// How an opcode transfers control, if it does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JumpKind {
    None,
    /// Target is the operand added to the offset past this instruction.
    Relative,
    /// Target is the operand itself.
    Absolute,
}

impl Opcode {
    /// Jump classification, derived purely from the opcode.
    pub fn jump_kind(self) -> JumpKind {
        match self {
            Opcode::JumpForward => JumpKind::Relative,
            Opcode::JumpAbsolute | Opcode::PopJumpIfFalse | Opcode::PopJumpIfTrue => {
                JumpKind::Absolute
            }
            _ => JumpKind::None,
        }
    }

    /// Whether this opcode stores into a named local or global slot.
    pub fn is_store_local(self) -> bool {
        matches!(self, Opcode::StoreName | Opcode::StoreFast)
    }
}

/// The decoded operand of one instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    None,
    /// An identifier, for name loads/stores and attribute access.
    Name(String),
    /// A constant from the code unit's constant pool.
    Const(Value),
    /// A jump operand: the delta for relative jumps, the target for absolute.
    Offset(usize),
    /// A small integer argument, e.g. a call's argument count.
    Arg(usize),
}

/// One decoded instruction. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub offset: usize,
    pub opcode: Opcode,
    pub operand: Operand,
}

impl Instruction {
    pub fn new(offset: usize, opcode: Opcode, operand: Operand) -> Self {
        Self {
            offset,
            opcode,
            operand,
        }
    }

    /// An instruction with no operand.
    pub fn simple(offset: usize, opcode: Opcode) -> Self {
        Self::new(offset, opcode, Operand::None)
    }

    pub fn load_const(offset: usize, value: Value) -> Self {
        Self::new(offset, Opcode::LoadConst, Operand::Const(value))
    }

    pub fn load_name(offset: usize, name: impl Into<String>) -> Self {
        Self::new(offset, Opcode::LoadName, Operand::Name(name.into()))
    }

    pub fn load_fast(offset: usize, name: impl Into<String>) -> Self {
        Self::new(offset, Opcode::LoadFast, Operand::Name(name.into()))
    }

    pub fn load_global(offset: usize, name: impl Into<String>) -> Self {
        Self::new(offset, Opcode::LoadGlobal, Operand::Name(name.into()))
    }

    pub fn store_name(offset: usize, name: impl Into<String>) -> Self {
        Self::new(offset, Opcode::StoreName, Operand::Name(name.into()))
    }

    pub fn store_fast(offset: usize, name: impl Into<String>) -> Self {
        Self::new(offset, Opcode::StoreFast, Operand::Name(name.into()))
    }

    pub fn store_attr(offset: usize, name: impl Into<String>) -> Self {
        Self::new(offset, Opcode::StoreAttr, Operand::Name(name.into()))
    }

    pub fn call_function(offset: usize, argc: usize) -> Self {
        Self::new(offset, Opcode::CallFunction, Operand::Arg(argc))
    }

    pub fn jump_forward(offset: usize, delta: usize) -> Self {
        Self::new(offset, Opcode::JumpForward, Operand::Offset(delta))
    }

    pub fn jump_absolute(offset: usize, target: usize) -> Self {
        Self::new(offset, Opcode::JumpAbsolute, Operand::Offset(target))
    }

    pub fn pop_jump_if_false(offset: usize, target: usize) -> Self {
        Self::new(offset, Opcode::PopJumpIfFalse, Operand::Offset(target))
    }

    /// Jump classification of this instruction.
    pub fn jump_kind(&self) -> JumpKind {
        self.opcode.jump_kind()
    }

    /// The offset control transfers to if this instruction jumps.
    ///
    /// Relative jumps land at `offset + INSTRUCTION_WIDTH + delta`, absolute
    /// jumps at the operand itself. `None` for non-jump instructions.
    pub fn jump_target(&self) -> Option<usize> {
        match (self.jump_kind(), &self.operand) {
            (JumpKind::Relative, Operand::Offset(delta)) => {
                Some(self.offset + INSTRUCTION_WIDTH + delta)
            }
            (JumpKind::Absolute, Operand::Offset(target)) => Some(*target),
            _ => None,
        }
    }

    /// The identifier operand, if this instruction carries one.
    pub fn name(&self) -> Option<&str> {
        match &self.operand {
            Operand::Name(name) => Some(name),
            _ => None,
        }
    }

    /// The small integer argument, defaulting to zero.
    pub fn arg_count(&self) -> usize {
        match self.operand {
            Operand::Arg(count) => count,
            _ => 0,
        }
    }
}

/// Read-only offset-to-instruction map for one code unit.
///
/// Built once per frame when its logger is created; never mutated afterwards.
#[derive(Debug, Clone)]
pub struct InstructionTable {
    by_offset: BTreeMap<usize, Instruction>,
}

impl InstructionTable {
    /// Indexes the decoded stream by offset.
    pub fn new(stream: &[Instruction]) -> Self {
        let by_offset = stream
            .iter()
            .map(|instr| (instr.offset, instr.clone()))
            .collect();
        Self { by_offset }
    }

    /// Looks up the instruction at `offset`.
    ///
    /// # Errors
    ///
    /// [`TraceError::UnknownOffset`] if `offset` is not an instruction
    /// boundary. For well-formed code this cannot happen; callers treat it
    /// as a fatal internal-consistency failure.
    pub fn lookup(&self, offset: usize) -> Result<&Instruction> {
        self.by_offset
            .get(&offset)
            .ok_or(TraceError::UnknownOffset { offset })
    }

    /// Number of instructions in the code unit.
    pub fn len(&self) -> usize {
        self.by_offset.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_offset.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_jump_target() {
        let instr = Instruction::jump_forward(10, 6);
        assert_eq!(
            instr.jump_target(),
            Some(10 + INSTRUCTION_WIDTH + 6),
            "relative target should be offset + width + delta"
        );
    }

    #[test]
    fn test_absolute_jump_target() {
        let instr = Instruction::jump_absolute(10, 42);
        assert_eq!(instr.jump_target(), Some(42));

        let conditional = Instruction::pop_jump_if_false(4, 20);
        assert_eq!(conditional.jump_target(), Some(20));
    }

    #[test]
    fn test_non_jump_has_no_target() {
        let instr = Instruction::store_name(0, "x");
        assert_eq!(instr.jump_kind(), JumpKind::None);
        assert_eq!(instr.jump_target(), None);
    }

    #[test]
    fn test_table_lookup() {
        let table = InstructionTable::new(&[
            Instruction::load_const(0, Value::Int(1)),
            Instruction::store_name(2, "x"),
        ]);

        assert_eq!(table.lookup(2).map(|i| i.opcode), Ok(Opcode::StoreName));
        assert_eq!(
            table.lookup(1),
            Err(TraceError::UnknownOffset { offset: 1 }),
            "offsets between boundaries must be rejected"
        );
    }
}
