//! The shadow operand stack.
//!
//! A tracer has no access to the VM's live evaluation stack, so this module
//! replays each instruction's declared stack effect to keep a shadow copy in
//! sync. The effect of every opcode is a single static mapping
//! ([`Opcode::stack_effect`]); retargeting the tracer at a different
//! instruction set means replacing that mapping and nothing else.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TraceError};
use crate::instruction::{Instruction, Opcode, Operand};
use crate::value::Value;

/// One entry of the shadow stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StackEntry {
    /// A value known to the simulator, e.g. a loaded constant.
    Value(Value),
    /// A name reference awaiting resolution through the frame's scopes.
    Name(String),
    /// The result of an operation the simulator cannot evaluate statically.
    Computed,
}

impl StackEntry {
    /// The known value of this entry, if it carries one.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            StackEntry::Value(value) => Some(value),
            _ => None,
        }
    }
}

/// The declared stack effect of one opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackEffect {
    /// No stack interaction.
    None,
    /// Push the instruction's operand (a constant or a name reference).
    PushOperand,
    /// Pop `n` entries.
    Pop(usize),
    /// Pop `pops` entries and push one entry for the derived result.
    Fold { pops: usize },
    /// Duplicate the top entry.
    Dup,
    /// Rotate the top `n` entries, moving the top below the others.
    Rot(usize),
    /// Pop the callee plus the operand's argument count, push the result.
    Call,
}

impl Opcode {
    /// The static effect table driving shadow-stack replay.
    pub fn stack_effect(self) -> StackEffect {
        match self {
            Opcode::LoadConst | Opcode::LoadName | Opcode::LoadFast | Opcode::LoadGlobal => {
                StackEffect::PushOperand
            }
            Opcode::LoadAttr => StackEffect::Fold { pops: 1 },
            Opcode::StoreName
            | Opcode::StoreFast
            | Opcode::PopTop
            | Opcode::PopJumpIfFalse
            | Opcode::PopJumpIfTrue
            | Opcode::ReturnValue => StackEffect::Pop(1),
            Opcode::StoreAttr => StackEffect::Pop(2),
            Opcode::DupTop => StackEffect::Dup,
            Opcode::RotTwo => StackEffect::Rot(2),
            Opcode::RotThree => StackEffect::Rot(3),
            Opcode::BinaryAdd
            | Opcode::BinarySubtract
            | Opcode::BinaryMultiply
            | Opcode::CompareOp => StackEffect::Fold { pops: 2 },
            Opcode::CallFunction => StackEffect::Call,
            Opcode::JumpForward | Opcode::JumpAbsolute | Opcode::Nop => StackEffect::None,
        }
    }
}

/// Shadow copy of the frame's evaluation stack.
#[derive(Debug, Clone, Default)]
pub struct OperandStack {
    entries: Vec<StackEntry>,
}

impl OperandStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replays `instr`'s declared stack effect.
    ///
    /// # Errors
    ///
    /// [`TraceError::StackUnderflow`] if the effect consumes more entries
    /// than the stack holds. Against a correctly decoded stream this cannot
    /// happen; it is reported rather than papered over.
    pub fn handle_instruction(&mut self, instr: &Instruction) -> Result<()> {
        match instr.opcode.stack_effect() {
            StackEffect::None => {}
            StackEffect::PushOperand => {
                let entry = match &instr.operand {
                    Operand::Const(value) => StackEntry::Value(value.clone()),
                    Operand::Name(name) => StackEntry::Name(name.clone()),
                    _ => StackEntry::Computed,
                };
                self.entries.push(entry);
            }
            StackEffect::Pop(count) => self.pop_many(count)?,
            StackEffect::Fold { pops } => {
                self.pop_many(pops)?;
                self.entries.push(StackEntry::Computed);
            }
            StackEffect::Dup => {
                let top = self.top()?.clone();
                self.entries.push(top);
            }
            StackEffect::Rot(count) => self.rotate(count)?,
            StackEffect::Call => {
                self.pop_many(instr.arg_count() + 1)?;
                self.entries.push(StackEntry::Computed);
            }
        }
        Ok(())
    }

    /// The top-of-stack entry (TOS).
    pub fn top(&self) -> Result<&StackEntry> {
        self.peek(0)
    }

    /// The next-to-top entry (TOS1).
    pub fn second(&self) -> Result<&StackEntry> {
        self.peek(1)
    }

    /// Current number of shadow entries.
    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    fn peek(&self, below_top: usize) -> Result<&StackEntry> {
        let required = below_top + 1;
        let depth = self.entries.len();
        if depth < required {
            return Err(TraceError::StackUnderflow { required, depth });
        }
        Ok(&self.entries[depth - required])
    }

    fn pop_many(&mut self, count: usize) -> Result<()> {
        let depth = self.entries.len();
        if depth < count {
            return Err(TraceError::StackUnderflow {
                required: count,
                depth,
            });
        }
        self.entries.truncate(depth - count);
        Ok(())
    }

    fn rotate(&mut self, count: usize) -> Result<()> {
        let depth = self.entries.len();
        if depth < count {
            return Err(TraceError::StackUnderflow {
                required: count,
                depth,
            });
        }
        self.entries[depth - count..].rotate_right(1);
        Ok(())
    }
}
