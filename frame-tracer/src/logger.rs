//! The scan driver: one logger per traced frame.
//!
//! On every observation the driver scans the instructions executed since
//! the previous one, feeding each through the mutation recorder and the
//! shadow stack. Jumps need care: instructions between a taken jump and
//! its target never executed, so scanning them would fabricate mutations.
//! The driver therefore remembers the pending jump target and, when the
//! instruction pointer lands exactly there, moves the cursor without
//! scanning at all.

use tracing::{debug, warn};

use crate::error::{Result, TraceError};
use crate::frame::FrameView;
use crate::instruction::{Instruction, InstructionTable, INSTRUCTION_WIDTH};
use crate::recorder;
use crate::stack::OperandStack;
use crate::trace::{Mutation, MutationLog};

/// Width of the tracer's own setup code at the top of a traced code unit:
/// the call into the tracer plus the pop of its result. Scanning starts
/// past it so the tracer never reports its own bookkeeping.
pub const TRACER_PROLOGUE: usize = 2 * INSTRUCTION_WIDTH;

/// Execution logger for a single call frame.
pub struct Logger {
    instructions: InstructionTable,
    execution_start_index: usize,
    next_jump_location: Option<usize>,
    value_stack: OperandStack,
    mutations: MutationLog,
}

impl Logger {
    /// Creates a logger for `frame`, which must be paused on the tracer's
    /// own setup call. Scanning begins at the first user instruction after
    /// the prologue.
    pub fn new(frame: &dyn FrameView) -> Self {
        Self::starting_at(frame, frame.last_instruction() + TRACER_PROLOGUE)
    }

    /// Creates a logger that begins scanning at an explicit offset, for
    /// embedders whose code units carry no tracer prologue.
    pub fn starting_at(frame: &dyn FrameView, start: usize) -> Self {
        let instructions = InstructionTable::new(frame.instructions());
        debug!(
            instruction_count = instructions.len(),
            start, "logger created"
        );
        Self {
            instructions,
            execution_start_index: start,
            next_jump_location: None,
            value_stack: OperandStack::new(),
            mutations: MutationLog::new(),
        }
    }

    /// Scans everything executed since the last observation and appends the
    /// mutations found.
    ///
    /// # Errors
    ///
    /// [`TraceError::UnknownOffset`] and [`TraceError::StackUnderflow`] are
    /// fatal to this frame's trace; the cursor can no longer be trusted.
    /// Unresolvable store targets are logged as warnings and skipped.
    pub fn detect_changes(&mut self, frame: &dyn FrameView) -> Result<()> {
        let last_i = frame.last_instruction();

        // The pointer landed exactly on the pending jump target: a jump was
        // taken, nothing in between executed, and the jump itself mutates
        // no variable. Move the cursor and re-arm from the target.
        if Some(last_i) == self.next_jump_location {
            self.execution_start_index = last_i;
            self.next_jump_location = self.instructions.lookup(last_i)?.jump_target();
            debug!(offset = last_i, "jump taken, scan skipped");
            return Ok(());
        }

        let mut offset = self.execution_start_index;
        while offset < last_i {
            let instr = self.instructions.lookup(offset)?.clone();
            self.scan_instruction(frame, &instr)?;
            offset += INSTRUCTION_WIDTH;
        }

        self.next_jump_location = self.instructions.lookup(last_i)?.jump_target();
        self.execution_start_index = last_i;
        Ok(())
    }

    /// Records any mutation made by `instr`, then replays it on the shadow
    /// stack. The order matters: the recorder reads the instruction's
    /// operands off the stack before the replay consumes them.
    fn scan_instruction(&mut self, frame: &dyn FrameView, instr: &Instruction) -> Result<()> {
        match recorder::record(frame, instr, &self.value_stack) {
            Ok(Some(mutation)) => {
                debug!(offset = instr.offset, target = ?mutation.target, "mutation recorded");
                self.mutations.push(mutation);
            }
            Ok(None) => {}
            Err(TraceError::UnresolvedName { name }) => {
                warn!(
                    %name,
                    offset = instr.offset,
                    "store target missing from every scope, mutation skipped"
                );
            }
            Err(err) => return Err(err),
        }
        self.value_stack.handle_instruction(instr)
    }

    /// The recorded mutations, in execution order.
    pub fn mutations(&self) -> &[Mutation] {
        self.mutations.as_slice()
    }

    /// The mutation log serialized as JSON.
    pub fn mutations_json(&self) -> serde_json::Result<String> {
        self.mutations.to_json()
    }

    /// Offset the next linear scan will start from.
    pub fn execution_start_index(&self) -> usize {
        self.execution_start_index
    }

    /// Pending jump target, if the current instruction can transfer control.
    pub fn next_jump_location(&self) -> Option<usize> {
        self.next_jump_location
    }
}

/// Creates a logger bound to `frame`, one per traced frame.
pub fn create_logger(frame: &dyn FrameView) -> Logger {
    Logger::new(frame)
}
