//! Frame Tracer - Mutation capture for stack-based bytecode frames
//!
//! This crate observes a running call frame of a stack-based bytecode VM and
//! reconstructs which named values (local variables, object attributes)
//! changed between observation points, producing a durable log of mutations.
//!
//! # Overview
//!
//! A logger is bound to exactly one frame. On each observation it:
//!
//! * scans the instructions executed since the last observation, skipping
//!   ranges a taken jump never executed;
//! * mirrors the VM's evaluation stack by replaying each instruction's
//!   declared stack effect (the tracer has no access to the live stack);
//! * emits one [`Mutation`] per store-class instruction, with the changed
//!   value deep-snapshotted so later in-place mutation of the same object
//!   cannot rewrite recorded history.
//!
//! # Usage
//!
//! ```
//! use frame_tracer::{Frame, Instruction, Logger, Opcode, Value};
//!
//! let mut frame = Frame::new(vec![
//!     Instruction::load_const(0, Value::Int(42)),
//!     Instruction::store_fast(2, "answer"),
//!     Instruction::simple(4, Opcode::ReturnValue),
//! ]);
//! let mut logger = Logger::starting_at(&frame, 0);
//!
//! // The VM runs offsets 0 and 2, then the hook fires at offset 4.
//! frame.set_local("answer", Value::Int(42));
//! frame.advance_to(4);
//! logger.detect_changes(&frame).expect("trace failed");
//!
//! assert_eq!(logger.mutations().len(), 1);
//! ```
//!
//! # Limitations
//!
//! * One logger traces one frame; tracing several frames means one logger
//!   each, with no shared state. Composition across a call stack is the
//!   hook installer's concern.
//! * Opaque host references snapshot as an identity tag only; in-place
//!   mutations of such values are not historized.
//! * The tracer consumes an already-decoded instruction stream; it is not
//!   a disassembler.

pub mod error;
pub mod frame;
pub mod instruction;
pub mod logger;
pub mod recorder;
pub mod stack;
pub mod trace;
pub mod value;

pub use error::{Result, TraceError};
pub use frame::{resolve, Frame, FrameView, Scope};
pub use instruction::{
    Instruction, InstructionTable, JumpKind, Opcode, Operand, INSTRUCTION_WIDTH,
};
pub use logger::{create_logger, Logger, TRACER_PROLOGUE};
pub use stack::{OperandStack, StackEffect, StackEntry};
pub use trace::{Mutation, MutationLog, MutationTarget};
pub use value::{ObjectData, OpaqueHandle, Value};
