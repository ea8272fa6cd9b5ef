//! # Marble Computer Simulator Core
//!
//! A deterministic simulator core for the marble computer: a minimal 8-bit
//! machine with two 32-byte memory banks, a single accumulator, a condition
//! flag, and an eight-byte-row marble display.
//!
//! This crate provides the assembler (text to a 32-slot instruction/data
//! image with label resolution), the per-instruction timing model, and the
//! execution engine that runs an image against a simulated-time budget.
//! Presentation is a consumer, not a part: the engine exposes read-only
//! state accessors and explicit operations, and never touches a clock, a
//! screen, or any other sink.
//!
//! ## Quick Start
//!
//! ```rust
//! use libmarble::{assemble, ExecutionEngine, RunMode};
//!
//! // Fill the register with ones, then stream it to the display forever.
//! let assembly = assemble("ones\nshow: display\n jump :show\n");
//! assert!(assembly.is_success());
//!
//! let mut engine = ExecutionEngine::new();
//! engine.load(assembly.image().unwrap());
//!
//! engine.step();
//! assert_eq!(engine.register(), 0xFF);
//!
//! // Run until a full eight-byte row has been emitted.
//! engine.set_run_mode(RunMode::UntilFullRow);
//! engine.advance(10_000.0);
//! assert_eq!(engine.current_row(), Some(&[0xFF; 8]));
//! ```
//!
//! ## Architecture
//!
//! - **Owned state**: one [`ExecutionEngine`] value exclusively owns one
//!   machine state; independent simulators are independent values.
//! - **Externally driven time**: the host feeds elapsed simulated seconds
//!   into [`ExecutionEngine::advance`]; the engine decides how many whole
//!   instructions that budget covers. [`clock::Throttle`] scales and clamps
//!   wall-clock deltas into that budget.
//! - **Diagnostics, not faults**: the assembler reports every problem it
//!   finds and keeps going; execution has no failure states at all —
//!   pointers wrap, arithmetic masks to 8 bits.
//! - **Table-driven encoding**: the mnemonic table in [`isa`] is the single
//!   source of truth shared by the assembler and the disassembler.
//!
//! ## Modules
//!
//! - [`isa`] - instruction word layout, encode/decode, mnemonic table
//! - [`assembler`] - two-pass text-to-image translation with diagnostics
//! - [`program`] - the immutable assembled image
//! - [`timing`] - execution steps and per-instruction durations
//! - [`engine`] - machine state, run modes, breakpoints, display protocol
//! - [`disassembler`] - bytes back to assembly text, strict decoding
//! - [`clock`] - host-side wall-clock throttling

pub mod assembler;
pub mod clock;
pub mod disassembler;
pub mod engine;
pub mod isa;
pub mod program;
pub mod timing;

pub use assembler::{assemble, Assembly, Diagnostic, DiagnosticKind};
pub use clock::Throttle;
pub use engine::{ExecutionEngine, RunMode, Status, ROW_SIZE};
pub use isa::Instruction;
pub use program::{Label, LabelScope, ProgramImage, BANK_SIZE};
pub use timing::{duration_of, steps_for, Step, StepSet};
