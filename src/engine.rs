//! # Execution Engine
//!
//! The engine owns the whole machine state — accumulator, condition flag,
//! both 32-byte banks, both wrapping bank pointers, and the display buffers —
//! and executes one instruction at a time against a simulated-time budget.
//!
//! ## Execution Model
//!
//! The host drives the engine explicitly:
//!
//! - [`step`](ExecutionEngine::step) executes exactly one instruction,
//!   regardless of timing.
//! - [`advance`](ExecutionEngine::advance) accepts an elapsed simulated-time
//!   budget and executes as many whole instructions as that time affords,
//!   using the [`timing`](crate::timing) model for each instruction's cost.
//!   Zero or many instructions may run per call; a partially funded
//!   instruction carries its accumulated time to the next call.
//!
//! The engine never suspends internally and never samples a clock: scaling
//! wall-clock time into a budget is the host's job (see
//! [`Throttle`](crate::clock::Throttle)). Stopping is a state transition
//! observed at the top of the `advance` loop; an instruction whose budget is
//! met executes atomically.
//!
//! ```
//! use libmarble::{assembler::assemble, ExecutionEngine, RunMode};
//!
//! let assembly = assemble("loop: display.i\n jump :loop\n");
//! let mut engine = ExecutionEngine::new();
//! engine.load(assembly.image().unwrap());
//!
//! engine.set_run_mode(RunMode::UntilDisplayByte);
//! engine.advance(1000.0);
//!
//! // Stopped after the first display byte, however large the budget.
//! assert_eq!(engine.run_mode(), RunMode::Stopped);
//! assert_eq!(engine.display_buffer().len(), 1);
//! ```

use crate::isa::{Destination, Instruction, Plane, Source, TargetBank};
use crate::program::{ProgramImage, BANK_SIZE};
use crate::timing;

/// Bytes per display row, the display's atomic refresh unit.
pub const ROW_SIZE: usize = 8;

/// What the engine does when instructions come due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Not executing. Initial state, and where every run ends up.
    Stopped,
    /// Execute until explicitly stopped.
    Forever,
    /// Stop after the next byte emitted to the display.
    UntilDisplayByte,
    /// Stop after the next completed eight-byte row.
    UntilFullRow,
}

/// Human-readable run state for a status readout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    WaitingForProgram,
    Running,
    RunningToDisplayByte,
    RunningToFullRow,
    Paused,
    PausedStep,
    PausedBreakpoint,
    PausedMemoryBreakpoint,
    PausedDisplayByte,
    PausedFullRow,
    PausedReset,
}

impl Status {
    /// The display string for this state.
    pub fn text(self) -> &'static str {
        match self {
            Status::WaitingForProgram => "Waiting for Program",
            Status::Running => "Running",
            Status::RunningToDisplayByte => "Running to next display byte",
            Status::RunningToFullRow => "Running to next row",
            Status::Paused => "Paused",
            Status::PausedStep => "Paused (Step)",
            Status::PausedBreakpoint => "Paused (Breakpoint)",
            Status::PausedMemoryBreakpoint => "Paused (Memory Breakpoint)",
            Status::PausedDisplayByte => "Paused (Display)",
            Status::PausedFullRow => "Paused (Row)",
            Status::PausedReset => "Paused (Reset)",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.text())
    }
}

/// The marble computer's execution engine.
///
/// One engine exclusively owns one machine state; independent simulations
/// are independent values. Until a successfully assembled image is loaded,
/// every operation is a no-op — there is nothing to run, which is not an
/// error condition.
pub struct ExecutionEngine {
    register: u8,
    condition: bool,
    instruction_pointer: usize,
    data_pointer: usize,
    instruction_bank: [u8; BANK_SIZE],
    data_bank: [u8; BANK_SIZE],
    display_buffer: Vec<u8>,
    current_row: Option<[u8; ROW_SIZE]>,
    completed_rows: Vec<[u8; ROW_SIZE]>,
    elapsed: f64,
    time_into_instruction: f64,
    run_mode: RunMode,
    status: Status,
    instruction_breakpoints: u32,
    data_breakpoints: u32,
    image: Option<ProgramImage>,
}

impl ExecutionEngine {
    /// Creates an engine with no program loaded.
    pub fn new() -> Self {
        ExecutionEngine {
            register: 0,
            condition: false,
            instruction_pointer: 0,
            data_pointer: 0,
            instruction_bank: [0; BANK_SIZE],
            data_bank: [0; BANK_SIZE],
            display_buffer: Vec::new(),
            current_row: None,
            completed_rows: Vec::new(),
            elapsed: 0.0,
            time_into_instruction: 0.0,
            run_mode: RunMode::Stopped,
            status: Status::WaitingForProgram,
            instruction_breakpoints: 0,
            data_breakpoints: 0,
            image: None,
        }
    }

    /// Loads an assembled image and resets the machine.
    ///
    /// The instruction bank is copied once and never mutated by execution.
    /// Breakpoint masks survive the load; everything else resets.
    pub fn load(&mut self, image: &ProgramImage) {
        self.instruction_bank = image.instructions;
        self.image = Some(image.clone());
        self.reset();
    }

    /// Re-applies the loaded image's initial data and clears the register,
    /// condition, pointers, time accounting, and display history. Does not
    /// touch breakpoint masks and does not re-run the assembler.
    pub fn reset(&mut self) {
        let Some(data) = self.image.as_ref().map(|image| image.data) else {
            return;
        };
        self.cancel_run();
        self.register = 0;
        self.condition = false;
        self.instruction_pointer = 0;
        self.data_pointer = 0;
        self.data_bank = data;
        self.display_buffer.clear();
        self.current_row = None;
        self.completed_rows.clear();
        self.elapsed = 0.0;
        self.time_into_instruction = 0.0;
        self.status = Status::PausedReset;
    }

    /// Selects what happens as instructions come due.
    pub fn set_run_mode(&mut self, mode: RunMode) {
        if self.image.is_none() {
            return;
        }
        self.run_mode = mode;
        self.status = match mode {
            RunMode::Stopped => Status::Paused,
            RunMode::Forever => Status::Running,
            RunMode::UntilDisplayByte => Status::RunningToDisplayByte,
            RunMode::UntilFullRow => Status::RunningToFullRow,
        };
    }

    /// Stops without discarding progress into the current instruction.
    pub fn pause(&mut self) {
        if self.image.is_none() || self.run_mode == RunMode::Stopped {
            return;
        }
        self.run_mode = RunMode::Stopped;
        self.status = Status::Paused;
    }

    /// Executes exactly one instruction, regardless of the timing budget.
    ///
    /// Any active run is cancelled first; control always stays with the
    /// caller, so breakpoints are evaluated but cannot re-stop anything.
    /// Elapsed simulated time still advances by the instruction's full
    /// duration.
    pub fn step(&mut self) {
        if self.image.is_none() {
            return;
        }
        self.cancel_run();
        self.status = Status::PausedStep;

        let instruction = Instruction::decode(self.instruction_bank[self.instruction_pointer]);
        let duration = timing::duration_of(&instruction);
        self.execute_one();
        self.elapsed += duration;
        self.time_into_instruction = 0.0;
        self.check_breakpoints();
    }

    /// Feeds `budget` simulated seconds into the machine and executes every
    /// instruction that becomes due.
    ///
    /// Runs until the next instruction is not yet funded or the run mode
    /// drops to [`RunMode::Stopped`] (display stops, row stops, breakpoints,
    /// or an explicit pause before the call). Leftover budget accumulates
    /// toward the next instruction.
    pub fn advance(&mut self, budget: f64) {
        if self.image.is_none() || self.run_mode == RunMode::Stopped {
            return;
        }
        if budget.is_finite() && budget > 0.0 {
            self.time_into_instruction += budget;
        }

        while self.run_mode != RunMode::Stopped {
            let instruction =
                Instruction::decode(self.instruction_bank[self.instruction_pointer]);
            let duration = timing::duration_of(&instruction);
            if self.time_into_instruction < duration {
                break;
            }
            self.time_into_instruction -= duration;
            self.elapsed += duration;
            self.execute_one();
            self.check_breakpoints();
        }
    }

    /// Flips one instruction-address breakpoint bit.
    pub fn toggle_instruction_breakpoint(&mut self, address: usize) {
        if address < BANK_SIZE {
            self.instruction_breakpoints ^= 1 << address;
        }
    }

    /// Flips one data-address breakpoint bit.
    pub fn toggle_data_breakpoint(&mut self, address: usize) {
        if address < BANK_SIZE {
            self.data_breakpoints ^= 1 << address;
        }
    }

    // ========== Read-only state ==========

    /// True once a successfully assembled image has been loaded.
    pub fn has_program(&self) -> bool {
        self.image.is_some()
    }

    /// The accumulator.
    pub fn register(&self) -> u8 {
        self.register
    }

    /// The condition flag.
    pub fn condition(&self) -> bool {
        self.condition
    }

    /// Index of the next instruction to execute. Always in 0..32.
    pub fn instruction_pointer(&self) -> usize {
        self.instruction_pointer
    }

    /// Current data address. Always in 0..32.
    pub fn data_pointer(&self) -> usize {
        self.data_pointer
    }

    /// The loaded instruction bank.
    pub fn instruction_bank(&self) -> &[u8; BANK_SIZE] {
        &self.instruction_bank
    }

    /// The current data bank contents.
    pub fn data_bank(&self) -> &[u8; BANK_SIZE] {
        &self.data_bank
    }

    /// Pending display bytes of the partially filled row (back buffer).
    pub fn display_buffer(&self) -> &[u8] {
        &self.display_buffer
    }

    /// The last fully completed row, if any row has completed yet.
    pub fn current_row(&self) -> Option<&[u8; ROW_SIZE]> {
        self.current_row.as_ref()
    }

    /// Rows completed since the host last drained them.
    pub fn completed_rows(&self) -> &[[u8; ROW_SIZE]] {
        &self.completed_rows
    }

    /// Takes the completed-row history, oldest first.
    pub fn drain_completed_rows(&mut self) -> Vec<[u8; ROW_SIZE]> {
        std::mem::take(&mut self.completed_rows)
    }

    /// Cumulative executed simulated time in seconds, for an uptime readout.
    pub fn uptime(&self) -> f64 {
        self.elapsed
    }

    /// Accumulated simulated time toward the next instruction.
    pub fn time_into_instruction(&self) -> f64 {
        self.time_into_instruction
    }

    /// Fraction (0..=1) of the next instruction's duration already funded,
    /// for a progress indicator.
    pub fn progress(&self) -> f64 {
        match self.next_instruction() {
            Some(instruction) => {
                (self.time_into_instruction / timing::duration_of(&instruction)).min(1.0)
            }
            None => 0.0,
        }
    }

    /// The decoded instruction under the instruction pointer.
    pub fn next_instruction(&self) -> Option<Instruction> {
        self.image.as_ref()?;
        Some(Instruction::decode(
            self.instruction_bank[self.instruction_pointer],
        ))
    }

    /// The active run mode.
    pub fn run_mode(&self) -> RunMode {
        self.run_mode
    }

    /// The current run status.
    pub fn status(&self) -> Status {
        self.status
    }

    /// Instruction breakpoint mask, one bit per address.
    pub fn instruction_breakpoints(&self) -> u32 {
        self.instruction_breakpoints
    }

    /// Data breakpoint mask, one bit per address.
    pub fn data_breakpoints(&self) -> u32 {
        self.data_breakpoints
    }

    // ========== Internals ==========

    fn cancel_run(&mut self) {
        self.run_mode = RunMode::Stopped;
        self.time_into_instruction = 0.0;
    }

    /// Fetch, advance the instruction pointer, then dispatch. The pointer
    /// moves before the body runs, which is what makes a relative branch
    /// delta of `target - site - 1` land on its target.
    fn execute_one(&mut self) {
        let byte = self.instruction_bank[self.instruction_pointer];
        self.instruction_pointer = (self.instruction_pointer + 1) % BANK_SIZE;

        match Instruction::decode(byte) {
            Instruction::Reg {
                source,
                plane,
                increment,
            } => {
                let operand = match source {
                    Source::Memory => self.data_bank[self.data_pointer],
                    Source::FixedOnes => 0xFF,
                };
                let original = self.register;
                match plane {
                    Plane::Unset => {
                        self.register &= !operand;
                        self.condition = self.register == original;
                    }
                    Plane::Set => {
                        self.register |= operand;
                        self.condition = self.register == original;
                    }
                    Plane::Toggle { carry: true } => {
                        let sum = original as u16 + operand as u16;
                        self.condition = sum > 0xFF;
                        self.register = (sum & 0xFF) as u8;
                    }
                    Plane::Toggle { carry: false } => {
                        self.register ^= operand;
                        // Both-high-bits rule, a hardware carry predictor;
                        // not a true overflow flag.
                        self.condition = original & 0x80 != 0 && operand & 0x80 != 0;
                    }
                    Plane::Read { destination, shift } => {
                        let value = self.register & (operand >> shift);
                        match destination {
                            Destination::Memory => {
                                self.data_bank[self.data_pointer] = value;
                                self.condition = false;
                            }
                            Destination::Display => {
                                self.condition = self.output_to_display(value);
                            }
                        }
                    }
                }
                if increment {
                    self.data_pointer = (self.data_pointer + 1) % BANK_SIZE;
                }
            }
            Instruction::Ctrl {
                target_bank,
                conditional,
                delta,
            } => {
                // An untaken conditional move changes nothing, the condition
                // flag included.
                if !conditional || self.condition {
                    let pointer = match target_bank {
                        TargetBank::Instruction => &mut self.instruction_pointer,
                        TargetBank::Data => &mut self.data_pointer,
                    };
                    *pointer = (*pointer + delta as usize) % BANK_SIZE;
                }
            }
        }
    }

    /// Appends a byte to the display buffer, applying the run-mode stop
    /// rules and the row flip. Returns whether this byte completed a row —
    /// the emitting instruction's condition value.
    fn output_to_display(&mut self, value: u8) -> bool {
        self.display_buffer.push(value);

        // Stops on every emitted byte, not only the eighth.
        if self.run_mode == RunMode::UntilDisplayByte {
            self.cancel_run();
            self.status = Status::PausedDisplayByte;
        }

        if self.display_buffer.len() < ROW_SIZE {
            return false;
        }

        if self.run_mode == RunMode::UntilFullRow {
            self.cancel_run();
            self.status = Status::PausedFullRow;
        }

        let mut row = [0u8; ROW_SIZE];
        row.copy_from_slice(&self.display_buffer);
        if let Some(previous) = self.current_row.replace(row) {
            self.completed_rows.push(previous);
        }
        self.display_buffer.clear();
        true
    }

    /// Evaluated after every executed instruction. The instruction check
    /// watches the address about to execute; the data check additionally
    /// requires that instruction to be a store. The checks are independent.
    fn check_breakpoints(&mut self) {
        if self.run_mode == RunMode::Stopped {
            return;
        }

        if self.instruction_breakpoints & (1 << self.instruction_pointer) != 0 {
            self.cancel_run();
            self.status = Status::PausedBreakpoint;
        }

        if self.data_breakpoints & (1 << self.data_pointer) != 0 {
            let next = Instruction::decode(self.instruction_bank[self.instruction_pointer]);
            if next.is_store() {
                self.cancel_run();
                self.status = Status::PausedMemoryBreakpoint;
            }
        }
    }
}

impl Default for ExecutionEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operations_without_program_are_noops() {
        let mut engine = ExecutionEngine::new();
        engine.step();
        engine.advance(1000.0);
        engine.set_run_mode(RunMode::Forever);
        engine.reset();
        engine.pause();

        assert_eq!(engine.run_mode(), RunMode::Stopped);
        assert_eq!(engine.status(), Status::WaitingForProgram);
        assert_eq!(engine.uptime(), 0.0);
        assert_eq!(engine.progress(), 0.0);
        assert!(engine.next_instruction().is_none());
    }

    #[test]
    fn test_breakpoint_toggle_flips_bits() {
        let mut engine = ExecutionEngine::new();
        engine.toggle_instruction_breakpoint(5);
        engine.toggle_data_breakpoint(0);
        assert_eq!(engine.instruction_breakpoints(), 1 << 5);
        assert_eq!(engine.data_breakpoints(), 1);

        engine.toggle_instruction_breakpoint(5);
        assert_eq!(engine.instruction_breakpoints(), 0);

        // Out-of-range addresses are ignored.
        engine.toggle_data_breakpoint(32);
        assert_eq!(engine.data_breakpoints(), 1);
    }

    #[test]
    fn test_status_text() {
        assert_eq!(Status::WaitingForProgram.text(), "Waiting for Program");
        assert_eq!(Status::PausedMemoryBreakpoint.to_string(), "Paused (Memory Breakpoint)");
    }
}
