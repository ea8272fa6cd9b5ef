//! # Timing Model
//!
//! Maps an instruction to the execution steps it performs and their fixed
//! simulated-time cost. Durations are in simulated seconds and independent of
//! any host frame rate: the engine consumes them against the time budget the
//! host supplies to [`ExecutionEngine::advance`](crate::ExecutionEngine::advance),
//! and a presentation layer can walk the step set to draw a progress bar.
//!
//! Steps are combined as a set: adding a step twice changes nothing, and the
//! duration sums each present step exactly once.

use crate::isa::{Destination, Instruction, Plane};

/// One execution step of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Fetch the operand from data memory.
    FetchData,
    /// Decode the instruction word.
    DecodeInstruction,
    /// Dispatch the operation to the register ALU.
    DispatchAlu,
    /// Write the masked value back to data memory.
    Store,
    /// Emit the masked value to the display.
    Display,
    /// Latch the condition flag for a conditional move.
    FlushCondition,
    /// Advance a bank pointer.
    AdjustPointer,
}

impl Step {
    /// Every step in execution order.
    pub const ALL: [Step; 7] = [
        Step::FetchData,
        Step::DecodeInstruction,
        Step::DispatchAlu,
        Step::Store,
        Step::Display,
        Step::FlushCondition,
        Step::AdjustPointer,
    ];

    /// Fixed duration of the step in simulated seconds.
    pub fn duration(self) -> f64 {
        match self {
            Step::FetchData => 3.0,
            Step::DecodeInstruction => 2.0,
            Step::DispatchAlu => 1.0,
            Step::Store => 6.0,
            Step::Display => 2.0,
            Step::FlushCondition => 2.0,
            Step::AdjustPointer => 2.0,
        }
    }

    fn bit(self) -> u8 {
        match self {
            Step::FetchData => 1 << 0,
            Step::DecodeInstruction => 1 << 1,
            Step::DispatchAlu => 1 << 2,
            Step::Store => 1 << 3,
            Step::Display => 1 << 4,
            Step::FlushCondition => 1 << 5,
            Step::AdjustPointer => 1 << 6,
        }
    }
}

/// A set of [`Step`]s.
///
/// Insertion is idempotent (set union), so a step contributed by more than
/// one rule is still executed and billed once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepSet(u8);

impl StepSet {
    /// The empty set.
    pub const EMPTY: StepSet = StepSet(0);

    /// Adds a step to the set.
    pub fn insert(&mut self, step: Step) {
        self.0 |= step.bit();
    }

    /// Returns the set with `step` added.
    pub fn with(mut self, step: Step) -> Self {
        self.insert(step);
        self
    }

    /// True if the set contains `step`.
    pub fn contains(self, step: Step) -> bool {
        self.0 & step.bit() != 0
    }

    /// Number of steps in the set.
    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// True if the set is empty.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterates the contained steps in execution order.
    pub fn iter(self) -> impl Iterator<Item = Step> {
        Step::ALL.into_iter().filter(move |&step| self.contains(step))
    }

    /// Sum of the contained steps' durations in simulated seconds.
    pub fn duration(self) -> f64 {
        self.iter().map(Step::duration).sum()
    }
}

/// Determines the steps an instruction performs.
///
/// Every instruction fetches and decodes. Control instructions adjust a
/// pointer, plus a condition flush when conditional. Register instructions
/// dispatch to the ALU; on the read plane they additionally display or
/// store, and a store with auto-increment adjusts the data pointer. A
/// display with auto-increment moves the pointer too, but the hardware folds
/// that into the display step rather than billing a separate adjustment.
pub fn steps_for(instruction: &Instruction) -> StepSet {
    let mut steps = StepSet::EMPTY
        .with(Step::FetchData)
        .with(Step::DecodeInstruction);

    match *instruction {
        Instruction::Ctrl { conditional, .. } => {
            steps.insert(Step::AdjustPointer);
            if conditional {
                steps.insert(Step::FlushCondition);
            }
        }
        Instruction::Reg {
            plane, increment, ..
        } => {
            steps.insert(Step::DispatchAlu);
            if let Plane::Read { destination, .. } = plane {
                match destination {
                    Destination::Display => steps.insert(Step::Display),
                    Destination::Memory => {
                        steps.insert(Step::Store);
                        if increment {
                            steps.insert(Step::AdjustPointer);
                        }
                    }
                }
            }
        }
    }

    steps
}

/// Total simulated-seconds cost of an instruction.
pub fn duration_of(instruction: &Instruction) -> f64 {
    steps_for(instruction).duration()
}
