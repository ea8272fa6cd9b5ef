//! # Disassembler
//!
//! Converts instruction bytes back into assembly text for inspection and
//! program listings. Formatting canonicalizes: byte zero renders as `nop`,
//! deltas render as signed offsets in -16..=15, and a zero shift is left
//! implicit — but every formatted instruction reassembles to the byte it
//! came from.

use std::fmt::Write;

use thiserror::Error;

use crate::isa::{
    signed_delta, Destination, Instruction, Plane, Source, TargetBank, REG_READ_SHIFT_MASK,
    REG_READ_SHIFT_SHIFT,
};
use crate::program::{ProgramImage, BANK_SIZE};

/// A byte rejected by [`decode_strict`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StrictDecodeError {
    /// Shift bits are only meaningful on the read plane; the mnemonic table
    /// never produces them elsewhere, so their presence means the byte did
    /// not come from the assembler.
    #[error("instruction {byte:#010b} carries shift bits ({shift}) outside the read plane")]
    ShiftOnNonRead { byte: u8, shift: u8 },
}

/// The canonical mnemonic for a decoded instruction.
///
/// Byte zero decodes as an unconditional instruction-bank move by zero;
/// [`format_instruction`] names that `nop`.
pub fn mnemonic_for(instruction: &Instruction) -> &'static str {
    match *instruction {
        Instruction::Reg { source, plane, .. } => match (plane, source) {
            (Plane::Toggle { carry: true }, Source::Memory) => "add",
            (Plane::Toggle { carry: true }, Source::FixedOnes) => "dec",
            (Plane::Toggle { carry: false }, Source::Memory) => "xor",
            (Plane::Toggle { carry: false }, Source::FixedOnes) => "not",
            (Plane::Set, Source::Memory) => "or",
            (Plane::Set, Source::FixedOnes) => "ones",
            (Plane::Unset, Source::Memory) => "unset",
            (Plane::Unset, Source::FixedOnes) => "zero",
            (
                Plane::Read {
                    destination: Destination::Memory,
                    ..
                },
                Source::Memory,
            ) => "store_and",
            (
                Plane::Read {
                    destination: Destination::Memory,
                    ..
                },
                Source::FixedOnes,
            ) => "store",
            (
                Plane::Read {
                    destination: Destination::Display,
                    ..
                },
                Source::Memory,
            ) => "display_and",
            (
                Plane::Read {
                    destination: Destination::Display,
                    ..
                },
                Source::FixedOnes,
            ) => "display",
        },
        Instruction::Ctrl {
            target_bank,
            conditional,
            ..
        } => match (target_bank, conditional) {
            (TargetBank::Instruction, false) => "jump",
            (TargetBank::Instruction, true) => "branch",
            (TargetBank::Data, false) => "seek",
            (TargetBank::Data, true) => "select",
        },
    }
}

/// Formats one instruction byte as assembly text.
pub fn format_instruction(byte: u8) -> String {
    if byte == 0 {
        return "nop".to_string();
    }

    let instruction = Instruction::decode(byte);
    let mut text = String::from(mnemonic_for(&instruction));
    match instruction {
        Instruction::Reg {
            plane, increment, ..
        } => {
            if let Plane::Read { shift, .. } = plane {
                if shift != 0 {
                    let _ = write!(text, ".shr{}", shift);
                }
            }
            if increment {
                text.push_str(".i");
            }
        }
        Instruction::Ctrl { delta, .. } => {
            let _ = write!(text, " {}", signed_delta(delta));
        }
    }
    text
}

/// Formats all 32 instruction slots of an image, in address order.
pub fn disassemble_image(image: &ProgramImage) -> Vec<String> {
    (0..BANK_SIZE)
        .map(|slot| format_instruction(image.instructions[slot]))
        .collect()
}

/// Decodes a byte, rejecting bit patterns the assembler can never emit.
pub fn decode_strict(byte: u8) -> Result<Instruction, StrictDecodeError> {
    let instruction = Instruction::decode(byte);
    if let Instruction::Reg { plane, .. } = instruction {
        if !matches!(plane, Plane::Read { .. }) {
            let shift = (byte & REG_READ_SHIFT_MASK) >> REG_READ_SHIFT_SHIFT;
            if shift != 0 {
                return Err(StrictDecodeError::ShiftOnNonRead { byte, shift });
            }
        }
    }
    Ok(instruction)
}
