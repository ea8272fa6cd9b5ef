//! # Assembler
//!
//! Converts marble-computer assembly text into a [`ProgramImage`].
//!
//! Assembly is two-pass. Pass 1 walks the source line by line, collecting
//! instructions, data bytes, label declarations, and pending label
//! references. Pass 2 resolves every pending reference into a relative
//! pointer delta once all labels are known. Problems never abort the pass:
//! each becomes a [`Diagnostic`] and parsing continues with the next
//! construct, so one run surfaces as many diagnostics as possible.
//!
//! ## Source Format
//!
//! Keywords and labels are case-insensitive. Each line may hold a scope
//! directive (`.inst`, or `.data` with an optional 0-31 start address), or
//! an optional label declaration (`name:`) followed by the scope's content:
//! one instruction in instruction scope, whitespace-separated byte literals
//! (decimal, `0x` hex, `0b` binary, `_` separators, optional leading `-`)
//! in data scope. Comments start with `//`, `;`, or `#`.
//!
//! ```
//! use libmarble::assembler::assemble;
//!
//! let assembly = assemble("start: ones\n display // emit 0xFF\n jump :start\n");
//! assert!(assembly.is_success());
//!
//! let image = assembly.image().unwrap();
//! assert_eq!(image.instructions[0], 0b1001_0000); // ones
//! assert_eq!(image.instructions[2], 0b0001_1101); // jump -3, folded to 5 bits
//! ```

mod scanner;
mod symbol_table;

use thiserror::Error;

use crate::isa::{
    fold_delta, lookup_mnemonic, TargetBank, CTRL_BANK_MASK, KIND_CTRL, KIND_MASK, KIND_REG,
    REG_INCREMENT_MASK, REG_PLANE_MASK, REG_PLANE_READ, REG_READ_SHIFT_SHIFT,
};
use crate::program::{LabelScope, ProgramImage, BANK_SIZE};
use scanner::Scanner;
use symbol_table::{PendingPatch, SymbolTable};

/// Classification of assembly diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// Malformed construct (trailing text, missing label, stray `.`).
    Syntax,
    /// Directive name not recognized.
    UnknownDirective,
    /// Mnemonic not in the instruction table.
    UnknownInstruction,
    /// Modifier unknown, duplicated, or not legal on this instruction.
    InvalidModifier,
    /// Numeric literal missing or containing invalid digits.
    InvalidNumber,
    /// Value outside its field's range (offset, data byte, data address).
    ValueOutOfRange,
    /// Label declared twice in one namespace.
    DuplicateLabel,
    /// Data slot written twice.
    DuplicateAddress,
    /// Label referenced but never declared.
    UnresolvedLabel,
    /// More than 32 instructions emitted.
    OversizedProgram,
}

/// A problem found during assembly.
///
/// `line` is 1-based for display and absent for whole-program diagnostics;
/// `column` is a 0-based char offset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub line: Option<usize>,
    pub column: usize,
}

impl Diagnostic {
    /// Source location as (1-based line, 0-based column), when line-scoped.
    pub fn location(&self) -> Option<(usize, usize)> {
        self.line.map(|line| (line, self.column))
    }
}

/// The outcome of one assembly run.
///
/// The image is best-effort: it is always populated so diagnostics can
/// reference concrete emitted addresses, but [`image`](Assembly::image)
/// only hands it out when the diagnostic list is empty — the engine's
/// load precondition.
#[derive(Debug, Clone)]
pub struct Assembly {
    /// Every diagnostic, in the order it was found.
    pub diagnostics: Vec<Diagnostic>,
    image: ProgramImage,
}

impl Assembly {
    /// True iff no diagnostics were produced.
    pub fn is_success(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// The assembled image, only for a successful assembly.
    pub fn image(&self) -> Option<&ProgramImage> {
        self.is_success().then_some(&self.image)
    }

    /// The best-effort image regardless of diagnostics. Not loadable state:
    /// use it for error reporting and inspection only.
    pub fn partial_image(&self) -> &ProgramImage {
        &self.image
    }
}

/// Assembles source text into a program image plus diagnostics.
pub fn assemble(source: &str) -> Assembly {
    Parser::new(source).run()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Instruction,
    Data,
}

struct Parser {
    scanner: Scanner,
    diagnostics: Vec<Diagnostic>,
    scope: Scope,
    instructions: Vec<u8>,
    instruction_lines: Vec<usize>,
    data: [u8; BANK_SIZE],
    data_written: [bool; BANK_SIZE],
    data_cursor: usize,
    symbols: SymbolTable,
}

impl Parser {
    fn new(source: &str) -> Self {
        Parser {
            scanner: Scanner::new(source),
            diagnostics: Vec::new(),
            scope: Scope::Instruction,
            instructions: Vec::new(),
            instruction_lines: Vec::new(),
            data: [0; BANK_SIZE],
            data_written: [false; BANK_SIZE],
            data_cursor: 0,
            symbols: SymbolTable::new(),
        }
    }

    fn run(mut self) -> Assembly {
        for line in 0..self.scanner.line_count() {
            self.scanner.set_line(line);
            self.parse_line();
        }
        self.apply_patches();
        self.finish()
    }

    fn error(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        let (line, column) = self.scanner.location();
        self.diagnostics.push(Diagnostic {
            kind,
            message: message.into(),
            line: Some(line),
            column,
        });
    }

    fn parse_line(&mut self) {
        self.scanner.skip_whitespace();

        if self.scanner.consume_char('.') {
            self.parse_directive();
        } else {
            self.try_label_declaration();
            self.scanner.skip_whitespace();
            match self.scope {
                Scope::Instruction => self.consume_instruction(),
                Scope::Data => self.consume_data_literals(),
            }
        }

        self.scanner.skip_whitespace();
        self.consume_comment();
        if !self.scanner.at_line_end() {
            self.error(DiagnosticKind::Syntax, "Unexpected extra arguments");
        }
    }

    /// A scope directive. Directive lines hold nothing else: data literals
    /// start on the following lines.
    fn parse_directive(&mut self) {
        let word = self.scanner.consume_word();
        match word.to_ascii_lowercase().as_str() {
            "inst" => self.scope = Scope::Instruction,
            "data" => {
                self.scope = Scope::Data;
                self.data_cursor = 0;
                self.scanner.skip_whitespace();
                if matches!(self.scanner.peek(), Some(ch) if ch.is_ascii_digit() || ch == '-') {
                    let address = self.parse_number();
                    if (0..BANK_SIZE as i64).contains(&address) {
                        self.data_cursor = address as usize;
                    } else {
                        self.error(
                            DiagnosticKind::ValueOutOfRange,
                            format!("Data address {} must be 0-31", address),
                        );
                    }
                }
            }
            "" => self.error(DiagnosticKind::Syntax, "Missing directive after '.'"),
            _ => self.error(
                DiagnosticKind::UnknownDirective,
                format!("Unknown directive '.{}'", word),
            ),
        }
    }

    /// `word:` declares a label at the scope's current position. Without the
    /// colon the cursor is reverted: the word belongs to the line's content.
    fn try_label_declaration(&mut self) {
        let start = self.scanner.pos();
        let word = self.scanner.consume_word();
        if !self.scanner.consume_char(':') {
            self.scanner.set_pos(start);
            return;
        }
        if word.is_empty() {
            self.error(DiagnosticKind::Syntax, "Missing label before ':'");
            return;
        }

        let (scope, target) = match self.scope {
            Scope::Instruction => (LabelScope::Instruction, self.instructions.len()),
            Scope::Data => (LabelScope::Data, self.data_cursor),
        };
        let line = self.scanner.location().0;
        let duplicate = match self.symbols.declare(scope, &word, line, target) {
            Ok(()) => None,
            Err(original) => Some((original.name.clone(), original.line)),
        };
        if let Some((original_name, original_line)) = duplicate {
            let case_note = if original_name != word {
                " Note: labels are case-insensitive."
            } else {
                ""
            };
            self.error(
                DiagnosticKind::DuplicateLabel,
                format!(
                    "Duplicate label '{}'. Original is on line {}.{}",
                    word, original_line, case_note
                ),
            );
        }
    }

    fn consume_instruction(&mut self) {
        let word = self.scanner.consume_word();
        if word.is_empty() {
            return;
        }
        let Some(info) = lookup_mnemonic(&word) else {
            self.error(
                DiagnosticKind::UnknownInstruction,
                format!("Unknown instruction '{}'", word),
            );
            return;
        };
        let line = self.scanner.location().0;

        // nop takes neither modifiers nor an operand.
        if info.name == "nop" {
            self.instructions.push(0);
            self.instruction_lines.push(line);
            return;
        }

        let mut bits = info.bits;
        let mut has_increment = false;
        let mut has_shift = false;
        while self.scanner.consume_char('.') {
            let modifier = self.scanner.consume_word();
            if modifier.is_empty() {
                self.error(DiagnosticKind::InvalidModifier, "Missing modifier after '.'");
                continue;
            }
            let lower = modifier.to_ascii_lowercase();
            if lower == "i" {
                if bits & KIND_MASK != KIND_REG {
                    self.error(
                        DiagnosticKind::InvalidModifier,
                        format!("Instruction '{}' can't use modifier .{}", word, modifier),
                    );
                } else if has_increment {
                    self.error(
                        DiagnosticKind::InvalidModifier,
                        format!("Duplicate modifier .{}", modifier),
                    );
                } else {
                    bits |= REG_INCREMENT_MASK;
                    has_increment = true;
                }
            } else if let Some(amount) = lower.strip_prefix("shr") {
                if amount.is_empty() || !amount.chars().all(|ch| ch.is_ascii_digit()) {
                    self.error(
                        DiagnosticKind::InvalidModifier,
                        format!("Invalid modifier '{}'", modifier),
                    );
                } else if bits & (KIND_MASK | REG_PLANE_MASK) != (KIND_REG | REG_PLANE_READ) {
                    self.error(
                        DiagnosticKind::InvalidModifier,
                        format!("Instruction '{}' can't use modifier .{}", word, modifier),
                    );
                } else {
                    match amount.parse::<u8>() {
                        Ok(shift) if shift <= 3 => {
                            if has_shift {
                                self.error(
                                    DiagnosticKind::InvalidModifier,
                                    "Duplicate modifier .shr",
                                );
                            } else {
                                bits |= shift << REG_READ_SHIFT_SHIFT;
                                has_shift = true;
                            }
                        }
                        _ => {
                            self.error(
                                DiagnosticKind::InvalidModifier,
                                ".shr modifier can only shift 0-3 bits",
                            );
                            has_shift = true;
                        }
                    }
                }
            } else {
                self.error(
                    DiagnosticKind::InvalidModifier,
                    format!("Invalid modifier '{}'", modifier),
                );
            }
        }

        if bits & KIND_MASK == KIND_CTRL {
            self.scanner.skip_whitespace();
            if self.scanner.consume_char(':') {
                let (line, column) = self.scanner.location();
                let label = self.scanner.consume_word();
                if label.is_empty() {
                    self.error(DiagnosticKind::Syntax, "Missing label");
                } else {
                    let target_bank = if bits & CTRL_BANK_MASK != 0 {
                        TargetBank::Data
                    } else {
                        TargetBank::Instruction
                    };
                    self.symbols.record_patch(PendingPatch {
                        instruction_index: self.instructions.len(),
                        label,
                        line,
                        column,
                        target_bank,
                    });
                }
            } else {
                let offset = self.parse_number();
                if !(-31..=31).contains(&offset) {
                    self.error(
                        DiagnosticKind::ValueOutOfRange,
                        format!("Offset {} is too large", offset),
                    );
                } else {
                    bits |= fold_delta(offset as i32);
                }
            }
        }

        self.instructions.push(bits);
        self.instruction_lines.push(line);
    }

    /// Byte literals written at the data cursor, wrapping mod 32. A slot
    /// already holding an explicit value is reported and left unchanged.
    fn consume_data_literals(&mut self) {
        loop {
            self.scanner.skip_whitespace();
            match self.scanner.peek() {
                Some(ch) if ch.is_ascii_digit() || ch == '-' => {}
                _ => break,
            }
            let value = self.parse_number();
            if !(-128..=255).contains(&value) {
                self.error(
                    DiagnosticKind::ValueOutOfRange,
                    format!("Value {} doesn't fit in one byte", value),
                );
            } else if self.data_written[self.data_cursor] {
                self.error(
                    DiagnosticKind::DuplicateAddress,
                    format!("Duplicate data address {}", self.data_cursor),
                );
            } else {
                self.data[self.data_cursor] = (value & 0xFF) as u8;
                self.data_written[self.data_cursor] = true;
            }
            self.data_cursor = (self.data_cursor + 1) % BANK_SIZE;
        }
    }

    fn consume_comment(&mut self) {
        if self.scanner.consume_str("//")
            || self.scanner.consume_char(';')
            || self.scanner.consume_char('#')
        {
            self.scanner.skip_to_line_end();
        }
    }

    /// Optional `-`, optional `0x`/`0b` base prefix, then digits with `_`
    /// separators. Emits diagnostics and yields 0 on malformed input.
    fn parse_number(&mut self) -> i64 {
        let negative = self.scanner.consume_char('-');
        let base = if self.scanner.consume_str("0x") {
            16
        } else if self.scanner.consume_str("0b") {
            2
        } else {
            10
        };
        let value = self.parse_unsigned(base);
        if negative {
            -value
        } else {
            value
        }
    }

    fn parse_unsigned(&mut self, base: i64) -> i64 {
        let mut result: i64 = 0;
        let mut has_digits = false;
        let mut has_error = false;
        while let Some(ch) = self.scanner.peek() {
            let value = match ch {
                '0'..='9' => ch as i64 - '0' as i64,
                'a'..='f' => 10 + ch as i64 - 'a' as i64,
                'A'..='F' => 10 + ch as i64 - 'A' as i64,
                '_' if has_digits => {
                    self.scanner.advance(1);
                    continue;
                }
                _ => break,
            };
            if value >= base {
                self.error(
                    DiagnosticKind::InvalidNumber,
                    format!("Character invalid in base {}: {}", base, ch),
                );
                has_error = true;
            }
            has_digits = true;
            self.scanner.advance(1);
            result = result.saturating_mul(base).saturating_add(value);
        }
        if !has_digits {
            self.error(DiagnosticKind::InvalidNumber, "Missing number");
            has_error = true;
        }
        if has_error {
            0
        } else {
            result
        }
    }

    /// Pass 2: fold resolved label deltas into their control instructions.
    ///
    /// Instruction-bank references are relative to the already-advanced
    /// instruction pointer (`target - patch - 1`); data-bank references
    /// encode the labeled address itself, which the data pointer reaches
    /// from its reset position.
    fn apply_patches(&mut self) {
        for patch in self.symbols.take_patches() {
            let scope = match patch.target_bank {
                TargetBank::Instruction => LabelScope::Instruction,
                TargetBank::Data => LabelScope::Data,
            };
            let target = self
                .symbols
                .lookup(scope, &patch.label)
                .map(|label| label.target);
            match target {
                Some(target) => {
                    let delta = match patch.target_bank {
                        TargetBank::Instruction => {
                            target as i32 - patch.instruction_index as i32 - 1
                        }
                        TargetBank::Data => target as i32,
                    };
                    self.instructions[patch.instruction_index] |= fold_delta(delta);
                }
                None => self.diagnostics.push(Diagnostic {
                    kind: DiagnosticKind::UnresolvedLabel,
                    message: format!("Couldn't find label declaration for '{}'", patch.label),
                    line: Some(patch.line),
                    column: patch.column,
                }),
            }
        }
    }

    fn finish(mut self) -> Assembly {
        if self.instructions.len() > BANK_SIZE {
            self.diagnostics.push(Diagnostic {
                kind: DiagnosticKind::OversizedProgram,
                message: format!(
                    "Program has more than 32 instructions ({})",
                    self.instructions.len()
                ),
                line: None,
                column: 0,
            });
            self.instructions.truncate(BANK_SIZE);
            self.instruction_lines.truncate(BANK_SIZE);
        } else {
            self.instructions.resize(BANK_SIZE, 0);
        }

        let mut instructions = [0u8; BANK_SIZE];
        instructions.copy_from_slice(&self.instructions);
        Assembly {
            diagnostics: self.diagnostics,
            image: ProgramImage {
                instructions,
                data: self.data,
                instruction_lines: self.instruction_lines,
                labels: self.symbols.into_labels(),
            },
        }
    }
}
