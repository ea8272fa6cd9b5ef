//! Execution tests for control instructions: jump/branch/seek/select

use libmarble::{assemble, ExecutionEngine};

fn load_program(source: &str) -> ExecutionEngine {
    let assembly = assemble(source);
    assert!(assembly.is_success(), "diagnostics: {:?}", assembly.diagnostics);
    let mut engine = ExecutionEngine::new();
    engine.load(assembly.image().unwrap());
    engine
}

#[test]
fn test_jump_skips_forward() {
    let mut engine = load_program("jump 2\nones\nones\nzero\n");

    engine.step();
    // Fetch advanced the pointer to 1, then the delta moved it to 3.
    assert_eq!(engine.instruction_pointer(), 3);

    engine.step();
    // Slot 3 is zero: the skipped ones never ran.
    assert_eq!(engine.register(), 0);
}

#[test]
fn test_jump_backward_wraps() {
    let mut engine = load_program("jump -1\n");

    engine.step();
    // Pointer went 0 -> 1 on fetch, then +31 wraps back to 0.
    assert_eq!(engine.instruction_pointer(), 0);
}

#[test]
fn test_positive_delta_aliases_negative() {
    // +31 is -1 mod 32.
    let mut engine = load_program("jump 31\n");
    engine.step();
    assert_eq!(engine.instruction_pointer(), 0);
}

#[test]
fn test_branch_untaken_falls_through() {
    let mut engine = load_program("branch 5\nones\n");

    engine.step();
    // Condition is false: no move, and the flag is left alone.
    assert_eq!(engine.instruction_pointer(), 1);
    assert!(!engine.condition());
}

#[test]
fn test_branch_taken_moves_and_keeps_condition() {
    // ones twice leaves the condition set, then the branch fires.
    let mut engine = load_program("ones\nones\nbranch 2\nzero\nzero\nones\n");

    engine.step();
    engine.step();
    assert!(engine.condition());

    engine.step();
    assert_eq!(engine.instruction_pointer(), 5);
    // Control flow does not consume the flag.
    assert!(engine.condition());
}

#[test]
fn test_seek_moves_data_pointer() {
    let mut engine = load_program("seek 7\nseek 30\n");

    engine.step();
    assert_eq!(engine.data_pointer(), 7);

    engine.step();
    assert_eq!(engine.data_pointer(), (7 + 30) % 32);
    // The instruction pointer is unaffected by data-bank moves.
    assert_eq!(engine.instruction_pointer(), 2);
}

#[test]
fn test_select_requires_condition() {
    let mut engine = load_program("select 3\nones\nones\nselect 3\n");

    engine.step();
    assert_eq!(engine.data_pointer(), 0);

    engine.step();
    engine.step();
    assert!(engine.condition());

    engine.step();
    assert_eq!(engine.data_pointer(), 3);
}

#[test]
fn test_nop_only_advances() {
    let mut engine = load_program("nop\nnop\n");

    engine.step();
    engine.step();
    assert_eq!(engine.instruction_pointer(), 2);
    assert_eq!(engine.register(), 0);
    assert_eq!(engine.data_pointer(), 0);
    assert!(!engine.condition());
}

#[test]
fn test_instruction_pointer_wraps_off_the_end() {
    let mut engine = load_program("ones\n");

    for _ in 0..32 {
        engine.step();
    }
    assert_eq!(engine.instruction_pointer(), 0);
}
