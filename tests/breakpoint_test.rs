//! Tests for instruction and data breakpoints

use libmarble::{assemble, ExecutionEngine, RunMode, Status};

fn load_program(source: &str) -> ExecutionEngine {
    let assembly = assemble(source);
    assert!(assembly.is_success(), "diagnostics: {:?}", assembly.diagnostics);
    let mut engine = ExecutionEngine::new();
    engine.load(assembly.image().unwrap());
    engine
}

#[test]
fn test_instruction_breakpoint_stops_on_approach() {
    // An all-nop program wrapping forever.
    let mut engine = load_program("");
    engine.toggle_instruction_breakpoint(5);

    engine.set_run_mode(RunMode::Forever);
    engine.advance(1_000_000.0);

    // Stopped with address 5 about to execute: five nops ran, never more.
    assert_eq!(engine.run_mode(), RunMode::Stopped);
    assert_eq!(engine.instruction_pointer(), 5);
    assert_eq!(engine.status(), Status::PausedBreakpoint);
    assert_eq!(engine.uptime(), 5.0 * 7.0);
}

#[test]
fn test_breakpoint_stop_is_reentrant() {
    let mut engine = load_program("");
    engine.toggle_instruction_breakpoint(5);
    engine.set_run_mode(RunMode::Forever);
    engine.advance(1_000_000.0);
    assert_eq!(engine.instruction_pointer(), 5);

    // Resuming executes the breakpointed slot and the stop happens on the
    // next approach, a full 32-instruction lap later.
    let uptime_at_stop = engine.uptime();
    engine.set_run_mode(RunMode::Forever);
    engine.advance(1_000_000.0);

    assert_eq!(engine.run_mode(), RunMode::Stopped);
    assert_eq!(engine.instruction_pointer(), 5);
    assert_eq!(engine.uptime(), uptime_at_stop + 32.0 * 7.0);
}

#[test]
fn test_breakpoint_never_passed_within_one_call() {
    let mut engine = load_program("");
    engine.toggle_instruction_breakpoint(3);
    engine.set_run_mode(RunMode::Forever);

    // Many small calls; none may carry execution past the breakpoint.
    for _ in 0..100 {
        engine.advance(50.0);
        if engine.run_mode() == RunMode::Stopped {
            break;
        }
    }
    assert_eq!(engine.instruction_pointer(), 3);
    assert_eq!(engine.run_mode(), RunMode::Stopped);
}

#[test]
fn test_data_breakpoint_stops_before_store() {
    let mut engine = load_program("ones\nstore.i\nstore.i\nstore.i\nstore.i\n");
    engine.toggle_data_breakpoint(2);

    engine.set_run_mode(RunMode::Forever);
    engine.advance(1_000_000.0);

    // Stopped when the pointer reached address 2 with a store up next:
    // addresses 0 and 1 were written, 2 was not.
    assert_eq!(engine.run_mode(), RunMode::Stopped);
    assert_eq!(engine.status(), Status::PausedMemoryBreakpoint);
    assert_eq!(engine.data_pointer(), 2);
    assert_eq!(engine.data_bank()[0], 0xFF);
    assert_eq!(engine.data_bank()[1], 0xFF);
    assert_eq!(engine.data_bank()[2], 0);
}

#[test]
fn test_data_breakpoint_ignores_non_store_instructions() {
    // The data pointer sits on address 0 the whole time, but nothing stores.
    let mut engine = load_program("loop: ones\n jump :loop\n");
    engine.toggle_data_breakpoint(0);

    engine.set_run_mode(RunMode::Forever);
    engine.advance(1_000.0);

    // Budget exhausted without a breakpoint stop.
    assert_eq!(engine.run_mode(), RunMode::Forever);
    assert_eq!(engine.status(), Status::Running);
}

#[test]
fn test_breakpoints_survive_load_and_reset() {
    let mut engine = load_program("");
    engine.toggle_instruction_breakpoint(4);
    engine.toggle_data_breakpoint(9);

    engine.reset();
    assert_eq!(engine.instruction_breakpoints(), 1 << 4);
    assert_eq!(engine.data_breakpoints(), 1 << 9);

    let assembly = assemble("ones\n");
    engine.load(assembly.image().unwrap());
    assert_eq!(engine.instruction_breakpoints(), 1 << 4);
    assert_eq!(engine.data_breakpoints(), 1 << 9);
}

#[test]
fn test_step_ignores_breakpoints() {
    let mut engine = load_program("");
    engine.toggle_instruction_breakpoint(1);

    // Stepping across the breakpointed address leaves control with the
    // caller either way.
    engine.step();
    assert_eq!(engine.instruction_pointer(), 1);
    assert_eq!(engine.status(), Status::PausedStep);

    engine.step();
    assert_eq!(engine.instruction_pointer(), 2);
    assert_eq!(engine.status(), Status::PausedStep);
}
