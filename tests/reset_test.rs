//! Tests for load/reset lifecycle

use libmarble::{assemble, ExecutionEngine, RunMode, Status};

const PROGRAM: &str = "\
.data
 10 20 30
.inst
ones
store.i
store.i
display
";

fn load_program(source: &str) -> ExecutionEngine {
    let assembly = assemble(source);
    assert!(assembly.is_success(), "diagnostics: {:?}", assembly.diagnostics);
    let mut engine = ExecutionEngine::new();
    engine.load(assembly.image().unwrap());
    engine
}

fn observable_state(engine: &ExecutionEngine) -> (u8, bool, usize, usize, [u8; 32], usize, f64) {
    (
        engine.register(),
        engine.condition(),
        engine.instruction_pointer(),
        engine.data_pointer(),
        *engine.data_bank(),
        engine.display_buffer().len() + engine.completed_rows().len(),
        engine.uptime(),
    )
}

#[test]
fn test_load_applies_initial_data() {
    let engine = load_program(PROGRAM);
    assert_eq!(&engine.data_bank()[0..3], &[10, 20, 30]);
    assert_eq!(engine.status(), Status::PausedReset);
    assert_eq!(engine.run_mode(), RunMode::Stopped);
}

#[test]
fn test_reset_restores_initial_data_and_clears_state() {
    let mut engine = load_program(PROGRAM);
    engine.set_run_mode(RunMode::Forever);
    engine.advance(1_000.0);

    // The run overwrote data and produced display output.
    assert_ne!(&engine.data_bank()[0..2], &[10, 20]);

    engine.reset();
    assert_eq!(engine.register(), 0);
    assert!(!engine.condition());
    assert_eq!(engine.instruction_pointer(), 0);
    assert_eq!(engine.data_pointer(), 0);
    assert_eq!(&engine.data_bank()[0..3], &[10, 20, 30]);
    assert!(engine.display_buffer().is_empty());
    assert!(engine.current_row().is_none());
    assert!(engine.completed_rows().is_empty());
    assert_eq!(engine.uptime(), 0.0);
    assert_eq!(engine.status(), Status::PausedReset);
}

#[test]
fn test_reset_is_idempotent() {
    let mut engine = load_program(PROGRAM);
    engine.set_run_mode(RunMode::Forever);
    engine.advance(500.0);

    engine.reset();
    let first = observable_state(&engine);
    engine.reset();
    let second = observable_state(&engine);
    assert_eq!(first, second);
}

#[test]
fn test_reset_stops_an_active_run() {
    let mut engine = load_program(PROGRAM);
    engine.set_run_mode(RunMode::Forever);
    engine.advance(3.0);

    engine.reset();
    assert_eq!(engine.run_mode(), RunMode::Stopped);
    assert_eq!(engine.time_into_instruction(), 0.0);
}

#[test]
fn test_reload_replaces_program() {
    let mut engine = load_program(PROGRAM);
    engine.set_run_mode(RunMode::Forever);
    engine.advance(100.0);

    let assembly = assemble("dec\n");
    engine.load(assembly.image().unwrap());

    assert_eq!(engine.instruction_pointer(), 0);
    assert_eq!(engine.data_bank(), &[0u8; 32]);
    engine.step();
    assert_eq!(engine.register(), 0xFF);
}
