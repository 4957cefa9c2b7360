//! Engine-level behavior: snapshots, resource limits, and pipeline errors.

use pretty_assertions::assert_eq;
use spindle::{
    CompileErrorKind, Engine, Error, LimitedTracker, NoLimitTracker, NoopTracer, RunErrorKind,
};

// === Snapshots ===

#[test]
fn dump_and_load_roundtrips_a_compiled_engine() {
    let mut engine = Engine::with_prelude();
    engine
        .load_str("square x = x * x;\nmain = square (square 3)")
        .unwrap();
    let bytes = engine.dump().unwrap();

    let restored = Engine::load(&bytes).unwrap();
    assert_eq!(restored.run().unwrap().to_string(), "81");
}

#[test]
fn restored_engines_accept_further_loads() {
    let mut engine = Engine::with_prelude();
    engine.load_str("square x = x * x").unwrap();
    let bytes = engine.dump().unwrap();

    let mut restored = Engine::load(&bytes).unwrap();
    restored.load_str("main = square 6").unwrap();
    assert_eq!(restored.run().unwrap().to_string(), "36");
}

// === Resource limits ===

#[test]
fn step_limit_stops_divergence() {
    let mut engine = Engine::with_prelude();
    engine.load_str("loop x = loop x;\nmain = loop 1").unwrap();
    let tracker = LimitedTracker::new().with_max_steps(10_000);
    match engine.run_with(tracker, NoopTracer) {
        Err(Error::Run(err)) => assert_eq!(err.kind, RunErrorKind::ResourceExhausted),
        other => panic!("expected a resource abort, got {other:?}"),
    }
}

#[test]
fn heap_limit_stops_unbounded_allocation() {
    let mut engine = Engine::with_prelude();
    engine
        .load_str("from n = cons n (from (n+1));\nlast xs = case xs of <1> -> 0, <2> y ys -> last ys;\nmain = last (from 0)")
        .unwrap();
    let tracker = LimitedTracker::new().with_max_heap_nodes(50_000);
    match engine.run_with(tracker, NoopTracer) {
        Err(Error::Run(err)) => assert_eq!(err.kind, RunErrorKind::ResourceExhausted),
        other => panic!("expected a resource abort, got {other:?}"),
    }
}

#[test]
fn tracker_state_is_observable_after_the_run() {
    let mut engine = Engine::with_prelude();
    engine.load_str("main = 1 + 2").unwrap();
    let mut tracker = LimitedTracker::new();
    engine.run_with(&mut tracker, NoopTracer).unwrap();
    assert!(tracker.steps() > 0);
    assert!(tracker.heap_nodes() > 0);
}

// === Pipeline errors ===

#[test]
fn unbound_identifiers_fail_the_load() {
    let mut engine = Engine::with_prelude();
    match engine.load_str("main = mystery") {
        Err(Error::Compile(err)) => assert_eq!(err.kind, CompileErrorKind::UnboundIdentifier),
        other => panic!("expected a compile error, got {other:?}"),
    }
}

#[test]
fn failed_loads_commit_nothing() {
    let mut engine = Engine::with_prelude();
    assert!(engine.load_str("f x = x + 1;\nmain = undefined_thing").is_err());
    // The failed program's definitions must not have been committed.
    match engine.load_str("main = f 1") {
        Err(Error::Compile(err)) => assert_eq!(err.kind, CompileErrorKind::UnboundIdentifier),
        other => panic!("expected 'f' to be unknown, got {other:?}"),
    }
}

#[test]
fn missing_main_is_reported_at_run_time() {
    let engine = Engine::with_prelude();
    match engine.run() {
        Err(Error::Compile(err)) => assert_eq!(err.kind, CompileErrorKind::MissingMain),
        other => panic!("expected MissingMain, got {other:?}"),
    }
}

#[test]
fn main_with_parameters_is_rejected() {
    let mut engine = Engine::with_prelude();
    engine.load_str("main x = x").unwrap();
    match engine.run() {
        Err(Error::Compile(err)) => assert_eq!(err.kind, CompileErrorKind::MainTakesArguments),
        other => panic!("expected MainTakesArguments, got {other:?}"),
    }
}

#[test]
fn over_applied_constructors_are_a_compile_error() {
    let mut engine = Engine::with_prelude();
    match engine.load_str("main = Pack{1,0} 5") {
        Err(Error::Compile(err)) => assert_eq!(err.kind, CompileErrorKind::ArityMismatch),
        other => panic!("expected ArityMismatch, got {other:?}"),
    }
}

#[test]
fn parse_errors_carry_positions() {
    let mut engine = Engine::with_prelude();
    match engine.load_str("main = let x 1 in x") {
        Err(Error::Parse(err)) => {
            assert_eq!(err.line, 1);
            assert!(err.column > 1);
        }
        other => panic!("expected a parse error, got {other:?}"),
    }
}

#[test]
fn prelude_free_engine_still_runs_primitives() {
    let mut engine = Engine::new();
    engine.load_str("main = 2 + 3").unwrap();
    assert_eq!(engine.run().unwrap().to_string(), "5");
}

#[test]
fn function_results_cannot_be_rendered() {
    let mut engine = Engine::with_prelude();
    engine.load_str("main = K 1").unwrap();
    match engine.run() {
        Err(Error::Run(err)) => assert_eq!(err.kind, RunErrorKind::TypeError),
        other => panic!("expected a render failure, got {other:?}"),
    }
}

#[test]
fn atoms_in_function_position_abort() {
    let mut engine = Engine::with_prelude();
    engine.load_str("main = 1 2").unwrap();
    match engine.run() {
        Err(Error::Run(err)) => assert_eq!(err.kind, RunErrorKind::TypeError),
        other => panic!("expected a stuck-application abort, got {other:?}"),
    }
}
