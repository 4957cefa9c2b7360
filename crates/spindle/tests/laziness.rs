//! Non-strictness, call-by-need sharing, and cyclic data from `letrec`.

use pretty_assertions::assert_eq;
use spindle::{BinaryOp, CountingTracer, Engine, Error, NoLimitTracker, RunErrorKind};

fn eval(source: &str) -> String {
    let mut engine = Engine::with_prelude();
    engine.load_str(source).unwrap();
    engine.run().unwrap().to_string()
}

fn eval_err(source: &str) -> RunErrorKind {
    let mut engine = Engine::with_prelude();
    engine.load_str(source).unwrap();
    match engine.run() {
        Err(Error::Run(err)) => err.kind,
        other => panic!("expected a runtime abort, got {other:?}"),
    }
}

// === Non-strictness ===

#[test]
fn k_never_forces_its_second_argument() {
    assert_eq!(eval("main = K 1 abort"), "1");
}

#[test]
fn k1_forces_its_second_argument() {
    assert_eq!(eval_err("main = K1 1 abort"), RunErrorKind::ExplicitAbort);
}

#[test]
fn abort_alone_aborts() {
    assert_eq!(eval_err("main = abort"), RunErrorKind::ExplicitAbort);
}

#[test]
fn unused_arguments_are_never_evaluated() {
    let mut engine = Engine::with_prelude();
    engine.load_str("main = K 1 (2 * 3)").unwrap();
    let mut counter = CountingTracer::new();
    let out = engine.run_with(NoLimitTracker, &mut counter).unwrap();
    assert_eq!(out.to_string(), "1");
    assert_eq!(counter.primop_count(BinaryOp::Mul), 0);
}

// === Sharing (call-by-need) ===

#[test]
fn shared_binding_evaluates_once() {
    let mut engine = Engine::with_prelude();
    engine
        .load_str("square x = x * x;\nmain = let y = square 3 in y + y")
        .unwrap();
    let mut counter = CountingTracer::new();
    let out = engine.run_with(NoLimitTracker, &mut counter).unwrap();
    assert_eq!(out.to_string(), "18");
    // `square 3` is demanded twice but reduced once.
    assert_eq!(counter.primop_count(BinaryOp::Mul), 1);
    assert_eq!(counter.primop_count(BinaryOp::Add), 1);
}

#[test]
fn shared_argument_evaluates_once() {
    let mut engine = Engine::with_prelude();
    engine
        .load_str("double x = x + x;\nmain = double (3 * 7)")
        .unwrap();
    let mut counter = CountingTracer::new();
    let out = engine.run_with(NoLimitTracker, &mut counter).unwrap();
    assert_eq!(out.to_string(), "42");
    assert_eq!(counter.primop_count(BinaryOp::Mul), 1);
}

// === Infinite structures ===

#[test]
fn recursive_stream_supports_finite_demand() {
    assert_eq!(
        eval("infinite x = cons x (infinite x);\nmain = hd (tl (tl (infinite 7)))"),
        "7"
    );
}

#[test]
fn letrec_ties_a_cyclic_stream() {
    assert_eq!(
        eval("infinite x = letrec xs = cons x xs in xs;\nmain = hd (tl (tl (infinite 7)))"),
        "7"
    );
}

#[test]
fn cyclic_stream_allocates_one_cell() {
    // The letrec version reuses one cons cell for every tail, so deep
    // demand allocates no further cells than the recursive version would.
    let mut engine = Engine::with_prelude();
    engine
        .load_str("infinite x = letrec xs = cons x xs in xs;\nmain = hd (tl (tl (tl (tl (infinite 1)))))")
        .unwrap();
    let mut counter = CountingTracer::new();
    let out = engine.run_with(NoLimitTracker, &mut counter).unwrap();
    assert_eq!(out.to_string(), "1");
    // One Pack for the single shared cell.
    assert_eq!(counter.instruction_count("Pack"), 1);
}

#[test]
fn take_from_an_infinite_enumeration() {
    let source = "\
from n = cons n (from (n+1));
take n xs = if (n==1) nil (case xs of
  <1> -> nil,
  <2> p ps -> cons p (take (n-1) ps));
main = hd (tl (tl (tl (take 5 (from 0)))))";
    assert_eq!(eval(source), "3");
}

#[test]
fn prefix_of_an_unbounded_stream() {
    let source = "\
from n = cons n (from (n+1));
main = hd (tl (tl (tl (from 5))))";
    assert_eq!(eval(source), "8");
}
