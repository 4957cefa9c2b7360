//! Constructors, `case` dispatch, case lifting, and list rendering.

use pretty_assertions::assert_eq;
use spindle::{Engine, Error, RunErrorKind};

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

// === Case dispatch ===

#[test]
fn list_length_by_structural_recursion() {
    let source = "\
length xs = case xs of <1> -> 0, <2> y ys -> 1 + length ys;
main = length (Pack{2,2} 2 (Pack{2,2} 2 (Pack{2,2} 1 Pack{1,0})))";
    assert_eq!(eval(source), "3");
}

#[test]
fn case_dispatches_on_the_evaluated_tag() {
    let source = "f x = case x of <3> -> 10, <4> -> 20;\nmain = f Pack{3,0}";
    assert_eq!(eval(source), "10");
    let source = "f x = case x of <3> -> 10, <4> -> 20;\nmain = f Pack{4,0}";
    assert_eq!(eval(source), "20");
}

#[test]
fn unmatched_tag_aborts() {
    let source = "f x = case x of <3> -> 10;\nmain = f Pack{4,0}";
    assert_eq!(eval_err(source), RunErrorKind::NoMatchingAlternative);
}

#[test]
fn head_of_the_empty_list_aborts() {
    assert_eq!(eval_err("main = hd nil"), RunErrorKind::NoMatchingAlternative);
}

#[test]
fn pattern_arity_mismatch_aborts() {
    let source = "f x = case x of <7> a -> a;\nmain = f (Pack{7,2} 1 2)";
    assert_eq!(eval_err(source), RunErrorKind::TypeError);
}

// === Case lifting out of lazy contexts ===

#[test]
fn case_inside_a_lazy_argument() {
    let source = "\
f x = K (1 + (case x of <3> -> 1, <4> -> 2)) 1;
main = f Pack{3,0}";
    assert_eq!(eval(source), "2");
    let source = "\
f x = K (1 + (case x of <3> -> 1, <4> -> 2)) 1;
main = f Pack{4,0}";
    assert_eq!(eval(source), "3");
}

#[test]
fn lifted_case_binds_constructor_fields() {
    let source = "\
f x = K (1 + (case x of <3> -> 1, <4> x -> x)) 1;
main = f (Pack{4,1} 10)";
    assert_eq!(eval(source), "11");
    let source = "\
f x = K (1 + (case x of <3> x -> x, <4> x -> x)) 1;
main = f (Pack{3,1} 100)";
    assert_eq!(eval(source), "101");
}

// === Rendering ===

#[test]
fn proper_lists_render_with_the_nil_sentinel() {
    assert_eq!(eval("main = cons 1 (cons 2 nil)"), "[1,2,'nil']");
    assert_eq!(eval("main = nil"), "['nil']");
}

#[test]
fn list_elements_are_forced_by_the_renderer() {
    assert_eq!(eval("main = cons (1 + 1) (cons (2 * 3) nil)"), "[2,6,'nil']");
}

#[test]
fn non_list_constructors_render_with_their_tag() {
    assert_eq!(eval("main = Pack{5,2} 1 2"), "Pack{5,2} 1 2");
    assert_eq!(eval("main = Pack{5,0}"), "Pack{5,0}");
    assert_eq!(
        eval("main = Pack{5,1} (Pack{6,1} 3)"),
        "Pack{5,1} (Pack{6,1} 3)"
    );
}

#[test]
fn nested_lists_render_recursively() {
    assert_eq!(eval("main = cons (cons 1 nil) nil"), "[[1,'nil'],'nil']");
}

// === Programs over lists ===

#[test]
fn sieve_of_eratosthenes_renders_the_primes() {
    let source = "\
from n = cons n (from (n + 1));

sieve xs = case xs of
  <1> -> nil,
  <2> p ps -> cons p (sieve (filter (nonMultiple p) ps));

filter predicate xs = case xs of
    <1> -> nil,
    <2> p ps -> let rest = filter predicate ps in if (predicate p) (cons p rest) rest;

nonMultiple p n = ((n/p)*p) != n;

take n xs = if (n==0) nil (case xs of
  <1> -> nil,
  <2> p ps -> cons p (take (n-1) ps));

main = sieve (take 15 (from 2))";
    assert_eq!(eval(source), "[2,3,5,7,11,13,'nil']");
}

#[test]
fn fourth_prime_from_the_sieve() {
    let source = "\
from n = cons n (from (n + 1));
sieve xs = case xs of
  <1> -> nil,
  <2> p ps -> cons p (sieve (filter (nonMultiple p) ps));
filter predicate xs = case xs of
    <1> -> nil,
    <2> p ps -> let rest = filter predicate ps in if (predicate p) (cons p rest) rest;
nonMultiple p n = ((n/p)*p) != n;
take n xs = if (n==0) nil (case xs of
  <1> -> nil,
  <2> p ps -> cons p (take (n-1) ps));
main = hd (tl (tl (tl (sieve (take 15 (from 2))))))";
    assert_eq!(eval(source), "7");
}

// === Definition merging across loads ===

#[test]
fn later_definitions_overwrite_earlier_ones() {
    let mut engine = Engine::with_prelude();
    engine.load_str("main = 1").unwrap();
    engine.load_str("main = 2").unwrap();
    assert_eq!(engine.run().unwrap().to_string(), "2");
}

#[test]
fn user_definitions_can_shadow_the_prelude() {
    let mut engine = Engine::with_prelude();
    engine.load_str("I x = 99;\nmain = I 1").unwrap();
    assert_eq!(engine.run().unwrap().to_string(), "99");
}
