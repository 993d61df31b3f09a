use super::{
    Context, Session,
    callgraph::CallGraph,
    classify::{classify, classify_function},
};
use crate::{
    ir::{NarrowingOracle, Operation, Site, Symbol, TypeAssertNarrowing},
    parser_tests::parse_string,
};
use analysis::cfg::ControlFlowGraph;

struct NeverNarrows;

impl NarrowingOracle for NeverNarrows {
    fn is_forced_narrowing(&self, _: &Operation) -> bool {
        false
    }
}

fn classify_all(
    source: &str,
    session: &Session,
    narrowing: &dyn NarrowingOracle,
) -> Vec<(String, bool)> {
    let program = parse_string(source).unwrap();
    let graph = CallGraph::build(&program);
    let ctx = Context {
        program: &program,
        graph: &graph,
        narrowing,
    };
    program
        .func_ids()
        .map(|func| {
            (
                program.name(func).to_owned(),
                classify_function(ctx, session, func),
            )
        })
        .collect()
}

fn expected(results: &[(&str, bool)]) -> Vec<(String, bool)> {
    results
        .iter()
        .map(|(name, capable)| ((*name).to_owned(), *capable))
        .collect()
}

const FAULTS: &str = r"unit a;

@deref(p: ptr) {
  x: int = field p f;
  ret;
}

@through_iface(p: iface) {
  x: int = field p f;
  ret;
}

@plain_field(p: int) {
  x: int = field p f;
  ret;
}

@slice_index(s: slice, i: int) {
  x: int = index s i;
  ret;
}

@map_index(s: map, i: int) {
  x: int = index s i;
  ret;
}

@string_index(s: string, i: int) {
  x: int = index s i;
  ret;
}

@untyped(s: unknown, i: int) {
  x: int = index s i;
  y: int = field s f;
  ret;
}

@divide(x: int, y: int) {
  q: int = div x y;
  ret;
}

@remainder(x: int, y: int) {
  q: int = mod x y;
  ret;
}

@float_divide(x: float, y: float) {
  q: float = div x y;
  ret;
}

@multiply(x: int, y: int) {
  q: int = mul x y;
  ret;
}

@assert(o: iface) {
  x: int = typeassert o;
  ret;
}

@checked_assert(o: iface) {
  x: int = typeassert o commaok;
  ret;
}

@raise {
  panic;
}

@spawn {
  go @raise;
  ret;
}
";

#[test]
fn direct_faults() {
    let results = classify_all(FAULTS, &Session::new(), &TypeAssertNarrowing);
    assert_eq!(
        results,
        expected(&[
            ("deref", true),
            ("through_iface", true),
            ("plain_field", false),
            ("slice_index", true),
            ("map_index", true),
            ("string_index", true),
            ("untyped", false),
            ("divide", true),
            ("remainder", true),
            ("float_divide", false),
            ("multiply", false),
            ("assert", true),
            ("checked_assert", false),
            ("raise", true),
            ("spawn", false),
        ])
    );
}

#[test]
fn narrowing_is_pluggable() {
    let results = classify_all(FAULTS, &Session::new(), &NeverNarrows);
    let (_, capable) = results.iter().find(|(name, _)| name == "assert").unwrap();
    assert!(!capable);
}

#[test]
fn calls_use_facts() {
    let source = r"unit a;

extern @fail;

@caller {
  call @fail;
  ret;
}

@deferrer {
  defer @fail;
  ret;
}

@spawner {
  go @fail;
  ret;
}
";
    let results = classify_all(source, &Session::new(), &TypeAssertNarrowing);
    assert_eq!(
        results,
        expected(&[
            ("fail", false),
            ("caller", false),
            ("deferrer", false),
            ("spawner", false),
        ])
    );

    let mut session = Session::new();
    session.export(Symbol("a.fail".to_owned()), true);
    let results = classify_all(source, &session, &TypeAssertNarrowing);
    assert_eq!(
        results,
        expected(&[
            ("fail", false),
            ("caller", true),
            ("deferrer", true),
            ("spawner", false),
        ])
    );
}

#[test]
fn single_operations() {
    let source = r"unit a;

@main(p: ptr) {
  x: int = field p f;
  print x;
  ret;
}
";
    let program = parse_string(source).unwrap();
    let graph = CallGraph::build(&program);
    let ctx = Context {
        program: &program,
        graph: &graph,
        narrowing: &TypeAssertNarrowing,
    };
    let session = Session::new();
    let func = program.func_ids().next().unwrap();
    let results: Vec<_> = program
        .function(func)
        .operations()
        .map(|(pos, op)| classify(ctx, &session, Site { func, pos }, op))
        .collect();
    assert_eq!(results, vec![true, false, false]);
}
