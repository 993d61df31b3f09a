use super::{Capability, CheckerConfig, Session, analyze, test_utils::facts};
use crate::{ir::Symbol, parser_tests::parse_string};

fn propagate(source: &str) -> (Vec<(String, bool)>, Vec<Capability>) {
    let program = parse_string(source).unwrap();
    let mut session = Session::new();
    let report = analyze(&program, &mut session, &CheckerConfig::default());
    (facts(&session), report.capabilities)
}

fn owned(facts: &[(&str, bool)]) -> Vec<(String, bool)> {
    facts
        .iter()
        .map(|(symbol, capable)| ((*symbol).to_owned(), *capable))
        .collect()
}

#[test]
fn callers_become_capable() {
    let source = r"unit a;

@leaf(x: int) {
  q: int = div x x;
  ret;
}

@middle(x: int) {
  call @leaf x;
  ret;
}

@top(x: int) {
  call @middle x;
  ret;
}

@unrelated {
  ret;
}
";
    let (facts, capabilities) = propagate(source);
    assert_eq!(
        facts,
        owned(&[
            ("a.leaf", true),
            ("a.middle", true),
            ("a.top", true),
            ("a.unrelated", false),
        ])
    );
    assert_eq!(
        capabilities,
        vec![
            Capability::Capable,
            Capability::Capable,
            Capability::Capable,
            Capability::NotCapable,
        ]
    );
}

#[test]
fn mutual_recursion() {
    let source = r"unit a;

@a(n: int) {
  zero: int = const 0;
  b: bool = gt n zero;
  br b .rec .done;

.rec:
  call @b n;
  ret;

.done:
  ret;
}

@b(n: int) {
  call @a n;
  q: int = div n n;
  ret;
}

@c(n: int) {
  call @d n;
  ret;
}

@d(n: int) {
  call @c n;
  ret;
}
";
    let (facts, _) = propagate(source);
    assert_eq!(
        facts,
        owned(&[("a.a", true), ("a.b", true), ("a.c", false), ("a.d", false)])
    );
}

#[test]
fn deferred_calls_propagate() {
    let source = r"unit a;

@cleanup {
  panic;
}

@user {
  defer @cleanup;
  ret;
}

@spawner {
  go @cleanup;
  ret;
}
";
    let (facts, _) = propagate(source);
    assert_eq!(
        facts,
        owned(&[("a.cleanup", true), ("a.spawner", false), ("a.user", true)])
    );
}

#[test]
fn no_facts_without_body() {
    let source = r"unit a;

extern @ext;

@empty {
}

anon @main$1 {
  panic;
}

@main {
  call @ext;
  f: fn = func @main$1;
  call f;
  ret;
}
";
    let (facts, capabilities) = propagate(source);
    // Anonymous callees have no fact to propagate from.
    assert_eq!(facts, owned(&[("a.main", false)]));
    assert_eq!(
        capabilities,
        vec![
            Capability::Pending,
            Capability::Pending,
            Capability::Pending,
            Capability::NotCapable,
        ]
    );
}

#[test]
fn first_fact_wins() {
    let source = r"unit a;

@f {
  panic;
}
";
    let program = parse_string(source).unwrap();
    let mut session = Session::new();
    session.export(Symbol("a.f".to_owned()), false);
    let report = analyze(&program, &mut session, &CheckerConfig::default());
    assert_eq!(report.capabilities, vec![Capability::Capable]);
    assert_eq!(facts(&session), owned(&[("a.f", false)]));
}
