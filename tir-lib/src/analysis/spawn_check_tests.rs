use super::{CheckerConfig, Session, SpawnCheckMode, test_utils::*};

const ANY_BODY: CheckerConfig = CheckerConfig {
    mode: SpawnCheckMode::AnyBody,
};

fn check_any_body(source: &str) -> String {
    check_in(source, &mut Session::new(), &ANY_BODY)
}

#[test]
fn nothing_to_judge() {
    let source = r"unit a;

extern @ext;

@empty {
}

@main(f: fn) {
  go @ext;
  go @empty;
  go f;
  ret;
}
";
    assert_eq!(check(source), "");
    assert_eq!(check_any_body(source), "");
}

#[test]
fn safe_tasks_depend_on_mode() {
    let source = r"unit a;

@quiet(x: int) {
  y: int = add x x;
  print y;
  ret;
}

@main(x: int) {
  go @quiet x;
  ret;
}
";
    assert_eq!(check(source), "");
    assert_eq!(
        check_any_body(source),
        "[line 10] Warning: this concurrent unit does not trap a fault.\n"
    );
}

#[test]
fn anonymous_tasks() {
    let source = r"unit a;

@fail {
  panic;
}

anon @main$1 {
  call @fail;
  ret;
}

anon @main$2 {
  nop;
  ret;
}

@main {
  f: fn = func @main$1;
  go f;
  g: fn = func @main$2;
  go g;
  ret;
}
";
    assert_eq!(
        check(source),
        "[line 19] Warning: this concurrent unit does not trap a fault.\n"
    );
    assert_eq!(
        check_any_body(source),
        "[line 19] Warning: this concurrent unit does not trap a fault.\n\
         [line 21] Warning: this concurrent unit does not trap a fault.\n"
    );
}

#[test]
fn one_diagnostic_per_site() {
    let source = r"unit a;

@task(p: ptr) {
  x: int = field p next;
  y: int = field x next;
  ret;
}

@main(p: ptr) {
  go @task p;
  go @task p;
  call @task p;
  ret;
}
";
    assert_eq!(
        check(source),
        "[line 10] Warning: this concurrent unit does not trap a fault.\n\
         [line 11] Warning: this concurrent unit does not trap a fault.\n"
    );
}

#[test]
fn spawns_inside_tasks() {
    let source = r"unit a;

@handler {
  recover;
  ret;
}

@inner {
  panic;
}

@outer {
  defer @handler;
  go @inner;
  ret;
}

@main {
  go @outer;
  ret;
}
";
    // The trap of the spawner does not cover the tasks it spawns.
    assert_eq!(
        check(source),
        "[line 14] Warning: this concurrent unit does not trap a fault.\n"
    );
}

#[test]
fn unresolved_handler_does_not_trap() {
    let source = r"unit a;

anon @lit$1 {
  recover;
  ret;
}

@task(h: fn) {
  defer h;
  panic;
}

@main(h: fn) {
  f: fn = func @lit$1;
  go @task h;
  ret;
}
";
    assert_eq!(
        check(source),
        "[line 15] Warning: this concurrent unit does not trap a fault.\n"
    );
}

#[test]
fn unresolved_spawns_are_skipped() {
    let source = r"unit a;

@fails {
  panic;
}

@main(g: fn) {
  f: fn = func @fails;
  go g;
  ret;
}
";
    assert_eq!(check(source), "");
    assert_eq!(check_any_body(source), "");
}
