use crate::*;

fn run_driver(sources: &[&str], opts: Opt) -> Option<String> {
    let mut diag = DiagnosticEmitter::log_to_buffer();
    let mut session = Session::new();
    for source in sources {
        process_source(source, &mut diag, &opts, &mut session)?;
    }
    if opts.print_facts {
        print_facts(&session, &mut diag);
    }
    Some(diag.out_buffer().unwrap() + &diag.err_buffer().unwrap())
}

const TASKS: &str = r"unit a;

@handler {
  recover;
  ret;
}

@p1 {
  defer @handler;
  panic;
}

@p2 {
  panic;
}

@p3 {
  ret;
}

@main {
  go @p1;
  go @p2;
  go @p3;
  ret;
}
";

#[test]
fn report_untrapped_tasks() {
    let output = run_driver(&[TASKS], Opt::default()).unwrap();
    assert_eq!(
        output,
        "[line 23] Warning: this concurrent unit does not trap a fault.\n"
    );
}

#[test]
fn any_body_mode() {
    let opts = Opt::parse_from(["tir", "--mode", "any-body", "source.tir"].iter());
    assert_eq!(opts.mode, CLIMode::AnyBody);
    let output = run_driver(&[TASKS], opts).unwrap();
    assert_eq!(
        output,
        "[line 23] Warning: this concurrent unit does not trap a fault.\n\
         [line 24] Warning: this concurrent unit does not trap a fault.\n"
    );
}

#[test]
fn command_line() {
    let opts = Opt::parse_from(["tir", "-vv", "--print-facts", "a.tir", "b.tir"].iter());
    assert_eq!(opts.verbose, 2);
    assert_eq!(opts.mode, CLIMode::FactGated);
    assert!(opts.print_facts);
    assert!(!opts.dump_cfg);
    assert_eq!(opts.filenames, vec!["a.tir", "b.tir"]);

    assert!(Opt::try_parse_from(["tir"].iter()).is_err());
    assert!(Opt::try_parse_from(["tir", "--mode", "sometimes", "a.tir"].iter()).is_err());
}

#[test]
fn facts_across_sources() {
    let lib = r"unit lib;

@fail {
  panic;
}
";
    let app = r"unit lib;

extern @fail;

unit app;

@task {
  call @fail;
  ret;
}

@main {
  go @task;
  ret;
}
";
    let opts = Opt {
        print_facts: true,
        ..Opt::default()
    };
    let output = run_driver(&[lib, app], opts).unwrap();
    assert_eq!(
        output,
        r"[line 13] Warning: this concurrent unit does not trap a fault.
app.main: safe
app.task: capable
lib.fail: capable
"
    );
}

#[test]
fn graph_dumps() {
    let source = r"unit a;

@task {
  panic;
}

@main {
  go @task;
  ret;
}
";
    let expected = r#"digraph "@task" {
  Node_0[label="panic;"]

}

digraph "@main" {
  Node_0[label="go @task;\nret;"]

}

digraph CallGraph {
  "@task"
  "@main"

  "@main" -> "@task" [label="go line 8"]
}

[line 8] Warning: this concurrent unit does not trap a fault.
"#;
    let opts = Opt {
        dump_cfg: true,
        dump_callgraph: true,
        ..Opt::default()
    };
    let output = run_driver(&[source], opts).unwrap();
    assert_eq!(output, expected);
}

#[test]
fn rejected_sources() {
    let output = run_driver(&["@main {}"], Opt::default());
    assert_eq!(output, None);

    let mut diag = DiagnosticEmitter::log_to_buffer();
    let opts = Opt {
        filenames: vec!["/nonexistent/input.tir".to_owned()],
        ..Opt::default()
    };
    let err = run(&opts, &mut diag).unwrap_err();
    assert!(matches!(err, DriverError::Read { .. }));
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn run_files() {
    let dir = std::env::temp_dir();
    let good = dir.join(format!("tir-driver-good-{}.tir", std::process::id()));
    let bad = dir.join(format!("tir-driver-bad-{}.tir", std::process::id()));
    std::fs::write(&good, TASKS).unwrap();
    std::fs::write(&bad, "unit a;\n@main {\n  go;\n}\n").unwrap();

    let mut diag = DiagnosticEmitter::log_to_buffer();
    let opts = Opt {
        filenames: vec![good.to_string_lossy().into_owned()],
        ..Opt::default()
    };
    let session = run(&opts, &mut diag).unwrap();
    assert_eq!(session.facts().len(), 5);
    assert_eq!(diag.warning_count(), 1);

    let mut diag = DiagnosticEmitter::log_to_buffer();
    let opts = Opt {
        filenames: vec![bad.to_string_lossy().into_owned()],
        ..Opt::default()
    };
    let err = run(&opts, &mut diag).unwrap_err();
    assert_eq!(err.exit_code(), 1);
    assert_eq!(
        diag.err_buffer().unwrap(),
        "[line 3] Error at ';': Identifier expected.\n"
    );

    std::fs::remove_file(good).unwrap();
    std::fs::remove_file(bad).unwrap();
}
