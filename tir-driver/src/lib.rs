use clap::{ArgAction, Parser as CommandLineParser, ValueEnum};
use thiserror::Error;
use tir_lib::{
    analysis::{
        CheckerConfig, Context, Session, SpawnCheckMode, analyze_with, callgraph::CallGraph,
    },
    ir::{TypeAssertNarrowing, print_dot},
    lexer::Lexer,
    parser::Parser,
};
use tracing::info;
use utils::DiagnosticEmitter;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, ValueEnum)]
pub enum CLIMode {
    /// Report spawns of fault-capable functions that do not trap.
    #[default]
    FactGated,
    /// Report spawns of any function with a body that does not trap.
    AnyBody,
}

impl From<CLIMode> for SpawnCheckMode {
    fn from(value: CLIMode) -> Self {
        match value {
            CLIMode::FactGated => SpawnCheckMode::FactGated,
            CLIMode::AnyBody => SpawnCheckMode::AnyBody,
        }
    }
}

#[derive(Debug, CommandLineParser, Default)]
#[command(
    name = "tir",
    version,
    about = "Find spawned tasks that do not trap faults."
)]
pub struct Opt {
    /// Which spawned tasks are required to trap faults.
    #[arg(long, value_enum, default_value_t = CLIMode::FactGated)]
    pub mode: CLIMode,

    /// Dump the control flow graph representation of the program in graphviz format.
    #[arg(long)]
    pub dump_cfg: bool,

    /// Dump the resolved call graph of the program in graphviz format.
    #[arg(long)]
    pub dump_callgraph: bool,

    /// Print the fault capability of every analyzed function.
    #[arg(long)]
    pub print_facts: bool,

    /// Log more details to the standard error, can be repeated.
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Files containing the programs, analyzed in order within one session.
    #[arg(required = true)]
    pub filenames: Vec<String>,
}

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("failed to read '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("'{path}' was rejected")]
    Rejected { path: String },
}

impl DriverError {
    pub fn exit_code(&self) -> u8 {
        match self {
            DriverError::Read { .. } => 2,
            DriverError::Rejected { .. } => 1,
        }
    }
}

/// Analyzes one program, reporting its findings as warnings. Facts exported
/// by earlier programs of the session are visible to this one.
pub fn process_source(
    src: &str,
    diag: &mut DiagnosticEmitter,
    opts: &Opt,
    session: &mut Session,
) -> Option<()> {
    let lexer = Lexer::new(src, diag);
    let tokens = lexer.lex_all();
    if tokens.tokens.is_empty() {
        return None;
    }
    let parser = Parser::new(tokens, diag);
    let program = parser.parse()?;

    if opts.dump_cfg {
        diag.out_ln(&print_dot(&program));
    }

    let graph = CallGraph::build(&program);
    if opts.dump_callgraph {
        diag.out_ln(&graph.print_dot(&program));
    }

    let ctx = Context {
        program: &program,
        graph: &graph,
        narrowing: &TypeAssertNarrowing,
    };
    let config = CheckerConfig {
        mode: opts.mode.into(),
    };
    let report = analyze_with(ctx, session, &config);
    for diagnostic in &report.diagnostics {
        diag.warning(diagnostic.location.0, diagnostic.message);
    }
    Some(())
}

pub fn print_facts(session: &Session, diag: &mut DiagnosticEmitter) {
    for (symbol, capable) in session.facts().iter() {
        let capability = if *capable { "capable" } else { "safe" };
        diag.out_ln(&format!("{symbol}: {capability}"));
    }
}

pub fn run(opts: &Opt, diag: &mut DiagnosticEmitter) -> Result<Session, DriverError> {
    let mut session = Session::new();
    for path in &opts.filenames {
        info!(path, "analyzing file");
        let contents = std::fs::read_to_string(path).map_err(|source| DriverError::Read {
            path: path.clone(),
            source,
        })?;
        process_source(&contents, diag, opts, &mut session)
            .ok_or_else(|| DriverError::Rejected { path: path.clone() })?;
    }
    info!(
        facts = session.facts().len(),
        warnings = diag.warning_count(),
        "session finished"
    );

    if opts.print_facts {
        print_facts(&session, diag);
    }
    Ok(session)
}

#[cfg(test)]
mod driver_tests;
