use std::process::ExitCode;

use clap::Parser;
use tir_driver::Opt;
use tracing::Level;
use utils::DiagnosticEmitter;

fn main() -> ExitCode {
    let opts = Opt::parse();

    let level = match opts.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_max_level(level)
        .init();

    let mut diag = DiagnosticEmitter::new(Box::new(std::io::stdout()), Box::new(std::io::stderr()));
    if let Err(err) = tir_driver::run(&opts, &mut diag) {
        diag.err_ln(&format!("error: {err}"));
        return ExitCode::from(err.exit_code());
    }

    ExitCode::from(0)
}
