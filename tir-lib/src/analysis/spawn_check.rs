use tracing::debug;

use crate::{
    ir::{CallKind, TypeOracle},
    lexer::Identifier,
};

use super::{
    Capability, CheckerConfig, Context, Diagnostic, Session, SpawnCheckMode, UNTRAPPED_TASK,
    classify::classify_function, traps::traps,
};

/// Reports the `go` sites of `unit` whose task may fault without trapping
/// it. Runs after the capability of the unit was propagated.
pub fn check_unit(
    ctx: Context,
    unit: Identifier,
    session: &Session,
    config: &CheckerConfig,
    capabilities: &mut [Capability],
) -> Vec<Diagnostic> {
    let program = ctx.program;
    let mut diagnostics = Vec::new();
    for func in program.functions_in(unit) {
        for (site, call) in program.call_sites(func) {
            if call.kind != CallKind::Go {
                continue;
            }
            let line = call.token.line_num;
            let Some(callee) = ctx.graph.resolve_callee(site) else {
                debug!(line = line.0, "unresolved spawn skipped");
                continue;
            };
            if !program.function(callee).has_body() {
                debug!(
                    line = line.0,
                    callee = program.name(callee),
                    "spawn of a function without body skipped"
                );
                continue;
            }

            let capable = match program.symbol_of(callee) {
                // A missing fact leaves the callee unknown, it still has to trap.
                Some(symbol) => session.capable(&symbol).unwrap_or(true),
                None => {
                    let capable = classify_function(ctx, session, callee);
                    capabilities[callee.0] = if capable {
                        Capability::Capable
                    } else {
                        Capability::NotCapable
                    };
                    capable
                }
            };
            if config.mode == SpawnCheckMode::FactGated && !capable {
                debug!(
                    line = line.0,
                    callee = program.name(callee),
                    "spawn of a safe function"
                );
                continue;
            }

            if traps(ctx, callee) {
                debug!(
                    line = line.0,
                    callee = program.name(callee),
                    "spawned task traps faults"
                );
                continue;
            }
            diagnostics.push(Diagnostic {
                location: line,
                message: UNTRAPPED_TASK,
            });
        }
    }
    diagnostics
}
