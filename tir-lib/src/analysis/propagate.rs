use std::collections::HashMap;

use analysis::solvers::propagate_backward;
use tracing::{debug, trace};

use crate::{
    ir::{CallKind, FuncId},
    lexer::Identifier,
};

use super::{Capability, Context, Session, classify::classify_function, exported_symbol};

/// Decides the capability of every named function with a body in `unit`
/// and exports a fact for each of them.
///
/// Functions that fault directly seed the propagation, then every caller
/// within the unit of a capable function becomes capable. Calls into other
/// units were already judged through the facts of those units.
pub fn propagate_unit(
    ctx: Context,
    unit: Identifier,
    session: &mut Session,
    capabilities: &mut [Capability],
) {
    let program = ctx.program;
    let funcs: Vec<(FuncId, _)> = program
        .functions_in(unit)
        .filter_map(|func| exported_symbol(program, func).map(|symbol| (func, symbol)))
        .collect();
    let local: HashMap<FuncId, usize> = funcs
        .iter()
        .enumerate()
        .map(|(idx, (func, _))| (*func, idx))
        .collect();

    let mut seeds = Vec::new();
    let mut callers = vec![Vec::new(); funcs.len()];
    for (idx, (func, symbol)) in funcs.iter().enumerate() {
        if classify_function(ctx, session, *func) {
            trace!(%symbol, "directly fault-capable");
            session.export(symbol.clone(), true);
            seeds.push(idx);
        }
        for (site, call) in program.call_sites(*func) {
            if call.kind == CallKind::Go {
                continue;
            }
            let Some(&callee) = ctx
                .graph
                .resolve_callee(site)
                .and_then(|callee| local.get(&callee))
            else {
                continue;
            };
            if !callers[callee].contains(&idx) {
                callers[callee].push(idx);
            }
        }
    }

    let capable = propagate_backward(
        funcs.len(),
        seeds,
        |idx| callers[idx].clone(),
        |idx, cause| {
            let (func, symbol) = &funcs[idx];
            capabilities[func.0] = Capability::Capable;
            if let Some(cause) = cause {
                trace!(%symbol, callee = %funcs[cause].1, "fault-capable through a call");
                session.export(symbol.clone(), true);
            }
        },
    );

    for (idx, (func, symbol)) in funcs.iter().enumerate() {
        if !capable.contains(idx) {
            capabilities[func.0] = Capability::NotCapable;
            session.export(symbol.clone(), false);
        }
    }
    debug!(
        unit = program.identifiers.get_name(unit),
        functions = funcs.len(),
        capable = capable.count_ones(..),
        "capability propagated"
    );
}
