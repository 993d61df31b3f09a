use analysis::cfg::{CfgBlock, ControlFlowGraph, OpPos};

use crate::ir::{CallKind, FuncId, Operation, Site};

use super::Context;

/// The first `defer` of the entry block. Deferred calls run in reverse
/// order, so only this one is guaranteed to run after every fault of the
/// function body.
fn first_defer(ctx: Context, func: FuncId) -> Option<Site> {
    let entry = ctx.program.function(func).entry()?;
    entry
        .operations()
        .iter()
        .position(|op| matches!(op, Operation::Call(call) if call.kind == CallKind::Defer))
        .map(|op_id| Site {
            func,
            pos: OpPos {
                block_id: 0,
                op_id,
            },
        })
}

/// The entry block intercepts faults itself.
pub fn has_intercept(ctx: Context, func: FuncId) -> bool {
    ctx.program
        .function(func)
        .entry()
        .is_some_and(|entry| {
            entry
                .operations()
                .iter()
                .any(|op| matches!(op, Operation::Recover(..)))
        })
}

/// The first deferred call of the function intercepts faults.
pub fn installs_deferred_intercept(ctx: Context, func: FuncId) -> bool {
    first_defer(ctx, func)
        .and_then(|site| ctx.graph.resolve_callee(site))
        .is_some_and(|handler| has_intercept(ctx, handler))
}

/// Whether a spawned function traps the faults raised in its body. The
/// function must defer a call that either intercepts directly or defers an
/// intercepting helper itself; deeper delegation is not followed.
pub fn traps(ctx: Context, func: FuncId) -> bool {
    let Some(handler) = first_defer(ctx, func).and_then(|site| ctx.graph.resolve_callee(site))
    else {
        return false;
    };
    has_intercept(ctx, handler) || installs_deferred_intercept(ctx, handler)
}
