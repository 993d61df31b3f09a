use analysis::cfg::ControlFlowGraph;

use crate::{
    ir::{
        BinaryOp, CallKind, FieldAccess, FuncId, IndexAccess, Operation, Site, Type, TypeOracle,
    },
    lexer::TokenValue,
};

use super::{Context, Session};

/// Whether evaluating a single operation can raise a fault by itself.
///
/// Calls count only when they run on the caller's stack (`call` and
/// `defer`) and the callee was already found fault-capable. Missing type
/// information never makes an operation fault-capable.
pub fn classify(ctx: Context, session: &Session, site: Site, op: &Operation) -> bool {
    let types = ctx.program;
    if ctx.narrowing.is_forced_narrowing(op) {
        return true;
    }
    match op {
        Operation::Panic(..) => true,
        Operation::Call(call) => {
            if call.kind == CallKind::Go {
                return false;
            }
            ctx.graph
                .resolve_callee(site)
                .and_then(|callee| types.symbol_of(callee))
                .and_then(|symbol| session.capable(&symbol))
                .unwrap_or(false)
        }
        Operation::Field(FieldAccess { base, .. }) => {
            types.type_of(base).is_some_and(|ty| ty.is_nilable())
        }
        Operation::Index(IndexAccess { base, .. }) => {
            types.type_of(base).is_some_and(|ty| ty.is_indexable())
        }
        Operation::BinOp(BinaryOp { token, rhs, .. }) => {
            matches!(token.value, TokenValue::Div | TokenValue::Mod)
                && types.type_of(rhs) == Some(Type::Int)
        }
        _ => false,
    }
}

/// Whether any operation of the function body is fault-capable.
pub fn classify_function(ctx: Context, session: &Session, func: FuncId) -> bool {
    ctx.program
        .function(func)
        .operations()
        .any(|(pos, op)| classify(ctx, session, Site { func, pos }, op))
}
