//! Finds spawned tasks that may fault without trapping the fault.
//!
//! The pipeline has three stages, the later ones visit the compilation units
//! callee units first:
//! 1. [`callgraph`] resolves every call, spawn and defer site once for the
//!    whole program.
//! 2. [`propagate`] classifies the named functions of each unit with
//!    [`classify`], spreads capability to same-unit callers and exports a
//!    fact for every named function with a body.
//! 3. [`spawn_check`] inspects every `go` site, consulting the exported
//!    facts and [`traps`].
use std::collections::HashMap;

use analysis::facts::FactStore;
use fixedbitset::FixedBitSet;
use tracing::debug;

use crate::{
    ir::{
        FuncId, FunctionKind, NarrowingOracle, Program, Symbol, TypeAssertNarrowing, TypeOracle,
    },
    lexer::{Identifier, Location},
};

pub mod callgraph;
pub mod classify;
pub mod propagate;
pub mod spawn_check;
pub mod traps;

use callgraph::CallGraph;

pub const UNTRAPPED_TASK: &str = "this concurrent unit does not trap a fault.";

/// Facts shared by every program analyzed in one session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Session {
    facts: FactStore<Symbol, bool>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the function defined as `symbol` was found fault-capable, if
    /// a fact was exported for it.
    pub fn capable(&self, symbol: &Symbol) -> Option<bool> {
        self.facts.import(symbol).copied()
    }

    pub fn export(&mut self, symbol: Symbol, capable: bool) -> bool {
        self.facts.export(symbol, capable)
    }

    pub fn facts(&self) -> &FactStore<Symbol, bool> {
        &self.facts
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SpawnCheckMode {
    /// Skip spawns of callees proven not to be fault-capable.
    #[default]
    FactGated,
    /// Require every spawned callee with a body to trap.
    AnyBody,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CheckerConfig {
    pub mode: SpawnCheckMode,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capability {
    Capable,
    NotCapable,
    /// Not decided by the analysis, e.g. external functions.
    Pending,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub location: Location,
    pub message: &'static str,
}

/// The inputs shared by every stage of the pipeline.
#[derive(Clone, Copy)]
pub struct Context<'a> {
    pub program: &'a Program,
    pub graph: &'a CallGraph,
    pub narrowing: &'a dyn NarrowingOracle,
}

#[derive(Clone, Debug)]
pub struct Report {
    pub diagnostics: Vec<Diagnostic>,
    /// Indexed by function id.
    pub capabilities: Vec<Capability>,
}

pub fn analyze(program: &Program, session: &mut Session, config: &CheckerConfig) -> Report {
    let graph = CallGraph::build(program);
    let ctx = Context {
        program,
        graph: &graph,
        narrowing: &TypeAssertNarrowing,
    };
    analyze_with(ctx, session, config)
}

pub fn analyze_with(ctx: Context, session: &mut Session, config: &CheckerConfig) -> Report {
    let mut capabilities = vec![Capability::Pending; ctx.program.functions.len()];
    let order = unit_order(ctx.program, ctx.graph);
    for &unit in &order {
        debug!(
            unit = ctx.program.identifiers.get_name(unit),
            "propagating fault capability"
        );
        propagate::propagate_unit(ctx, unit, session, &mut capabilities);
    }

    let mut diagnostics = Vec::new();
    for &unit in &order {
        diagnostics.extend(spawn_check::check_unit(
            ctx,
            unit,
            session,
            config,
            &mut capabilities,
        ));
    }
    debug!(found = diagnostics.len(), "analysis finished");
    Report {
        diagnostics,
        capabilities,
    }
}

/// Orders the compilation units so that the units a unit calls into come
/// before it. Mutually dependent units are ordered by a depth-first walk
/// starting from the first declared unit.
pub fn unit_order(program: &Program, graph: &CallGraph) -> Vec<Identifier> {
    let index: HashMap<Identifier, usize> = program
        .units
        .iter()
        .enumerate()
        .map(|(idx, unit)| (*unit, idx))
        .collect();

    let mut deps = vec![Vec::new(); program.units.len()];
    for func in program.func_ids() {
        let from = index[&program.function(func).get_unit()];
        for (_, callee) in graph.edges_from(func) {
            let to = index[&program.function(callee).get_unit()];
            if from != to && !deps[from].contains(&to) {
                deps[from].push(to);
            }
        }
    }

    // Iterative post-order, the stack holds a unit and its next dependency.
    let mut visited = FixedBitSet::with_capacity(program.units.len());
    let mut order = Vec::with_capacity(program.units.len());
    for root in 0..program.units.len() {
        if visited.put(root) {
            continue;
        }
        let mut stack = vec![(root, 0)];
        while let Some((unit, next)) = stack.pop() {
            if let Some(&dep) = deps[unit].get(next) {
                stack.push((unit, next + 1));
                if !visited.put(dep) {
                    stack.push((dep, 0));
                }
            } else {
                order.push(program.units[unit]);
            }
        }
    }
    order
}

/// Symbols of named functions that have a body, the functions facts are
/// exported for.
pub(crate) fn exported_symbol(program: &Program, func: FuncId) -> Option<Symbol> {
    let function = program.function(func);
    if function.kind() != FunctionKind::Named || !function.has_body() {
        return None;
    }
    program.symbol_of(func)
}



#[cfg(test)]
mod classify_tests;

#[cfg(test)]
mod propagate_tests;


#[cfg(test)]
mod spawn_check_tests;

#[cfg(test)]
mod test_utils {
    use super::*;
    use crate::parser_tests::parse_string;

    /// Runs the whole pipeline on a fresh session and renders the
    /// diagnostics the way the driver prints them.
    pub fn check(source: &str) -> String {
        check_in(source, &mut Session::new(), &CheckerConfig::default())
    }

    pub fn check_in(source: &str, session: &mut Session, config: &CheckerConfig) -> String {
        let program = parse_string(source).unwrap();
        let report = analyze(&program, session, config);
        render(&report)
    }

    pub fn render(report: &Report) -> String {
        report
            .diagnostics
            .iter()
            .map(|diag| format!("[line {}] Warning: {}\n", diag.location.0, diag.message))
            .collect()
    }

    pub fn facts(session: &Session) -> Vec<(String, bool)> {
        session
            .facts()
            .iter()
            .map(|(symbol, capable)| (symbol.0.clone(), *capable))
            .collect()
    }
}
