use std::collections::{BTreeMap, HashMap};

use analysis::{
    cfg::{ControlFlowGraph, OpPos},
    solvers::SubsetFlow,
};
use fixedbitset::FixedBitSet;
use itertools::Itertools;
use tracing::{debug, trace};

use crate::{
    ir::{Call, Callee, FuncId, Operation, Program, Site, TypeAssert, UnaryOp},
    lexer::{Identifier, TokenValue},
};

/// Resolved callees of every call-like site in a program.
///
/// Each site maps to its possible callees in declaration order. A site
/// without callees is unresolved; sites through interfaces or function
/// values may have several.
#[derive(Clone, Debug, Default)]
pub struct CallGraph {
    sites: BTreeMap<Site, Vec<FuncId>>,
}

impl CallGraph {
    pub fn build(program: &Program) -> Self {
        let coarse = Coarse::new(program);
        let refined = Refined::new(program, &coarse);

        let mut sites = BTreeMap::new();
        for func in program.func_ids() {
            for (site, call) in program.call_sites(func) {
                let candidates = coarse.resolve(program, call);
                // A refined site with no values flowing in stays unresolved.
                let callees = refined
                    .resolve(program, site, call, &candidates)
                    .unwrap_or(candidates);
                trace!(
                    caller = program.name(func),
                    callees = ?callees.iter().map(|&callee| program.name(callee)).collect_vec(),
                    "resolved call site"
                );
                sites.insert(site, callees);
            }
        }
        let graph = CallGraph { sites };
        debug!(
            sites = graph.sites.len(),
            edges = graph.edges().count(),
            "call graph built"
        );
        graph
    }

    /// The single best-effort callee of a site.
    pub fn resolve_callee(&self, site: Site) -> Option<FuncId> {
        self.callees(site).first().copied()
    }

    pub fn callees(&self, site: Site) -> &[FuncId] {
        self.sites.get(&site).map_or(&[], Vec::as_slice)
    }

    /// Every `(site, callee)` pair ordered by site.
    pub fn edges(&self) -> impl Iterator<Item = (Site, FuncId)> + '_ {
        self.sites
            .iter()
            .flat_map(|(site, callees)| callees.iter().map(move |callee| (*site, *callee)))
    }

    /// The edges leaving the sites of one function.
    pub fn edges_from(&self, func: FuncId) -> impl Iterator<Item = (Site, FuncId)> + '_ {
        let first = OpPos {
            block_id: 0,
            op_id: 0,
        };
        let range = Site { func, pos: first }..Site {
            func: FuncId(func.0 + 1),
            pos: first,
        };
        self.sites
            .range(range)
            .flat_map(|(site, callees)| callees.iter().map(move |callee| (*site, *callee)))
    }

    /// Graphviz rendering, one edge per resolved callee of a site labeled
    /// with the kind and line of the site.
    pub fn print_dot(&self, program: &Program) -> String {
        let name = |func: FuncId| {
            program
                .identifiers
                .get_name(program.function(func).name_id())
        };
        let mut output = "digraph CallGraph {\n".to_owned();
        for func in program.func_ids() {
            output.push_str(&format!("  \"{}\"\n", name(func)));
        }
        output.push('\n');
        for (site, callee) in self.edges() {
            let Some(call) = program.get_op(site).as_call() else {
                continue;
            };
            output.push_str(&format!(
                "  \"{}\" -> \"{}\" [label=\"{} line {}\"]\n",
                name(site.func),
                name(callee),
                call.kind,
                call.token.line_num.0
            ));
        }
        output.push_str("}\n");
        output
    }
}

/// Class hierarchy style resolution: any address-taken function may be
/// called through a function value, and any method with the right name may
/// be called through an interface.
struct Coarse {
    address_taken: Vec<FuncId>,
    methods: HashMap<String, Vec<FuncId>>,
    globals: HashMap<Identifier, FuncId>,
    arity: Vec<usize>,
}

impl Coarse {
    fn new(program: &Program) -> Self {
        let mut taken = FixedBitSet::with_capacity(program.functions.len());
        for func in &program.functions {
            for (_, op) in func.operations() {
                if let Operation::FuncRef(_, _, name) = op {
                    if let Some(id) = program.lookup(*name) {
                        taken.insert(id.0);
                    }
                }
            }
        }

        let mut methods: HashMap<String, Vec<FuncId>> = HashMap::new();
        for func in program.func_ids() {
            if let Some((_, method)) = program.method_of(func) {
                methods.entry(method.to_owned()).or_default().push(func);
            }
        }

        Coarse {
            address_taken: taken.ones().map(FuncId).collect(),
            methods,
            globals: program.globals.clone(),
            arity: program
                .functions
                .iter()
                .map(|func| func.get_formals().len())
                .collect(),
        }
    }

    fn resolve(&self, program: &Program, call: &Call) -> Vec<FuncId> {
        match &call.callee {
            Callee::Static(name) => self.globals.get(name).copied().into_iter().collect(),
            Callee::Dynamic(_) => self
                .address_taken
                .iter()
                .copied()
                .filter(|callee| self.arity[callee.0] == call.args.len())
                .collect(),
            Callee::Invoke { method, .. } => {
                let name = program.identifiers.get_name(*method);
                self.methods.get(name).cloned().unwrap_or_default()
            }
        }
    }
}

/// Type propagation style refinement. Function values and concrete types
/// flow from `func` and `make` operations through copies, assertions,
/// arguments and returns; a dynamic site calls only the functions reaching
/// its callee value and an interface site only the methods of the types
/// reaching its receiver.
struct Refined {
    nodes: HashMap<(FuncId, Identifier), usize>,
    /// Concrete type names, values `functions.len()..` of the universe.
    types: Vec<Identifier>,
    flow: SubsetFlow,
}

impl Refined {
    fn new(program: &Program, coarse: &Coarse) -> Self {
        let func_num = program.functions.len();

        // One node per local of each function, plus one per returned value.
        let mut nodes = HashMap::new();
        for id in program.func_ids() {
            let func = program.function(id);
            let locals = func
                .get_formals()
                .iter()
                .copied()
                .chain(func.operations().filter_map(|(_, op)| op.get_result()));
            for var in locals {
                let next = func_num + nodes.len();
                nodes.entry((id, var.id)).or_insert(next);
            }
        }

        let types: Vec<Identifier> = program
            .functions
            .iter()
            .flat_map(|func| func.operations())
            .filter_map(|(_, op)| match op {
                Operation::MakeInterface(make) => Some(make.concrete),
                _ => None,
            })
            .unique()
            .collect();

        let node_num = func_num + nodes.len();
        let mut flow = SubsetFlow::new(node_num, func_num + types.len());
        let node = |func: FuncId, var: Identifier| nodes.get(&(func, var)).copied();
        for id in program.func_ids() {
            let ret_node = id.0;
            for (_, op) in program.function(id).operations() {
                match op {
                    Operation::FuncRef(_, result, name) => {
                        if let (Some(to), Some(value)) = (node(id, result.id), program.lookup(*name))
                        {
                            flow.seed(to, value.0);
                        }
                    }
                    Operation::MakeInterface(make) => {
                        if let (Some(to), Some(ty)) = (
                            node(id, make.result.id),
                            types.iter().position(|ty| *ty == make.concrete),
                        ) {
                            flow.seed(to, func_num + ty);
                        }
                    }
                    Operation::UnOp(UnaryOp {
                        token,
                        result,
                        operand,
                    }) if token.value == TokenValue::Identity => {
                        if let (Some(from), Some(to)) = (node(id, operand.id), node(id, result.id)) {
                            flow.add_edge(from, to);
                        }
                    }
                    Operation::TypeAssert(TypeAssert {
                        result, operand, ..
                    }) => {
                        if let (Some(from), Some(to)) = (node(id, operand.id), node(id, result.id)) {
                            flow.add_edge(from, to);
                        }
                    }
                    Operation::Ret(_, Some(var)) => {
                        if let Some(from) = node(id, var.id) {
                            flow.add_edge(from, ret_node);
                        }
                    }
                    Operation::Call(call) => {
                        for callee in coarse.resolve(program, call) {
                            let formals = program.function(callee).get_formals();
                            for (arg, formal) in call.args.iter().zip(formals) {
                                if let (Some(from), Some(to)) =
                                    (node(id, arg.id), node(callee, formal.id))
                                {
                                    flow.add_edge(from, to);
                                }
                            }
                            if let Some(to) = call.result.and_then(|res| node(id, res.id)) {
                                flow.add_edge(callee.0, to);
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        flow.solve();

        Refined { nodes, types, flow }
    }

    /// `None` when the site is not refined, static calls need no refinement.
    fn resolve(
        &self,
        program: &Program,
        site: Site,
        call: &Call,
        candidates: &[FuncId],
    ) -> Option<Vec<FuncId>> {
        let func_num = program.functions.len();
        match &call.callee {
            Callee::Static(_) => None,
            Callee::Dynamic(var) => {
                let node = *self.nodes.get(&(site.func, var.id))?;
                Some(
                    self.flow
                        .values(node)
                        .filter(|&value| value < func_num)
                        .map(FuncId)
                        .filter(|callee| candidates.contains(callee))
                        .collect(),
                )
            }
            Callee::Invoke { receiver, .. } => {
                let node = *self.nodes.get(&(site.func, receiver.id))?;
                let concrete: Vec<&str> = self
                    .flow
                    .values(node)
                    .filter(|&value| value >= func_num)
                    .map(|value| program.identifiers.get_name(self.types[value - func_num]))
                    .collect();
                Some(
                    candidates
                        .iter()
                        .copied()
                        .filter(|&callee| {
                            program
                                .method_of(callee)
                                .is_some_and(|(ty, _)| concrete.contains(&ty))
                        })
                        .collect(),
                )
            }
        }
    }
}
