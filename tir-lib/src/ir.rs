use core::fmt::Display;
use std::collections::HashMap;

use analysis::cfg::*;
use itertools::Itertools;

use crate::lexer::{Identifier, IdentifierTable, Location, Token, TokenValue};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Float,
    Bool,
    Str,
    Ptr,
    Iface,
    Slice,
    Map,
    Fn,
    Unknown,
}

impl Type {
    /// Values of this type may be absent at run time.
    pub fn is_nilable(self) -> bool {
        matches!(self, Type::Ptr | Type::Iface)
    }

    /// Indexing values of this type may fail on a missing index or key.
    pub fn is_indexable(self) -> bool {
        matches!(self, Type::Slice | Type::Map | Type::Str)
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Type::Int => "int",
            Type::Float => "float",
            Type::Bool => "bool",
            Type::Str => "string",
            Type::Ptr => "ptr",
            Type::Iface => "iface",
            Type::Slice => "slice",
            Type::Map => "map",
            Type::Fn => "fn",
            Type::Unknown => "unknown",
        };
        write!(f, "{name}")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Variable {
    pub id: Identifier,
    pub ty: Type,
}

/// Index of a function within a [`Program`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncId(pub usize);

/// Identity of a named function that stays stable across programs analyzed
/// in the same session: the name of its compilation unit and its own name,
/// e.g. `a.main` or `a.T.close`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(pub String);

impl Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Call site position: the enclosing function and the operation within it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Site {
    pub func: FuncId,
    pub pos: OpPos,
}

#[derive(Clone, Debug)]
pub struct BinaryOp {
    pub token: Token,
    pub result: Variable,
    pub lhs: Variable,
    pub rhs: Variable,
}

#[derive(Clone, Debug)]
pub struct UnaryOp {
    pub token: Token,
    pub result: Variable,
    pub operand: Variable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallKind {
    Call,
    Go,
    Defer,
}

impl Display for CallKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallKind::Call => write!(f, "call"),
            CallKind::Go => write!(f, "go"),
            CallKind::Defer => write!(f, "defer"),
        }
    }
}

#[derive(Clone, Debug)]
pub enum Callee {
    /// A function named at the call site.
    Static(Identifier),
    /// A call through a function value.
    Dynamic(Variable),
    /// Method dispatch through an interface value.
    Invoke {
        receiver: Variable,
        method: Identifier,
    },
}

#[derive(Clone, Debug)]
pub struct Call {
    pub token: Token,
    pub kind: CallKind,
    pub callee: Callee,
    pub result: Option<Variable>,
    pub args: Vec<Variable>,
}

#[derive(Clone, Debug)]
pub struct Branch {
    pub token: Token,
    pub cond: Variable,
    pub then: Identifier,
    pub els: Identifier,
}

#[derive(Clone, Debug)]
pub struct FieldAccess {
    pub token: Token,
    pub result: Variable,
    pub base: Variable,
    pub field: Identifier,
}

#[derive(Clone, Debug)]
pub struct IndexAccess {
    pub token: Token,
    pub result: Variable,
    pub base: Variable,
    pub index: Variable,
}

#[derive(Clone, Debug)]
pub struct TypeAssert {
    pub token: Token,
    pub result: Variable,
    pub operand: Variable,
    pub comma_ok: bool,
}

#[derive(Clone, Debug)]
pub struct MakeInterface {
    pub token: Token,
    pub result: Variable,
    pub concrete: Identifier,
    pub value: Variable,
}

#[derive(Clone, Debug)]
pub enum Operation {
    BinOp(BinaryOp),
    UnOp(UnaryOp),
    Const(Token, Variable),
    Field(FieldAccess),
    Index(IndexAccess),
    TypeAssert(TypeAssert),
    FuncRef(Token, Variable, Identifier),
    MakeInterface(MakeInterface),
    Recover(Token, Option<Variable>),
    Call(Call),
    Print(Token, Variable),
    Nop(Token),
    Jump(Token, Identifier),
    Br(Branch),
    Ret(Token, Option<Variable>),
    Panic(Token, Option<Variable>),
}

impl Operation {
    pub fn get_token(&self) -> Token {
        match self {
            Operation::BinOp(BinaryOp { token, .. })
            | Operation::UnOp(UnaryOp { token, .. })
            | Operation::Const(token, _)
            | Operation::Field(FieldAccess { token, .. })
            | Operation::Index(IndexAccess { token, .. })
            | Operation::TypeAssert(TypeAssert { token, .. })
            | Operation::FuncRef(token, _, _)
            | Operation::MakeInterface(MakeInterface { token, .. })
            | Operation::Recover(token, _)
            | Operation::Call(Call { token, .. })
            | Operation::Print(token, _)
            | Operation::Nop(token)
            | Operation::Jump(token, _)
            | Operation::Br(Branch { token, .. })
            | Operation::Ret(token, _)
            | Operation::Panic(token, _) => *token,
        }
    }

    pub fn location(&self) -> Location {
        self.get_token().line_num
    }

    pub fn get_result(&self) -> Option<Variable> {
        match self {
            Operation::BinOp(BinaryOp { result, .. })
            | Operation::UnOp(UnaryOp { result, .. })
            | Operation::Const(_, result)
            | Operation::Field(FieldAccess { result, .. })
            | Operation::Index(IndexAccess { result, .. })
            | Operation::TypeAssert(TypeAssert { result, .. })
            | Operation::FuncRef(_, result, _)
            | Operation::MakeInterface(MakeInterface { result, .. }) => Some(*result),
            Operation::Recover(_, result) => *result,
            Operation::Call(Call { result, .. }) => *result,
            _ => None,
        }
    }

    pub fn as_call(&self) -> Option<&Call> {
        match self {
            Operation::Call(call) => Some(call),
            _ => None,
        }
    }

    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Operation::Jump(_, _) | Operation::Br(_) | Operation::Ret(_, _) | Operation::Panic(_, _)
        )
    }
}

/// The last operation is a terminator:
/// * Branch
/// * Jump
/// * Ret
/// * Panic
#[derive(Clone, Debug, Default)]
pub struct BasicBlock {
    label: Option<Identifier>,
    operations: Vec<Operation>,
    succs: Vec<usize>,
    preds: Vec<usize>,
}

impl BasicBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label(&self) -> Option<Identifier> {
        self.label
    }
}

impl CfgBlock for BasicBlock {
    type Operation = Operation;

    fn operations(&self) -> &[Self::Operation] {
        &self.operations
    }

    fn predecessors(&self) -> &[usize] {
        &self.preds
    }

    fn successors(&self) -> &[usize] {
        &self.succs
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FunctionKind {
    /// Declared with a name, facts are exported for it.
    Named,
    /// A function literal. It can be referenced within the program but it
    /// has no symbol.
    Anonymous,
    /// Declared without a body.
    External,
}

#[derive(Clone, Debug)]
pub struct Function {
    basic_blocks: Vec<BasicBlock>,
    function: Token,
    unit: Identifier,
    kind: FunctionKind,
    ret_ty: Option<Type>,
    formals: Vec<Variable>,
}

impl ControlFlowGraph for Function {
    type Block = BasicBlock;

    fn blocks(&self) -> &[Self::Block] {
        &self.basic_blocks
    }
}

impl MutableCfg for Function {
    fn new_block(&mut self) -> usize {
        self.basic_blocks.push(BasicBlock::new());
        self.basic_blocks.len() - 1
    }

    fn add_edge(&mut self, from: usize, to: usize) -> &mut Self {
        self.basic_blocks[from].succs.push(to);
        self.basic_blocks[to].preds.push(from);
        self
    }
}

impl Function {
    pub fn new(
        function: Token,
        unit: Identifier,
        kind: FunctionKind,
        ret_ty: Option<Type>,
        formals: Vec<Variable>,
    ) -> Self {
        Self {
            basic_blocks: Vec::default(),
            function,
            unit,
            kind,
            ret_ty,
            formals,
        }
    }

    pub fn extend_block(&mut self, block: usize, ops: impl IntoIterator<Item = Operation>) {
        self.basic_blocks[block].operations.extend(ops);
    }

    pub fn set_label(&mut self, block: usize, label: Identifier) {
        self.basic_blocks[block].label = Some(label);
    }

    pub fn get_function(&self) -> Token {
        self.function
    }

    pub fn name_id(&self) -> Identifier {
        match self.function.value {
            TokenValue::Global(id) => id,
            _ => panic!("Function names are global identifiers."),
        }
    }

    pub fn get_unit(&self) -> Identifier {
        self.unit
    }

    pub fn kind(&self) -> FunctionKind {
        self.kind
    }

    pub fn get_return_type(&self) -> Option<Type> {
        self.ret_ty
    }

    pub fn get_formals(&self) -> &[Variable] {
        &self.formals
    }

    /// Functions without a body cannot be inspected; external declarations
    /// and empty literals both end up here.
    pub fn has_body(&self) -> bool {
        self.basic_blocks
            .iter()
            .any(|block| !block.operations.is_empty())
    }
}

/// The type-resolution oracle consumed by the analysis.
pub trait TypeOracle {
    /// Static type of a variable, `None` when it is not known.
    fn type_of(&self, var: &Variable) -> Option<Type>;

    /// The symbol a function is defined as, `None` for function literals.
    fn symbol_of(&self, func: FuncId) -> Option<Symbol>;
}

/// Decides whether an operation converts a value to a narrower type without
/// a fallback, and may fault doing so.
pub trait NarrowingOracle {
    fn is_forced_narrowing(&self, op: &Operation) -> bool;
}

/// Type assertions without the `commaok` form fault on a mismatch.
#[derive(Clone, Copy, Debug, Default)]
pub struct TypeAssertNarrowing;

impl NarrowingOracle for TypeAssertNarrowing {
    fn is_forced_narrowing(&self, op: &Operation) -> bool {
        matches!(op, Operation::TypeAssert(TypeAssert { comma_ok: false, .. }))
    }
}

#[derive(Clone, Debug, Default)]
pub struct Program {
    pub functions: Vec<Function>,
    /// Compilation units in declaration order.
    pub units: Vec<Identifier>,
    pub identifiers: IdentifierTable,
    pub globals: HashMap<Identifier, FuncId>,
}

impl Program {
    pub fn function(&self, id: FuncId) -> &Function {
        &self.functions[id.0]
    }

    pub fn lookup(&self, name: Identifier) -> Option<FuncId> {
        self.globals.get(&name).copied()
    }

    pub fn func_ids(&self) -> impl Iterator<Item = FuncId> + '_ {
        (0..self.functions.len()).map(FuncId)
    }

    pub fn functions_in(&self, unit: Identifier) -> impl Iterator<Item = FuncId> + '_ {
        self.func_ids()
            .filter(move |&id| self.function(id).get_unit() == unit)
    }

    /// The name of a function without its sigil.
    pub fn name(&self, id: FuncId) -> &str {
        let name = self.identifiers.get_name(self.function(id).name_id());
        name.strip_prefix('@').unwrap_or(name)
    }

    /// The receiver type and method name of functions named `@T.m`.
    pub fn method_of(&self, id: FuncId) -> Option<(&str, &str)> {
        self.name(id).rsplit_once('.')
    }

    pub fn get_op(&self, site: Site) -> &Operation {
        &self.function(site.func).blocks()[site.pos.block_id].operations()[site.pos.op_id]
    }

    /// Every call-like operation of a function.
    pub fn call_sites(&self, func: FuncId) -> impl Iterator<Item = (Site, &Call)> + '_ {
        self.function(func).operations().filter_map(move |(pos, op)| {
            op.as_call().map(|call| (Site { func, pos }, call))
        })
    }
}

impl TypeOracle for Program {
    fn type_of(&self, var: &Variable) -> Option<Type> {
        match var.ty {
            Type::Unknown => None,
            ty => Some(ty),
        }
    }

    fn symbol_of(&self, func: FuncId) -> Option<Symbol> {
        let function = self.function(func);
        if function.kind() == FunctionKind::Anonymous {
            return None;
        }
        let unit = self.identifiers.get_name(function.get_unit());
        Some(Symbol(format!("{unit}.{}", self.name(func))))
    }
}

pub fn print_operation(op: &Operation, program: &Program) -> String {
    let get_name = |var: &Variable| program.identifiers.get_name(var.id);
    let def = |var: &Variable| format!("{}: {} = ", get_name(var), var.ty);
    let name = |id: &Identifier| program.identifiers.get_name(*id);
    match op {
        Operation::BinOp(BinaryOp {
            token,
            result,
            lhs,
            rhs,
        }) => format!(
            "{}{} {} {};",
            def(result),
            token.value,
            get_name(lhs),
            get_name(rhs)
        ),
        Operation::UnOp(UnaryOp {
            token,
            result,
            operand,
        }) => format!("{}{} {};", def(result), token.value, get_name(operand)),
        Operation::Const(tok, var) => format!("{}const {};", def(var), tok.value),
        Operation::Field(FieldAccess {
            result,
            base,
            field,
            ..
        }) => format!("{}field {} {};", def(result), get_name(base), name(field)),
        Operation::Index(IndexAccess {
            result,
            base,
            index,
            ..
        }) => format!(
            "{}index {} {};",
            def(result),
            get_name(base),
            get_name(index)
        ),
        Operation::TypeAssert(TypeAssert {
            result,
            operand,
            comma_ok,
            ..
        }) => format!(
            "{}typeassert {}{};",
            def(result),
            get_name(operand),
            if *comma_ok { " commaok" } else { "" }
        ),
        Operation::FuncRef(_, result, func) => format!("{}func {};", def(result), name(func)),
        Operation::MakeInterface(MakeInterface {
            result,
            concrete,
            value,
            ..
        }) => format!(
            "{}make {} {};",
            def(result),
            name(concrete),
            get_name(value)
        ),
        Operation::Recover(_, Some(result)) => format!("{}recover;", def(result)),
        Operation::Recover(_, None) => "recover;".to_owned(),
        Operation::Call(Call {
            kind,
            callee,
            result,
            args,
            ..
        }) => {
            let callee = match callee {
                Callee::Static(func) => name(func).to_owned(),
                Callee::Dynamic(var) => get_name(var).to_owned(),
                Callee::Invoke { receiver, method } => {
                    format!("invoke {} {}", get_name(receiver), name(method))
                }
            };
            let args = args.iter().map(|v| format!(" {}", get_name(v))).join("");
            let prefix = result.as_ref().map(def).unwrap_or_default();
            format!("{prefix}{kind} {callee}{args};")
        }
        Operation::Print(_, v) => format!("print {};", get_name(v)),
        Operation::Nop(_) => "nop;".to_owned(),
        Operation::Jump(_, target) => format!("jmp {};", name(target)),
        Operation::Br(Branch {
            cond, then, els, ..
        }) => format!("br {} {} {};", get_name(cond), name(then), name(els)),
        Operation::Ret(_, Some(v)) => format!("ret {};", get_name(v)),
        Operation::Ret(_, None) => "ret;".to_owned(),
        Operation::Panic(_, Some(v)) => format!("panic {};", get_name(v)),
        Operation::Panic(_, None) => "panic;".to_owned(),
    }
}

fn print_signature(func: &Function, program: &Program) -> String {
    let mut result = String::new();
    match func.kind() {
        FunctionKind::External => result.push_str("extern "),
        FunctionKind::Anonymous => result.push_str("anon "),
        FunctionKind::Named => {}
    }
    result.push_str(program.identifiers.get_name(func.name_id()));
    if !func.get_formals().is_empty() {
        let formals = func
            .get_formals()
            .iter()
            .map(|v| format!("{}: {}", program.identifiers.get_name(v.id), v.ty))
            .join(", ");
        result.push_str(&format!("({formals})"));
    }
    if let Some(ret_ty) = func.get_return_type() {
        result.push_str(&format!(": {ret_ty}"));
    }
    result
}

pub fn print_function(func: &Function, program: &Program) -> String {
    let signature = print_signature(func, program);
    if func.kind() == FunctionKind::External {
        return format!("{signature};\n");
    }
    let mut result = format!("{signature} {{\n");
    for (id, block) in func.blocks().iter().enumerate() {
        if let Some(label) = block.label() {
            if id != 0 {
                result.push('\n');
            }
            result.push_str(&format!("{}:\n", program.identifiers.get_name(label)));
        }
        for op in block.operations() {
            result.push_str(&format!("  {}\n", print_operation(op, program)));
        }
    }
    result.push_str("}\n");
    result
}

/// Print the program back in the textual form accepted by the parser.
pub fn print(program: &Program) -> String {
    let mut result = String::new();
    for &unit in &program.units {
        if !result.is_empty() {
            result.push('\n');
        }
        result.push_str(&format!("unit {};\n", program.identifiers.get_name(unit)));
        for id in program.functions_in(unit) {
            result.push('\n');
            result.push_str(&print_function(program.function(id), program));
        }
    }
    result
}

pub fn print_cfg(func: &Function, program: &Program) -> String {
    let name = format!("\"{}\"", program.identifiers.get_name(func.name_id()));
    analysis::cfg::print(Some(&name), func, |op| print_operation(op, program))
}

pub fn print_dot(program: &Program) -> String {
    program
        .functions
        .iter()
        .filter(|func| func.has_body())
        .map(|func| print_cfg(func, program))
        .join("\n")
}
