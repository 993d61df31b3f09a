use std::collections::HashMap;

use analysis::cfg::{CfgBlock, ControlFlowGraph, MutableCfg};
use utils::DiagnosticEmitter;

use crate::{
    ir::{self, CallKind, Callee, FuncId, Function, FunctionKind, Operation, Program, Type, Variable},
    lexer::{Identifier, IdentifierTable, LexResult, Location, Token, TokenValue},
};

use TokenValue::*;

#[derive(Default)]
struct SymbolTable(HashMap<Identifier, Type>);

impl SymbolTable {
    fn insert(
        &mut self,
        diag: &mut DiagnosticEmitter,
        identifiers: &IdentifierTable,
        line: Location,
        id: Identifier,
        ty: Type,
    ) -> Option<()> {
        match self.0.insert(id, ty) {
            Some(previous) if previous != ty => {
                diag.report(
                    line.0,
                    &format!("at '{}'", identifiers.get_name(id)),
                    &format!("Variable redefined with type '{ty}', previously '{previous}'."),
                );
                None
            }
            _ => Some(()),
        }
    }

    fn get(
        &self,
        diag: &mut DiagnosticEmitter,
        identifiers: &IdentifierTable,
        line: Location,
        id: Identifier,
    ) -> Option<Variable> {
        let Some(&ty) = self.0.get(&id) else {
            diag.report(
                line.0,
                &format!("at '{}'", identifiers.get_name(id)),
                "Undefined variable.",
            );
            return None;
        };
        Some(Variable { id, ty })
    }
}

#[derive(Default)]
struct LabelsToBlocks(HashMap<Identifier, usize>);

impl LabelsToBlocks {
    fn insert(
        &mut self,
        diag: &mut DiagnosticEmitter,
        identifiers: &IdentifierTable,
        line: Location,
        label: Identifier,
        block: usize,
    ) -> Option<()> {
        if self.0.insert(label, block).is_some() {
            diag.report(
                line.0,
                &format!("at '{}'", identifiers.get_name(label)),
                "Label defined more than once.",
            );
            return None;
        }
        Some(())
    }

    fn get(
        &self,
        diag: &mut DiagnosticEmitter,
        identifiers: &IdentifierTable,
        line: Location,
        label: Identifier,
    ) -> Option<usize> {
        let Some(&block) = self.0.get(&label) else {
            diag.report(
                line.0,
                &format!("at '{}'", identifiers.get_name(label)),
                "Undefined label.",
            );
            return None;
        };
        Some(block)
    }
}

pub struct Parser<'src> {
    current_tok: usize,
    current_block: usize,
    current_unit: Option<Identifier>,
    tokens: Vec<Token>,
    program: Program,
    diag: &'src mut DiagnosticEmitter,
}

impl<'src> Parser<'src> {
    pub fn new(lexed: LexResult, diag: &'src mut DiagnosticEmitter) -> Self {
        let LexResult {
            tokens,
            identifiers,
        } = lexed;

        Parser {
            current_tok: 0,
            current_block: 0,
            current_unit: None,
            tokens,
            program: Program {
                identifiers,
                ..Program::default()
            },
            diag,
        }
    }

    pub fn parse(mut self) -> Option<Program> {
        while !self.is_at_end() {
            if self.try_consume(Unit).is_some() {
                let (_, unit) = self.consume_local()?;
                self.consume(Semicolon, "")?;
                if !self.program.units.contains(&unit) {
                    self.program.units.push(unit);
                }
                self.current_unit = Some(unit);
                continue;
            }

            let kind = if self.try_consume(Extern).is_some() {
                FunctionKind::External
            } else if self.try_consume(Anon).is_some() {
                FunctionKind::Anonymous
            } else {
                FunctionKind::Named
            };
            let func = self.parse_function(kind)?;
            self.program.functions.push(func);
        }
        let functions = self.program.functions.clone();
        for func in &functions {
            self.analyze(func)?;
        }
        Some(self.program)
    }

    fn parse_function(&mut self, kind: FunctionKind) -> Option<Function> {
        let Some(unit) = self.current_unit else {
            self.error(self.peek(), "Compilation unit expected before functions.");
            return None;
        };
        let func = self.consume(Global(Identifier(0)), "Function name expected.")?;
        let Global(func_id) = func.value else {
            unreachable!();
        };

        let mut formals = Vec::new();
        if self.try_consume(LeftParen).is_some() {
            formals = self.parse_formals()?;
        }

        let mut ret = None;
        if self.try_consume(Colon).is_some() {
            ret = Some(self.parse_type()?);
        }

        let id = FuncId(self.program.functions.len());
        if self.program.globals.insert(func_id, id).is_some() {
            self.error(func, "Function defined more than once.");
            return None;
        }

        let mut cfg = Function::new(func, unit, kind, ret, formals.clone());
        if kind == FunctionKind::External {
            self.consume(Semicolon, "")?;
            return Some(cfg);
        }

        let mut symbols = SymbolTable::default();
        for Variable { id, ty } in formals {
            symbols.insert(self.diag, &self.program.identifiers, func.line_num, id, ty)?;
        }
        let mut jumps = LabelsToBlocks::default();
        self.consume(LeftBrace, "")?;
        self.parse_function_body(&mut cfg, &mut symbols, &mut jumps)?;

        // Add edges to the Cfg.
        let mut edges = Vec::new();
        for (id, block) in cfg.blocks().iter().enumerate() {
            match block.operations().last() {
                Some(Operation::Br(ir::Branch {
                    token, then, els, ..
                })) => {
                    let to = jumps.get(self.diag, &self.program.identifiers, token.line_num, *then)?;
                    edges.push((id, to));
                    let to = jumps.get(self.diag, &self.program.identifiers, token.line_num, *els)?;
                    edges.push((id, to));
                }
                Some(Operation::Jump(token, next)) => {
                    let to = jumps.get(self.diag, &self.program.identifiers, token.line_num, *next)?;
                    edges.push((id, to));
                }
                _ => continue,
            }
        }
        cfg.add_edges(&edges);

        Some(cfg)
    }

    fn parse_formals(&mut self) -> Option<Vec<Variable>> {
        let mut result = Vec::new();
        if !self.check(RightParen) {
            loop {
                let (_, id) = self.consume_local()?;
                self.consume(Colon, "")?;
                let ty = self.parse_type()?;
                result.push(Variable { id, ty });
                if self.try_consume(Comma).is_none() {
                    break;
                }
            }
        }
        self.consume(RightParen, "")?;
        Some(result)
    }

    fn parse_type(&mut self) -> Option<Type> {
        let ty = match self.peek().value {
            Int => Type::Int,
            Float => Type::Float,
            Bool => Type::Bool,
            Str => Type::Str,
            Ptr => Type::Ptr,
            Iface => Type::Iface,
            Slice => Type::Slice,
            Map => Type::Map,
            FnType => Type::Fn,
            Unknown => Type::Unknown,
            _ => {
                self.error(self.peek(), "Type expected.");
                return None;
            }
        };
        self.advance();
        Some(ty)
    }

    fn parse_function_body(
        &mut self,
        cfg: &mut Function,
        symbols: &mut SymbolTable,
        jumps: &mut LabelsToBlocks,
    ) -> Option<()> {
        if self.try_consume(RightBrace).is_some() {
            // Empty body, nothing to execute.
            return Some(());
        }

        self.current_block = cfg.new_block();
        let mut ops = Vec::new();
        while !self.check(RightBrace) {
            if let Label(label) = self.peek().value {
                let tok = self.advance();
                self.consume(Colon, "")?;
                // The only way to have a label when the current block is empty
                // is if the function starts with a label.
                if !ops.is_empty() {
                    cfg.extend_block(self.current_block, ops.drain(..));
                    self.current_block = cfg.new_block();
                }
                cfg.set_label(self.current_block, label);
                jumps.insert(
                    self.diag,
                    &self.program.identifiers,
                    tok.line_num,
                    label,
                    self.current_block,
                )?;
                continue;
            }
            let op = self.parse_instruction(symbols)?;
            ops.push(op);
        }
        cfg.extend_block(self.current_block, ops);

        self.consume(RightBrace, "")?;
        Some(())
    }

    fn parse_instruction(&mut self, symbols: &mut SymbolTable) -> Option<Operation> {
        if let Some(tok) = self.try_consume(Print) {
            let var = self.parse_operand(symbols)?;
            self.consume(Semicolon, "")?;
            return Some(Operation::Print(tok, var));
        }

        if let Some(tok) = self.try_consume(Return) {
            let var = self.parse_optional_operand(symbols)?;
            return Some(Operation::Ret(tok, var));
        }

        if let Some(tok) = self.try_consume(Panic) {
            let var = self.parse_optional_operand(symbols)?;
            return Some(Operation::Panic(tok, var));
        }

        if let Some(tok) = self.try_consume(Jump) {
            let target = self.consume_label()?;
            self.consume(Semicolon, "")?;
            return Some(Operation::Jump(tok, target));
        }

        if let Some(token) = self.try_consume(Branch) {
            let cond = self.parse_operand(symbols)?;
            let then = self.consume_label()?;
            let els = self.consume_label()?;
            self.consume(Semicolon, "")?;
            return Some(Operation::Br(ir::Branch {
                token,
                cond,
                then,
                els,
            }));
        }

        if let Some(tok) = self.try_consume(Nop) {
            self.consume(Semicolon, "")?;
            return Some(Operation::Nop(tok));
        }

        if let Some(tok) = self.try_consume(Recover) {
            self.consume(Semicolon, "")?;
            return Some(Operation::Recover(tok, None));
        }

        if let Some(token) = self.match_tokens(&[Call, Go, Defer]) {
            return self.parse_call(token, None, symbols);
        }

        let (tok, res_id) = self.consume_local()?;
        self.consume(Colon, "")?;
        let result_ty = self.parse_type()?;
        self.consume(Define, "")?;

        let result = Variable {
            id: res_id,
            ty: result_ty,
        };

        symbols.insert(
            self.diag,
            &self.program.identifiers,
            tok.line_num,
            res_id,
            result_ty,
        )?;

        if let Some(token) = self.try_consume(Call) {
            return self.parse_call(token, Some(result), symbols);
        }

        if let Some(const_tok) = self.try_consume(Const) {
            let Some(tok) = self.match_tokens(&[True, False, Integer(0)]) else {
                self.error(const_tok, "Integer or boolean constant expected.");
                return None;
            };
            self.consume(Semicolon, "")?;
            return Some(Operation::Const(tok, result));
        }

        if let Some(tok) = self.try_consume(Recover) {
            self.consume(Semicolon, "")?;
            return Some(Operation::Recover(tok, Some(result)));
        }

        if let Some(token) = self.try_consume(Field) {
            let base = self.parse_operand(symbols)?;
            let (_, field) = self.consume_local()?;
            self.consume(Semicolon, "")?;
            return Some(Operation::Field(ir::FieldAccess {
                token,
                result,
                base,
                field,
            }));
        }

        if let Some(token) = self.try_consume(Index) {
            let base = self.parse_operand(symbols)?;
            let index = self.parse_operand(symbols)?;
            self.consume(Semicolon, "")?;
            return Some(Operation::Index(ir::IndexAccess {
                token,
                result,
                base,
                index,
            }));
        }

        if let Some(token) = self.try_consume(TypeAssert) {
            let operand = self.parse_operand(symbols)?;
            let comma_ok = self.try_consume(CommaOk).is_some();
            self.consume(Semicolon, "")?;
            return Some(Operation::TypeAssert(ir::TypeAssert {
                token,
                result,
                operand,
                comma_ok,
            }));
        }

        if let Some(token) = self.try_consume(Func) {
            let func = self.consume(Global(Identifier(0)), "Function name expected.")?;
            let Global(func) = func.value else {
                unreachable!();
            };
            self.consume(Semicolon, "")?;
            return Some(Operation::FuncRef(token, result, func));
        }

        if let Some(token) = self.try_consume(Make) {
            let (_, concrete) = self.consume_local()?;
            let value = self.parse_operand(symbols)?;
            self.consume(Semicolon, "")?;
            return Some(Operation::MakeInterface(ir::MakeInterface {
                token,
                result,
                concrete,
                value,
            }));
        }

        // Unary operations.
        if let Some(token) = self.match_tokens(&[Identity, Not]) {
            let operand = self.parse_operand(symbols)?;
            self.consume(Semicolon, "")?;
            return Some(Operation::UnOp(ir::UnaryOp {
                token,
                result,
                operand,
            }));
        }

        // Binary operations.
        if let Some(token) = self.match_tokens(&[
            Add,
            Mul,
            Sub,
            Div,
            Mod,
            Equal,
            LessThan,
            GreaterThan,
            LessThanOrEq,
            GreaterThanOrEq,
            And,
            Or,
        ]) {
            let lhs = self.parse_operand(symbols)?;
            let rhs = self.parse_operand(symbols)?;
            self.consume(Semicolon, "")?;
            return Some(Operation::BinOp(ir::BinaryOp {
                token,
                result,
                lhs,
                rhs,
            }));
        }

        self.error(self.peek(), "Unexpected token.");
        None
    }

    fn parse_call(
        &mut self,
        token: Token,
        result: Option<Variable>,
        symbols: &mut SymbolTable,
    ) -> Option<Operation> {
        let kind = match token.value {
            Go => CallKind::Go,
            Defer => CallKind::Defer,
            _ => CallKind::Call,
        };
        let callee = match self.peek().value {
            Global(id) => {
                self.advance();
                Callee::Static(id)
            }
            Invoke => {
                self.advance();
                let receiver = self.parse_operand(symbols)?;
                let (_, method) = self.consume_local()?;
                Callee::Invoke { receiver, method }
            }
            _ => Callee::Dynamic(self.parse_operand(symbols)?),
        };
        let mut args = Vec::new();
        while !self.check(Semicolon) {
            args.push(self.parse_operand(symbols)?);
        }
        self.consume(Semicolon, "")?;
        Some(Operation::Call(ir::Call {
            token,
            kind,
            callee,
            result,
            args,
        }))
    }

    fn parse_operand(&mut self, symbols: &SymbolTable) -> Option<Variable> {
        let (tok, id) = self.consume_local()?;
        symbols.get(self.diag, &self.program.identifiers, tok.line_num, id)
    }

    /// Parses `;` or `x;`, used by operations with an optional operand.
    fn parse_optional_operand(&mut self, symbols: &SymbolTable) -> Option<Option<Variable>> {
        if self.try_consume(Semicolon).is_some() {
            return Some(None);
        }
        let var = self.parse_operand(symbols)?;
        self.consume(Semicolon, "")?;
        Some(Some(var))
    }

    fn peek(&self) -> Token {
        self.tokens[self.current_tok]
    }

    fn previous(&self) -> Token {
        self.tokens[self.current_tok - 1]
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek().value, EndOfFile)
    }

    fn check(&self, tok_val: TokenValue) -> bool {
        if self.is_at_end() {
            false
        } else {
            core::mem::discriminant(&self.peek().value) == core::mem::discriminant(&tok_val)
        }
    }

    fn match_tokens(&mut self, tok_vals: &[TokenValue]) -> Option<Token> {
        if tok_vals.iter().any(|val| self.check(*val)) {
            let prev = self.advance();
            return Some(prev);
        }
        None
    }

    fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.current_tok += 1;
        }
        self.previous()
    }

    fn consume(&mut self, tok_val: TokenValue, s: &str) -> Option<Token> {
        if self.check(tok_val) {
            return Some(self.advance());
        }
        let msg = if s.is_empty() {
            format!("'{tok_val}' expected.")
        } else {
            s.to_owned()
        };
        self.error(self.peek(), &msg);
        None
    }

    fn consume_local(&mut self) -> Option<(Token, Identifier)> {
        let tok = self.consume(Local(Identifier(0)), "Identifier expected.")?;
        let Local(id) = tok.value else {
            unreachable!();
        };
        Some((tok, id))
    }

    fn consume_label(&mut self) -> Option<Identifier> {
        let tok = self.consume(Label(Identifier(0)), "Label expected.")?;
        let Label(id) = tok.value else {
            unreachable!();
        };
        Some(id)
    }

    fn try_consume(&mut self, tok_val: TokenValue) -> Option<Token> {
        if self.check(tok_val) {
            return Some(self.advance());
        }
        None
    }

    fn error(&mut self, tok: Token, s: &str) {
        if tok.value == EndOfFile {
            self.diag.report(tok.line_num.0, "at end of file", s);
        } else {
            let item = match tok.value {
                Local(id) | Global(id) | Label(id) => {
                    self.program.identifiers.get_name(id).to_owned()
                }
                value => value.to_string(),
            };
            self.diag.report(tok.line_num.0, &format!("at '{item}'"), s);
        }
    }

    fn expect_type(&mut self, t: Token, found: Type, expected: Type) -> Option<()> {
        if found == expected {
            return Some(());
        }
        self.error(t, &format!("'{expected}' type expected; '{found}' found"));
        None
    }

    fn lookup_function(&mut self, token: Token, name: Identifier) -> Option<FuncId> {
        let func = self.program.lookup(name);
        if func.is_none() {
            let msg = format!(
                "Undefined function '{}'.",
                self.program.identifiers.get_name(name)
            );
            self.error(token, &msg);
        }
        func
    }

    /// Checks the structure of a parsed function: block terminators, uses of
    /// functions, and the types of the operations where they are fixed.
    fn analyze(&mut self, cfg: &Function) -> Option<()> {
        for block in cfg.blocks() {
            let Some((last, rest)) = block.operations().split_last() else {
                continue;
            };
            if !last.is_terminator() {
                self.error(
                    last.get_token(),
                    "Block terminator expected to be jmp, br, ret, or panic.",
                );
                return None;
            }
            if let Some(op) = rest.iter().find(|op| op.is_terminator()) {
                self.error(op.get_token(), "Operations after a terminator need a label.");
                return None;
            }

            for op in block.operations() {
                match op.clone() {
                    Operation::BinOp(ir::BinaryOp {
                        token,
                        result,
                        lhs,
                        rhs,
                    }) => match token.value {
                        Add | Mul | Div | Sub | Mod => {
                            self.expect_type(token, rhs.ty, lhs.ty)?;
                            self.expect_type(token, result.ty, lhs.ty)?;
                        }
                        LessThan | GreaterThan | LessThanOrEq | GreaterThanOrEq | Equal => {
                            self.expect_type(token, result.ty, Type::Bool)?;
                            self.expect_type(token, rhs.ty, lhs.ty)?;
                        }
                        And | Or => {
                            self.expect_type(token, result.ty, Type::Bool)?;
                            self.expect_type(token, lhs.ty, Type::Bool)?;
                            self.expect_type(token, rhs.ty, Type::Bool)?;
                        }
                        _ => unreachable!("Unexpected binary operator."),
                    },
                    Operation::UnOp(ir::UnaryOp {
                        token,
                        result,
                        operand,
                    }) => match token.value {
                        Identity => self.expect_type(token, operand.ty, result.ty)?,
                        Not => {
                            self.expect_type(token, result.ty, Type::Bool)?;
                            self.expect_type(token, operand.ty, Type::Bool)?;
                        }
                        _ => unreachable!("Unexpected unary operator."),
                    },
                    Operation::Const(token, result) => match token.value {
                        Integer(_) => self.expect_type(token, result.ty, Type::Int)?,
                        _ => self.expect_type(token, result.ty, Type::Bool)?,
                    },
                    Operation::Br(ir::Branch { token, cond, .. }) => {
                        self.expect_type(token, cond.ty, Type::Bool)?;
                    }
                    Operation::FuncRef(token, result, func) => {
                        self.expect_type(token, result.ty, Type::Fn)?;
                        self.lookup_function(token, func)?;
                    }
                    Operation::MakeInterface(ir::MakeInterface { token, result, .. }) => {
                        self.expect_type(token, result.ty, Type::Iface)?;
                    }
                    Operation::Call(ir::Call {
                        token,
                        callee,
                        result,
                        args,
                        ..
                    }) => match callee {
                        Callee::Static(name) => {
                            let func = self.lookup_function(token, name)?;
                            let callee = &self.program.functions[func.0];
                            let (formals, ret) =
                                (callee.get_formals().len(), callee.get_return_type());
                            if formals != args.len() {
                                self.error(
                                    token,
                                    &format!("{formals} arguments expected, got {}", args.len()),
                                );
                                return None;
                            }
                            match (result, ret) {
                                (Some(_), None) => {
                                    self.error(token, "Void functions cannot return a value.");
                                    return None;
                                }
                                (Some(result), Some(ret)) => {
                                    self.expect_type(token, result.ty, ret)?
                                }
                                _ => {}
                            }
                        }
                        Callee::Dynamic(var) => self.expect_type(token, var.ty, Type::Fn)?,
                        Callee::Invoke { receiver, .. } => {
                            self.expect_type(token, receiver.ty, Type::Iface)?
                        }
                    },
                    Operation::Ret(token, ret) => match (ret, cfg.get_return_type()) {
                        (Some(_), None) => {
                            self.error(token, "Void functions cannot return a value.");
                            return None;
                        }
                        (None, Some(_)) => {
                            self.error(token, "Non-void functions must return a value.");
                            return None;
                        }
                        (Some(var), Some(ret_ty)) => self.expect_type(token, var.ty, ret_ty)?,
                        (None, None) => {}
                    },
                    _ => continue,
                }
            }
        }
        Some(())
    }
}
