use std::collections::HashMap;
use utils::DiagnosticEmitter;

use lazy_static::lazy_static;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(pub usize);

#[derive(Clone, Debug, Copy, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Location(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenValue {
    Local(Identifier),
    Global(Identifier),
    Label(Identifier),
    Integer(i32),

    // Arithmetic
    Add,
    Mul,
    Sub,
    Div,
    Mod,

    // Logic
    True,
    False,
    Equal,
    LessThan,
    GreaterThan,
    LessThanOrEq,
    GreaterThanOrEq,
    Not,
    And,
    Or,

    // Control flow
    Jump,
    Branch,
    Call,
    Return,

    // Tasks and faults
    Go,
    Defer,
    Invoke,
    Panic,
    Recover,

    // Memory and values
    Field,
    Index,
    TypeAssert,
    CommaOk,
    Func,
    Make,

    // Separators
    Define,
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    Colon,
    Semicolon,
    Comma,

    // Builtin types
    Int,
    Float,
    Bool,
    Str,
    Ptr,
    Iface,
    Slice,
    Map,
    FnType,
    Unknown,

    // Declarations
    Unit,
    Extern,
    Anon,

    // Misc
    Const,
    Print,
    Nop,
    Identity,

    EndOfFile,
}

use TokenValue::*;

fn from_char(c: char) -> Option<TokenValue> {
    match c {
        '(' => Some(LeftParen),
        ')' => Some(RightParen),
        '{' => Some(LeftBrace),
        '}' => Some(RightBrace),
        ':' => Some(Colon),
        ';' => Some(Semicolon),
        '=' => Some(Define),
        ',' => Some(Comma),
        _ => None,
    }
}

impl core::fmt::Display for TokenValue {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match *self {
            Local(i) => write!(f, "local_{}", i.0),
            Global(i) => write!(f, "global_{}", i.0),
            Label(i) => write!(f, "label_{}", i.0),
            Integer(i) => write!(f, "{i}"),

            Add => write!(f, "add"),
            Mul => write!(f, "mul"),
            Sub => write!(f, "sub"),
            Div => write!(f, "div"),
            Mod => write!(f, "mod"),

            True => write!(f, "true"),
            False => write!(f, "false"),
            Equal => write!(f, "eq"),
            LessThan => write!(f, "lt"),
            GreaterThan => write!(f, "gt"),
            LessThanOrEq => write!(f, "le"),
            GreaterThanOrEq => write!(f, "ge"),
            Not => write!(f, "not"),
            And => write!(f, "and"),
            Or => write!(f, "or"),

            Jump => write!(f, "jmp"),
            Branch => write!(f, "br"),
            Call => write!(f, "call"),
            Return => write!(f, "ret"),

            Go => write!(f, "go"),
            Defer => write!(f, "defer"),
            Invoke => write!(f, "invoke"),
            Panic => write!(f, "panic"),
            Recover => write!(f, "recover"),

            Field => write!(f, "field"),
            Index => write!(f, "index"),
            TypeAssert => write!(f, "typeassert"),
            CommaOk => write!(f, "commaok"),
            Func => write!(f, "func"),
            Make => write!(f, "make"),

            Define => write!(f, "="),
            LeftParen => write!(f, "("),
            RightParen => write!(f, ")"),
            LeftBrace => write!(f, "{{"),
            RightBrace => write!(f, "}}"),
            Colon => write!(f, ":"),
            Semicolon => write!(f, ";"),
            Comma => write!(f, ","),

            Int => write!(f, "int"),
            Float => write!(f, "float"),
            Bool => write!(f, "bool"),
            Str => write!(f, "string"),
            Ptr => write!(f, "ptr"),
            Iface => write!(f, "iface"),
            Slice => write!(f, "slice"),
            Map => write!(f, "map"),
            FnType => write!(f, "fn"),
            Unknown => write!(f, "unknown"),

            Unit => write!(f, "unit"),
            Extern => write!(f, "extern"),
            Anon => write!(f, "anon"),

            Const => write!(f, "const"),
            Print => write!(f, "print"),
            Nop => write!(f, "nop"),
            Identity => write!(f, "id"),

            EndOfFile => write!(f, "END_OF_FILE"),
        }
    }
}

lazy_static! {
    static ref KEYWORDS: HashMap<String, TokenValue> = {
        let mut m = HashMap::new();
        for kw in [
            Add, Mul, Sub, Div, Mod, True, False, Equal, LessThan, GreaterThan, LessThanOrEq,
            GreaterThanOrEq, Not, And, Or,
        ] {
            m.insert(kw.to_string(), kw);
        }

        for kw in [Jump, Branch, Call, Return, Go, Defer, Invoke, Panic, Recover] {
            m.insert(kw.to_string(), kw);
        }

        for kw in [Field, Index, TypeAssert, CommaOk, Func, Make] {
            m.insert(kw.to_string(), kw);
        }

        for kw in [Int, Float, Bool, Str, Ptr, Iface, Slice, Map, FnType, Unknown] {
            m.insert(kw.to_string(), kw);
        }

        for kw in [Unit, Extern, Anon, Const, Print, Nop, Identity] {
            m.insert(kw.to_string(), kw);
        }
        m
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub value: TokenValue,

    pub line_num: Location,
}

impl core::fmt::Display for Token {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// Interned names. Names keep their sigil, so `@main`, `.loop` and `x`
/// never collide.
#[derive(Debug, Clone, Default)]
pub struct IdentifierTable(pub Vec<String>);

impl IdentifierTable {
    pub fn lookup(&self, ident: &str) -> Option<Identifier> {
        // TODO: more efficient lookup.
        self.0.iter().position(|str| str == ident).map(Identifier)
    }

    fn get_identifier(&mut self, ident: &str) -> Identifier {
        if let Some(id) = self.lookup(ident) {
            id
        } else {
            self.0.push(ident.to_owned());
            Identifier(self.0.len() - 1)
        }
    }

    pub fn get_name(&self, id: Identifier) -> &str {
        &self.0[id.0]
    }
}

pub struct Lexer<'src> {
    source: &'src str,
    start: usize,
    current: usize,
    line_num: u32,
    has_error: bool,
    diagnostic_emitter: &'src mut DiagnosticEmitter,
    identifiers: IdentifierTable,
}

#[derive(Debug, Clone, Default)]
pub struct LexResult {
    pub tokens: Vec<Token>,
    pub identifiers: IdentifierTable,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str, diagnostic_emitter: &'src mut DiagnosticEmitter) -> Self {
        Lexer {
            source,
            start: 0,
            current: 0,
            line_num: 1,
            has_error: false,
            diagnostic_emitter,
            identifiers: IdentifierTable::default(),
        }
    }

    pub fn lex_all(mut self) -> LexResult {
        if !self.source.is_ascii() {
            self.diagnostic_emitter
                .error(self.line_num, "Only ASCII input is supported.");
            return LexResult::default();
        }

        let mut tokens = Vec::new();
        while !self.is_at_end() {
            if let Some(tok) = self.lex() {
                tokens.push(tok);
            } else if self.has_error {
                return LexResult::default();
            }
        }

        tokens.push(Token {
            value: EndOfFile,
            line_num: Location(self.line_num),
        });

        LexResult {
            tokens,
            identifiers: self.identifiers,
        }
    }

    fn lex(&mut self) -> Option<Token> {
        loop {
            if self.is_at_end() {
                return None;
            }

            self.start = self.current;
            match self.advance() {
                // Unambiguous single character tokens.
                c @ ('=' | '(' | ')' | '{' | '}' | ':' | ';' | ',') => {
                    return Some(self.token(from_char(c)?));
                }

                // Whitespace
                '\n' => {
                    self.line_num += 1;
                    continue;
                }
                ' ' | '\t' | '\r' => continue,

                // Comments
                '#' => {
                    self.skip_line();
                    continue;
                }
                '/' => {
                    if self.match_char('/') {
                        self.skip_line();
                        continue;
                    }
                    if self.match_char('*') {
                        if self.skip_block_comment() {
                            continue;
                        }
                        return None;
                    }
                    return self.unexpected();
                }

                // Negative numbers
                '-' => {
                    if self.peek().is_ascii_digit() {
                        return self.lex_number();
                    }
                    self.diagnostic_emitter
                        .error(self.line_num, "Expected number after '-'.");
                    self.has_error = true;
                    return None;
                }
                c @ ('@' | '.') => {
                    if self.peek().is_ascii_alphabetic() {
                        let ident = if c == '@' {
                            self.lex_while(|c| c.is_ascii_alphanumeric() || "_.$".contains(c))
                        } else {
                            self.lex_while(|c| c.is_ascii_alphanumeric() || c == '_')
                        };
                        let id = self.identifiers.get_identifier(ident);
                        return Some(self.token(if c == '@' { Global(id) } else { Label(id) }));
                    }
                    return self.unexpected();
                }
                c => {
                    if c.is_ascii_digit() {
                        return self.lex_number();
                    }
                    if c.is_ascii_alphabetic() {
                        let ident = self.lex_while(|c| c.is_ascii_alphanumeric() || c == '_');
                        let value = match KEYWORDS.get(ident) {
                            Some(keyword) => *keyword,
                            None => Local(self.identifiers.get_identifier(ident)),
                        };
                        return Some(self.token(value));
                    }
                    return self.unexpected();
                }
            }
        }
    }

    fn token(&self, value: TokenValue) -> Token {
        Token {
            value,
            line_num: Location(self.line_num),
        }
    }

    fn unexpected(&mut self) -> Option<Token> {
        self.diagnostic_emitter.error(
            self.line_num,
            &format!(
                "Unexpected token: '{}'.",
                &self.source[self.start..self.current]
            ),
        );
        self.has_error = true;
        None
    }

    fn skip_line(&mut self) {
        while !self.is_at_end() && self.peek() != '\n' {
            self.advance();
        }
    }

    /// Returns false when the comment is not closed before the end of input.
    fn skip_block_comment(&mut self) -> bool {
        loop {
            if self.is_at_end() {
                self.diagnostic_emitter
                    .error(self.line_num, "Multiline comment not closed.");
                self.has_error = true;
                return false;
            }
            match self.advance() {
                '\n' => self.line_num += 1,
                '*' if self.match_char('/') => return true,
                _ => {}
            }
        }
    }

    fn lex_number(&mut self) -> Option<Token> {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        let Ok(value) = self.source[self.start..self.current].parse::<i32>() else {
            self.diagnostic_emitter
                .error(self.line_num, "Integer literal out of range.");
            self.has_error = true;
            return None;
        };

        Some(self.token(Integer(value)))
    }

    fn lex_while(&mut self, pred: impl Fn(char) -> bool) -> &'src str {
        while pred(self.peek()) {
            self.advance();
        }

        &self.source[self.start..self.current]
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn peek(&self) -> char {
        self.source
            .as_bytes()
            .get(self.current)
            .map_or('\0', |&b| b as char)
    }

    fn advance(&mut self) -> char {
        let prev = self.peek();
        self.current += 1;
        prev
    }

    fn match_char(&mut self, expected: char) -> bool {
        if !self.is_at_end() && self.peek() == expected {
            self.current += 1;
            true
        } else {
            false
        }
    }
}
