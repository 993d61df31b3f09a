use super::lexer::*;
use utils::DiagnosticEmitter;

#[derive(Debug)]
struct LexTestResult {
    output: String,
    result: LexResult,
}

fn lex_string(source: &str) -> LexTestResult {
    let mut diag = DiagnosticEmitter::log_to_buffer();
    let tokens = Lexer::new(source, &mut diag).lex_all();
    LexTestResult {
        output: diag.out_buffer().unwrap_or_default() + &diag.err_buffer().unwrap_or_default(),
        result: tokens,
    }
}

fn to_token_values(tokens: Vec<Token>) -> Vec<TokenValue> {
    tokens.into_iter().map(|tok| tok.value).collect()
}

use TokenValue::*;

#[test]
fn test_empty_input() {
    let LexTestResult { output, result } = lex_string("");
    assert_eq!(to_token_values(result.tokens), vec![EndOfFile]);
    assert_eq!(output, "");

    let LexTestResult { output, result } = lex_string("  \n\t\n");
    assert_eq!(to_token_values(result.tokens), vec![EndOfFile]);
    assert_eq!(output, "");
}

#[test]
fn test_all_tokens() {
    let LexTestResult { output, result } = lex_string(
        r"ident @global ident .label 50 -50 add mul sub div mod eq lt gt le ge not and or
              jmp br call ret go defer invoke panic recover
              field index typeassert commaok func make = (){} ;:,
              int float bool string ptr iface slice map fn unknown
              unit extern anon const print nop id true false",
    );
    let expected = vec![
        Local(Identifier(0)),
        Global(Identifier(1)),
        Local(Identifier(0)),
        Label(Identifier(2)),
        Integer(50),
        Integer(-50),
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
        Not,
        And,
        Or,
        Jump,
        Branch,
        Call,
        Return,
        Go,
        Defer,
        Invoke,
        Panic,
        Recover,
        Field,
        Index,
        TypeAssert,
        CommaOk,
        Func,
        Make,
        Define,
        LeftParen,
        RightParen,
        LeftBrace,
        RightBrace,
        Semicolon,
        Colon,
        Comma,
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
        Unit,
        Extern,
        Anon,
        Const,
        Print,
        Nop,
        Identity,
        True,
        False,
        EndOfFile,
    ];

    assert_eq!(to_token_values(result.tokens), expected);
    assert_eq!(output, "");
    assert_eq!(result.identifiers.get_name(Identifier(1)), "@global");
    assert_eq!(result.identifiers.get_name(Identifier(2)), ".label");
}

#[test]
fn test_qualified_globals() {
    let LexTestResult { output, result } = lex_string("@T.close @main$1 @a_b");
    assert_eq!(output, "");
    assert_eq!(
        to_token_values(result.tokens),
        vec![
            Global(Identifier(0)),
            Global(Identifier(1)),
            Global(Identifier(2)),
            EndOfFile
        ]
    );
    assert_eq!(result.identifiers.0, vec!["@T.close", "@main$1", "@a_b"]);
}

#[test]
fn test_comments_and_lines() {
    let LexTestResult { output, result } = lex_string(
        r"# line comment
ret; // trailing
/* block
   comment */ go",
    );
    assert_eq!(output, "");
    let lines: Vec<_> = result
        .tokens
        .iter()
        .map(|tok| (tok.value, tok.line_num.0))
        .collect();
    assert_eq!(
        lines,
        vec![(Return, 2), (Semicolon, 2), (Go, 4), (EndOfFile, 4)]
    );
}

#[test]
fn test_lexer_errors() {
    let LexTestResult { output, result } = lex_string("ret ^");
    assert!(result.tokens.is_empty());
    assert_eq!(output, "[line 1] Error : Unexpected token: '^'.\n");

    let LexTestResult { output, result } = lex_string("\n- 5");
    assert!(result.tokens.is_empty());
    assert_eq!(output, "[line 2] Error : Expected number after '-'.\n");

    let LexTestResult { output, result } = lex_string("/* open");
    assert!(result.tokens.is_empty());
    assert_eq!(output, "[line 1] Error : Multiline comment not closed.\n");

    let LexTestResult { output, result } = lex_string("99999999999");
    assert!(result.tokens.is_empty());
    assert_eq!(output, "[line 1] Error : Integer literal out of range.\n");

    let LexTestResult { output, .. } = lex_string("@ x");
    assert_eq!(output, "[line 1] Error : Unexpected token: '@'.\n");
}
