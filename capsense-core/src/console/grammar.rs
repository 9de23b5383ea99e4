#![allow(clippy::module_name_repetitions)]

//! Lexer and parser for the console.
//!
//! The lexer uses `regal` to produce a bounded token stream. The parser walks
//! those tokens by hand, and numeric lexemes are decoded with `winnow`
//! combinators so literals such as `150ms` or `8700` share one definition.

use core::fmt;
use core::ops::Range;
use core::time::Duration;

use heapless::Vec as HeaplessVec;
use regal::IncrementalError;
use regal::TokenCache;
use regal_macros::RegalLexer;
use winnow::ascii::{Uint, dec_uint};
use winnow::combinator::alt;
use winnow::prelude::*;

use super::catalog::{self, CommandTag};
use crate::keypad::KeyIndex;

/// Maximum number of tokens produced per console line.
pub const MAX_TOKENS: usize = 32;
const MAX_CACHE_RECORDS: usize = MAX_TOKENS * 2;
/// Maximum number of pads one `touch` command may queue.
pub const MAX_TOUCHES: usize = 16;

/// Lexical token kinds recognized by the console grammar.
#[derive(RegalLexer, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TokenKind {
    /// Duration literal ending in `ms` or `s`.
    #[regex(r"[0-9]+(?:ms|s)", priority = 2)]
    Duration,
    /// Unsuffixed integer literal.
    #[regex(r"[0-9]+")]
    Integer,
    /// Identifier or keyword (case-insensitive match performed later).
    #[regex(r"[A-Za-z][A-Za-z0-9-]*")]
    Ident,
    /// Optional separator between touch keys.
    #[token(",")]
    Comma,
    /// Inline whitespace is ignored.
    #[regex(r"[ \t]+", skip)]
    Whitespace,
    /// End-of-line token (`\r`, `\n`, or `\r\n`).
    #[token("\r\n")]
    #[token("\n")]
    #[token("\r")]
    Eol,
    /// Pseudo variant used when the lexer encounters unsupported input.
    #[default]
    #[regex(r".", priority = 1024)]
    Error,
}

/// Token emitted by the lexer with a byte span back into the source line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub lexeme: &'a str,
    pub span: Range<usize>,
}

/// Bounded token buffer to avoid dynamic allocation in `no_std` environments.
pub type TokenBuffer<'a> = HeaplessVec<Token<'a>, MAX_TOKENS>;

/// Pads queued by a `touch` command.
pub type TouchList = HeaplessVec<KeyIndex, MAX_TOUCHES>;

/// Lexer errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LexError {
    /// Input produced more tokens than the static buffer allows.
    TooManyTokens { processed: usize },
    /// Underlying lexer reported an unrecoverable error.
    Engine,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexError::TooManyTokens { processed } => {
                write!(f, "token buffer exhausted after {processed} items")
            }
            LexError::Engine => write!(f, "lexer engine error"),
        }
    }
}

/// Grammar errors emitted by the parser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GrammarErrorKind<'a> {
    UnexpectedToken {
        expected: &'static str,
        found: TokenKind,
        span: Range<usize>,
    },
    UnexpectedEnd {
        expected: &'static str,
    },
    UnknownCommand {
        lexeme: &'a str,
    },
    InvalidInteger {
        span: Range<usize>,
    },
    InvalidDuration {
        span: Range<usize>,
    },
    UnknownKey {
        lexeme: &'a str,
        span: Range<usize>,
    },
    TooManyTouches,
    InvalidToken {
        span: Range<usize>,
        lexeme: &'a str,
    },
}

impl fmt::Display for GrammarErrorKind<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrammarErrorKind::UnexpectedToken {
                expected,
                found,
                span,
            } => write!(f, "expected {expected}, found {found:?} at {span:?}"),
            GrammarErrorKind::UnexpectedEnd { expected } => {
                write!(f, "unexpected end of input, expected {expected}")
            }
            GrammarErrorKind::UnknownCommand { lexeme } => write!(f, "unknown command `{lexeme}`"),
            GrammarErrorKind::InvalidInteger { span } => {
                write!(f, "invalid integer literal at {span:?}")
            }
            GrammarErrorKind::InvalidDuration { span } => {
                write!(f, "invalid duration literal at {span:?}")
            }
            GrammarErrorKind::UnknownKey { lexeme, span } => {
                write!(f, "no pad `{lexeme}` at {span:?}")
            }
            GrammarErrorKind::TooManyTouches => {
                write!(f, "at most {MAX_TOUCHES} touches per command")
            }
            GrammarErrorKind::InvalidToken { span, lexeme } => {
                write!(f, "unsupported token `{lexeme}` at {span:?}")
            }
        }
    }
}

/// Wrapper type enabling a consistent error surface for consumers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrammarError<'a> {
    pub kind: GrammarErrorKind<'a>,
}

impl fmt::Display for GrammarError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}

impl<'a> GrammarError<'a> {
    fn new(kind: GrammarErrorKind<'a>) -> Self {
        GrammarError { kind }
    }

    fn unexpected(expected: &'static str, token: Option<&Token<'a>>) -> Self {
        Self::new(match token {
            Some(tok) => GrammarErrorKind::UnexpectedToken {
                expected,
                found: tok.kind,
                span: tok.span.clone(),
            },
            None => GrammarErrorKind::UnexpectedEnd { expected },
        })
    }

    fn invalid_token(token: &Token<'a>) -> Self {
        Self::new(GrammarErrorKind::InvalidToken {
            span: token.span.clone(),
            lexeme: token.lexeme,
        })
    }
}

/// Combined lex/parse error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseError<'a> {
    Lex(LexError),
    Grammar(GrammarError<'a>),
}

impl fmt::Display for ParseError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Lex(err) => err.fmt(f),
            ParseError::Grammar(err) => err.fmt(f),
        }
    }
}

/// Structured commands produced by the parser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command<'a> {
    /// Set the simulated oscillator frequency in hertz.
    Freq(u32),
    /// Queue pad touches, consumed one per pass.
    Touch(TouchList),
    /// Run a number of loop passes.
    Run(u32),
    /// Run passes until the clock moved by at least the duration.
    Advance(Duration),
    Status,
    Help(Option<&'a str>),
}

/// Tokenize the provided line.
pub fn lex(line: &str) -> Result<TokenBuffer<'_>, LexError> {
    let compiled = TokenKind::lexer();
    let mut cache: TokenCache<TokenKind, MAX_CACHE_RECORDS> = TokenCache::new();
    let partial = cache
        .rebuild(compiled, line)
        .map_err(map_incremental_error)?;
    let mut buffer = TokenBuffer::new();

    for record in cache.tokens() {
        if record.skipped {
            continue;
        }

        let span = record.start..record.end;
        let lexeme = &line[span.clone()];
        push_token(&mut buffer, record.token, lexeme, span)?;
    }

    if let Some(partial) = partial.filter(|partial| !partial.fragment.is_empty()) {
        let start = partial.start;
        let end = start + partial.fragment.len();
        push_token(&mut buffer, TokenKind::Error, partial.fragment, start..end)?;
    }

    Ok(buffer)
}

fn push_token<'a>(
    buffer: &mut TokenBuffer<'a>,
    kind: TokenKind,
    lexeme: &'a str,
    span: Range<usize>,
) -> Result<(), LexError> {
    buffer
        .push(Token { kind, lexeme, span })
        .map_err(|_| LexError::TooManyTokens {
            processed: buffer.len() + 1,
        })
}

fn map_incremental_error(error: IncrementalError) -> LexError {
    match error {
        IncrementalError::TokenOverflow => LexError::TooManyTokens {
            processed: MAX_TOKENS,
        },
        _ => LexError::Engine,
    }
}

/// Parse a console command from the provided line.
pub fn parse(line: &str) -> Result<Command<'_>, ParseError<'_>> {
    let tokens = lex(line).map_err(ParseError::Lex)?;

    if let Some(token) = tokens.iter().find(|token| token.kind == TokenKind::Error) {
        return Err(ParseError::Grammar(GrammarError::invalid_token(token)));
    }

    let mut input = tokens.as_slice();
    let command = command(&mut input).map_err(ParseError::Grammar)?;

    if let Some(token) = input.iter().find(|token| token.kind != TokenKind::Eol) {
        return Err(ParseError::Grammar(GrammarError::unexpected(
            "end of command",
            Some(token),
        )));
    }

    Ok(command)
}

type Input<'src, 'slice> = &'slice [Token<'src>];

fn command<'src>(input: &mut Input<'src, '_>) -> Result<Command<'src>, GrammarError<'src>> {
    let keyword = expect_kind(input, TokenKind::Ident, "command keyword")?;
    let spec = catalog::find(keyword.lexeme).ok_or_else(|| {
        GrammarError::new(GrammarErrorKind::UnknownCommand {
            lexeme: keyword.lexeme,
        })
    })?;

    match spec.tag {
        CommandTag::Freq => {
            let token = expect_kind(input, TokenKind::Integer, "frequency in hertz")?;
            Ok(Command::Freq(parse_integer(&token)?))
        }
        CommandTag::Touch => touch_list(input).map(Command::Touch),
        CommandTag::Run => {
            let token = expect_kind(input, TokenKind::Integer, "pass count")?;
            Ok(Command::Run(parse_integer(&token)?))
        }
        CommandTag::Advance => {
            let token = expect_kind(input, TokenKind::Duration, "duration")?;
            Ok(Command::Advance(parse_duration(&token)?))
        }
        CommandTag::Status => Ok(Command::Status),
        CommandTag::Help => Ok(Command::Help(optional_ident(input))),
    }
}

fn touch_list<'src>(input: &mut Input<'src, '_>) -> Result<TouchList, GrammarError<'src>> {
    let mut keys = TouchList::new();
    let first = expect_kind(input, TokenKind::Integer, "key index")?;
    push_key(&mut keys, &first)?;

    loop {
        match input.split_first() {
            Some((token, rest)) if token.kind == TokenKind::Integer => {
                *input = rest;
                push_key(&mut keys, token)?;
            }
            Some((token, rest)) if token.kind == TokenKind::Comma => {
                *input = rest;
                let next = expect_kind(input, TokenKind::Integer, "key index")?;
                push_key(&mut keys, &next)?;
            }
            _ => return Ok(keys),
        }
    }
}

fn push_key<'src>(keys: &mut TouchList, token: &Token<'src>) -> Result<(), GrammarError<'src>> {
    let raw: u8 = parse_integer(token).map_err(|_| unknown_key(token))?;
    let key = KeyIndex::from_index(usize::from(raw)).ok_or_else(|| unknown_key(token))?;
    keys.push(key)
        .map_err(|_| GrammarError::new(GrammarErrorKind::TooManyTouches))
}

fn unknown_key<'src>(token: &Token<'src>) -> GrammarError<'src> {
    GrammarError::new(GrammarErrorKind::UnknownKey {
        lexeme: token.lexeme,
        span: token.span.clone(),
    })
}

fn optional_ident<'src>(input: &mut Input<'src, '_>) -> Option<&'src str> {
    match input.split_first() {
        Some((token, rest)) if token.kind == TokenKind::Ident => {
            *input = rest;
            Some(token.lexeme)
        }
        _ => None,
    }
}

fn expect_kind<'src>(
    input: &mut Input<'src, '_>,
    kind: TokenKind,
    label: &'static str,
) -> Result<Token<'src>, GrammarError<'src>> {
    match input.split_first() {
        Some((token, rest)) if token.kind == kind => {
            *input = rest;
            Ok(token.clone())
        }
        Some((token, _)) if token.kind == TokenKind::Eol => {
            Err(GrammarError::unexpected(label, None))
        }
        Some((token, _)) => Err(GrammarError::unexpected(label, Some(token))),
        None => Err(GrammarError::unexpected(label, None)),
    }
}

fn integer_literal<T: Uint>(input: &mut &str) -> ModalResult<T> {
    dec_uint(input)
}

fn duration_literal(input: &mut &str) -> ModalResult<Duration> {
    (dec_uint::<_, u64, _>, alt(("ms", "s")))
        .map(|(value, unit): (u64, &str)| {
            if unit == "ms" {
                Duration::from_millis(value)
            } else {
                Duration::from_secs(value)
            }
        })
        .parse_next(input)
}

fn parse_integer<'a, T: Uint>(token: &Token<'a>) -> Result<T, GrammarError<'a>> {
    integer_literal::<T>
        .parse(token.lexeme)
        .map_err(|_| {
            GrammarError::new(GrammarErrorKind::InvalidInteger {
                span: token.span.clone(),
            })
        })
}

fn parse_duration<'a>(token: &Token<'a>) -> Result<Duration, GrammarError<'a>> {
    duration_literal.parse(token.lexeme).map_err(|_| {
        GrammarError::new(GrammarErrorKind::InvalidDuration {
            span: token.span.clone(),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(input: &str) -> Command<'_> {
        parse(input).expect("command should parse")
    }

    fn keys(raw: &[u8]) -> TouchList {
        raw.iter().copied().map(KeyIndex::new).collect()
    }

    #[test]
    fn parses_freq() {
        assert_eq!(parse_ok("freq 8700"), Command::Freq(8_700));
    }

    #[test]
    fn parses_touch_with_spaces_and_commas() {
        assert_eq!(parse_ok("touch 0 1 2 3 0"), Command::Touch(keys(&[0, 1, 2, 3, 0])));
        assert_eq!(parse_ok("touch 0,1, 2"), Command::Touch(keys(&[0, 1, 2])));
    }

    #[test]
    fn rejects_unwired_key() {
        match parse("touch 0 7") {
            Err(ParseError::Grammar(err)) => {
                assert!(matches!(
                    err.kind,
                    GrammarErrorKind::UnknownKey { lexeme: "7", .. }
                ));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn parses_advance_units() {
        assert_eq!(
            parse_ok("advance 150ms"),
            Command::Advance(Duration::from_millis(150))
        );
        assert_eq!(parse_ok("advance 2s"), Command::Advance(Duration::from_secs(2)));
    }

    #[test]
    fn parses_run_status_and_help() {
        assert_eq!(parse_ok("run 25"), Command::Run(25));
        assert_eq!(parse_ok("STATUS"), Command::Status);
        assert_eq!(parse_ok("help"), Command::Help(None));
        assert_eq!(parse_ok("help touch"), Command::Help(Some("touch")));
    }

    #[test]
    fn trailing_newline_is_accepted() {
        assert_eq!(parse_ok("run 3\r\n"), Command::Run(3));
    }

    #[test]
    fn missing_argument_reports_expected_value() {
        match parse("freq") {
            Err(ParseError::Grammar(err)) => assert_eq!(
                err.kind,
                GrammarErrorKind::UnexpectedEnd {
                    expected: "frequency in hertz"
                }
            ),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn integer_overflow_is_rejected() {
        assert!(matches!(
            parse("freq 99999999999"),
            Err(ParseError::Grammar(GrammarError {
                kind: GrammarErrorKind::InvalidInteger { .. }
            }))
        ));
    }

    #[test]
    fn rejects_unknown_command_and_trailing_tokens() {
        assert!(matches!(
            parse("reboot now"),
            Err(ParseError::Grammar(GrammarError {
                kind: GrammarErrorKind::UnknownCommand { lexeme: "reboot" }
            }))
        ));
        assert!(matches!(
            parse("status now"),
            Err(ParseError::Grammar(GrammarError {
                kind: GrammarErrorKind::UnexpectedToken { .. }
            }))
        ));
    }

    #[test]
    fn lexer_emits_error_token_for_unknown_symbol() {
        let tokens = lex("freq 8700$").expect("lexing should succeed");
        let last = tokens.last().expect("expected at least one token");
        assert_eq!(last.kind, TokenKind::Error);
        assert_eq!(last.lexeme, "$");
    }
}
