//! The contract between the host's lexer and this parser.
//!
//! The lexer classifies source text into [`Token`]s ahead of time; the
//! parser never sees raw characters. Literal values arrive already parsed
//! into the native representation, and every token carries the source
//! location diagnostics will point at.

use crate::Type;
use std::sync::Arc;

/// Position of a token in the effect source.
///
/// `source` is the file name the preprocessor attributed the line to, so
/// tokens from different `#line` regions may disagree about it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SourceLocation {
    pub source: Arc<str>,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(source: impl Into<Arc<str>>, line: u32, column: u32) -> Self {
        SourceLocation {
            source: source.into(),
            line,
            column,
        }
    }
}

/// A classified token.
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub value: TokenValue,
    pub location: SourceLocation,
}

impl Token {
    pub fn new(value: TokenValue, location: SourceLocation) -> Self {
        Token { value, location }
    }
}

/// Everything the lexer can produce.
///
/// Type keywords (`float4`, `bool2x2`, `texture`, ...) arrive pre-resolved
/// as [`TokenValue::TypeName`]; only the generic `vector`/`matrix` forms
/// need further parsing.
#[derive(Clone, Debug, PartialEq)]
pub enum TokenValue {
    Identifier(String),

    IntConstant(i32),
    UintConstant(u32),
    FloatConstant(f32),
    DoubleConstant(f64),
    StringConstant(String),
    BoolConstant(bool),

    TypeName(Type),
    Vector,
    Matrix,

    Struct,
    Namespace,
    Technique,
    Pass,

    If,
    Else,
    Switch,
    Case,
    Default,
    For,
    While,
    Do,
    Break,
    Continue,
    Return,
    Discard,

    Extern,
    Static,
    Uniform,
    Volatile,
    Precise,
    In,
    Out,
    InOut,
    Const,
    Linear,
    NoPerspective,
    Centroid,
    NoInterpolation,

    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    LeftAngle,
    RightAngle,

    Comma,
    Semicolon,
    Colon,
    ColonColon,
    Dot,
    Question,

    Bang,
    Tilde,
    Plus,
    Dash,
    Star,
    Slash,
    Percent,
    Ampersand,
    VerticalBar,
    Caret,

    Assign,
    Equal,
    NotEqual,
    LessEqual,
    GreaterEqual,
    LeftShift,
    RightShift,
    LogicalAnd,
    LogicalOr,
    Increment,
    Decrement,

    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    LeftShiftAssign,
    RightShiftAssign,
    AndAssign,
    XorAssign,
    OrAssign,

    End,
}

impl std::fmt::Display for TokenValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match *self {
            TokenValue::Identifier(ref name) => name.as_str(),
            TokenValue::IntConstant(_) | TokenValue::UintConstant(_) => "integer literal",
            TokenValue::FloatConstant(_) | TokenValue::DoubleConstant(_) => "floating point literal",
            TokenValue::StringConstant(_) => "string literal",
            TokenValue::BoolConstant(true) => "true",
            TokenValue::BoolConstant(false) => "false",
            TokenValue::TypeName(_) => "type name",
            TokenValue::Vector => "vector",
            TokenValue::Matrix => "matrix",
            TokenValue::Struct => "struct",
            TokenValue::Namespace => "namespace",
            TokenValue::Technique => "technique",
            TokenValue::Pass => "pass",
            TokenValue::If => "if",
            TokenValue::Else => "else",
            TokenValue::Switch => "switch",
            TokenValue::Case => "case",
            TokenValue::Default => "default",
            TokenValue::For => "for",
            TokenValue::While => "while",
            TokenValue::Do => "do",
            TokenValue::Break => "break",
            TokenValue::Continue => "continue",
            TokenValue::Return => "return",
            TokenValue::Discard => "discard",
            TokenValue::Extern => "extern",
            TokenValue::Static => "static",
            TokenValue::Uniform => "uniform",
            TokenValue::Volatile => "volatile",
            TokenValue::Precise => "precise",
            TokenValue::In => "in",
            TokenValue::Out => "out",
            TokenValue::InOut => "inout",
            TokenValue::Const => "const",
            TokenValue::Linear => "linear",
            TokenValue::NoPerspective => "noperspective",
            TokenValue::Centroid => "centroid",
            TokenValue::NoInterpolation => "nointerpolation",
            TokenValue::LeftParen => "(",
            TokenValue::RightParen => ")",
            TokenValue::LeftBrace => "{",
            TokenValue::RightBrace => "}",
            TokenValue::LeftBracket => "[",
            TokenValue::RightBracket => "]",
            TokenValue::LeftAngle => "<",
            TokenValue::RightAngle => ">",
            TokenValue::Comma => ",",
            TokenValue::Semicolon => ";",
            TokenValue::Colon => ":",
            TokenValue::ColonColon => "::",
            TokenValue::Dot => ".",
            TokenValue::Question => "?",
            TokenValue::Bang => "!",
            TokenValue::Tilde => "~",
            TokenValue::Plus => "+",
            TokenValue::Dash => "-",
            TokenValue::Star => "*",
            TokenValue::Slash => "/",
            TokenValue::Percent => "%",
            TokenValue::Ampersand => "&",
            TokenValue::VerticalBar => "|",
            TokenValue::Caret => "^",
            TokenValue::Assign => "=",
            TokenValue::Equal => "==",
            TokenValue::NotEqual => "!=",
            TokenValue::LessEqual => "<=",
            TokenValue::GreaterEqual => ">=",
            TokenValue::LeftShift => "<<",
            TokenValue::RightShift => ">>",
            TokenValue::LogicalAnd => "&&",
            TokenValue::LogicalOr => "||",
            TokenValue::Increment => "++",
            TokenValue::Decrement => "--",
            TokenValue::AddAssign => "+=",
            TokenValue::SubAssign => "-=",
            TokenValue::MulAssign => "*=",
            TokenValue::DivAssign => "/=",
            TokenValue::ModAssign => "%=",
            TokenValue::LeftShiftAssign => "<<=",
            TokenValue::RightShiftAssign => ">>=",
            TokenValue::AndAssign => "&=",
            TokenValue::XorAssign => "^=",
            TokenValue::OrAssign => "|=",
            TokenValue::End => "end of file",
        };
        f.write_str(name)
    }
}

/// Cursor over the pre-lexed token stream.
///
/// Cloning the cursor position is how the parser implements speculative
/// parsing: a snapshot taken before a lookahead replays every token that
/// was consumed after it, including the one-token lookahead window.
#[derive(Clone, Debug)]
pub struct TokenStream {
    tokens: Vec<Token>,
    position: usize,
}

impl TokenStream {
    pub fn new(tokens: Vec<Token>) -> Self {
        TokenStream {
            tokens,
            position: 0,
        }
    }

    /// The next token, or an `End` token once the stream is exhausted.
    pub(crate) fn next(&mut self) -> Token {
        match self.tokens.get(self.position) {
            Some(token) => {
                self.position += 1;
                token.clone()
            }
            None => {
                let location = self
                    .tokens
                    .last()
                    .map(|token| token.location.clone())
                    .unwrap_or_default();
                Token::new(TokenValue::End, location)
            }
        }
    }

    pub(crate) const fn position(&self) -> usize {
        self.position
    }

    pub(crate) fn set_position(&mut self, position: usize) {
        self.position = position;
    }
}
