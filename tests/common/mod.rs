//! Shared helpers for the integration tests: a small lexer producing the
//! token stream the compiler consumes, and a walker over the serialized
//! SPIR-V words.

// Each test binary uses a different subset of these helpers.
#![allow(dead_code)]

use effectfx::{
    BaseType, Frontend, Module, Options, ParseErrors, SourceLocation, Token, TokenValue, Type,
};

fn keyword(word: &str) -> Option<TokenValue> {
    let value = match word {
        "true" => TokenValue::BoolConstant(true),
        "false" => TokenValue::BoolConstant(false),
        "void" => TokenValue::TypeName(Type::VOID),
        "string" => TokenValue::TypeName(Type::STRING),
        "texture" => TokenValue::TypeName(Type::TEXTURE),
        "sampler" => TokenValue::TypeName(Type::SAMPLER),
        "vector" => TokenValue::Vector,
        "matrix" => TokenValue::Matrix,
        "struct" => TokenValue::Struct,
        "namespace" => TokenValue::Namespace,
        "technique" => TokenValue::Technique,
        "pass" => TokenValue::Pass,
        "if" => TokenValue::If,
        "else" => TokenValue::Else,
        "switch" => TokenValue::Switch,
        "case" => TokenValue::Case,
        "default" => TokenValue::Default,
        "for" => TokenValue::For,
        "while" => TokenValue::While,
        "do" => TokenValue::Do,
        "break" => TokenValue::Break,
        "continue" => TokenValue::Continue,
        "return" => TokenValue::Return,
        "discard" => TokenValue::Discard,
        "extern" => TokenValue::Extern,
        "static" => TokenValue::Static,
        "uniform" => TokenValue::Uniform,
        "volatile" => TokenValue::Volatile,
        "precise" => TokenValue::Precise,
        "in" => TokenValue::In,
        "out" => TokenValue::Out,
        "inout" => TokenValue::InOut,
        "const" => TokenValue::Const,
        "linear" => TokenValue::Linear,
        "noperspective" => TokenValue::NoPerspective,
        "centroid" => TokenValue::Centroid,
        "nointerpolation" => TokenValue::NoInterpolation,
        _ => return numeric_type(word),
    };
    Some(value)
}

fn numeric_type(word: &str) -> Option<TokenValue> {
    for (name, base) in [
        ("bool", BaseType::Bool),
        ("int", BaseType::Int),
        ("uint", BaseType::Uint),
        ("float", BaseType::Float),
    ] {
        let Some(suffix) = word.strip_prefix(name) else {
            continue;
        };
        let ty = match suffix.as_bytes() {
            [] => Type::scalar(base),
            [n @ b'1'..=b'4'] => Type::vector(base, (n - b'0') as u32),
            [r @ b'1'..=b'4', b'x', c @ b'1'..=b'4'] => {
                Type::matrix(base, (r - b'0') as u32, (c - b'0') as u32)
            }
            _ => return None,
        };
        return Some(TokenValue::TypeName(ty));
    }
    None
}

/// Classify `source` into the token stream the parser consumes.
pub fn tokenize(source: &str) -> Vec<Token> {
    let bytes = source.as_bytes();
    let mut tokens = vec![];
    let mut at = 0;
    let mut line = 1u32;
    let mut line_start = 0usize;

    while at < bytes.len() {
        let c = bytes[at];
        if c == b'\n' {
            line += 1;
            at += 1;
            line_start = at;
            continue;
        }
        if c.is_ascii_whitespace() {
            at += 1;
            continue;
        }
        if bytes[at..].starts_with(b"//") {
            while at < bytes.len() && bytes[at] != b'\n' {
                at += 1;
            }
            continue;
        }
        if bytes[at..].starts_with(b"/*") {
            at += 2;
            while at < bytes.len() && !bytes[at..].starts_with(b"*/") {
                if bytes[at] == b'\n' {
                    line += 1;
                    line_start = at + 1;
                }
                at += 1;
            }
            at = (at + 2).min(bytes.len());
            continue;
        }

        let location = SourceLocation::new("test.fx", line, (at - line_start) as u32 + 1);
        let start = at;

        let value = if c.is_ascii_alphabetic() || c == b'_' {
            while at < bytes.len() && (bytes[at].is_ascii_alphanumeric() || bytes[at] == b'_') {
                at += 1;
            }
            let word = &source[start..at];
            keyword(word).unwrap_or_else(|| TokenValue::Identifier(word.to_owned()))
        } else if c.is_ascii_digit()
            || (c == b'.' && bytes.get(at + 1).is_some_and(u8::is_ascii_digit))
        {
            let mut floating = false;
            while at < bytes.len() {
                match bytes[at] {
                    b'0'..=b'9' => at += 1,
                    b'.' => {
                        floating = true;
                        at += 1;
                    }
                    b'e' | b'E' => {
                        floating = true;
                        at += 1;
                        if matches!(bytes.get(at), Some(b'+') | Some(b'-')) {
                            at += 1;
                        }
                    }
                    _ => break,
                }
            }
            let digits = &source[start..at];
            match bytes.get(at) {
                Some(b'f') | Some(b'F') => {
                    at += 1;
                    TokenValue::FloatConstant(digits.parse().unwrap())
                }
                Some(b'l') | Some(b'L') => {
                    at += 1;
                    TokenValue::DoubleConstant(digits.parse().unwrap())
                }
                Some(b'u') | Some(b'U') => {
                    at += 1;
                    TokenValue::UintConstant(digits.parse().unwrap())
                }
                _ if floating => TokenValue::FloatConstant(digits.parse().unwrap()),
                _ => TokenValue::IntConstant(digits.parse().unwrap()),
            }
        } else if c == b'"' {
            at += 1;
            let text_start = at;
            while at < bytes.len() && bytes[at] != b'"' {
                at += 1;
            }
            let text = source[text_start..at].to_owned();
            at = (at + 1).min(bytes.len());
            TokenValue::StringConstant(text)
        } else {
            let table: &[(&str, TokenValue)] = &[
                ("<<=", TokenValue::LeftShiftAssign),
                (">>=", TokenValue::RightShiftAssign),
                ("<<", TokenValue::LeftShift),
                (">>", TokenValue::RightShift),
                ("<=", TokenValue::LessEqual),
                (">=", TokenValue::GreaterEqual),
                ("==", TokenValue::Equal),
                ("!=", TokenValue::NotEqual),
                ("&&", TokenValue::LogicalAnd),
                ("||", TokenValue::LogicalOr),
                ("++", TokenValue::Increment),
                ("--", TokenValue::Decrement),
                ("+=", TokenValue::AddAssign),
                ("-=", TokenValue::SubAssign),
                ("*=", TokenValue::MulAssign),
                ("/=", TokenValue::DivAssign),
                ("%=", TokenValue::ModAssign),
                ("&=", TokenValue::AndAssign),
                ("|=", TokenValue::OrAssign),
                ("^=", TokenValue::XorAssign),
                ("::", TokenValue::ColonColon),
                ("(", TokenValue::LeftParen),
                (")", TokenValue::RightParen),
                ("{", TokenValue::LeftBrace),
                ("}", TokenValue::RightBrace),
                ("[", TokenValue::LeftBracket),
                ("]", TokenValue::RightBracket),
                ("<", TokenValue::LeftAngle),
                (">", TokenValue::RightAngle),
                (",", TokenValue::Comma),
                (";", TokenValue::Semicolon),
                (":", TokenValue::Colon),
                (".", TokenValue::Dot),
                ("?", TokenValue::Question),
                ("!", TokenValue::Bang),
                ("~", TokenValue::Tilde),
                ("+", TokenValue::Plus),
                ("-", TokenValue::Dash),
                ("*", TokenValue::Star),
                ("/", TokenValue::Slash),
                ("%", TokenValue::Percent),
                ("&", TokenValue::Ampersand),
                ("|", TokenValue::VerticalBar),
                ("^", TokenValue::Caret),
                ("=", TokenValue::Assign),
            ];
            let (text, value) = table
                .iter()
                .find(|(text, _)| source[at..].starts_with(text))
                .unwrap_or_else(|| panic!("unlexable character {:?}", c as char));
            at += text.len();
            value.clone()
        };

        tokens.push(Token::new(value, location));
    }

    tokens
}

pub fn compile(source: &str) -> Module {
    compile_with(source, &Options::default())
}

pub fn compile_with(source: &str, options: &Options) -> Module {
    match Frontend::new(options).compile(tokenize(source)) {
        Ok(module) => module,
        Err(errors) => panic!("compilation failed:\n{}", errors.log),
    }
}

pub fn compile_errors(source: &str) -> ParseErrors {
    match Frontend::new(&Options::default()).compile(tokenize(source)) {
        Ok(_) => panic!("expected compilation to fail"),
        Err(errors) => errors,
    }
}

pub fn has_error_code(errors: &ParseErrors, code: u32) -> bool {
    errors.errors.iter().any(|error| error.code == code)
}

/// Split the word stream into `(opcode, operand words)` pairs, skipping
/// the module header.
pub fn instructions(words: &[u32]) -> Vec<(u32, Vec<u32>)> {
    assert_eq!(words[0], 0x0723_0203, "bad magic number");
    let mut result = vec![];
    let mut at = 5;
    while at < words.len() {
        let word = words[at];
        let count = (word >> 16) as usize;
        assert!(count > 0, "zero length instruction at word {at}");
        assert!(at + count <= words.len(), "truncated instruction");
        result.push((word & 0xFFFF, words[at + 1..at + count].to_vec()));
        at += count;
    }
    result
}

pub fn count_op(words: &[u32], op: spirv::Op) -> usize {
    instructions(words)
        .iter()
        .filter(|&&(opcode, _)| opcode == op as u32)
        .count()
}

pub fn find_ops(words: &[u32], op: spirv::Op) -> Vec<Vec<u32>> {
    instructions(words)
        .into_iter()
        .filter(|&(opcode, _)| opcode == op as u32)
        .map(|(_, operands)| operands)
        .collect()
}

/// Whether a packed string (as SPIR-V encodes literals) occurs anywhere in
/// the module.
pub fn contains_packed_string(words: &[u32], text: &str) -> bool {
    let bytes = text.as_bytes();
    let mut packed: Vec<u32> = bytes
        .chunks(4)
        .map(|chunk| {
            chunk
                .iter()
                .rev()
                .fold(0u32, |word, &byte| (word << 8) | byte as u32)
        })
        .collect();
    if bytes.len() % 4 == 0 {
        packed.push(0);
    }
    words
        .windows(packed.len())
        .any(|window| window == packed.as_slice())
}
