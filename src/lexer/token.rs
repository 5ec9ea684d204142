//! Token definitions for the Iodine lexer.

use crate::span::Span;

/// All token types in Iodine.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    IntLiteral(i64),
    FloatLiteral(f64),
    StringLiteral(String),
    BoolLiteral(bool),

    // Identifiers and keywords
    Identifier(String),

    // Keywords
    Func,
    Lambda,
    Class,
    Enum,
    Interface,
    Static,
    SelfKw,
    Super,
    Return,
    If,
    Else,
    While,
    For,
    Foreach,
    In,
    Break,
    Continue,
    Raise,
    Try,
    Except,
    Switch,
    Case,
    Default,
    Use,
    From,
    Is,
    Null,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Equal,
    PlusEqual,
    MinusEqual,
    StarEqual,
    SlashEqual,
    PercentEqual,
    EqualEqual,
    BangEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    LessLess,
    GreaterGreater,
    Bang,
    Tilde,
    Ampersand,
    Pipe,
    Caret,
    And,
    Or,

    // Delimiters
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Comma,
    Dot,
    Colon,
    Semicolon,
    FatArrow, // =>

    // Special
    Eof,
}

/// Reserved words, including the literal keywords.
const KEYWORDS: &[(&str, TokenKind)] = &[
    ("func", TokenKind::Func),
    ("lambda", TokenKind::Lambda),
    ("class", TokenKind::Class),
    ("enum", TokenKind::Enum),
    ("interface", TokenKind::Interface),
    ("static", TokenKind::Static),
    ("self", TokenKind::SelfKw),
    ("super", TokenKind::Super),
    ("return", TokenKind::Return),
    ("if", TokenKind::If),
    ("else", TokenKind::Else),
    ("while", TokenKind::While),
    ("for", TokenKind::For),
    ("foreach", TokenKind::Foreach),
    ("in", TokenKind::In),
    ("break", TokenKind::Break),
    ("continue", TokenKind::Continue),
    ("raise", TokenKind::Raise),
    ("try", TokenKind::Try),
    ("except", TokenKind::Except),
    ("switch", TokenKind::Switch),
    ("case", TokenKind::Case),
    ("default", TokenKind::Default),
    ("use", TokenKind::Use),
    ("from", TokenKind::From),
    ("is", TokenKind::Is),
    ("null", TokenKind::Null),
    ("true", TokenKind::BoolLiteral(true)),
    ("false", TokenKind::BoolLiteral(false)),
];

impl TokenKind {
    /// The keyword token spelled `ident`, if it is reserved.
    pub fn keyword(ident: &str) -> Option<TokenKind> {
        KEYWORDS
            .iter()
            .find(|entry| entry.0 == ident)
            .map(|entry| entry.1.clone())
    }

    /// Source text of tokens that always look the same.
    pub fn lexeme(&self) -> Option<&'static str> {
        if let Some(entry) = KEYWORDS.iter().find(|entry| entry.1 == *self) {
            return Some(entry.0);
        }
        let text = match self {
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Equal => "=",
            TokenKind::PlusEqual => "+=",
            TokenKind::MinusEqual => "-=",
            TokenKind::StarEqual => "*=",
            TokenKind::SlashEqual => "/=",
            TokenKind::PercentEqual => "%=",
            TokenKind::EqualEqual => "==",
            TokenKind::BangEqual => "!=",
            TokenKind::Less => "<",
            TokenKind::LessEqual => "<=",
            TokenKind::Greater => ">",
            TokenKind::GreaterEqual => ">=",
            TokenKind::LessLess => "<<",
            TokenKind::GreaterGreater => ">>",
            TokenKind::Bang => "!",
            TokenKind::Tilde => "~",
            TokenKind::Ampersand => "&",
            TokenKind::Pipe => "|",
            TokenKind::Caret => "^",
            TokenKind::And => "&&",
            TokenKind::Or => "||",
            TokenKind::LeftParen => "(",
            TokenKind::RightParen => ")",
            TokenKind::LeftBrace => "{",
            TokenKind::RightBrace => "}",
            TokenKind::LeftBracket => "[",
            TokenKind::RightBracket => "]",
            TokenKind::Comma => ",",
            TokenKind::Dot => ".",
            TokenKind::Colon => ":",
            TokenKind::Semicolon => ";",
            TokenKind::FatArrow => "=>",
            TokenKind::Eof => "end of input",
            _ => return None,
        };
        Some(text)
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::IntLiteral(n) => write!(f, "{}", n),
            TokenKind::FloatLiteral(n) => write!(f, "{}", n),
            TokenKind::StringLiteral(s) => write!(f, "\"{}\"", s),
            TokenKind::Identifier(s) => f.write_str(s),
            other => f.write_str(other.lexeme().unwrap_or("?")),
        }
    }
}

/// A token with its kind and source location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn eof(position: usize, line: usize, column: usize) -> Self {
        Self {
            kind: TokenKind::Eof,
            span: Span::new(position, position, line, column),
        }
    }
}
