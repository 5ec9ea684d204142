//! Lexer/Scanner for Iodine source code.

use tracing::trace;

use crate::error::{ErrorLog, LexerError};
use crate::lexer::token::{Token, TokenKind};
use crate::span::Span;

/// The lexer transforms source code into a stream of tokens.
pub struct Scanner<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    current_pos: usize,
    line: usize,
    column: usize,
    start_pos: usize,
    start_line: usize,
    start_column: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            current_pos: 0,
            line: 1,
            column: 1,
            start_pos: 0,
            start_line: 1,
            start_column: 1,
        }
    }

    /// Scan all tokens from the source.
    ///
    /// Bad characters are reported to `log` and skipped, so a single pass
    /// surfaces every lexical error. The stream always ends with `Eof`.
    pub fn scan_tokens(&mut self, log: &mut ErrorLog) -> Vec<Token> {
        let mut tokens = Vec::new();

        loop {
            match self.scan_token() {
                Ok(token) => {
                    let is_eof = token.kind == TokenKind::Eof;
                    tokens.push(token);
                    if is_eof {
                        break;
                    }
                }
                Err(err) => log.push(err),
            }
        }

        trace!(count = tokens.len(), "scanned tokens");
        tokens
    }

    /// Scan the next token.
    pub fn scan_token(&mut self) -> Result<Token, LexerError> {
        self.skip_whitespace_and_comments()?;
        self.mark_start();

        let Some((_, c)) = self.advance() else {
            return Ok(Token::eof(self.current_pos, self.line, self.column));
        };

        if let Some(kind) = punctuation(c) {
            return Ok(self.make_token(kind));
        }

        let kind = match c {
            '+' => self.either(&[('=', TokenKind::PlusEqual)], TokenKind::Plus),
            '-' => self.either(&[('=', TokenKind::MinusEqual)], TokenKind::Minus),
            '*' => self.either(&[('=', TokenKind::StarEqual)], TokenKind::Star),
            '/' => self.either(&[('=', TokenKind::SlashEqual)], TokenKind::Slash),
            '%' => self.either(&[('=', TokenKind::PercentEqual)], TokenKind::Percent),
            '!' => self.either(&[('=', TokenKind::BangEqual)], TokenKind::Bang),
            '&' => self.either(&[('&', TokenKind::And)], TokenKind::Ampersand),
            '|' => self.either(&[('|', TokenKind::Or)], TokenKind::Pipe),
            '=' => self.either(
                &[('=', TokenKind::EqualEqual), ('>', TokenKind::FatArrow)],
                TokenKind::Equal,
            ),
            '<' => self.either(
                &[('=', TokenKind::LessEqual), ('<', TokenKind::LessLess)],
                TokenKind::Less,
            ),
            '>' => self.either(
                &[('=', TokenKind::GreaterEqual), ('>', TokenKind::GreaterGreater)],
                TokenKind::Greater,
            ),
            '"' | '\'' => return self.scan_string(c),
            c if c.is_ascii_digit() => return self.scan_number(c),
            c if c.is_alphabetic() || c == '_' => return Ok(self.scan_identifier(c)),
            _ => return Err(LexerError::unexpected_char(c, self.current_span())),
        };
        Ok(self.make_token(kind))
    }

    /// Consume the first listed follower that is next in the source and
    /// return its kind, or `single` when none matches.
    fn either(&mut self, followers: &[(char, TokenKind)], single: TokenKind) -> TokenKind {
        for (next, kind) in followers {
            if self.match_char(*next) {
                return kind.clone();
            }
        }
        single
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), LexerError> {
        loop {
            match self.peek() {
                Some(' ' | '\t' | '\r') => {
                    self.advance();
                }
                Some('\n') => {
                    self.newline();
                }
                Some('/') => {
                    if self.peek_next() == Some('/') {
                        while self.peek().is_some() && self.peek() != Some('\n') {
                            self.advance();
                        }
                    } else if self.peek_next() == Some('*') {
                        self.mark_start();
                        self.advance();
                        self.advance();
                        let mut depth = 1;
                        while depth > 0 {
                            match self.peek() {
                                None => {
                                    return Err(LexerError::UnterminatedComment(
                                        self.current_span(),
                                    ))
                                }
                                Some('*') if self.peek_next() == Some('/') => {
                                    self.advance();
                                    self.advance();
                                    depth -= 1;
                                }
                                Some('/') if self.peek_next() == Some('*') => {
                                    self.advance();
                                    self.advance();
                                    depth += 1;
                                }
                                Some('\n') => self.newline(),
                                _ => {
                                    self.advance();
                                }
                            }
                        }
                    } else {
                        return Ok(());
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn scan_string(&mut self, quote: char) -> Result<Token, LexerError> {
        let mut value = String::new();

        loop {
            match self.peek() {
                None | Some('\n') => {
                    return Err(LexerError::unterminated_string(self.current_span()));
                }
                Some(c) if c == quote => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    let escaped = match self.peek() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('0') => '\0',
                        Some('\\') => '\\',
                        Some('"') => '"',
                        Some('\'') => '\'',
                        Some(c) => {
                            self.advance();
                            return Err(LexerError::invalid_escape(c, self.current_span()));
                        }
                        None => {
                            return Err(LexerError::unterminated_string(self.current_span()));
                        }
                    };
                    self.advance();
                    value.push(escaped);
                }
                Some(c) => {
                    self.advance();
                    value.push(c);
                }
            }
        }

        Ok(self.make_token(TokenKind::StringLiteral(value)))
    }

    fn scan_number(&mut self, first: char) -> Result<Token, LexerError> {
        if first == '0' && matches!(self.peek(), Some('x' | 'X')) {
            self.advance();
            let mut digits = String::new();
            while let Some(c) = self.peek() {
                if c.is_ascii_hexdigit() {
                    digits.push(c);
                    self.advance();
                } else if c == '_' {
                    self.advance();
                } else {
                    break;
                }
            }
            let n = i64::from_str_radix(&digits, 16)
                .map_err(|_| LexerError::invalid_number(format!("0x{}", digits), self.current_span()))?;
            return Ok(self.make_token(TokenKind::IntLiteral(n)));
        }

        let mut value = String::from(first);
        let mut is_float = false;

        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                value.push(c);
                self.advance();
            } else if c == '.' && !is_float {
                // `1.foo()` is a call on an integer, not a float
                match self.peek_next() {
                    Some(next) if next.is_ascii_digit() => {
                        is_float = true;
                        value.push(c);
                        self.advance();
                    }
                    _ => break,
                }
            } else if c == '_' {
                self.advance();
            } else {
                break;
            }
        }

        if is_float {
            let n: f64 = value
                .parse()
                .map_err(|_| LexerError::invalid_number(value.clone(), self.current_span()))?;
            Ok(self.make_token(TokenKind::FloatLiteral(n)))
        } else {
            let n: i64 = value
                .parse()
                .map_err(|_| LexerError::invalid_number(value.clone(), self.current_span()))?;
            Ok(self.make_token(TokenKind::IntLiteral(n)))
        }
    }

    fn scan_identifier(&mut self, first: char) -> Token {
        let mut value = String::from(first);

        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                value.push(c);
                self.advance();
            } else {
                break;
            }
        }

        let kind = TokenKind::keyword(&value).unwrap_or(TokenKind::Identifier(value));
        self.make_token(kind)
    }

    fn advance(&mut self) -> Option<(usize, char)> {
        if let Some((pos, c)) = self.chars.next() {
            self.current_pos = pos + c.len_utf8();
            self.column += 1;
            Some((pos, c))
        } else {
            None
        }
    }

    fn newline(&mut self) {
        self.advance();
        self.line += 1;
        self.column = 1;
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn peek_next(&self) -> Option<char> {
        let mut iter = self.source[self.current_pos..].chars();
        iter.next();
        iter.next()
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn mark_start(&mut self) {
        self.start_pos = self.current_pos;
        self.start_line = self.line;
        self.start_column = self.column;
    }

    fn current_span(&self) -> Span {
        Span::new(
            self.start_pos,
            self.current_pos,
            self.start_line,
            self.start_column,
        )
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        Token::new(kind, self.current_span())
    }
}

fn punctuation(c: char) -> Option<TokenKind> {
    let kind = match c {
        '(' => TokenKind::LeftParen,
        ')' => TokenKind::RightParen,
        '{' => TokenKind::LeftBrace,
        '}' => TokenKind::RightBrace,
        '[' => TokenKind::LeftBracket,
        ']' => TokenKind::RightBracket,
        ',' => TokenKind::Comma,
        '.' => TokenKind::Dot,
        ':' => TokenKind::Colon,
        ';' => TokenKind::Semicolon,
        '~' => TokenKind::Tilde,
        '^' => TokenKind::Caret,
        _ => return None,
    };
    Some(kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(source: &str) -> Vec<TokenKind> {
        let mut log = ErrorLog::new();
        let tokens = Scanner::new(source).scan_tokens(&mut log);
        assert!(log.is_empty(), "unexpected lexer errors: {}", log);
        tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_basic_tokens() {
        assert_eq!(
            scan("(){}[]"),
            vec![
                TokenKind::LeftParen,
                TokenKind::RightParen,
                TokenKind::LeftBrace,
                TokenKind::RightBrace,
                TokenKind::LeftBracket,
                TokenKind::RightBracket,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            scan("42 3.14 1_000 0xff"),
            vec![
                TokenKind::IntLiteral(42),
                TokenKind::FloatLiteral(3.14),
                TokenKind::IntLiteral(1000),
                TokenKind::IntLiteral(255),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_integer_method_call_is_not_float() {
        assert_eq!(
            scan("1.str"),
            vec![
                TokenKind::IntLiteral(1),
                TokenKind::Dot,
                TokenKind::Identifier("str".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_strings_and_escapes() {
        assert_eq!(
            scan(r#""a\tb" 'it\'s'"#),
            vec![
                TokenKind::StringLiteral("a\tb".to_string()),
                TokenKind::StringLiteral("it's".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_keywords() {
        assert_eq!(
            scan("func lambda foreach except self use"),
            vec![
                TokenKind::Func,
                TokenKind::Lambda,
                TokenKind::Foreach,
                TokenKind::Except,
                TokenKind::SelfKw,
                TokenKind::Use,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            scan("+= == => << >> >= && | ~"),
            vec![
                TokenKind::PlusEqual,
                TokenKind::EqualEqual,
                TokenKind::FatArrow,
                TokenKind::LessLess,
                TokenKind::GreaterGreater,
                TokenKind::GreaterEqual,
                TokenKind::And,
                TokenKind::Pipe,
                TokenKind::Tilde,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comments() {
        assert_eq!(
            scan("a // line\n/* block /* nested */ */ b"),
            vec![
                TokenKind::Identifier("a".to_string()),
                TokenKind::Identifier("b".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_line_tracking() {
        let mut log = ErrorLog::new();
        let tokens = Scanner::new("a\n  b").scan_tokens(&mut log);
        assert_eq!(tokens[1].span.line, 2);
        assert_eq!(tokens[1].span.column, 3);
    }

    #[test]
    fn test_errors_are_collected() {
        let mut log = ErrorLog::new();
        let tokens = Scanner::new("a @ b $ c").scan_tokens(&mut log);
        assert_eq!(log.len(), 2);
        assert_eq!(tokens.len(), 4);
    }

    #[test]
    fn test_unterminated_string() {
        let mut log = ErrorLog::new();
        Scanner::new("\"open").scan_tokens(&mut log);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_token_display_matches_source() {
        assert_eq!(TokenKind::Foreach.to_string(), "foreach");
        assert_eq!(TokenKind::BoolLiteral(false).to_string(), "false");
        assert_eq!(TokenKind::LeftBrace.to_string(), "{");
        assert_eq!(TokenKind::GreaterGreater.to_string(), ">>");
    }
}
