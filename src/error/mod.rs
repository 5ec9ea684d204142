//! Error types for all compilation phases, plus the log that collects them.

use std::fmt;

use crate::span::Span;
use thiserror::Error;

/// Lexer errors.
#[derive(Debug, Error)]
pub enum LexerError {
    #[error("Unexpected character '{0}' at {1}")]
    UnexpectedChar(char, Span),

    #[error("Unterminated string at {0}")]
    UnterminatedString(Span),

    #[error("Unterminated block comment at {0}")]
    UnterminatedComment(Span),

    #[error("Invalid escape sequence '\\{0}' at {1}")]
    InvalidEscape(char, Span),

    #[error("Invalid number '{0}' at {1}")]
    InvalidNumber(String, Span),
}

impl LexerError {
    pub fn unexpected_char(c: char, span: Span) -> Self {
        Self::UnexpectedChar(c, span)
    }

    pub fn unterminated_string(span: Span) -> Self {
        Self::UnterminatedString(span)
    }

    pub fn invalid_escape(c: char, span: Span) -> Self {
        Self::InvalidEscape(c, span)
    }

    pub fn invalid_number(s: String, span: Span) -> Self {
        Self::InvalidNumber(s, span)
    }

    pub fn span(&self) -> Span {
        match self {
            Self::UnexpectedChar(_, span) => *span,
            Self::UnterminatedString(span) => *span,
            Self::UnterminatedComment(span) => *span,
            Self::InvalidEscape(_, span) => *span,
            Self::InvalidNumber(_, span) => *span,
        }
    }
}

/// Parser errors.
#[derive(Debug, Error)]
pub enum ParserError {
    #[error("Unexpected token '{found}', expected {expected} at {span}")]
    UnexpectedToken {
        expected: String,
        found: String,
        span: Span,
    },

    #[error("Unexpected end of file at {0}")]
    UnexpectedEof(Span),

    #[error("Invalid assignment target at {0}")]
    InvalidAssignmentTarget(Span),

    #[error("{message} at {span}")]
    General { message: String, span: Span },
}

impl ParserError {
    pub fn unexpected_token(
        expected: impl Into<String>,
        found: impl Into<String>,
        span: Span,
    ) -> Self {
        Self::UnexpectedToken {
            expected: expected.into(),
            found: found.into(),
            span,
        }
    }

    pub fn unexpected_eof(span: Span) -> Self {
        Self::UnexpectedEof(span)
    }

    pub fn invalid_assignment_target(span: Span) -> Self {
        Self::InvalidAssignmentTarget(span)
    }

    pub fn general(message: impl Into<String>, span: Span) -> Self {
        Self::General {
            message: message.into(),
            span,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Self::UnexpectedToken { span, .. } => *span,
            Self::UnexpectedEof(span) => *span,
            Self::InvalidAssignmentTarget(span) => *span,
            Self::General { span, .. } => *span,
        }
    }
}

/// Structural misuse found while resolving scopes.
#[derive(Debug, Error)]
pub enum SemanticError {
    #[error("Statement '{0}' is only allowed inside a function body at {1}")]
    StatementOutsideFunction(&'static str, Span),

    #[error("Function '{0}' cannot be declared inside another function, use a lambda at {1}")]
    NestedFunction(String, Span),

    #[error("'use' is only allowed at module level at {0}")]
    UseOutsideModule(Span),

    #[error("'break' outside of a loop or switch at {0}")]
    BreakOutsideLoop(Span),

    #[error("'continue' outside of a loop at {0}")]
    ContinueOutsideLoop(Span),

    #[error("Cannot use 'self' outside of an instance method at {0}")]
    SelfOutsideMethod(Span),

    #[error("Cannot call 'super' outside of a constructor at {0}")]
    SuperOutsideConstructor(Span),

    #[error("Class '{0}' has no base class at {1}")]
    NoBaseClass(String, Span),

    #[error("Duplicate parameter '{0}' at {1}")]
    DuplicateParameter(String, Span),
}

impl SemanticError {
    pub fn span(&self) -> Span {
        match self {
            Self::StatementOutsideFunction(_, span) => *span,
            Self::NestedFunction(_, span) => *span,
            Self::UseOutsideModule(span) => *span,
            Self::BreakOutsideLoop(span) => *span,
            Self::ContinueOutsideLoop(span) => *span,
            Self::SelfOutsideMethod(span) => *span,
            Self::SuperOutsideConstructor(span) => *span,
            Self::NoBaseClass(_, span) => *span,
            Self::DuplicateParameter(_, span) => *span,
        }
    }
}

/// Bytecode compilation errors.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("'{0}' is already defined in this module at {1}")]
    DuplicateDefinition(String, Span),

    #[error("{message} at {span}")]
    General { message: String, span: Span },
}

impl CompileError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self::General {
            message: message.into(),
            span,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Self::DuplicateDefinition(_, span) => *span,
            Self::General { span, .. } => *span,
        }
    }
}

/// Runtime errors.
///
/// Inside the VM every variant is converted into an exception object that
/// `try/except` can catch; only uncaught ones leave the VM as errors.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Division by zero at {0}")]
    DivisionByZero(Span),

    #[error("Undefined variable '{0}' at {1}")]
    UndefinedVariable(String, Span),

    #[error("Value of type {0} is not callable at {1}")]
    NotCallable(String, Span),

    #[error("Wrong number of arguments: expected {expected}, got {got} at {span}")]
    WrongArity {
        expected: usize,
        got: usize,
        span: Span,
    },

    #[error("Type error: {message} at {span}")]
    TypeError { message: String, span: Span },

    #[error("Index out of bounds: {index} (length {length}) at {span}")]
    IndexOutOfBounds {
        index: i64,
        length: usize,
        span: Span,
    },

    #[error("Key not found: {key} at {span}")]
    KeyNotFound { key: String, span: Span },

    #[error("Cannot access attribute '{attribute}' on {value_type} at {span}")]
    NoSuchAttribute {
        value_type: String,
        attribute: String,
        span: Span,
    },

    #[error("Stack overflow: call depth exceeded {0} at {1}")]
    StackOverflow(usize, Span),

    #[error("Could not import module '{module}': {reason} at {span}")]
    Import {
        module: String,
        reason: String,
        span: Span,
    },

    #[error("Uncaught {kind}: {message} at {span}")]
    Uncaught {
        kind: String,
        message: String,
        span: Span,
    },

    #[error("{message} at {span}")]
    General { message: String, span: Span },
}

impl RuntimeError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self::General {
            message: message.into(),
            span,
        }
    }

    pub fn division_by_zero(span: Span) -> Self {
        Self::DivisionByZero(span)
    }

    pub fn undefined_variable(name: impl Into<String>, span: Span) -> Self {
        Self::UndefinedVariable(name.into(), span)
    }

    pub fn not_callable(type_name: impl Into<String>, span: Span) -> Self {
        Self::NotCallable(type_name.into(), span)
    }

    pub fn wrong_arity(expected: usize, got: usize, span: Span) -> Self {
        Self::WrongArity {
            expected,
            got,
            span,
        }
    }

    pub fn type_error(message: impl Into<String>, span: Span) -> Self {
        Self::TypeError {
            message: message.into(),
            span,
        }
    }

    pub fn no_such_attribute(
        value_type: impl Into<String>,
        attribute: impl Into<String>,
        span: Span,
    ) -> Self {
        Self::NoSuchAttribute {
            value_type: value_type.into(),
            attribute: attribute.into(),
            span,
        }
    }

    pub fn import(module: impl Into<String>, reason: impl Into<String>, span: Span) -> Self {
        Self::Import {
            module: module.into(),
            reason: reason.into(),
            span,
        }
    }

    /// Name of the exception kind a script sees when it catches this error.
    pub fn kind(&self) -> &str {
        match self {
            Self::DivisionByZero(_) => "DivisionByZeroException",
            Self::UndefinedVariable(..) => "UndefinedVariableException",
            Self::NotCallable(..) => "NotCallableException",
            Self::WrongArity { .. } => "ArgumentException",
            Self::TypeError { .. } => "TypeException",
            Self::IndexOutOfBounds { .. } => "IndexException",
            Self::KeyNotFound { .. } => "KeyNotFoundException",
            Self::NoSuchAttribute { .. } => "AttributeNotFoundException",
            Self::StackOverflow(..) => "StackOverflowException",
            Self::Import { .. } => "ModuleNotFoundException",
            Self::Uncaught { kind, .. } => kind,
            Self::General { .. } => "Exception",
        }
    }

    /// The message without the trailing source location.
    pub fn message(&self) -> String {
        match self {
            Self::Uncaught { message, .. } | Self::General { message, .. } => message.clone(),
            other => {
                let text = other.to_string();
                match text.rfind(" at line ") {
                    Some(idx) => text[..idx].to_string(),
                    None => text,
                }
            }
        }
    }

    /// Attach a source location to an error raised without one (natives).
    pub fn at(mut self, span: Span) -> Self {
        if self.span() == Span::default() {
            *self.span_mut() = span;
        }
        self
    }

    fn span_mut(&mut self) -> &mut Span {
        match self {
            Self::DivisionByZero(span) => span,
            Self::UndefinedVariable(_, span) => span,
            Self::NotCallable(_, span) => span,
            Self::WrongArity { span, .. } => span,
            Self::TypeError { span, .. } => span,
            Self::IndexOutOfBounds { span, .. } => span,
            Self::KeyNotFound { span, .. } => span,
            Self::NoSuchAttribute { span, .. } => span,
            Self::StackOverflow(_, span) => span,
            Self::Import { span, .. } => span,
            Self::Uncaught { span, .. } => span,
            Self::General { span, .. } => span,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Self::DivisionByZero(span) => *span,
            Self::UndefinedVariable(_, span) => *span,
            Self::NotCallable(_, span) => *span,
            Self::WrongArity { span, .. } => *span,
            Self::TypeError { span, .. } => *span,
            Self::IndexOutOfBounds { span, .. } => *span,
            Self::KeyNotFound { span, .. } => *span,
            Self::NoSuchAttribute { span, .. } => *span,
            Self::StackOverflow(_, span) => *span,
            Self::Import { span, .. } => *span,
            Self::Uncaught { span, .. } => *span,
            Self::General { span, .. } => *span,
        }
    }
}

/// A unified error type for all phases.
#[derive(Debug, Error)]
pub enum IodineError {
    #[error("Lexer error: {0}")]
    Lexer(#[from] LexerError),

    #[error("Parser error: {0}")]
    Parser(#[from] ParserError),

    #[error("Semantic error: {0}")]
    Semantic(#[from] SemanticError),

    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Every error reported by the phase that aborted the pipeline.
    #[error("{0}")]
    Compilation(ErrorLog),
}

/// Accumulates user-level errors so one run can report all of them.
///
/// Each phase pushes into the log and keeps going; the driver calls
/// [`ErrorLog::check`] between phases and stops at the first non-empty log.
#[derive(Debug, Default)]
pub struct ErrorLog {
    errors: Vec<IodineError>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: impl Into<IodineError>) {
        self.errors.push(error.into());
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, IodineError> {
        self.errors.iter()
    }

    /// Drain the log into an error if anything was reported.
    pub fn check(&mut self) -> Result<(), IodineError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(IodineError::Compilation(std::mem::take(self)))
        }
    }
}

impl fmt::Display for ErrorLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", error)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a ErrorLog {
    type Item = &'a IodineError;
    type IntoIter = std::slice::Iter<'a, IodineError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}
