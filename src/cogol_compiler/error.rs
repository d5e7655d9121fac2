// Compiler Error Handling
//
// `CompilerError` is for failures that stop a tool run (I/O, configuration,
// reading a listing back in). Problems found in a Cogol program are
// `Diagnostic`s instead: they are recorded and logged, and compilation goes on.

use std::fmt;

#[derive(Debug, Clone)]
pub enum CompilerError {
    IOError(String),
    ConfigError(String),
    ListingParseError(String, usize), // message, line
    UnresolvedOperand(String, usize), // operand, instruction index
}

impl fmt::Display for CompilerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CompilerError::IOError(msg) => {
                write!(f, "IO error: {}", msg)
            }
            CompilerError::ConfigError(msg) => {
                write!(f, "Configuration error: {}", msg)
            }
            CompilerError::ListingParseError(msg, line) => {
                write!(f, "Listing parse error at line {}: {}", line, msg)
            }
            CompilerError::UnresolvedOperand(operand, index) => {
                write!(
                    f,
                    "Unresolved operand '{}' in instruction {}",
                    operand, index
                )
            }
        }
    }
}

impl std::error::Error for CompilerError {}

impl From<std::io::Error> for CompilerError {
    fn from(err: std::io::Error) -> Self {
        CompilerError::IOError(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    Redeclaration,
    ReservedName,
    UndeclaredVariable,
    TypeMismatch,
    UnsupportedOperator,
    UndeclaredSubroutine,
    NonConstantInitializer,
    OutOfRange,
    UnresolvedSymbol,
    ForbiddenCharacter,
    UnexpectedToken,
    InvalidMode,
    InvalidReturn,
    ConstantCondition,
    UnsupportedArgument,
}

impl DiagnosticKind {
    pub fn severity(self) -> Severity {
        match self {
            DiagnosticKind::TypeMismatch
            | DiagnosticKind::OutOfRange
            | DiagnosticKind::ConstantCondition => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    /// Remaining tokens of the offending statement, space separated
    pub context: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>, context: impl Into<String>) -> Self {
        Diagnostic {
            kind,
            message: message.into(),
            context: context.into(),
        }
    }

    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }

    pub fn is_error(&self) -> bool {
        self.severity() == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.severity(), self.message)?;
        if !self.context.is_empty() {
            write!(f, " (at: {})", self.context)?;
        }
        Ok(())
    }
}

/// Ordered collection of everything reported during one compilation
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity() {
            Severity::Warning => log::warn!("{}", diagnostic),
            Severity::Error => log::error!("{}", diagnostic),
        }
        self.entries.push(diagnostic);
    }

    pub fn report(&mut self, kind: DiagnosticKind, message: impl Into<String>, context: impl Into<String>) {
        self.push(Diagnostic::new(kind, message, context));
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        for diagnostic in diagnostics {
            self.push(diagnostic);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}
