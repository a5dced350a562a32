use miette::{Diagnostic, SourceSpan};

use crate::{builder::error::BuildError, tokenizer::error::TokenizeError};

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum InnerError {
    #[error(transparent)]
    Tokenize(#[from] TokenizeError),
    #[error(transparent)]
    Build(#[from] BuildError),
}

/// A fatal parse error, tied to the line that caused it.
#[derive(PartialEq, Debug, Clone, thiserror::Error)]
#[error("{cause} (line {})", .line_index + 1)]
pub struct Error {
    /// The underlying cause of the error.
    pub cause: InnerError,
    /// Zero-based index of the failing line in the input.
    pub line_index: usize,
    /// The raw content of the failing line.
    pub line: String,
    /// The offending part of `line`.
    pub location: SourceSpan,
}

impl Error {
    pub fn from_error(line_index: usize, line: impl Into<String>, cause: InnerError) -> Self {
        let line = line.into();
        let location = match &cause {
            InnerError::Tokenize(TokenizeError::MalformedLevel(token)) => span_of(&line, token),
            InnerError::Build(BuildError::DuplicatePointer(pointer)) => span_of(&line, pointer),
            InnerError::Build(_) => span_of(&line, line.trim()),
        };

        Self {
            cause,
            line_index,
            line,
            location,
        }
    }
}

/// Span of `token` inside `line`, falling back to the first non-blank character.
fn span_of(line: &str, token: &str) -> SourceSpan {
    let start = line.len() - line.trim_start().len();
    let offset = if token.is_empty() {
        start
    } else {
        line[start..].find(token).map_or(start, |pos| start + pos)
    };
    let len = token.len().max(1).min(line.len().saturating_sub(offset));

    SourceSpan::new(offset.into(), len)
}

impl Diagnostic for Error {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        let c = match self.cause {
            InnerError::Tokenize(TokenizeError::MalformedLevel(_)) => "TokenizeError::MalformedLevel",
            InnerError::Build(BuildError::StructuralUnderflow { .. }) => {
                "BuildError::StructuralUnderflow"
            }
            InnerError::Build(BuildError::DuplicatePointer(_)) => "BuildError::DuplicatePointer",
            InnerError::Build(BuildError::InvalidAttachment) => "BuildError::InvalidAttachment",
            InnerError::Build(BuildError::UnknownRecord) => "BuildError::UnknownRecord",
        };

        Some(Box::new(c))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        let msg = match &self.cause {
            InnerError::Tokenize(TokenizeError::MalformedLevel(_)) => {
                "Every line must start with a non-negative level number.".to_string()
            }
            InnerError::Build(BuildError::StructuralUnderflow { level }) => format!(
                "No open record can hold a level {level} line. The first line and every new tree must start at level 0."
            ),
            InnerError::Build(BuildError::DuplicatePointer(pointer)) => {
                format!("`{pointer}` is declared more than once.")
            }
            InnerError::Build(BuildError::InvalidAttachment | BuildError::UnknownRecord) => {
                return None;
            }
        };

        Some(Box::new(msg))
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = miette::LabeledSpan> + '_>> {
        Some(Box::new(std::iter::once(
            miette::LabeledSpan::new_with_span(Some(format!("{}", self.cause)), self.location),
        )))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&self.line)
    }
}
