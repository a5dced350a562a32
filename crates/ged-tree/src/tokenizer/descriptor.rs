use std::fmt::{self, Display};

use itertools::Itertools;
use smol_str::SmolStr;

/// Depth of a line in the source hierarchy; `0` marks a forest root.
pub type Level = usize;

/// One tokenized source line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecordDescriptor {
    pub level: Level,
    pub pointer: Option<SmolStr>,
    pub tag: SmolStr,
    pub data: String,
    pub reference: Option<SmolStr>,
}

impl RecordDescriptor {
    pub fn new(level: Level, tag: impl Into<SmolStr>) -> Self {
        Self {
            level,
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn with_pointer(mut self, pointer: impl Into<SmolStr>) -> Self {
        self.pointer = Some(pointer.into());
        self
    }

    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = data.into();
        self
    }

    pub fn with_reference(mut self, reference: impl Into<SmolStr>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// The line content following the level.
    pub fn line_data(&self) -> String {
        line_data(
            self.pointer.as_deref(),
            &self.tag,
            &self.data,
            self.reference.as_deref(),
        )
    }
}

impl Display for RecordDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_line(
            f,
            self.level,
            self.pointer.as_deref(),
            &self.tag,
            &self.data,
            self.reference.as_deref(),
        )
    }
}

pub(crate) fn line_data(
    pointer: Option<&str>,
    tag: &str,
    data: &str,
    reference: Option<&str>,
) -> String {
    [pointer.unwrap_or_default(), tag, data, reference.unwrap_or_default()]
        .into_iter()
        .filter(|part| !part.is_empty())
        .join(" ")
}

/// Writes `{level} {line data}` without a line terminator; empty fields are omitted.
pub(crate) fn write_line(
    f: &mut impl fmt::Write,
    level: Level,
    pointer: Option<&str>,
    tag: &str,
    data: &str,
    reference: Option<&str>,
) -> fmt::Result {
    let line_data = line_data(pointer, tag, data, reference);
    if line_data.is_empty() {
        write!(f, "{level}")
    } else {
        write!(f, "{level} {line_data}")
    }
}
