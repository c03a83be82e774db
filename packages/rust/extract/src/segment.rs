//! The tagged intermediate representation produced by the splitter.

use serde::{Deserialize, Serialize};

/// What a heading means for language grouping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadingRole {
    /// Starts (or resumes) the section of the named language.
    Language(String),
    /// A heading at or above the language level that is not a language
    /// (`==See also==`). Closes the current language section.
    Section,
    /// A sub-heading inside a language section (`===Iterative===`).
    Subsection,
}

/// Parameters of an output label (`{{out|Sample run|input=5}}`, `Output:`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputLabel {
    /// Caption shown by the label; `Output` unless the page says otherwise.
    pub label: String,
    /// `case=` parameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case: Option<String>,
    /// `input=` parameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    /// `note=` parameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl OutputLabel {
    /// A label with the given caption and no parameters.
    pub fn named(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }
}

/// A `{{works with|...}}` annotation naming the implementation a block targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorksWith {
    /// Wiki name of the compiler/interpreter.
    pub name: String,
    /// Display name, when the three-argument form is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    /// Version string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl WorksWith {
    /// Parse the argument list of a `works with` template (`GCC|4.8`).
    pub fn from_args(args: &str) -> Option<Self> {
        let parts: Vec<&str> = args.split('|').map(str::trim).collect();
        let name = parts.first().filter(|n| !n.is_empty())?.to_string();
        let arg = |i: usize| {
            parts
                .get(i)
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
        };
        let (display, version) = match parts.len() {
            1 => (None, None),
            2 => (None, arg(1)),
            _ => (arg(1), arg(2)),
        };
        Some(Self {
            name,
            display,
            version,
        })
    }
}

/// A classified contiguous span of a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// `== text ==` at some level.
    Heading {
        level: u8,
        text: String,
        role: HeadingRole,
    },
    /// A delimited block of source code.
    CodeFence {
        /// Raw info line of the opener (`c`, `lang="python" line`), if any.
        info: Option<String>,
        /// Text between the delimiters.
        body: String,
        /// 1-based line number of the opener.
        line: usize,
    },
    /// Program output introduced by an output label.
    OutputFence { label: OutputLabel, body: String },
    /// Implementation annotation for the blocks that follow.
    WorksWith(WorksWith),
    /// Anything else, kept verbatim.
    Plain(String),
}

impl Segment {
    /// Short variant name for tracing.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Heading { .. } => "heading",
            Self::CodeFence { .. } => "code_fence",
            Self::OutputFence { .. } => "output_fence",
            Self::WorksWith(_) => "works_with",
            Self::Plain(_) => "plain",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn works_with_two_args() {
        let ww = WorksWith::from_args("GCC|4.8").unwrap();
        assert_eq!(ww.name, "GCC");
        assert_eq!(ww.version.as_deref(), Some("4.8"));
        assert!(ww.display.is_none());
    }

    #[test]
    fn works_with_three_args() {
        let ww = WorksWith::from_args("Python|CPython|3.11").unwrap();
        assert_eq!(ww.display.as_deref(), Some("CPython"));
        assert_eq!(ww.version.as_deref(), Some("3.11"));
    }

    #[test]
    fn works_with_requires_a_name() {
        assert!(WorksWith::from_args("").is_none());
        assert!(WorksWith::from_args(" |1.0").is_none());
    }
}
