//! Code block entities built from fence segments.

use std::sync::LazyLock;

use regex::Regex;
use rosetta_shared::{Result, RosettaError};
use serde::{Deserialize, Serialize};

use crate::segment::{Segment, WorksWith};

/// `lang="python"` / `lang=python` inside an info line.
static LANG_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\blang\s*=\s*["']?([^"'\s]+)["']?"#).expect("lang attribute regex")
});

/// Program output associated with a code block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    /// Caption of the label that introduced the output (`Output`, `Sample run`).
    pub label: String,
    /// Output text, label excluded.
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// One code example. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBlock {
    /// Source text between the fence delimiters, whitespace preserved.
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Output>,
    /// Language or dialect token from the fence info line (`c`, `python`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syntax: Option<String>,
    /// Raw fence info line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub works_with: Option<WorksWith>,
}

impl CodeBlock {
    /// Output text, or `""` when the block has none.
    pub fn output_text(&self) -> &str {
        self.output.as_ref().map_or("", |o| o.text.as_str())
    }
}

/// Build a [`CodeBlock`] from a fence segment and an optional output segment.
///
/// Fails only when handed the wrong segment variants. Content that cannot be
/// interpreted (an odd info line, say) is dropped from the metadata instead.
pub fn build_block(
    fence: &Segment,
    output: Option<&Segment>,
    works_with: Option<&WorksWith>,
) -> Result<CodeBlock> {
    let Segment::CodeFence { info, body, .. } = fence else {
        return Err(RosettaError::parse(format!(
            "expected a code fence segment, got {}",
            fence.kind()
        )));
    };

    let output = match output {
        None => None,
        Some(Segment::OutputFence { label, body }) => Some(Output {
            label: label.label.clone(),
            text: body.clone(),
            case: label.case.clone(),
            input: label.input.clone(),
            note: label.note.clone(),
        }),
        Some(other) => {
            return Err(RosettaError::parse(format!(
                "expected an output segment, got {}",
                other.kind()
            )));
        }
    };

    Ok(CodeBlock {
        code: body.clone(),
        output,
        syntax: info.as_deref().and_then(syntax_from_info),
        info: info.clone(),
        works_with: works_with.cloned(),
    })
}

/// Pull a language token out of a fence info line.
///
/// `lang="cpp" line` gives `cpp`; `python` gives `python`; an info line with
/// only unrecognized attributes gives nothing.
fn syntax_from_info(info: &str) -> Option<String> {
    if let Some(caps) = LANG_ATTR_RE.captures(info) {
        return Some(caps[1].to_string());
    }
    info.split_whitespace()
        .next()
        .filter(|tok| !tok.contains(['=', '"', '\'']))
        .map(str::to_string)
}
