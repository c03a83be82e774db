//! Grouping of code blocks under their language headings.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::block::{CodeBlock, build_block};
use crate::segment::{HeadingRole, Segment, WorksWith};

/// All code blocks one task page has for a single language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    /// Name as written on the page, trimmed.
    pub name: String,
    /// Blocks in document order.
    pub blocks: Vec<CodeBlock>,
}

impl Language {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            blocks: Vec::new(),
        }
    }
}

/// Group fence segments by the nearest preceding language heading.
///
/// Languages keep first-seen order and repeated headings for the same name
/// append to the existing entry. An output segment attaches to the fence
/// right before it (plain text in between is tolerated). Fences outside any
/// language section and outputs with no fence are omitted.
pub fn aggregate(segments: &[Segment]) -> Vec<Language> {
    let mut languages: Vec<Language> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut current: Option<usize> = None;
    let mut works_with: Option<WorksWith> = None;
    let mut consumed_output: Option<usize> = None;

    for (i, segment) in segments.iter().enumerate() {
        match segment {
            Segment::Heading { role, text, .. } => match role {
                HeadingRole::Language(name) => {
                    works_with = None;
                    let idx = *index.entry(name.clone()).or_insert_with(|| {
                        languages.push(Language::new(name.clone()));
                        languages.len() - 1
                    });
                    current = Some(idx);
                }
                HeadingRole::Section => {
                    debug!(heading = %text, "section heading closes language");
                    current = None;
                    works_with = None;
                }
                HeadingRole::Subsection => {}
            },

            Segment::WorksWith(ww) => {
                if current.is_some() {
                    works_with = Some(ww.clone());
                }
            }

            Segment::CodeFence { line, .. } => {
                let Some(lang_idx) = current else {
                    debug!(line, "code fence outside a language section, skipped");
                    continue;
                };

                let output_idx = following_output(segments, i);
                let output = output_idx.map(|j| &segments[j]);
                match build_block(segment, output, works_with.as_ref()) {
                    Ok(block) => {
                        consumed_output = output_idx;
                        languages[lang_idx].blocks.push(block);
                    }
                    Err(e) => {
                        warn!(line, error = %e, "skipping code block");
                    }
                }
            }

            Segment::OutputFence { label, .. } => {
                if consumed_output != Some(i) {
                    debug!(label = %label.label, "output without a preceding code block, skipped");
                }
            }

            Segment::Plain(_) => {}
        }
    }

    languages
}

/// Index of the output segment belonging to the fence at `fence_idx`, looking
/// past plain text only.
fn following_output(segments: &[Segment], fence_idx: usize) -> Option<usize> {
    segments
        .iter()
        .enumerate()
        .skip(fence_idx + 1)
        .find(|(_, s)| !matches!(s, Segment::Plain(_)))
        .and_then(|(j, s)| matches!(s, Segment::OutputFence { .. }).then_some(j))
}
