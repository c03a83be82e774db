//! Extraction engine: raw task page markup in, language/code-block entities out.
//!
//! The pipeline is:
//! 1. [`split`] scans the page into tagged [`Segment`]s
//! 2. [`aggregate`] groups code fences under their language headings,
//!    building each [`CodeBlock`] with [`build_block`]
//! 3. [`parse_task_page`] runs both and adds the page preamble
//!
//! Category listing pages go through [`task_links`] instead.
//!
//! Nothing here performs I/O. Ambiguous fragments are omitted, never raised.

pub mod block;
pub mod category;
pub mod conventions;
pub mod language;
pub mod preamble;
pub mod segment;
pub mod splitter;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

pub use block::{CodeBlock, Output, build_block};
pub use category::{TaskLink, task_links};
pub use conventions::Conventions;
pub use language::{Language, aggregate};
pub use preamble::{intro, task_description};
pub use segment::{HeadingRole, OutputLabel, Segment, WorksWith};
pub use splitter::split;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// How well a page parse went.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseOutcome {
    /// At least one language was recovered.
    Complete,
    /// The page text was blank.
    Empty,
    /// Non-blank text but zero languages: most likely a layout the scanner
    /// does not recognize. A soft signal, not an error.
    Degraded,
}

/// Everything extracted from one task page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTask {
    pub languages: Vec<Language>,
    pub intro: String,
    pub description: String,
    pub outcome: ParseOutcome,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Parse a task page into languages plus its preamble.
#[instrument(skip_all, fields(bytes = raw.len()))]
pub fn parse_task_page(raw: &str, conventions: &Conventions) -> ParsedTask {
    let segments = split(raw, conventions);
    let languages = aggregate(&segments);

    let outcome = if !languages.is_empty() {
        ParseOutcome::Complete
    } else if raw.trim().is_empty() {
        ParseOutcome::Empty
    } else {
        ParseOutcome::Degraded
    };

    debug!(
        segments = segments.len(),
        languages = languages.len(),
        ?outcome,
        "task page parsed"
    );

    ParsedTask {
        languages,
        intro: intro(raw),
        description: task_description(raw),
        outcome,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fixture_path(name: &str) -> std::path::PathBuf {
        std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../../fixtures/pages")
            .join(name)
    }

    fn load_fixture(name: &str) -> String {
        fs::read_to_string(fixture_path(name))
            .unwrap_or_else(|e| panic!("failed to read fixture {name}: {e}"))
    }

    fn parse(raw: &str) -> ParsedTask {
        parse_task_page(raw, &Conventions::default())
    }

    // --- Fixture: 100 doors ---

    #[test]
    fn fixture_languages_in_heading_order() {
        let parsed = parse(&load_fixture("100_doors.wiki"));
        let names: Vec<&str> = parsed.languages.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["Ada", "C", "F#", "Go", "Python", "Rust"]);
        assert_eq!(parsed.outcome, ParseOutcome::Complete);
    }

    #[test]
    fn fixture_block_counts() {
        let parsed = parse(&load_fixture("100_doors.wiki"));
        let counts: Vec<usize> = parsed.languages.iter().map(|l| l.blocks.len()).collect();
        // C merges the `{{header|C}} and {{header|C++}}` section; Go loses its
        // unterminated first fence.
        assert_eq!(counts, vec![2, 2, 1, 1, 2, 1]);
    }

    #[test]
    fn fixture_c_block_has_output_and_works_with() {
        let parsed = parse(&load_fixture("100_doors.wiki"));
        let c = &parsed.languages[1];
        let block = &c.blocks[0];

        assert!(block.code.starts_with("#include <stdio.h>"));
        assert!(block.code.ends_with('}'));
        assert_eq!(
            block.output_text(),
            "door #1 is open.\ndoor #2 is closed.\ndoor #3 is closed.\ndoor #4 is open."
        );
        let ww = block.works_with.as_ref().expect("works with");
        assert_eq!(ww.name, "GCC");
        assert_eq!(ww.version.as_deref(), Some("4.8"));

        assert_eq!(c.blocks[1].syntax.as_deref(), Some("cpp"));
        assert!(c.blocks[1].output.is_none());
    }

    #[test]
    fn fixture_go_keeps_only_well_formed_block() {
        let parsed = parse(&load_fixture("100_doors.wiki"));
        let go = &parsed.languages[3];
        assert_eq!(go.blocks[0].code, "package main\n\nfunc main() {}");
    }

    #[test]
    fn fixture_output_template_parameters() {
        let parsed = parse(&load_fixture("100_doors.wiki"));
        let python = &parsed.languages[4];
        assert!(python.blocks[0].output.is_none());

        let output = python.blocks[1].output.as_ref().expect("output");
        assert_eq!(output.label, "Sample run");
        assert_eq!(output.note.as_deref(), Some("first three lines"));
        assert_eq!(output.text, "Door 1 is open\nDoor 4 is open\nDoor 9 is open");
    }

    #[test]
    fn fixture_output_heading_and_syntaxhighlight() {
        let parsed = parse(&load_fixture("100_doors.wiki"));
        let rust = &parsed.languages[5];
        assert_eq!(rust.blocks[0].syntax.as_deref(), Some("rust"));
        assert_eq!(rust.blocks[0].info.as_deref(), Some("lang=\"rust\""));
        assert_eq!(rust.blocks[0].output_text(), "Door 1 is open\nDoor 4 is open");
    }

    #[test]
    fn fixture_preamble() {
        let parsed = parse(&load_fixture("100_doors.wiki"));
        assert!(parsed.intro.starts_with("{{task|"));
        assert!(parsed.intro.ends_with("You make 100 passes by the doors."));
        assert!(parsed.description.starts_with("Answer the question:"));
        assert!(!parsed.description.contains("{{header"));
    }

    #[test]
    fn fixture_parse_is_idempotent() {
        let raw = load_fixture("100_doors.wiki");
        assert_eq!(parse(&raw), parse(&raw));
    }

    // --- Outcomes ---

    #[test]
    fn unknown_layout_is_degraded_not_error() {
        let parsed = parse(&load_fixture("unknown_layout.wiki"));
        assert!(parsed.languages.is_empty());
        assert_eq!(parsed.outcome, ParseOutcome::Degraded);
    }

    #[test]
    fn blank_page_is_empty() {
        assert_eq!(parse("  \n\n").outcome, ParseOutcome::Empty);
    }

    #[test]
    fn languages_serialize_to_json() {
        let parsed = parse("==C==\n<lang c>int main(){}</lang>\nOutput: (no output)\n");
        let json = serde_json::to_value(&parsed.languages).unwrap();
        assert_eq!(json[0]["name"], "C");
        assert_eq!(json[0]["blocks"][0]["code"], "int main(){}");
        assert_eq!(json[0]["blocks"][0]["output"]["text"], "(no output)");
        assert!(json[0]["blocks"][0].get("works_with").is_none());
    }

    #[test]
    fn custom_conventions_change_recognition() {
        let config = rosetta_shared::ExtractionConfig {
            output_labels: vec!["Transcript".into()],
            ..Default::default()
        };
        let conv = Conventions::from(&config);
        let raw = "==C==\n<lang c>x</lang>\nTranscript:\nhello\n";
        let parsed = parse_task_page(raw, &conv);
        assert_eq!(parsed.languages[0].blocks[0].output_text(), "hello");
    }
}
