//! Line-oriented scanner that partitions a task page into [`Segment`]s.
//!
//! The scanner is a small state machine driven by line-level pattern matches:
//! - `AwaitingHeading`: before the first language heading (or after a
//!   non-language section heading). Only headings and fences are recognized.
//! - `InLanguage`: inside a language section; output labels and
//!   `{{works with}}` lines are recognized as well.
//! - `InFence`: collecting the body of a code fence.
//! - `InOutput`: an output label was seen; collecting its body.
//!
//! Malformed input never aborts the scan: an unterminated fence or output
//! block is turned back into plain text and scanning resumes.

use std::sync::LazyLock;

use regex::Regex;
use rosetta_shared::canonical_name;
use tracing::debug;

use crate::conventions::{Conventions, strip_label_decoration};
use crate::segment::{HeadingRole, OutputLabel, Segment, WorksWith};

// ---------------------------------------------------------------------------
// Regex patterns (compiled once)
// ---------------------------------------------------------------------------

/// `== text ==` with one to six `=` on each side.
static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(={1,6})\s*(.+?)\s*(={1,6})\s*$").expect("heading regex")
});

/// `{{header|Name}}` or `{{header|Wiki name|Display}}` inside a heading.
static HEADER_TEMPLATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\{\{\s*header\s*\|([^}]*)\}\}").expect("header template regex")
});

/// A line starting with a template: name, optional arguments, trailing text.
static TEMPLATE_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\{\{\s*([A-Za-z][A-Za-z ]*?)\s*(?:\|([^}]*))?\}\}(.*)$")
        .expect("template line regex")
});

/// `{{works with|...}}` at the start of a line.
static WORKS_WITH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*\{\{\s*works\s+with\s*\|([^}]*)\}\}").expect("works with regex")
});

/// Opening tag of a code fence: `<lang c>`, `<syntaxhighlight lang="c">`, `<source lang=c>`.
static TAG_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(lang|syntaxhighlight|source)\b([^>]*)>").expect("fence open regex")
});

/// Closing tag of a code fence.
static TAG_CLOSE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</\s*(lang|syntaxhighlight|source)\s*>").expect("fence close regex")
});

/// `<pre>` at the start of a line (output body opener).
static PRE_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*<pre\b[^>]*>").expect("pre open regex")
});

static PRE_CLOSE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</\s*pre\s*>").expect("pre close regex")
});

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

/// Split raw page markup into an ordered sequence of segments.
///
/// CRLF line endings are normalized to LF; everything else is kept verbatim.
/// This function never fails: fragments it cannot interpret end up as
/// [`Segment::Plain`].
pub fn split(raw: &str, conventions: &Conventions) -> Vec<Segment> {
    let text = raw.replace("\r\n", "\n");
    let mut scanner = Scanner::new(conventions);

    for (idx, line) in text.split('\n').enumerate() {
        scanner.feed(line, idx + 1);
    }

    scanner.finish()
}

// ---------------------------------------------------------------------------
// Scanner state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum FenceKind {
    /// `<lang>`, `<syntaxhighlight>` or `<source>`; holds the lowercase tag name.
    Tag(String),
    /// A backtick fence opened with this many backticks.
    Backticks(usize),
}

#[derive(Debug)]
struct OpenFence<'a> {
    kind: FenceKind,
    info: Option<&'a str>,
    opener: &'a str,
    lines: Vec<&'a str>,
    line: usize,
}

#[derive(Debug)]
enum OutputPhase<'a> {
    /// Label seen, body not started yet.
    AwaitBody,
    /// Inside `<pre>...</pre>`.
    Pre(Vec<&'a str>),
    /// Inside a backtick fence.
    Fenced(usize, Vec<&'a str>),
    /// Unfenced lines following the label, up to a blank or structural line.
    Lines(Vec<&'a str>),
}

#[derive(Debug)]
struct OpenOutput<'a> {
    label: OutputLabel,
    phase: OutputPhase<'a>,
}

#[derive(Debug)]
enum State<'a> {
    AwaitingHeading,
    InLanguage,
    InFence(OpenFence<'a>),
    InOutput(OpenOutput<'a>),
}

struct Scanner<'a, 'c> {
    conventions: &'c Conventions,
    segments: Vec<Segment>,
    plain: Vec<&'a str>,
    state: State<'a>,
    /// Whether a language section is open. Survives fences and output blocks.
    language_open: bool,
}

impl<'a, 'c> Scanner<'a, 'c> {
    fn new(conventions: &'c Conventions) -> Self {
        Self {
            conventions,
            segments: Vec::new(),
            plain: Vec::new(),
            state: State::AwaitingHeading,
            language_open: false,
        }
    }

    /// Process one physical line. A step may hand back a (possibly shorter)
    /// slice to be processed again in the new state.
    fn feed(&mut self, line: &'a str, line_no: usize) {
        let mut current = Some(line);
        while let Some(l) = current.take() {
            current = self.step(l, line_no);
        }
    }

    fn step(&mut self, line: &'a str, line_no: usize) -> Option<&'a str> {
        match std::mem::replace(&mut self.state, State::AwaitingHeading) {
            State::AwaitingHeading | State::InLanguage => {
                self.state = self.resume();
                self.step_text(line, line_no)
            }
            State::InFence(fence) => self.step_fence(fence, line),
            State::InOutput(output) => self.step_output(output, line),
        }
    }

    fn resume(&self) -> State<'a> {
        if self.language_open {
            State::InLanguage
        } else {
            State::AwaitingHeading
        }
    }

    fn finish(mut self) -> Vec<Segment> {
        match std::mem::replace(&mut self.state, State::AwaitingHeading) {
            State::InFence(fence) => self.abandon_fence(fence),
            State::InOutput(output) => match output.phase {
                OutputPhase::Lines(lines) => self.emit_output(output.label, &lines),
                OutputPhase::Pre(lines) | OutputPhase::Fenced(_, lines) => {
                    debug!(label = %output.label.label, "unterminated output block at end of page");
                    self.plain.extend(lines);
                }
                OutputPhase::AwaitBody => {
                    debug!(label = %output.label.label, "output label without a body");
                }
            },
            State::AwaitingHeading | State::InLanguage => {}
        }
        self.flush_plain();
        self.segments
    }

    // -----------------------------------------------------------------------
    // AwaitingHeading / InLanguage
    // -----------------------------------------------------------------------

    fn step_text(&mut self, line: &'a str, line_no: usize) -> Option<&'a str> {
        if let Some((level, text)) = parse_heading(line) {
            return self.on_heading(level, text);
        }

        if self.language_open {
            if let Some(works_with) = parse_works_with(line) {
                self.flush_plain();
                self.segments.push(Segment::WorksWith(works_with));
                return None;
            }
            if let Some((label, rest)) = self.parse_output_label(line) {
                self.flush_plain();
                self.state = State::InOutput(OpenOutput {
                    label,
                    phase: OutputPhase::AwaitBody,
                });
                return non_blank(rest);
            }
        }

        let opener = TAG_OPEN_RE
            .captures(line)
            .and_then(|caps| Some((caps.get(0)?, caps)));
        if let Some((whole, caps)) = opener {
            let before = &line[..whole.start()];
            if !before.trim().is_empty() {
                self.plain.push(before);
            }
            self.flush_plain();
            self.state = State::InFence(OpenFence {
                kind: FenceKind::Tag(caps[1].to_lowercase()),
                info: caps.get(2).map(|m| m.as_str().trim()).filter(|s| !s.is_empty()),
                opener: whole.as_str(),
                lines: Vec::new(),
                line: line_no,
            });
            return non_blank(&line[whole.end()..]);
        }

        if let Some((count, info)) = backtick_fence(line) {
            self.flush_plain();
            self.state = State::InFence(OpenFence {
                kind: FenceKind::Backticks(count),
                info,
                opener: line,
                lines: Vec::new(),
                line: line_no,
            });
            return None;
        }

        self.plain.push(line);
        None
    }

    fn on_heading(&mut self, level: u8, text: &'a str) -> Option<&'a str> {
        self.flush_plain();

        if self.language_open && self.conventions.is_output_label(text) {
            self.state = State::InOutput(OpenOutput {
                label: OutputLabel::named(strip_label_decoration(text)),
                phase: OutputPhase::AwaitBody,
            });
            return None;
        }

        let role = heading_role(level, text, self.conventions);
        match &role {
            HeadingRole::Language(_) => self.language_open = true,
            HeadingRole::Section => self.language_open = false,
            HeadingRole::Subsection => {}
        }
        self.state = self.resume();
        self.segments.push(Segment::Heading {
            level,
            text: text.to_string(),
            role,
        });
        None
    }

    // -----------------------------------------------------------------------
    // InFence
    // -----------------------------------------------------------------------

    fn step_fence(&mut self, mut fence: OpenFence<'a>, line: &'a str) -> Option<&'a str> {
        if self.closes_open_block(line) {
            self.abandon_fence(fence);
            return Some(line);
        }

        match &fence.kind {
            FenceKind::Tag(name) => {
                let close = TAG_CLOSE_RE
                    .captures_iter(line)
                    .filter(|c| c[1].eq_ignore_ascii_case(name))
                    .filter_map(|c| c.get(0))
                    .next();
                let reopen = TAG_OPEN_RE.find(line);

                // A new opener before any closer: the open fence was never terminated.
                let reopened = match (reopen, close) {
                    (Some(open), Some(close)) => open.start() < close.start(),
                    (Some(_), None) => true,
                    _ => false,
                };
                if reopened {
                    self.abandon_fence(fence);
                    return Some(line);
                }

                if let Some(close) = close {
                    let before = &line[..close.start()];
                    if !before.trim().is_empty() {
                        fence.lines.push(before);
                    }
                    self.emit_fence(fence);
                    self.state = self.resume();
                    return non_blank(&line[close.end()..]);
                }
            }
            FenceKind::Backticks(count) => {
                if let Some((n, info)) = backtick_fence(line) {
                    if n >= *count && info.is_none() {
                        self.emit_fence(fence);
                        self.state = self.resume();
                        return None;
                    }
                    if info.is_some() {
                        self.abandon_fence(fence);
                        return Some(line);
                    }
                }
            }
        }

        fence.lines.push(line);
        self.state = State::InFence(fence);
        None
    }

    fn emit_fence(&mut self, fence: OpenFence<'a>) {
        self.segments.push(Segment::CodeFence {
            info: fence.info.map(str::to_string),
            body: fence.lines.join("\n"),
            line: fence.line,
        });
    }

    fn abandon_fence(&mut self, fence: OpenFence<'a>) {
        debug!(line = fence.line, "unterminated code fence kept as plain text");
        self.plain.push(fence.opener);
        self.plain.extend(fence.lines);
    }

    // -----------------------------------------------------------------------
    // InOutput
    // -----------------------------------------------------------------------

    fn step_output(&mut self, mut output: OpenOutput<'a>, line: &'a str) -> Option<&'a str> {
        match &mut output.phase {
            OutputPhase::AwaitBody => {
                if line.trim().is_empty() {
                    self.plain.push(line);
                } else if let Some(m) = PRE_OPEN_RE.find(line) {
                    self.flush_plain();
                    output.phase = OutputPhase::Pre(Vec::new());
                    self.state = State::InOutput(output);
                    return non_blank(&line[m.end()..]);
                } else if let Some((count, _)) = backtick_fence(line) {
                    self.flush_plain();
                    output.phase = OutputPhase::Fenced(count, Vec::new());
                } else if self.is_structural(line) {
                    debug!(label = %output.label.label, "output label without a body");
                    self.state = self.resume();
                    return Some(line);
                } else {
                    self.flush_plain();
                    output.phase = OutputPhase::Lines(vec![line]);
                }
            }
            OutputPhase::Pre(lines) => {
                if self.closes_open_block(line) {
                    self.plain.append(lines);
                    self.state = self.resume();
                    return Some(line);
                }
                if let Some(close) = PRE_CLOSE_RE.find(line) {
                    let before = &line[..close.start()];
                    if !before.trim().is_empty() {
                        lines.push(before);
                    }
                    let lines = std::mem::take(lines);
                    self.emit_output(output.label, &lines);
                    self.state = self.resume();
                    return non_blank(&line[close.end()..]);
                }
                lines.push(line);
            }
            OutputPhase::Fenced(count, lines) => {
                if self.closes_open_block(line) {
                    self.plain.append(lines);
                    self.state = self.resume();
                    return Some(line);
                }
                if let Some((n, None)) = backtick_fence(line) {
                    if n >= *count {
                        let lines = std::mem::take(lines);
                        self.emit_output(output.label, &lines);
                        self.state = self.resume();
                        return None;
                    }
                }
                lines.push(line);
            }
            OutputPhase::Lines(lines) => {
                if line.trim().is_empty() || self.is_structural(line) {
                    let lines = std::mem::take(lines);
                    self.emit_output(output.label, &lines);
                    self.state = self.resume();
                    return Some(line);
                }
                lines.push(line);
            }
        }

        self.state = State::InOutput(output);
        None
    }

    fn emit_output(&mut self, label: OutputLabel, lines: &[&str]) {
        self.flush_plain();
        self.segments.push(Segment::OutputFence {
            label,
            body: lines.join("\n"),
        });
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn flush_plain(&mut self) {
        if !self.plain.is_empty() {
            self.segments.push(Segment::Plain(self.plain.join("\n")));
            self.plain.clear();
        }
    }

    /// Recognize an output label line, returning the label and any text that
    /// follows it on the same line.
    fn parse_output_label(&self, line: &'a str) -> Option<(OutputLabel, &'a str)> {
        if let Some(caps) = TEMPLATE_LINE_RE.captures(line) {
            if !self.conventions.is_output_template(&caps[1]) {
                return None;
            }
            let label = label_from_template_args(caps.get(2).map(|m| m.as_str()));
            let rest = caps.get(3).map_or("", |m| m.as_str());
            return Some((label, rest));
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }
        if self.conventions.is_output_label(trimmed) {
            return Some((OutputLabel::named(strip_label_decoration(trimmed)), ""));
        }

        // `Output: 42` or `'''Output:''' 42`
        let colon = trimmed.find(':')?;
        let (head, tail) = trimmed.split_at(colon + 1);
        if !self.conventions.is_output_label(head) {
            return None;
        }
        let rest = tail.trim_start_matches('\'').trim_start();
        Some((OutputLabel::named(strip_label_decoration(head)), rest))
    }

    /// A language or section heading ends any open fence or output block.
    fn closes_open_block(&self, line: &str) -> bool {
        parse_heading(line).is_some_and(|(level, text)| {
            matches!(
                heading_role(level, text, self.conventions),
                HeadingRole::Language(_) | HeadingRole::Section
            )
        })
    }

    /// Lines that end an unfenced output body.
    fn is_structural(&self, line: &'a str) -> bool {
        parse_heading(line).is_some()
            || TAG_OPEN_RE.is_match(line)
            || PRE_OPEN_RE.is_match(line)
            || backtick_fence(line).is_some()
            || WORKS_WITH_RE.is_match(line)
            || self.parse_output_label(line).is_some()
    }
}

// ---------------------------------------------------------------------------
// Line classifiers
// ---------------------------------------------------------------------------

/// Parse `== text ==` into `(level, text)`. The level is the smaller of the
/// two `=` runs, as MediaWiki does.
fn parse_heading(line: &str) -> Option<(u8, &str)> {
    let caps = HEADING_RE.captures(line)?;
    let text = caps.get(2)?.as_str();
    if text.chars().all(|c| c == '=') {
        return None;
    }
    let level = caps[1].len().min(caps[3].len());
    Some((level as u8, text))
}

/// Decide whether a heading starts a language section.
pub(crate) fn heading_role(level: u8, text: &str, conventions: &Conventions) -> HeadingRole {
    if let Some(name) = header_template_name(text) {
        return HeadingRole::Language(name);
    }

    let lang_level = conventions.language_heading_level();
    if level == lang_level
        && !conventions.is_non_language_heading(text)
        && !conventions.is_output_label(text)
    {
        let name = canonical_name(text);
        if !name.is_empty() {
            return HeadingRole::Language(name);
        }
    }

    if level <= lang_level {
        HeadingRole::Section
    } else {
        HeadingRole::Subsection
    }
}

/// Language name from the first `{{header|...}}` in a heading.
///
/// `{{header|F Sharp|F#}}` names `F#`; `{{header|C}} and {{header|C++}}`
/// names `C`.
fn header_template_name(text: &str) -> Option<String> {
    let caps = HEADER_TEMPLATE_RE.captures(text)?;
    let args: Vec<&str> = caps[1].split('|').map(str::trim).collect();
    let name = match args.as_slice() {
        [_, display, ..] if !display.is_empty() => display,
        [wiki, ..] => wiki,
        [] => return None,
    };
    let name = canonical_name(name);
    (!name.is_empty()).then_some(name)
}

fn parse_works_with(line: &str) -> Option<WorksWith> {
    let caps = WORKS_WITH_RE.captures(line)?;
    WorksWith::from_args(&caps[1])
}

/// A line opening or closing a backtick fence: `(backtick count, info)`.
fn backtick_fence(line: &str) -> Option<(usize, Option<&str>)> {
    let trimmed = line.trim_start();
    let count = trimmed.chars().take_while(|&c| c == '`').count();
    if count < 3 {
        return None;
    }
    let info = trimmed[count..].trim();
    if info.contains('`') {
        return None;
    }
    Some((count, (!info.is_empty()).then_some(info)))
}

/// Build a label from `{{out|...}}` arguments.
///
/// Named parameters `case`, `input` and `note` are kept; `text=` or a bare
/// argument replaces the caption.
fn label_from_template_args(args: Option<&str>) -> OutputLabel {
    let mut label = OutputLabel::named("Output");
    let Some(args) = args else {
        return label;
    };

    for param in args.split('|').map(str::trim).filter(|p| !p.is_empty()) {
        match param.split_once('=') {
            Some((key, value)) => {
                let value = value.trim().to_string();
                match key.trim().to_lowercase().as_str() {
                    "case" => label.case = Some(value),
                    "input" => label.input = Some(value),
                    "note" => label.note = Some(value),
                    "text" => label.label = value,
                    other => debug!(param = other, "ignoring unknown output parameter"),
                }
            }
            None => label.label = param.to_string(),
        }
    }
    label
}

fn non_blank(s: &str) -> Option<&str> {
    (!s.trim().is_empty()).then_some(s)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
