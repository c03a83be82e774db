//! Write every code block of a set of tasks into a directory tree.
//!
//! One file per block. With the Unix layout a file is
//! `<dir>/<task>[__N].<ext>`; with the RISC OS layout (type by directory) it
//! is `<dir>/<ext>/<task>[__N]`. The extension is the lowercased language
//! name with `/` turned into `.`; `__N` (1-based) only appears when the
//! language has more than one block.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rosetta_extract::Language;
use rosetta_fetch::PageSource;
use rosetta_shared::{Result, RosettaError};
use tracing::{debug, instrument, warn};

use crate::task::Task;

/// How output files are arranged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Layout {
    /// `<dir>/<name>.<ext>`
    #[default]
    Unix,
    /// `<dir>/<ext>/<name>`
    RiscOs,
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unix => "unix",
            Self::RiscOs => "riscos",
        })
    }
}

impl FromStr for Layout {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unix" => Ok(Self::Unix),
            "riscos" => Ok(Self::RiscOs),
            other => Err(format!("unknown layout '{other}' (expected unix or riscos)")),
        }
    }
}

/// Options for [`write_task_files`].
#[derive(Debug, Clone)]
pub struct DumpOptions {
    pub dir: PathBuf,
    pub layout: Layout,
    /// Prefix each file with the task intro as a comment.
    pub include_intro: bool,
    /// Prefix each file with the task description as a comment.
    pub include_task: bool,
}

impl DumpOptions {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            layout: Layout::Unix,
            include_intro: true,
            include_task: true,
        }
    }
}

/// Dump all tasks, in order. Returns the files written.
pub async fn write_task_files<S: PageSource>(
    tasks: &[&Task<S>],
    opts: &DumpOptions,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for &task in tasks {
        written.extend(dump_task(task, opts).await?);
    }
    Ok(written)
}

/// Load one task and write its blocks. Returns the files written.
#[instrument(skip_all, fields(task = task.id(), dir = %opts.dir.display()))]
pub async fn dump_task<S: PageSource>(task: &Task<S>, opts: &DumpOptions) -> Result<Vec<PathBuf>> {
    let languages = task.languages().await?;
    let intro = task.intro().await?;
    let description = task.description().await?;
    write_languages(&task.fs_name(), intro, description, languages, opts)
}

/// Write the blocks of already-parsed languages under `fs_name`.
pub fn write_languages(
    fs_name: &str,
    intro: &str,
    description: &str,
    languages: &[Language],
    opts: &DumpOptions,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    if !usable_path_component(fs_name) {
        warn!(task = fs_name, "task name is not usable as a file name, skipping");
        return Ok(written);
    }

    for lang in languages {
        let Some(extension) = extension_for(&lang.name) else {
            warn!(language = %lang.name, "language name is not usable as a file extension, skipping");
            continue;
        };

        let multiple = lang.blocks.len() > 1;
        for (index, block) in lang.blocks.iter().enumerate() {
            let name = if multiple {
                format!("{fs_name}__{}", index + 1)
            } else {
                fs_name.to_string()
            };
            let path = match opts.layout {
                Layout::Unix => opts.dir.join(format!("{name}.{extension}")),
                Layout::RiscOs => opts.dir.join(&extension).join(name),
            };

            let mut content = String::new();
            if opts.include_intro && !intro.is_empty() {
                content.push_str(&comment(&lang.name, &format!("\n{intro}")));
                content.push('\n');
            }
            if opts.include_task && !description.is_empty() {
                content.push_str(&comment(&lang.name, &format!("TASK:\n{description}")));
                content.push('\n');
            }
            content.push_str(&block.code);
            if !content.ends_with('\n') {
                content.push('\n');
            }

            write_file(&path, &content)?;
            written.push(path);
        }
    }

    Ok(written)
}

/// Wrap `text` in a comment for `language`: `/* */` for C and C++, `# ` lines
/// for everything else.
pub fn comment(language: &str, text: &str) -> String {
    if matches!(language, "C" | "C++") {
        return format!("/*{text}\n*/\n");
    }
    text.lines().map(|line| format!("# {line}\n")).collect()
}

fn extension_for(language: &str) -> Option<String> {
    let ext = language.to_lowercase().replace('/', ".");
    let ext = ext.trim();
    usable_path_component(ext).then(|| ext.to_string())
}

/// Non-empty, not made only of dots, and free of path separators.
fn usable_path_component(name: &str) -> bool {
    let name = name.trim();
    !name.is_empty()
        && !name.chars().all(|c| c == '.')
        && !name.contains(['/', '\\'])
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| RosettaError::io(parent, e))?;
    }
    std::fs::write(path, content).map_err(|e| RosettaError::io(path, e))?;
    debug!(path = %path.display(), bytes = content.len(), "wrote code file");
    Ok(())
}
