//! Plain-text listings of tasks and categories.

use std::io::Write;

use rosetta_extract::Language;
use rosetta_fetch::PageSource;
use rosetta_shared::{Result, RosettaError};
use tracing::warn;

use crate::category::Category;
use crate::task::Task;

/// What a listing shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Task names (categories only).
    pub tasks: bool,
    /// Language names.
    pub languages: bool,
    /// Counts next to names, or a bare count when nothing else is listed.
    pub count: bool,
    /// Code of every block, indented under its language.
    pub code: bool,
}

impl ListOptions {
    /// Languages are listed when nothing was asked for, and always with code.
    pub fn normalized(mut self) -> Self {
        if !(self.tasks || self.languages || self.count || self.code) {
            self.languages = true;
        }
        if self.code {
            self.languages = true;
        }
        self
    }
}

/// List one task: its language count, or its languages (sorted by name)
/// with optional block counts and code.
pub async fn list_task<S: PageSource, W: Write>(
    task: &Task<S>,
    opts: ListOptions,
    out: &mut W,
) -> Result<()> {
    let opts = opts.normalized();
    let languages = task.languages().await?;
    if opts.count && !opts.languages {
        return emit(out, &languages.len().to_string());
    }
    write_languages(languages, opts, "", out)
}

/// List a category: its task count, or its task names with optional language
/// counts and nested language listings.
pub async fn list_category<S: PageSource, W: Write>(
    category: &Category<S>,
    opts: ListOptions,
    out: &mut W,
) -> Result<()> {
    let tasks: Vec<&Task<S>> = category.tasks().await?.iter().collect();
    list_tasks(&tasks, opts, out).await
}

/// List an explicit set of category members, as [`list_category`] does.
pub async fn list_tasks<S: PageSource, W: Write>(
    tasks: &[&Task<S>],
    opts: ListOptions,
    out: &mut W,
) -> Result<()> {
    let opts = opts.normalized();
    if opts.count && !opts.languages && !opts.tasks {
        return emit(out, &tasks.len().to_string());
    }

    let needs_page = opts.languages || (opts.count && !opts.tasks);
    for task in tasks {
        if !needs_page {
            emit(out, task.name())?;
            continue;
        }

        let languages = match task.languages().await {
            Ok(languages) => languages,
            Err(e) if e.is_not_found() => {
                warn!(task = task.id(), "listed task has no page, skipping");
                continue;
            }
            Err(e) => return Err(e),
        };

        if opts.count && !opts.tasks {
            emit(out, &format!("{} ({})", task.name(), languages.len()))?;
        } else {
            emit(out, task.name())?;
        }
        if opts.languages {
            write_languages(languages, opts, "  ", out)?;
        }
    }
    Ok(())
}

fn write_languages<W: Write>(
    languages: &[Language],
    opts: ListOptions,
    base_indent: &str,
    out: &mut W,
) -> Result<()> {
    let mut sorted: Vec<&Language> = languages.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    for lang in sorted {
        let mut indent = base_indent.to_string();
        if opts.languages {
            if opts.count {
                emit(out, &format!("{indent}{} ({})", lang.name, lang.blocks.len()))?;
            } else {
                emit(out, &format!("{indent}{}", lang.name))?;
            }
            indent.push_str("  ");
        }
        if opts.code {
            for (index, block) in lang.blocks.iter().enumerate() {
                emit(out, &format!("{indent}#{index}:"))?;
                for line in block.code.lines() {
                    emit(out, &format!("{indent}  {line}"))?;
                }
            }
        }
    }
    Ok(())
}

fn emit<W: Write>(out: &mut W, line: &str) -> Result<()> {
    writeln!(out, "{line}").map_err(|e| RosettaError::io("<listing output>", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rosetta_fetch::MemoryPageSource;
    use rosetta_shared::PageKind;
    use std::sync::Arc;

    fn source() -> Arc<MemoryPageSource> {
        Arc::new(
            MemoryPageSource::new()
                .with_page(
                    PageKind::Category,
                    "Basics",
                    "* [[Hello world]]\n* [[Gone]]\n* [[Loop]]\n",
                )
                .with_page(
                    PageKind::Task,
                    "Hello_world",
                    "==Python==\n<lang python>print('hi')</lang>\n==C==\n<lang c>int main(){\n  puts(\"hi\");\n}</lang>\n<lang c>int x;</lang>\n",
                )
                .with_page(
                    PageKind::Task,
                    "Loop",
                    "==Go==\n<lang go>for {}</lang>\n",
                ),
        )
    }

    async fn task_listing(opts: ListOptions) -> String {
        let task = Task::new("Hello_world", source());
        let mut out = Vec::new();
        list_task(&task, opts, &mut out).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    async fn category_listing(opts: ListOptions) -> String {
        let category = Category::new("Basics", source());
        let mut out = Vec::new();
        list_category(&category, opts, &mut out).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn task_defaults_to_sorted_languages() {
        assert_eq!(task_listing(ListOptions::default()).await, "C\nPython\n");
    }

    #[tokio::test]
    async fn task_counts() {
        let opts = ListOptions {
            languages: true,
            count: true,
            ..Default::default()
        };
        assert_eq!(task_listing(opts).await, "C (2)\nPython (1)\n");

        let opts = ListOptions {
            count: true,
            ..Default::default()
        };
        assert_eq!(task_listing(opts).await, "2\n");
    }

    #[tokio::test]
    async fn task_code_is_indented_under_languages() {
        let opts = ListOptions {
            code: true,
            ..Default::default()
        };
        let listing = task_listing(opts).await;
        assert!(listing.starts_with(
            "C\n  #0:\n    int main(){\n      puts(\"hi\");\n    }\n  #1:\n    int x;\nPython\n"
        ));
    }

    #[tokio::test]
    async fn category_listings() {
        let tasks_only = ListOptions {
            tasks: true,
            ..Default::default()
        };
        assert_eq!(category_listing(tasks_only).await, "Hello world\nGone\nLoop\n");

        let count = ListOptions {
            count: true,
            ..Default::default()
        };
        assert_eq!(category_listing(count).await, "3\n");

        let languages = ListOptions {
            languages: true,
            ..Default::default()
        };
        assert_eq!(
            category_listing(languages).await,
            "Hello world\n  C\n  Python\nLoop\n  Go\n"
        );
    }

    #[tokio::test]
    async fn category_language_counts_skip_missing_tasks() {
        let opts = ListOptions {
            tasks: false,
            languages: false,
            count: true,
            code: false,
        };
        // A bare count never loads task pages.
        assert_eq!(category_listing(opts).await, "3\n");

        let category = Category::new("Basics", source());
        let tasks: Vec<&Task<MemoryPageSource>> = category.tasks().await.unwrap().iter().collect();
        let mut out = Vec::new();
        let opts = ListOptions {
            languages: true,
            count: true,
            ..Default::default()
        };
        list_tasks(&tasks, opts, &mut out).await.unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Hello world (2)\n  C (2)\n  Python (1)\nLoop (1)\n  Go (1)\n"
        );
    }
}
