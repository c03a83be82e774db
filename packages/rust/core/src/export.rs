//! JSON export of tasks and categories.

use std::path::Path;

use rosetta_extract::{Language, ParseOutcome};
use rosetta_fetch::PageSource;
use rosetta_shared::{Result, RosettaError};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::category::Category;
use crate::task::Task;

/// Serializable snapshot of a loaded task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDocument {
    pub id: String,
    pub name: String,
    pub intro: String,
    /// The `;Task:` block.
    pub task: String,
    pub outcome: ParseOutcome,
    pub languages: Vec<Language>,
}

/// Serializable snapshot of a category and every task it lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDocument {
    pub category: String,
    pub tasks: Vec<TaskDocument>,
}

impl<S: PageSource> Task<S> {
    /// Load the task (if needed) and snapshot it.
    pub async fn export(&self) -> Result<TaskDocument> {
        let page = self.load().await?;
        Ok(TaskDocument {
            id: self.id().to_string(),
            name: self.name().to_string(),
            intro: page.parsed.intro.clone(),
            task: page.parsed.description.clone(),
            outcome: page.parsed.outcome,
            languages: page.parsed.languages.clone(),
        })
    }
}

impl<S: PageSource> Category<S> {
    /// Load every listed task and snapshot the category. Listed tasks without
    /// a page are left out.
    #[instrument(skip(self), fields(category = %self.name()))]
    pub async fn export(&self) -> Result<CategoryDocument> {
        let mut tasks = Vec::new();
        for task in self.tasks().await? {
            match task.export().await {
                Ok(doc) => tasks.push(doc),
                Err(e) if e.is_not_found() => {
                    warn!(task = task.id(), "listed task has no page, skipping");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(CategoryDocument {
            category: self.name().to_string(),
            tasks,
        })
    }
}

/// Serialize `value` as JSON.
pub fn to_json_string<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    json.map_err(|e| RosettaError::Serialization(e.to_string()))
}

/// Write `value` as JSON to `path`, creating parent directories. The file
/// ends with a newline.
pub fn write_json<T: Serialize>(path: &Path, value: &T, pretty: bool) -> Result<()> {
    let mut json = to_json_string(value, pretty)?;
    json.push('\n');

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| RosettaError::io(parent, e))?;
    }
    std::fs::write(path, json).map_err(|e| RosettaError::io(path, e))?;
    debug!(path = %path.display(), "wrote JSON file");
    Ok(())
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
                    "* [[Hello world]]\n* [[Gone]]\n",
                )
                .with_page(
                    PageKind::Task,
                    "Hello_world",
                    "Print it.\n==C==\n<lang c>puts(\"hi\");</lang>\nOutput:\nhi\n",
                ),
        )
    }

    #[tokio::test]
    async fn task_document_shape() {
        let task = Task::new("Hello_world", source());
        let doc = task.export().await.unwrap();
        assert_eq!(doc.intro, "Print it.");
        assert_eq!(doc.outcome, ParseOutcome::Complete);

        let json: serde_json::Value = serde_json::from_str(&to_json_string(&doc, false).unwrap()).unwrap();
        assert_eq!(json["id"], "Hello_world");
        assert_eq!(json["outcome"], "complete");
        assert_eq!(json["languages"][0]["name"], "C");
        assert_eq!(json["languages"][0]["blocks"][0]["output"]["text"], "hi");
    }

    #[tokio::test]
    async fn category_document_skips_missing_tasks() {
        let category = Category::new("Basics", source());
        let doc = category.export().await.unwrap();
        assert_eq!(doc.category, "Basics");
        assert_eq!(doc.tasks.len(), 1);
        assert_eq!(doc.tasks[0].name, "Hello world");
    }

    #[tokio::test]
    async fn write_json_roundtrip() {
        let dir = std::env::temp_dir().join(format!("rc-export-test-{}", uuid::Uuid::now_v7()));
        let path = dir.join("nested").join("task.json");

        let doc = Task::new("Hello_world", source()).export().await.unwrap();
        write_json(&path, &doc, true).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.ends_with("}\n"));
        let back: TaskDocument = serde_json::from_str(&content).unwrap();
        assert_eq!(back, doc);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
