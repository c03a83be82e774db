//! Lazily-loaded category handle.

use std::fmt;
use std::sync::Arc;

use rosetta_extract::{Conventions, TaskLink, task_links};
use rosetta_fetch::PageSource;
use rosetta_shared::{PageKind, Result, canonical_name};
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

use crate::task::{LanguageFilter, Task};

/// Predicate deciding which listed tasks a category exposes.
pub type TaskFilter = Arc<dyn Fn(&TaskLink) -> bool + Send + Sync>;

/// A category listing page. Its tasks are handles that have not been loaded.
pub struct Category<S> {
    name: String,
    source: Arc<S>,
    conventions: Arc<Conventions>,
    task_filter: Option<TaskFilter>,
    language_filter: Option<LanguageFilter>,
    tasks: OnceCell<Vec<Task<S>>>,
}

impl<S> fmt::Debug for Category<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Category");
        s.field("name", &self.name);
        match self.tasks.get() {
            Some(tasks) => s.field("tasks", &tasks.len()),
            None => s.field("tasks", &"not loaded"),
        };
        s.finish()
    }
}

impl<S: PageSource> Category<S> {
    pub fn new(name: impl Into<String>, source: Arc<S>) -> Self {
        Self {
            name: canonical_name(&name.into()),
            source,
            conventions: Arc::new(Conventions::default()),
            task_filter: None,
            language_filter: None,
            tasks: OnceCell::new(),
        }
    }

    /// Conventions handed to every task of this category.
    pub fn with_conventions(mut self, conventions: Arc<Conventions>) -> Self {
        self.conventions = conventions;
        self.tasks = OnceCell::new();
        self
    }

    /// Only expose listed tasks matching `filter`.
    pub fn with_task_filter(mut self, filter: TaskFilter) -> Self {
        self.task_filter = Some(filter);
        self.tasks = OnceCell::new();
        self
    }

    /// Language filter applied to every task of this category.
    pub fn with_language_filter(mut self, filter: LanguageFilter) -> Self {
        self.language_filter = Some(filter);
        self.tasks = OnceCell::new();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_loaded(&self) -> bool {
        self.tasks.initialized()
    }

    /// Task handles in listing order. Only the listing page is fetched.
    pub async fn tasks(&self) -> Result<&[Task<S>]> {
        let tasks = self.tasks.get_or_try_init(|| self.fetch_listing()).await?;
        Ok(tasks.as_slice())
    }

    /// Task by identifier (`100_doors`) or title (`100 doors`).
    pub async fn task(&self, name: &str) -> Result<Option<&Task<S>>> {
        let name = canonical_name(name);
        Ok(self
            .tasks()
            .await?
            .iter()
            .find(|t| t.id() == name || t.name() == name))
    }

    /// Tasks that have a language named `language`.
    ///
    /// Loads every task. Listed pages that turn out to be missing are skipped
    /// with a warning; any other failure is returned.
    pub async fn tasks_with_language(&self, language: &str) -> Result<Vec<&Task<S>>> {
        let mut matching = Vec::new();
        for task in self.tasks().await? {
            match task.language(language).await {
                Ok(Some(_)) => matching.push(task),
                Ok(None) => {}
                Err(e) if e.is_not_found() => {
                    warn!(task = task.id(), "listed task has no page, skipping");
                }
                Err(e) => return Err(e),
            }
        }
        debug!(language, count = matching.len(), "tasks with language");
        Ok(matching)
    }

    #[instrument(skip(self), fields(category = %self.name))]
    async fn fetch_listing(&self) -> Result<Vec<Task<S>>> {
        let page = self.source.fetch(PageKind::Category, &self.name).await?;
        let mut links = task_links(&page);
        if let Some(filter) = &self.task_filter {
            links.retain(|link| filter(link));
        }
        info!(tasks = links.len(), "category loaded");

        Ok(links
            .into_iter()
            .map(|link| {
                let task = Task::new(link.id, Arc::clone(&self.source))
                    .with_name(link.title)
                    .with_conventions(Arc::clone(&self.conventions));
                match &self.language_filter {
                    Some(filter) => task.with_language_filter(Arc::clone(filter)),
                    None => task,
                }
            })
            .collect())
    }
}
