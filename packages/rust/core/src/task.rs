//! Lazily-loaded task handle.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use rosetta_extract::{Conventions, Language, ParseOutcome, ParsedTask, parse_task_page};
use rosetta_fetch::PageSource;
use rosetta_shared::{PageKind, Result, canonical_name};
use tokio::sync::OnceCell;
use tracing::{debug, instrument, warn};

/// Predicate deciding which languages a task exposes.
pub type LanguageFilter = Arc<dyn Fn(&Language) -> bool + Send + Sync>;

/// The parsed, filtered content of a task page.
#[derive(Debug)]
pub(crate) struct TaskPage {
    pub(crate) parsed: ParsedTask,
    by_name: HashMap<String, usize>,
}

impl TaskPage {
    fn new(mut parsed: ParsedTask, filter: Option<&LanguageFilter>) -> Self {
        if let Some(filter) = filter {
            parsed.languages.retain(|lang| filter(lang));
        }
        let by_name = parsed
            .languages
            .iter()
            .enumerate()
            .map(|(i, lang)| (lang.name.clone(), i))
            .collect();
        Self { parsed, by_name }
    }
}

/// A task page, fetched and parsed on first access.
///
/// The page is loaded at most once per handle, even with concurrent callers.
/// A failed load (for example a missing page) leaves the handle unloaded.
pub struct Task<S> {
    id: String,
    name: String,
    source: Arc<S>,
    conventions: Arc<Conventions>,
    language_filter: Option<LanguageFilter>,
    page: OnceCell<TaskPage>,
}

impl<S> fmt::Debug for Task<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Task");
        s.field("id", &self.id).field("name", &self.name);
        match self.page.get() {
            Some(page) => s.field("languages", &page.parsed.languages.len()),
            None => s.field("languages", &"not loaded"),
        };
        s.finish()
    }
}

impl<S: PageSource> Task<S> {
    /// Handle for the task whose page identifier is `id` (`100_doors`).
    pub fn new(id: impl Into<String>, source: Arc<S>) -> Self {
        let id = canonical_name(&id.into());
        Self {
            name: id.clone(),
            id,
            source,
            conventions: Arc::new(Conventions::default()),
            language_filter: None,
            page: OnceCell::new(),
        }
    }

    /// Display name, when it differs from the identifier (`100 doors`).
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_conventions(mut self, conventions: Arc<Conventions>) -> Self {
        self.conventions = conventions;
        self.page = OnceCell::new();
        self
    }

    /// Only expose languages matching `filter`. Discards any loaded page.
    pub fn with_language_filter(mut self, filter: LanguageFilter) -> Self {
        self.language_filter = Some(filter);
        self.page = OnceCell::new();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// File-system safe name (`/` replaced by `_`).
    pub fn fs_name(&self) -> String {
        self.id.replace('/', "_")
    }

    /// Whether the page has been fetched and parsed.
    pub fn is_loaded(&self) -> bool {
        self.page.initialized()
    }

    /// All languages on the page, in order of first appearance.
    pub async fn languages(&self) -> Result<&[Language]> {
        Ok(&self.load().await?.parsed.languages)
    }

    /// Language by name (surrounding whitespace ignored, case significant).
    pub async fn language(&self, name: &str) -> Result<Option<&Language>> {
        let page = self.load().await?;
        Ok(page
            .by_name
            .get(&canonical_name(name))
            .map(|&i| &page.parsed.languages[i]))
    }

    pub async fn language_names(&self) -> Result<Vec<&str>> {
        Ok(self
            .languages()
            .await?
            .iter()
            .map(|l| l.name.as_str())
            .collect())
    }

    /// Prose before the task description.
    pub async fn intro(&self) -> Result<&str> {
        Ok(&self.load().await?.parsed.intro)
    }

    /// The `;Task:` block.
    pub async fn description(&self) -> Result<&str> {
        Ok(&self.load().await?.parsed.description)
    }

    /// Whether the parse recovered anything. `Degraded` is a soft signal.
    pub async fn outcome(&self) -> Result<ParseOutcome> {
        Ok(self.load().await?.parsed.outcome)
    }

    pub(crate) async fn load(&self) -> Result<&TaskPage> {
        self.page.get_or_try_init(|| self.fetch_and_parse()).await
    }

    #[instrument(skip(self), fields(task = %self.id))]
    async fn fetch_and_parse(&self) -> Result<TaskPage> {
        let raw = self.source.fetch(PageKind::Task, &self.id).await?;
        let parsed = parse_task_page(&raw, &self.conventions);

        if parsed.outcome == ParseOutcome::Degraded {
            warn!(
                bytes = raw.len(),
                "no languages recovered from non-empty page, layout not recognized"
            );
        }

        let page = TaskPage::new(parsed, self.language_filter.as_ref());
        debug!(languages = page.parsed.languages.len(), "task loaded");
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rosetta_fetch::MemoryPageSource;

    const PAGE: &str = "Open the doors.\n;Task:\nSay which are open.\n==C==\n<lang c>int main(){}</lang>\nOutput:\n(no output)\n==Python==\n<lang python>a</lang>\n<lang python>b</lang>\n";

    fn source() -> Arc<MemoryPageSource> {
        Arc::new(MemoryPageSource::new().with_page(PageKind::Task, "100_doors", PAGE))
    }

    #[tokio::test]
    async fn languages_load_lazily_once() {
        let source = source();
        let task = Task::new("100_doors", source.clone());
        assert!(!task.is_loaded());
        assert_eq!(source.fetch_count(), 0);

        let names = task.language_names().await.unwrap();
        assert_eq!(names, vec!["C", "Python"]);
        assert!(task.is_loaded());

        let c = task.language("C").await.unwrap().expect("C");
        assert_eq!(c.blocks[0].output_text(), "(no output)");
        assert_eq!(task.language(" Python ").await.unwrap().unwrap().blocks.len(), 2);
        assert!(task.language("python").await.unwrap().is_none());

        assert_eq!(task.intro().await.unwrap(), "Open the doors.");
        assert_eq!(task.description().await.unwrap(), "Say which are open.");
        assert_eq!(source.fetch_count(), 1);
    }

    #[tokio::test]
    async fn concurrent_first_access_fetches_once() {
        let source = source();
        let task = Task::new("100_doors", source.clone());

        let (a, b, c) = tokio::join!(task.languages(), task.languages(), task.outcome());
        assert_eq!(a.unwrap().len(), 2);
        assert_eq!(b.unwrap().len(), 2);
        assert_eq!(c.unwrap(), ParseOutcome::Complete);
        assert_eq!(source.fetch_count(), 1);
    }

    #[tokio::test]
    async fn missing_task_is_not_found_and_not_cached() {
        let source = Arc::new(MemoryPageSource::new());
        let task = Task::new("No_such_task", source.clone());

        let err = task.languages().await.unwrap_err();
        assert!(err.is_not_found());
        assert!(!task.is_loaded());

        // A later access tries again instead of returning a partial task.
        task.languages().await.unwrap_err();
        assert_eq!(source.fetch_count(), 2);
    }

    #[tokio::test]
    async fn language_filter_applies() {
        let filter: LanguageFilter = Arc::new(|lang: &Language| lang.name == "Python");
        let task = Task::new("100_doors", source()).with_language_filter(filter);
        assert_eq!(task.language_names().await.unwrap(), vec!["Python"]);
        assert!(task.language("C").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unrecognized_layout_is_degraded() {
        let source = Arc::new(
            MemoryPageSource::new().with_page(PageKind::Task, "Odd", "Just prose, no sections."),
        );
        let task = Task::new("Odd", source);
        assert!(task.languages().await.unwrap().is_empty());
        assert_eq!(task.outcome().await.unwrap(), ParseOutcome::Degraded);
    }

    #[test]
    fn fs_name_replaces_slashes() {
        let task = Task::new("Sorting_algorithms/Bubble_sort", source());
        assert_eq!(task.fs_name(), "Sorting_algorithms_Bubble_sort");
        assert_eq!(task.name(), "Sorting_algorithms/Bubble_sort");
        let task = task.with_name("Sorting algorithms/Bubble sort");
        assert_eq!(task.name(), "Sorting algorithms/Bubble sort");
        assert_eq!(task.id(), "Sorting_algorithms/Bubble_sort");
    }
}
