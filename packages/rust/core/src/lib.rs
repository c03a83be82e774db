//! Domain handles and outputs for the Rosetta Code extractor.
//!
//! [`Task`] and [`Category`] are lazy handles over a [`PageSource`]: nothing
//! is fetched until a caller asks for content, and each page is parsed at
//! most once per handle. The [`export`], [`dirdump`] and [`report`] modules
//! turn loaded handles into JSON, per-block source files and text listings.
//!
//! [`PageSource`]: rosetta_fetch::PageSource

pub mod category;
pub mod dirdump;
pub mod export;
pub mod report;
pub mod task;

pub use category::{Category, TaskFilter};
pub use dirdump::{DumpOptions, Layout, dump_task, write_task_files};
pub use export::{CategoryDocument, TaskDocument, to_json_string, write_json};
pub use report::{ListOptions, list_category, list_task, list_tasks};
pub use task::{LanguageFilter, Task};
