//! CLI command definitions, routing, and tracing setup.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use rosetta_core::{
    Category, CategoryDocument, DumpOptions, LanguageFilter, Layout, ListOptions, Task, dump_task,
    list_task, list_tasks, to_json_string,
};
use rosetta_extract::{Conventions, Language};
use rosetta_fetch::{CachedPageSource, HttpPageSource, PageSource};
use rosetta_shared::{
    AppConfig, PageKind, cache_db_path, canonical_name, init_config, load_config,
    load_config_from,
};
use rosetta_storage::{CacheStats, Storage};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// rccli: read tasks, languages and code from Rosetta Code.
#[derive(Parser)]
#[command(
    name = "rccli",
    version,
    about = "Extract tasks, languages and code samples from Rosetta Code.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.rosettacode/rosettacode.toml.
    #[arg(long, global = true, env = "RCCLI_CONFIG")]
    pub config: Option<PathBuf>,

    /// Serve pages from the cache only; never touch the network.
    #[arg(long, global = true, conflicts_with = "no_cache")]
    pub offline: bool,

    /// Bypass the page cache.
    #[arg(long, global = true)]
    pub no_cache: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Which page a command reads.
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub(crate) struct Target {
    /// Task page identifier, e.g. 100_doors.
    #[arg(long)]
    pub task: Option<String>,

    /// Category name, e.g. Puzzles.
    #[arg(long)]
    pub category: Option<String>,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// List languages, tasks, counts or code.
    List {
        #[command(flatten)]
        target: Target,

        /// Only this language (and, for categories, only tasks that have it).
        #[arg(long)]
        language: Option<String>,

        /// Report task names.
        #[arg(long)]
        tasks: bool,

        /// Report language names.
        #[arg(long)]
        languages: bool,

        /// Report counts.
        #[arg(long)]
        count: bool,

        /// Report the code of every block.
        #[arg(long)]
        code: bool,

        /// Write to a file instead of stdout.
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Export as JSON.
    Json {
        #[command(flatten)]
        target: Target,

        #[arg(long)]
        language: Option<String>,

        /// Write to a file instead of stdout.
        #[arg(long)]
        file: Option<PathBuf>,

        /// Single-line JSON.
        #[arg(long)]
        compact: bool,
    },

    /// Write every code block to its own file.
    Dump {
        #[command(flatten)]
        target: Target,

        #[arg(long)]
        language: Option<String>,

        /// Output directory.
        #[arg(long)]
        dir: PathBuf,

        /// File layout: unix (<dir>/<name>.<ext>) or riscos (<dir>/<ext>/<name>).
        #[arg(long, default_value = "unix")]
        layout: Layout,

        /// Do not prefix files with the task intro and description.
        #[arg(long)]
        no_header: bool,
    },

    /// Page cache management.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Cache subcommands.
#[derive(Subcommand)]
pub(crate) enum CacheAction {
    /// Show what the cache holds.
    Stats,
    /// Remove cached pages: one task or category, or everything.
    Clear {
        /// Only this task page.
        #[arg(long, conflicts_with = "category")]
        task: Option<String>,

        /// Only this category listing page.
        #[arg(long)]
        category: Option<String>,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "rosetta=info",
        1 => "rosetta=debug",
        _ => "rosetta=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // Logs go to stderr so listings and JSON on stdout stay clean.
    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Page source
// ---------------------------------------------------------------------------

/// The source picked from config and flags.
enum Source {
    Direct(HttpPageSource),
    Cached(CachedPageSource<HttpPageSource>),
}

impl PageSource for Source {
    async fn fetch(&self, kind: PageKind, name: &str) -> rosetta_shared::Result<String> {
        match self {
            Self::Direct(source) => source.fetch(kind, name).await,
            Self::Cached(source) => source.fetch(kind, name).await,
        }
    }
}

/// Everything a page-reading command needs.
struct Session {
    source: Arc<Source>,
    conventions: Arc<Conventions>,
}

impl Session {
    async fn open(cli: &CliFlags) -> Result<Self> {
        let config = cli.load_config()?;
        let http = HttpPageSource::new(&config.source)?;

        let use_cache = config.cache.enabled && !cli.no_cache;
        if cli.offline && !use_cache {
            return Err(eyre!("--offline needs the page cache, but it is disabled in the config"));
        }

        let source = if use_cache {
            let path = cache_db_path(&config)?;
            let storage = Storage::open(&path)
                .await
                .wrap_err_with(|| format!("cannot open page cache at {}", path.display()))?;
            Source::Cached(CachedPageSource::new(http, Arc::new(storage)).with_offline(cli.offline))
        } else {
            Source::Direct(http)
        };

        Ok(Self {
            source: Arc::new(source),
            conventions: Arc::new(Conventions::from(&config.extraction)),
        })
    }

    fn task(&self, id: &str, language: Option<&str>) -> Task<Source> {
        let task = Task::new(task_id(id), Arc::clone(&self.source))
            .with_conventions(Arc::clone(&self.conventions));
        match language {
            Some(lang) => task.with_language_filter(language_filter(lang)),
            None => task,
        }
    }

    fn category(&self, name: &str) -> Category<Source> {
        Category::new(name, Arc::clone(&self.source)).with_conventions(Arc::clone(&self.conventions))
    }
}

/// Page identifier for a task given on the command line (`100 doors` → `100_doors`).
fn task_id(name: &str) -> String {
    canonical_name(name).replace(' ', "_")
}

fn language_filter(language: &str) -> LanguageFilter {
    let language = language.trim().to_string();
    Arc::new(move |lang: &Language| lang.name == language)
}

/// Category tasks, narrowed to those with `language` when one is given.
async fn category_tasks<'c>(
    category: &'c Category<Source>,
    language: Option<&str>,
) -> Result<Vec<&'c Task<Source>>> {
    Ok(match language {
        Some(lang) => category.tasks_with_language(lang).await?,
        None => category.tasks().await?.iter().collect(),
    })
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Global flags, split off so commands can borrow them.
struct CliFlags {
    config: Option<PathBuf>,
    offline: bool,
    no_cache: bool,
}

impl CliFlags {
    fn load_config(&self) -> Result<AppConfig> {
        Ok(match &self.config {
            Some(path) => load_config_from(path)?,
            None => load_config()?,
        })
    }
}

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let flags = CliFlags {
        config: cli.config,
        offline: cli.offline,
        no_cache: cli.no_cache,
    };

    match cli.command {
        Command::List {
            target,
            language,
            tasks,
            languages,
            count,
            code,
            file,
        } => {
            let opts = ListOptions {
                tasks,
                languages,
                count,
                code,
            };
            cmd_list(&flags, &target, language.as_deref(), opts, file.as_deref()).await
        }
        Command::Json {
            target,
            language,
            file,
            compact,
        } => cmd_json(&flags, &target, language.as_deref(), file.as_deref(), !compact).await,
        Command::Dump {
            target,
            language,
            dir,
            layout,
            no_header,
        } => {
            let opts = DumpOptions {
                dir,
                layout,
                include_intro: !no_header,
                include_task: !no_header,
            };
            cmd_dump(&flags, &target, language.as_deref(), &opts).await
        }
        Command::Cache { action } => match action {
            CacheAction::Stats => cmd_cache_stats(&flags).await,
            CacheAction::Clear { task, category } => {
                let page = match (&task, &category) {
                    (Some(id), _) => Some((PageKind::Task, task_id(id))),
                    (None, Some(name)) => Some((PageKind::Category, canonical_name(name))),
                    (None, None) => None,
                };
                cmd_cache_clear(&flags, page).await
            }
        },
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(&flags).await,
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn output(file: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match file {
        Some(path) => {
            let f = File::create(path)
                .wrap_err_with(|| format!("cannot create {}", path.display()))?;
            Box::new(BufWriter::new(f))
        }
        None => Box::new(std::io::stdout()),
    })
}

async fn cmd_list(
    flags: &CliFlags,
    target: &Target,
    language: Option<&str>,
    opts: ListOptions,
    file: Option<&Path>,
) -> Result<()> {
    let session = Session::open(flags).await?;
    let mut out = output(file)?;

    if let Some(id) = &target.task {
        let task = session.task(id, language);
        list_task(&task, opts, &mut out).await?;
    } else if let Some(name) = &target.category {
        let category = match language {
            Some(lang) => session.category(name).with_language_filter(language_filter(lang)),
            None => session.category(name),
        };
        let tasks = category_tasks(&category, language).await?;
        list_tasks(&tasks, opts, &mut out).await?;
    }

    out.flush()?;
    Ok(())
}

async fn cmd_json(
    flags: &CliFlags,
    target: &Target,
    language: Option<&str>,
    file: Option<&Path>,
    pretty: bool,
) -> Result<()> {
    let session = Session::open(flags).await?;

    let json = if let Some(id) = &target.task {
        let doc = session.task(id, language).export().await?;
        to_json_string(&doc, pretty)?
    } else if let Some(name) = &target.category {
        let category = match language {
            Some(lang) => session.category(name).with_language_filter(language_filter(lang)),
            None => session.category(name),
        };
        let doc = match language {
            None => category.export().await?,
            Some(lang) => {
                let mut tasks = Vec::new();
                for task in category_tasks(&category, Some(lang)).await? {
                    tasks.push(task.export().await?);
                }
                CategoryDocument {
                    category: category.name().to_string(),
                    tasks,
                }
            }
        };
        to_json_string(&doc, pretty)?
    } else {
        return Err(eyre!("use --task or --category to select tasks"));
    };

    let mut out = output(file)?;
    writeln!(out, "{json}")?;
    out.flush()?;
    Ok(())
}

async fn cmd_dump(
    flags: &CliFlags,
    target: &Target,
    language: Option<&str>,
    opts: &DumpOptions,
) -> Result<()> {
    let session = Session::open(flags).await?;

    let single;
    let category;
    let tasks: Vec<&Task<Source>> = if let Some(id) = &target.task {
        single = session.task(id, language);
        vec![&single]
    } else if let Some(name) = &target.category {
        category = match language {
            Some(lang) => session.category(name).with_language_filter(language_filter(lang)),
            None => session.category(name),
        };
        category_tasks(&category, language).await?
    } else {
        return Err(eyre!("use --task or --category to select tasks"));
    };

    info!(tasks = tasks.len(), dir = %opts.dir.display(), layout = %opts.layout, "dumping code");

    let progress = ProgressBar::new(tasks.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("{spinner:.cyan} [{pos}/{len}] {msg}")
            .map_err(|e| eyre!("invalid progress template: {e}"))?
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );

    let mut files = 0usize;
    for task in tasks.iter().copied() {
        progress.set_message(task.name().to_string());
        match dump_task(task, opts).await {
            Ok(written) => files += written.len(),
            Err(e) if e.is_not_found() => {
                warn!(task = task.id(), "listed task has no page, skipping");
            }
            Err(e) => {
                progress.abandon();
                return Err(e.into());
            }
        }
        progress.inc(1);
    }
    progress.finish_and_clear();

    println!();
    println!("  Code written!");
    println!("  Tasks:  {}", tasks.len());
    println!("  Files:  {files}");
    println!("  Path:   {}", opts.dir.display());
    println!();

    Ok(())
}

fn cache_path(flags: &CliFlags) -> Result<PathBuf> {
    let config = flags.load_config()?;
    Ok(cache_db_path(&config)?)
}

/// Stats of the cache at `path`, or `None` when no cache exists yet. Never
/// creates or migrates the database.
async fn read_cache_stats(path: &Path) -> Result<Option<CacheStats>> {
    if !path.exists() {
        return Ok(None);
    }
    let storage = Storage::open_readonly(path)
        .await
        .wrap_err_with(|| format!("cannot open page cache at {}", path.display()))?;
    Ok(Some(storage.stats().await?))
}

/// Remove one cached page, or every page when none is named.
async fn clear_cache(storage: &Storage, page: Option<(PageKind, &str)>) -> Result<u64> {
    Ok(match page {
        Some((kind, name)) => u64::from(storage.delete_page(kind, name).await?),
        None => storage.clear().await?,
    })
}

async fn cmd_cache_stats(flags: &CliFlags) -> Result<()> {
    let path = cache_path(flags)?;
    let Some(stats) = read_cache_stats(&path).await? else {
        println!("No page cache at {}", path.display());
        return Ok(());
    };

    println!();
    println!("  Tasks:       {}", stats.tasks);
    println!("  Categories:  {}", stats.categories);
    println!("  Total size:  {} bytes", stats.total_bytes);
    println!();

    Ok(())
}

async fn cmd_cache_clear(flags: &CliFlags, page: Option<(PageKind, String)>) -> Result<()> {
    let path = cache_path(flags)?;
    if !path.exists() {
        println!("No page cache at {}", path.display());
        return Ok(());
    }
    let storage = Storage::open(&path)
        .await
        .wrap_err_with(|| format!("cannot open page cache at {}", path.display()))?;

    let page = page.as_ref().map(|(kind, name)| (*kind, name.as_str()));
    let removed = clear_cache(&storage, page).await?;
    println!("Removed {removed} cached pages");
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(flags: &CliFlags) -> Result<()> {
    let config = flags.load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_db_path() -> PathBuf {
        std::env::temp_dir().join(format!("rccli-test-{}.db", uuid::Uuid::now_v7()))
    }

    #[tokio::test]
    async fn stats_without_cache_do_not_create_it() {
        let path = temp_db_path();
        assert!(read_cache_stats(&path).await.unwrap().is_none());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn stats_read_existing_cache() {
        let path = temp_db_path();
        {
            let storage = Storage::open(&path).await.unwrap();
            storage.put_page(PageKind::Task, "100_doors", "==C==").await.unwrap();
            storage.put_page(PageKind::Category, "Puzzles", "<ul></ul>").await.unwrap();
        }

        let stats = read_cache_stats(&path).await.unwrap().expect("cache exists");
        assert_eq!(stats.tasks, 1);
        assert_eq!(stats.categories, 1);

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn clear_one_page_or_everything() {
        let path = temp_db_path();
        let storage = Storage::open(&path).await.unwrap();
        storage.put_page(PageKind::Task, "100_doors", "a").await.unwrap();
        storage.put_page(PageKind::Task, "FizzBuzz", "b").await.unwrap();
        storage.put_page(PageKind::Category, "Puzzles", "c").await.unwrap();

        let removed = clear_cache(&storage, Some((PageKind::Task, "100_doors"))).await.unwrap();
        assert_eq!(removed, 1);
        assert!(storage.get_page(PageKind::Task, "100_doors").await.unwrap().is_none());
        assert!(storage.get_page(PageKind::Task, "FizzBuzz").await.unwrap().is_some());

        let removed = clear_cache(&storage, Some((PageKind::Task, "100_doors"))).await.unwrap();
        assert_eq!(removed, 0);

        assert_eq!(clear_cache(&storage, None).await.unwrap(), 2);

        drop(storage);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn task_ids_use_underscores() {
        assert_eq!(task_id(" 100 doors "), "100_doors");
        assert_eq!(task_id("Sorting_algorithms/Bubble_sort"), "Sorting_algorithms/Bubble_sort");
    }
}
