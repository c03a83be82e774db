//! Application configuration for the Rosetta Code extractor.
//!
//! User config lives at `~/.rosettacode/rosettacode.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, RosettaError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "rosettacode.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".rosettacode";

/// Default page cache database file name (inside the config directory).
const CACHE_FILE_NAME: &str = "pages.db";

// ---------------------------------------------------------------------------
// Config structs (matching rosettacode.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Where pages are fetched from.
    #[serde(default)]
    pub source: SourceConfig,

    /// On-disk page cache.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Markup conventions used by the extraction engine.
    #[serde(default)]
    pub extraction: ExtractionConfig,
}

/// `[source]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Site root, e.g. `https://rosettacode.org`.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// HTTP request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Largest page body accepted, in bytes.
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            max_response_bytes: default_max_response_bytes(),
        }
    }
}

fn default_base_url() -> String {
    "https://rosettacode.org".into()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_response_bytes() -> u64 {
    16 * 1024 * 1024
}

/// `[cache]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether fetched pages are cached on disk.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Cache database path. Defaults to `~/.rosettacode/pages.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

fn default_true() -> bool {
    true
}

/// `[extraction]` section: the enumerated table of markup conventions.
///
/// Output label synonyms and heading conventions vary across pages, so they
/// are data rather than checks scattered through the scanner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Heading level whose plain-text headings name a language (`==C==`).
    #[serde(default = "default_language_heading_level")]
    pub language_heading_level: u8,

    /// Template names that introduce program output (`{{out}}`, `{{output|...}}`).
    #[serde(default = "default_output_templates")]
    pub output_templates: Vec<String>,

    /// Free-text labels that introduce program output (`Output:`, `'''Sample output'''`).
    #[serde(default = "default_output_labels")]
    pub output_labels: Vec<String>,

    /// Headings at the language level that never name a language.
    #[serde(default = "default_non_language_headings")]
    pub non_language_headings: Vec<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            language_heading_level: default_language_heading_level(),
            output_templates: default_output_templates(),
            output_labels: default_output_labels(),
            non_language_headings: default_non_language_headings(),
        }
    }
}

fn default_language_heading_level() -> u8 {
    2
}
fn default_output_templates() -> Vec<String> {
    ["out", "output"].map(String::from).to_vec()
}
fn default_output_labels() -> Vec<String> {
    [
        "Output",
        "Outputs",
        "Sample output",
        "Example output",
        "Program output",
        "Sample run",
    ]
    .map(String::from)
    .to_vec()
}
fn default_non_language_headings() -> Vec<String> {
    [
        "See also",
        "References",
        "Related tasks",
        "Notes",
        "Task",
        "Description",
        "External links",
    ]
    .map(String::from)
    .to_vec()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.rosettacode/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| RosettaError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.rosettacode/rosettacode.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Resolve the page cache database path, honoring `[cache] path` and `~/`.
pub fn cache_db_path(config: &AppConfig) -> Result<PathBuf> {
    match config.cache.path.as_deref() {
        Some(p) => expand_home(p),
        None => Ok(config_dir()?.join(CACHE_FILE_NAME)),
    }
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| RosettaError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        RosettaError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| RosettaError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| RosettaError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| RosettaError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Reject values the extractor cannot work with.
fn validate_config(config: &AppConfig) -> Result<()> {
    let level = config.extraction.language_heading_level;
    if !(1..=6).contains(&level) {
        return Err(RosettaError::config(format!(
            "language_heading_level must be between 1 and 6, got {level}"
        )));
    }
    if !config.source.base_url.starts_with("http://")
        && !config.source.base_url.starts_with("https://")
    {
        return Err(RosettaError::config(format!(
            "base_url must be an http(s) URL, got '{}'",
            config.source.base_url
        )));
    }
    Ok(())
}

fn expand_home(path: &str) -> Result<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| RosettaError::config("could not determine home directory"))?;
            Ok(home.join(rest))
        }
        None => Ok(PathBuf::from(path)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("base_url"));
        assert!(toml_str.contains("output_templates"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.extraction.language_heading_level, 2);
        assert_eq!(parsed.source.base_url, "https://rosettacode.org");
        assert!(parsed.cache.enabled);
    }

    #[test]
    fn partial_extraction_section_keeps_other_defaults() {
        let toml_str = r#"
[extraction]
output_labels = ["Output", "Transcript"]
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.extraction.output_labels, vec!["Output", "Transcript"]);
        assert_eq!(config.extraction.output_templates, vec!["out", "output"]);
        assert_eq!(config.source.timeout_secs, 30);
    }

    #[test]
    fn invalid_heading_level_rejected() {
        let mut config = AppConfig::default();
        config.extraction.language_heading_level = 9;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("language_heading_level"));
    }

    #[test]
    fn explicit_cache_path_is_used() {
        let mut config = AppConfig::default();
        config.cache.path = Some("/tmp/rc-pages.db".into());
        assert_eq!(
            cache_db_path(&config).unwrap(),
            PathBuf::from("/tmp/rc-pages.db")
        );
    }
}
