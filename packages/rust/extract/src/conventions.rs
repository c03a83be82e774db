//! The enumerated table of markup conventions the splitter recognizes.
//!
//! Seeded from [`ExtractionConfig::default`]. Synonyms found while building the
//! fixture suite: `Sample output` and `'''Output:'''` (bold) are common on older
//! pages; `{{output}}` is the long form of the `{{out}}` template.

use rosetta_shared::ExtractionConfig;

/// Markup conventions, normalized for case-insensitive lookups.
#[derive(Debug, Clone)]
pub struct Conventions {
    language_heading_level: u8,
    output_templates: Vec<String>,
    output_labels: Vec<String>,
    non_language_headings: Vec<String>,
}

impl Default for Conventions {
    fn default() -> Self {
        Self::from(&ExtractionConfig::default())
    }
}

impl From<&ExtractionConfig> for Conventions {
    fn from(config: &ExtractionConfig) -> Self {
        let lower = |items: &[String]| -> Vec<String> {
            items
                .iter()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect()
        };
        Self {
            language_heading_level: config.language_heading_level.clamp(1, 6),
            output_templates: lower(&config.output_templates),
            output_labels: lower(&config.output_labels),
            non_language_headings: lower(&config.non_language_headings),
        }
    }
}

impl Conventions {
    /// Heading level whose plain-text headings name a language.
    pub fn language_heading_level(&self) -> u8 {
        self.language_heading_level
    }

    /// Whether `name` (a template name such as `out`) introduces output.
    pub fn is_output_template(&self, name: &str) -> bool {
        let name = name.trim().to_lowercase();
        self.output_templates.iter().any(|t| *t == name)
    }

    /// Whether `text` is a free-text output label, ignoring case, bold/italic
    /// quote marks and a trailing colon.
    pub fn is_output_label(&self, text: &str) -> bool {
        let normalized = strip_label_decoration(text).to_lowercase();
        !normalized.is_empty() && self.output_labels.iter().any(|l| *l == normalized)
    }

    /// Whether a heading at the language level is reserved for non-language
    /// sections.
    pub fn is_non_language_heading(&self, text: &str) -> bool {
        let normalized = strip_label_decoration(text).to_lowercase();
        self.non_language_headings.iter().any(|h| *h == normalized)
    }
}

/// Strip wiki emphasis (`'''`), a leading `;` and a trailing `:` from a label.
pub(crate) fn strip_label_decoration(text: &str) -> &str {
    let mut s = text.trim();
    s = s.strip_prefix(';').unwrap_or(s).trim();
    s = s.trim_matches('\'').trim();
    s = s.strip_suffix(':').unwrap_or(s).trim();
    s.trim_matches('\'').trim()
}
