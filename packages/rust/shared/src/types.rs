//! Small domain types shared by every crate.

use serde::{Deserialize, Serialize};

/// The two kinds of page the site serves to the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageKind {
    /// A task page: wiki markup with one section per language.
    Task,
    /// A category listing page: a list of links to task pages.
    Category,
}

impl PageKind {
    /// Stable lowercase identifier, used as a cache key component.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Category => "category",
        }
    }
}

impl std::fmt::Display for PageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PageKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "task" => Ok(Self::Task),
            "category" => Ok(Self::Category),
            other => Err(format!("unknown page kind '{other}'")),
        }
    }
}

/// Canonicalize a language or category name: trim surrounding whitespace,
/// preserve case.
pub fn canonical_name(name: &str) -> String {
    name.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_kind_roundtrip() {
        for kind in [PageKind::Task, PageKind::Category] {
            let parsed: PageKind = kind.as_str().parse().expect("parse kind");
            assert_eq!(parsed, kind);
        }
        assert!("page".parse::<PageKind>().is_err());
    }

    #[test]
    fn canonical_name_trims_but_keeps_case() {
        assert_eq!(canonical_name("  ALGOL 68 \t"), "ALGOL 68");
        assert_eq!(canonical_name("python"), "python");
    }
}
