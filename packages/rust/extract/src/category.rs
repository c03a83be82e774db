//! Task-name scan for category listing pages.
//!
//! Category pages are link lists, not code pages, so they get a simple
//! list-item scan instead of the section splitter. Both the rendered HTML
//! listing and raw wikitext bullet lists are understood.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// `/wiki/Page_name`, no query, fragment or namespace.
static WIKI_HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/wiki/([^?#:]+)$").expect("wiki href regex")
});

/// `* [[Page name]]` or `# [[Page name|label]]`.
static WIKITEXT_ITEM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*[*#]+\s*\[\[([^\]|]+)(?:\|[^\]]*)?\]\]").expect("wikitext item regex")
});

/// One task linked from a category page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskLink {
    /// Page identifier in wiki form (`100_doors`).
    pub id: String,
    /// Display title (`100 doors`).
    pub title: String,
}

impl TaskLink {
    fn from_title(title: &str) -> Self {
        let title = title.trim();
        Self {
            id: title.replace(' ', "_"),
            title: title.to_string(),
        }
    }
}

/// Extract task links from a category page, in page order, without duplicates.
pub fn task_links(page: &str) -> Vec<TaskLink> {
    let mut links = html_links(page);
    if links.is_empty() {
        links = wikitext_links(page);
    }

    let mut seen = HashSet::new();
    links.retain(|link| !link.id.is_empty() && seen.insert(link.id.clone()));
    debug!(count = links.len(), "category links extracted");
    links
}

fn html_links(page: &str) -> Vec<TaskLink> {
    let doc = Html::parse_document(page);

    for sel_str in ["#mw-pages li a[href]", "li a[href]"] {
        let Ok(selector) = Selector::parse(sel_str) else {
            continue;
        };
        let links: Vec<TaskLink> = doc
            .select(&selector)
            .filter_map(|a| {
                let href = a.value().attr("href")?;
                let caps = WIKI_HREF_RE.captures(href)?;
                let link = match a.value().attr("title") {
                    Some(title) if !title.trim().is_empty() => TaskLink::from_title(title),
                    _ => {
                        let id = caps[1].to_string();
                        TaskLink {
                            title: id.replace('_', " "),
                            id,
                        }
                    }
                };
                Some(link)
            })
            .collect();
        if !links.is_empty() {
            return links;
        }
    }

    Vec::new()
}

fn wikitext_links(page: &str) -> Vec<TaskLink> {
    WIKITEXT_ITEM_RE
        .captures_iter(page)
        .map(|caps| caps[1].trim().to_string())
        .filter(|name| !name.contains(':'))
        .map(|name| TaskLink::from_title(&name))
        .collect()
}
