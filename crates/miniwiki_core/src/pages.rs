//! Page model and the legacy-content migration applied at load time.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::links::rewrite_legacy_links;

/// A titled unit of wiki content. `title` is the display label and, by
/// convention, the key the page is stored under; `content` is free-form
/// text that may embed `[Title]` link spans.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WikiPage {
    pub title: String,
    pub content: String,
}

/// The full page collection, keyed by title.
pub type PageMap = BTreeMap<String, WikiPage>;

pub const HOME_TITLE: &str = "Home";

pub const DEFAULT_HOME_CONTENT: &str = "Welcome! This is your wiki home page. \
Reference other pages by bracketing their titles, like [Documentation] or [Projects].";

/// The collection a fresh wiki starts with: a single Home page.
pub fn default_pages(home_content: Option<&str>) -> PageMap {
    let content = home_content.unwrap_or(DEFAULT_HOME_CONTENT);
    BTreeMap::from([(
        HOME_TITLE.to_string(),
        WikiPage {
            title: HOME_TITLE.to_string(),
            content: content.to_string(),
        },
    )])
}

/// Rewrite legacy `[[Title]]` syntax in every page's content. Returns the
/// migrated collection and how many pages changed; zero changes means the
/// input was already in current syntax.
pub fn migrate_legacy_pages(pages: &PageMap) -> (PageMap, usize) {
    let mut migrated = PageMap::new();
    let mut changed = 0usize;
    for (key, page) in pages {
        let content = rewrite_legacy_links(&page.content);
        if content != page.content {
            changed += 1;
        }
        migrated.insert(
            key.clone(),
            WikiPage {
                title: page.title.clone(),
                content,
            },
        );
    }
    (migrated, changed)
}
