//! The page store: owns the live collection, persists every replacement,
//! migrates legacy content at load time, and keeps the backup log fed.
//!
//! The store is an explicitly owned object over an injected [`Storage`]
//! backend. It assumes a single logical writer; concurrent writers would
//! degrade to last-write-wins at full-collection granularity.

use anyhow::{Context, Result};

use crate::backup::{self, BackupEntry};
use crate::pages::{PageMap, WikiPage, default_pages, migrate_legacy_pages};
use crate::storage::{PAGES_KEY, Storage};

type Listener = Box<dyn FnMut(&PageMap)>;

pub struct PageStore {
    storage: Box<dyn Storage>,
    pages: PageMap,
    listeners: Vec<(usize, Listener)>,
    next_listener_id: usize,
}

impl std::fmt::Debug for PageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageStore")
            .field("pages", &self.pages)
            .field("listeners", &self.listeners.len())
            .field("next_listener_id", &self.next_listener_id)
            .finish_non_exhaustive()
    }
}

impl PageStore {
    /// Open a store over `storage` with the built-in default Home page.
    pub fn open(storage: Box<dyn Storage>) -> Result<Self> {
        Self::open_with_home(storage, None)
    }

    /// Open a store over `storage`. When nothing is persisted yet, the
    /// collection starts as a single Home page whose content is
    /// `home_content` when given.
    ///
    /// Persisted content in the legacy `[[Title]]` syntax is rewritten
    /// before the collection is exposed. The load always ends with a
    /// persistence write and a backup append, so the migrated (or default)
    /// form reaches storage immediately.
    ///
    /// A persisted collection that fails to parse is a fatal open error;
    /// there is no recovery path for corrupt live data.
    pub fn open_with_home(storage: Box<dyn Storage>, home_content: Option<&str>) -> Result<Self> {
        let mut store = Self {
            storage,
            pages: PageMap::new(),
            listeners: Vec::new(),
            next_listener_id: 0,
        };

        store.pages = match store.storage.get_item(PAGES_KEY)? {
            Some(raw) => {
                let loaded: PageMap = serde_json::from_str(&raw)
                    .context("failed to parse persisted pages under wiki-pages")?;
                let (migrated, changed) = migrate_legacy_pages(&loaded);
                if changed > 0 {
                    log::info!("rewrote legacy [[link]] syntax in {changed} pages");
                }
                migrated
            }
            None => default_pages(home_content),
        };

        store.persist_and_backup()?;
        Ok(store)
    }

    /// The current collection snapshot.
    pub fn pages(&self) -> &PageMap {
        &self.pages
    }

    /// Replace the whole collection. Every replacement is persisted and
    /// appended to the backup log before listeners run.
    pub fn replace(&mut self, pages: PageMap) -> Result<()> {
        self.pages = pages;
        self.persist_and_backup()?;
        self.notify();
        Ok(())
    }

    /// Insert or overwrite one page, keyed by its title.
    pub fn upsert_page(&mut self, page: WikiPage) -> Result<()> {
        let mut next = self.pages.clone();
        next.insert(page.title.clone(), page);
        self.replace(next)
    }

    /// Remove a page by title. Returns `false` when no such page exists,
    /// in which case nothing is written.
    pub fn remove_page(&mut self, title: &str) -> Result<bool> {
        if !self.pages.contains_key(title) {
            return Ok(false);
        }
        let mut next = self.pages.clone();
        next.remove(title);
        self.replace(next)?;
        Ok(true)
    }

    /// Register a change listener. The listener runs synchronously with the
    /// current collection immediately, then again after every replacement.
    pub fn subscribe(&mut self, mut listener: impl FnMut(&PageMap) + 'static) -> usize {
        listener(&self.pages);
        let id = self.next_listener_id;
        self.next_listener_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: usize) {
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
    }

    /// The backup log, oldest entry first.
    pub fn backups(&self) -> Result<Vec<BackupEntry>> {
        backup::read_backups(self.storage.as_ref())
    }

    /// Replace the collection with the backup whose timestamp matches
    /// exactly. An unknown timestamp is a silent no-op. Restoring counts as
    /// a mutation and appends a fresh backup of the restored state.
    pub fn restore_backup(&mut self, timestamp: u64) -> Result<()> {
        let backups = self.backups()?;
        if let Some(entry) = backups
            .into_iter()
            .find(|entry| entry.timestamp == timestamp)
        {
            self.replace(entry.data)?;
        }
        Ok(())
    }

    /// The raw persisted JSON for the live collection, `"{}"` when nothing
    /// has been written yet.
    pub fn export_data(&self) -> Result<String> {
        Ok(self
            .storage
            .get_item(PAGES_KEY)?
            .unwrap_or_else(|| "{}".to_string()))
    }

    /// Parse `json` and wholesale-replace the collection with it. Returns
    /// `Ok(false)` without touching the collection when the input is not
    /// valid JSON, not an object, or its entries do not match the page
    /// shape. Storage failures still propagate as errors.
    pub fn import_data(&mut self, json: &str) -> Result<bool> {
        let value: serde_json::Value = match serde_json::from_str(json) {
            Ok(value) => value,
            Err(error) => {
                log::warn!("import rejected, input is not valid JSON: {error}");
                return Ok(false);
            }
        };
        if !value.is_object() {
            log::warn!("import rejected, top-level value is not an object");
            return Ok(false);
        }
        let pages: PageMap = match serde_json::from_value(value) {
            Ok(pages) => pages,
            Err(error) => {
                log::warn!("import rejected, entries do not match the page shape: {error}");
                return Ok(false);
            }
        };

        self.replace(pages)?;
        Ok(true)
    }

    fn persist_and_backup(&mut self) -> Result<()> {
        let raw = serde_json::to_string(&self.pages).context("failed to serialize pages")?;
        self.storage.set_item(PAGES_KEY, &raw)?;
        backup::append_backup(self.storage.as_mut(), &self.pages, backup::now_millis()?)
    }

    fn notify(&mut self) {
        for (_, listener) in &mut self.listeners {
            listener(&self.pages);
        }
    }
}
