//! Rows of the current folder and lazy folder size computation.

use crate::error::{BackendError, BrowserError, Result};
use crate::navigator::FolderPath;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::debug;

pub const PARENT_LINK_KEY: &str = "..";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    File,
    Folder,
    /// Synthetic `..` row, never sent to the backend.
    ParentLink,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub key: String,
    pub kind: EntryKind,
    pub size: Option<u64>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl ObjectEntry {
    pub fn file(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            kind: EntryKind::File,
            size: Some(size),
            last_modified: None,
        }
    }

    pub fn folder(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind: EntryKind::Folder,
            size: None,
            last_modified: None,
        }
    }

    pub fn parent_link() -> Self {
        Self {
            key: PARENT_LINK_KEY.to_string(),
            kind: EntryKind::ParentLink,
            size: None,
            last_modified: None,
        }
    }

    pub fn is_folder(&self) -> bool {
        self.kind == EntryKind::Folder
    }

    pub fn is_parent_link(&self) -> bool {
        self.kind == EntryKind::ParentLink
    }
}

/// Latest published rows and the folder they belong to.
///
/// Republishing keeps the scope; clearing (bucket switch, disconnect) starts
/// a new one, so size replies issued before a clear can never patch rows
/// that only happen to share a folder path.
#[derive(Debug, Default)]
pub struct ObjectListingStore {
    rows: Vec<ObjectEntry>,
    folder: FolderPath,
    scope: u64,
    loaded: bool,
}

impl ObjectListingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[ObjectEntry] {
        &self.rows
    }

    /// Folder the published rows were listed from.
    pub fn folder(&self) -> &FolderPath {
        &self.folder
    }

    pub fn scope(&self) -> u64 {
        self.scope
    }

    /// Whether a listing has been published since the last clear.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn get(&self, key: &str) -> Option<&ObjectEntry> {
        self.rows.iter().find(|row| row.key == key)
    }

    /// Replaces the rows. Sizes already known for folders that are listed
    /// again are carried over.
    pub fn publish(&mut self, folder: FolderPath, mut rows: Vec<ObjectEntry>) {
        if folder == self.folder {
            for row in rows.iter_mut().filter(|row| row.is_folder() && row.size.is_none()) {
                row.size = self.get(&row.key).and_then(|old| old.size);
            }
        }
        self.rows = rows;
        self.folder = folder;
        self.loaded = true;
    }

    pub fn clear(&mut self) {
        self.rows.clear();
        self.folder = FolderPath::root();
        self.scope += 1;
        self.loaded = false;
    }

    /// Sets the size of the row keyed `key`. Returns false if no row matches.
    pub fn patch_size(&mut self, key: &str, size: u64) -> bool {
        match self.rows.iter_mut().find(|row| row.key == key) {
            Some(row) => {
                row.size = Some(size);
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeTicket {
    /// Row key to patch.
    pub key: String,
    /// Full prefix sent to the backend.
    pub prefix: String,
    /// Folder whose listing holds the row.
    pub folder: FolderPath,
    scope: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SizeOutcome {
    Patched { key: String, size: u64 },
    Failed { key: String, reason: String },
    /// The row is no longer on screen.
    Stale,
}

/// Tracks folder size requests still waiting on the backend.
#[derive(Debug, Default)]
pub struct FolderSizeAggregator {
    pending: HashSet<(u64, String)>,
}

impl FolderSizeAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pending(&self, store: &ObjectListingStore, key: &str) -> bool {
        let prefix = format!("{}{}", store.folder().as_str(), key);
        self.pending.contains(&(store.scope(), prefix))
    }

    pub fn request(&mut self, store: &ObjectListingStore, key: &str) -> Result<SizeTicket> {
        let row = store.get(key).ok_or_else(|| BrowserError::Size {
            prefix: key.to_string(),
            reason: "no such row in the current listing".to_string(),
        })?;
        if !row.is_folder() {
            return Err(BrowserError::Size {
                prefix: key.to_string(),
                reason: "not a folder".to_string(),
            });
        }

        let ticket = SizeTicket {
            key: key.to_string(),
            prefix: format!("{}{}", store.folder().as_str(), key),
            folder: store.folder().clone(),
            scope: store.scope(),
        };
        self.pending.insert((ticket.scope, ticket.prefix.clone()));
        debug!("Requesting size of {}", ticket.prefix);
        Ok(ticket)
    }

    /// Failures are always reported. A size is applied while its row is
    /// still displayed, even if the folder was re-listed in between.
    pub fn complete(
        &mut self,
        store: &mut ObjectListingStore,
        ticket: &SizeTicket,
        result: std::result::Result<u64, BackendError>,
    ) -> SizeOutcome {
        self.pending.remove(&(ticket.scope, ticket.prefix.clone()));

        let size = match result {
            Ok(size) => size,
            Err(e) => {
                return SizeOutcome::Failed {
                    key: ticket.key.clone(),
                    reason: e.to_string(),
                }
            }
        };

        if ticket.scope != store.scope() || &ticket.folder != store.folder() {
            debug!("Dropping size of {}, its folder is no longer shown", ticket.prefix);
            return SizeOutcome::Stale;
        }
        if store.patch_size(&ticket.key, size) {
            SizeOutcome::Patched {
                key: ticket.key.clone(),
                size,
            }
        } else {
            debug!("Dropping size of {}, the row is gone", ticket.prefix);
            SizeOutcome::Stale
        }
    }
}

/// Human readable byte count, e.g. `1.5 MB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing() -> ObjectListingStore {
        let mut store = ObjectListingStore::new();
        store.publish(FolderPath::root(), vec![
            ObjectEntry::folder("docs/"),
            ObjectEntry::folder("img/"),
            ObjectEntry::file("readme.md", 42),
        ]);
        store
    }

    #[test]
    fn size_patch_touches_only_matching_row() {
        let mut store = listing();
        let before = store.rows().to_vec();
        let mut sizes = FolderSizeAggregator::new();

        let ticket = sizes.request(&store, "docs/").unwrap();
        assert_eq!(ticket.prefix, "docs/");
        let outcome = sizes.complete(&mut store, &ticket, Ok(2048));

        assert_eq!(
            outcome,
            SizeOutcome::Patched {
                key: "docs/".to_string(),
                size: 2048
            }
        );
        assert_eq!(store.rows()[0].size, Some(2048));
        assert_eq!(store.rows()[1], before[1]);
        assert_eq!(store.rows()[2], before[2]);
    }

    #[test]
    fn interleaved_size_requests_keep_each_others_results() {
        let mut store = listing();
        let mut sizes = FolderSizeAggregator::new();
        let docs = sizes.request(&store, "docs/").unwrap();
        let img = sizes.request(&store, "img/").unwrap();

        sizes.complete(&mut store, &img, Ok(7));
        sizes.complete(&mut store, &docs, Ok(9));

        assert_eq!(store.get("docs/").unwrap().size, Some(9));
        assert_eq!(store.get("img/").unwrap().size, Some(7));
    }

    #[test]
    fn size_prefix_includes_current_folder() {
        let mut store = ObjectListingStore::new();
        store.publish(FolderPath::parse("a/b/").unwrap(), vec![ObjectEntry::folder("docs/")]);
        let mut sizes = FolderSizeAggregator::new();
        let ticket = sizes.request(&store, "docs/").unwrap();
        assert_eq!(ticket.prefix, "a/b/docs/");
        assert_eq!(ticket.key, "docs/");
        assert!(sizes.is_pending(&store, "docs/"));
    }

    #[test]
    fn size_failure_leaves_store_untouched() {
        let mut store = listing();
        let before = store.rows().to_vec();
        let mut sizes = FolderSizeAggregator::new();
        let ticket = sizes.request(&store, "docs/").unwrap();

        let outcome = sizes.complete(
            &mut store,
            &ticket,
            Err(BackendError::Transport("refused".to_string())),
        );

        assert!(matches!(outcome, SizeOutcome::Failed { .. }));
        assert_eq!(store.rows(), before.as_slice());
        assert!(!sizes.is_pending(&store, "docs/"));
    }

    #[test]
    fn size_survives_relisting_of_same_folder() {
        let mut store = listing();
        let mut sizes = FolderSizeAggregator::new();
        let ticket = sizes.request(&store, "docs/").unwrap();

        store.publish(FolderPath::root(), vec![ObjectEntry::folder("docs/"), ObjectEntry::folder("new/")]);
        assert!(sizes.is_pending(&store, "docs/"));
        let outcome = sizes.complete(&mut store, &ticket, Ok(1));

        assert_eq!(outcome, SizeOutcome::Patched { key: "docs/".to_string(), size: 1 });
        assert_eq!(store.get("docs/").unwrap().size, Some(1));
    }

    #[test]
    fn relisting_keeps_known_folder_sizes() {
        let mut store = listing();
        store.patch_size("docs/", 10);
        store.publish(FolderPath::root(), vec![ObjectEntry::folder("docs/")]);
        assert_eq!(store.get("docs/").unwrap().size, Some(10));

        store.publish(FolderPath::parse("docs/").unwrap(), vec![ObjectEntry::folder("docs/")]);
        assert_eq!(store.get("docs/").unwrap().size, None);
    }

    #[test]
    fn size_for_folder_left_behind_is_dropped() {
        let mut store = listing();
        let mut sizes = FolderSizeAggregator::new();
        let ticket = sizes.request(&store, "docs/").unwrap();

        store.publish(FolderPath::parse("img/").unwrap(), vec![ObjectEntry::folder("docs/")]);
        let outcome = sizes.complete(&mut store, &ticket, Ok(1));

        assert_eq!(outcome, SizeOutcome::Stale);
        assert_eq!(store.get("docs/").unwrap().size, None);
    }

    #[test]
    fn size_from_before_clear_is_dropped_but_failure_reported() {
        let mut store = listing();
        let mut sizes = FolderSizeAggregator::new();
        let ok = sizes.request(&store, "docs/").unwrap();
        let failing = sizes.request(&store, "img/").unwrap();

        store.clear();
        store.publish(FolderPath::root(), vec![ObjectEntry::folder("docs/")]);

        assert_eq!(sizes.complete(&mut store, &ok, Ok(1)), SizeOutcome::Stale);
        assert_eq!(store.get("docs/").unwrap().size, None);
        assert!(matches!(
            sizes.complete(&mut store, &failing, Err(BackendError::Status { status: 404, body: String::new() })),
            SizeOutcome::Failed { ref key, .. } if key == "img/"
        ));
    }

    #[test]
    fn size_only_for_folder_rows() {
        let mut store = listing();
        let mut sizes = FolderSizeAggregator::new();
        assert!(sizes.request(&store, "readme.md").is_err());
        assert!(sizes.request(&store, "missing/").is_err());

        store.publish(FolderPath::parse("a/").unwrap(), vec![ObjectEntry::parent_link()]);
        assert!(sizes.request(&store, PARENT_LINK_KEY).is_err());
    }

    #[test]
    fn format_size_scales_units() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }
}
