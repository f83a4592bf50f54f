//! Folder semantics on top of a flat, prefix-queryable key space.

use crate::error::{BackendError, BrowserError, Result};
use crate::listing::{EntryKind, ObjectEntry, PARENT_LINK_KEY};
use std::fmt;
use tracing::{debug, warn};

/// Full prefix of a folder under the current bucket.
///
/// Always empty (bucket root) or a `/`-terminated path without empty
/// segments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FolderPath(String);

impl FolderPath {
    pub fn root() -> Self {
        FolderPath(String::new())
    }

    /// Normalizes an externally supplied path. `"/"` is root, leading slashes
    /// are dropped and a missing trailing slash is added.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim_start_matches('/');
        if trimmed.is_empty() {
            return Ok(Self::root());
        }
        let mut path = FolderPath::root();
        for segment in trimmed.trim_end_matches('/').split('/') {
            path = path.join(segment)?;
        }
        Ok(path)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Appends a folder key relative to this path.
    pub fn join(&self, key: &str) -> Result<Self> {
        let name = key.strip_suffix('/').unwrap_or(key);
        if name.is_empty()
            || name == PARENT_LINK_KEY
            || name == "."
            || key.starts_with('/')
            || key.contains("//")
            || name.split('/').any(|segment| segment.is_empty() || segment == PARENT_LINK_KEY)
        {
            return Err(BrowserError::InvalidPath(key.to_string()));
        }
        Ok(FolderPath(format!("{}{}/", self.0, name)))
    }

    /// Path one level up; the parent of root is root.
    pub fn parent(&self) -> Self {
        let trimmed = self.0.trim_end_matches('/');
        match trimmed.rsplit_once('/') {
            Some((parent, _)) => FolderPath(format!("{}/", parent)),
            None => FolderPath::root(),
        }
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|segment| !segment.is_empty())
    }
}

impl fmt::Display for FolderPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str("/")
        } else {
            f.write_str(&self.0)
        }
    }
}

/// Handle for a dispatched listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingTicket {
    generation: u64,
    /// Prefix sent to the listing endpoint; empty for root.
    pub prefix: String,
}

impl ListingTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingOutcome {
    /// Rows to publish, already carrying the `..` row when below root.
    Published(Vec<ObjectEntry>),
    Failed {
        prefix: String,
        reason: String,
        restored: FolderPath,
    },
    Stale,
}

#[derive(Debug, Clone)]
struct Pending {
    generation: u64,
    restore: FolderPath,
}

/// Tracks the current folder and the one-level undo used when a listing
/// fetch fails.
///
/// Transitions are applied before their request is dispatched; a reply is
/// only accepted if no later transition was made in the meantime.
#[derive(Debug, Default)]
pub struct FolderNavigator {
    current: FolderPath,
    previous: FolderPath,
    generation: u64,
    pending: Option<Pending>,
}

impl FolderNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> &FolderPath {
        &self.current
    }

    pub fn previous(&self) -> &FolderPath {
        &self.previous
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    /// Reacts to the user selecting a row. Files do not navigate.
    pub fn activate(&mut self, row: &ObjectEntry) -> Result<Option<ListingTicket>> {
        match row.kind {
            EntryKind::ParentLink => Ok(self.go_up()),
            EntryKind::Folder => self.enter_folder(&row.key).map(Some),
            EntryKind::File => Ok(None),
        }
    }

    pub fn enter_folder(&mut self, key: &str) -> Result<ListingTicket> {
        let next = self.current.join(key)?;
        debug!("Entering folder {} from {}", next, self.current);
        Ok(self.transition(next))
    }

    /// Moves one level up. Returns `None` at the bucket root.
    pub fn go_up(&mut self) -> Option<ListingTicket> {
        if self.current.is_root() {
            return None;
        }
        let next = self.current.parent();
        debug!("Going up from {} to {}", self.current, next);
        Some(self.transition(next))
    }

    /// Re-lists the current folder. A failure keeps the current folder.
    pub fn refresh(&mut self) -> ListingTicket {
        let restore = match &self.pending {
            Some(pending) => pending.restore.clone(),
            None => self.current.clone(),
        };
        self.dispatch(restore)
    }

    /// Jumps to the bucket root without keeping anything to undo to.
    pub fn reset_to_root(&mut self) -> ListingTicket {
        self.current = FolderPath::root();
        self.previous = FolderPath::root();
        self.dispatch(FolderPath::root())
    }

    /// Drops any in-flight listing, rolling back its optimistic transition.
    pub fn invalidate(&mut self) {
        self.generation += 1;
        if let Some(pending) = self.pending.take() {
            debug!("Discarding pending listing, back to {}", pending.restore);
            self.current = pending.restore;
        }
    }

    pub fn complete(
        &mut self,
        ticket: &ListingTicket,
        result: std::result::Result<Vec<ObjectEntry>, BackendError>,
    ) -> ListingOutcome {
        let is_current =
            matches!(&self.pending, Some(pending) if pending.generation == ticket.generation);
        if !is_current {
            debug!("Dropping stale listing for '{}'", ticket.prefix);
            return ListingOutcome::Stale;
        }
        let pending = self.pending.take();

        match result {
            Ok(rows) => ListingOutcome::Published(self.assemble(rows)),
            Err(e) => {
                if let Some(pending) = pending {
                    self.current = pending.restore;
                }
                warn!("Listing '{}' failed: {}", ticket.prefix, e);
                ListingOutcome::Failed {
                    prefix: ticket.prefix.clone(),
                    reason: e.to_string(),
                    restored: self.current.clone(),
                }
            }
        }
    }

    /// Builds the displayed rows for the current folder.
    pub fn assemble(&self, rows: Vec<ObjectEntry>) -> Vec<ObjectEntry> {
        let mut assembled = Vec::with_capacity(rows.len() + 1);
        if !self.current.is_root() {
            assembled.push(ObjectEntry::parent_link());
        }
        assembled.extend(rows.into_iter().filter(|row| {
            !row.key.is_empty() && row.key != PARENT_LINK_KEY && row.kind != EntryKind::ParentLink
        }));
        assembled
    }

    fn transition(&mut self, next: FolderPath) -> ListingTicket {
        let restore = match &self.pending {
            // The folder on screen is still the one before the pending move.
            Some(pending) => pending.restore.clone(),
            None => self.current.clone(),
        };
        self.previous = restore.clone();
        self.current = next;
        self.dispatch(restore)
    }

    fn dispatch(&mut self, restore: FolderPath) -> ListingTicket {
        self.generation += 1;
        self.pending = Some(Pending {
            generation: self.generation,
            restore,
        });
        ListingTicket {
            generation: self.generation,
            prefix: self.current.as_str().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(path: &str) -> FolderNavigator {
        let mut nav = FolderNavigator::new();
        for segment in FolderPath::parse(path).unwrap().segments().map(str::to_string).collect::<Vec<_>>() {
            let ticket = nav.enter_folder(&segment).unwrap();
            nav.complete(&ticket, Ok(vec![]));
        }
        nav
    }

    #[test]
    fn folder_path_normalizes_input() {
        assert_eq!(FolderPath::parse("/").unwrap(), FolderPath::root());
        assert_eq!(FolderPath::parse("").unwrap(), FolderPath::root());
        assert_eq!(FolderPath::parse("a/b").unwrap().as_str(), "a/b/");
        assert_eq!(FolderPath::parse("/a/b/").unwrap().as_str(), "a/b/");
        assert!(FolderPath::parse("a//b/").is_err());
        assert!(FolderPath::parse("a/../b").is_err());
    }

    #[test]
    fn join_rejects_parent_link_and_garbage() {
        let root = FolderPath::root();
        assert!(root.join("..").is_err());
        assert!(root.join("").is_err());
        assert!(root.join("/abs/").is_err());
        assert!(root.join("a//").is_err());
        assert_eq!(root.join("b").unwrap().as_str(), "b/");
        assert_eq!(root.join("b/").unwrap().as_str(), "b/");
    }

    #[test]
    fn go_up_drops_one_segment() {
        let mut nav = at("a/b/");
        let ticket = nav.go_up().unwrap();
        assert_eq!(nav.current().as_str(), "a/");
        assert_eq!(ticket.prefix, "a/");
    }

    #[test]
    fn go_up_to_root_sends_empty_prefix() {
        let mut nav = at("a/");
        let ticket = nav.go_up().unwrap();
        assert!(nav.current().is_root());
        assert_eq!(ticket.prefix, "");
    }

    #[test]
    fn go_up_at_root_does_nothing() {
        let mut nav = FolderNavigator::new();
        assert!(nav.go_up().is_none());
        assert!(!nav.is_loading());
    }

    #[test]
    fn failed_drill_down_rolls_back_one_level() {
        let mut nav = at("a/");

        let ticket = nav.enter_folder("b").unwrap();
        assert_eq!(nav.current().as_str(), "a/b/");
        assert_eq!(nav.previous().as_str(), "a/");

        let outcome = nav.complete(&ticket, Err(BackendError::Transport("down".into())));
        assert!(matches!(outcome, ListingOutcome::Failed { ref restored, .. } if restored.as_str() == "a/"));
        assert_eq!(nav.current().as_str(), "a/");
        assert_eq!(nav.previous().as_str(), "a/");
    }

    #[test]
    fn failed_go_up_stays_in_folder() {
        let mut nav = at("a/b/");
        let ticket = nav.go_up().unwrap();
        nav.complete(&ticket, Err(BackendError::Transport("down".into())));
        assert_eq!(nav.current().as_str(), "a/b/");
    }

    #[test]
    fn failed_refresh_keeps_current_folder() {
        let mut nav = at("a/b/");
        let ticket = nav.refresh();
        nav.complete(&ticket, Err(BackendError::Transport("down".into())));
        assert_eq!(nav.current().as_str(), "a/b/");
        assert_eq!(nav.previous().as_str(), "a/");
    }

    #[test]
    fn non_root_listing_starts_with_parent_link() {
        let mut nav = FolderNavigator::new();
        let ticket = nav.enter_folder("docs/").unwrap();
        let outcome = nav.complete(&ticket, Ok(vec![ObjectEntry::file("x.txt", 1)]));
        let ListingOutcome::Published(rows) = outcome else {
            panic!("expected rows");
        };
        assert!(rows[0].is_parent_link());
        assert_eq!(rows.iter().filter(|r| r.is_parent_link()).count(), 1);
        assert_eq!(rows[1].key, "x.txt");
    }

    #[test]
    fn root_listing_has_no_parent_link() {
        let mut nav = FolderNavigator::new();
        let ticket = nav.reset_to_root();
        let outcome = nav.complete(
            &ticket,
            Ok(vec![ObjectEntry::folder("a/"), ObjectEntry::parent_link()]),
        );
        let ListingOutcome::Published(rows) = outcome else {
            panic!("expected rows");
        };
        assert!(rows.iter().all(|r| !r.is_parent_link()));
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn late_reply_after_navigating_away_is_dropped() {
        let mut nav = FolderNavigator::new();
        let first = nav.enter_folder("a").unwrap();
        let second = nav.go_up().unwrap();

        assert_eq!(nav.complete(&first, Ok(vec![])), ListingOutcome::Stale);
        assert!(matches!(nav.complete(&second, Ok(vec![])), ListingOutcome::Published(_)));
        assert!(nav.current().is_root());
    }

    #[test]
    fn chained_failure_returns_to_last_displayed_folder() {
        let mut nav = at("a/");
        let _first = nav.enter_folder("b").unwrap();
        let second = nav.enter_folder("c").unwrap();
        assert_eq!(nav.current().as_str(), "a/b/c/");
        assert_eq!(nav.previous().as_str(), "a/");

        nav.complete(&second, Err(BackendError::Transport("down".into())));
        assert_eq!(nav.current().as_str(), "a/");
    }

    #[test]
    fn invalidate_discards_pending_and_rolls_back() {
        let mut nav = at("a/");
        let ticket = nav.enter_folder("b").unwrap();
        nav.invalidate();
        assert_eq!(nav.current().as_str(), "a/");
        assert_eq!(nav.complete(&ticket, Ok(vec![])), ListingOutcome::Stale);
    }

    #[test]
    fn reset_to_root_bypasses_undo() {
        let mut nav = at("a/b/");
        let ticket = nav.reset_to_root();
        assert_eq!(ticket.prefix, "");
        nav.complete(&ticket, Err(BackendError::Transport("down".into())));
        assert!(nav.current().is_root());
        assert!(nav.previous().is_root());
    }

    #[test]
    fn activating_a_file_does_not_navigate() {
        let mut nav = at("a/");
        assert!(nav.activate(&ObjectEntry::file("x", 1)).unwrap().is_none());
        assert_eq!(nav.current().as_str(), "a/");
        let up = nav.activate(&ObjectEntry::parent_link()).unwrap().unwrap();
        assert_eq!(up.prefix, "");
    }
}
