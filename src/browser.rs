//! Central state store tying the connection, session, navigation and
//! listing state together.
//!
//! The [`Browser`] never performs I/O. User intents come in as [`Action`]s,
//! backend replies as [`Reply`]s; both return the [`Command`]s that must be
//! executed next (see [`crate::driver::Driver`]). Every state change is
//! published as a [`Change`] to subscribers, in the order it happened.

use crate::backend::{SessionReply, StatusReply};
use crate::connection::{BucketsTicket, ConnectOutcome, ConnectTicket, ConnectionManager, Prompt};
use crate::credentials::{CredentialStore, Credentials};
use crate::error::{BackendError, BrowserError};
use crate::listing::{
    format_size, FolderSizeAggregator, ObjectEntry, ObjectListingStore, SizeOutcome, SizeTicket,
};
use crate::navigator::{FolderNavigator, FolderPath, ListingOutcome, ListingTicket};
use crate::session::{ProbeOutcome, SessionController, SetBucketOutcome, SetBucketTicket};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

type BackendResult<T> = std::result::Result<T, BackendError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Probe the backend for a session to resume.
    Start,
    SubmitCredentials {
        endpoint: String,
        access_key: String,
        secret_key: String,
    },
    /// Prompt closed without input.
    DismissPrompt,
    /// Prompt closed with an explicit cancel.
    CancelPrompt,
    /// Re-open the prompt to connect with other credentials.
    Reconnect,
    SelectBucket(String),
    RefreshBuckets,
    /// Row selected in the listing: folder, file or `..`.
    OpenRow(String),
    EnterFolder(String),
    GoUp,
    Refresh,
    RequestFolderSize(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ProbeSession,
    Connect(ConnectTicket),
    SetBucket(SetBucketTicket),
    RefreshBuckets(BucketsTicket),
    ListObjects(ListingTicket),
    FolderSize(SizeTicket),
}

#[derive(Debug, Clone)]
pub enum Reply {
    Session(BackendResult<SessionReply>),
    Connect(ConnectTicket, BackendResult<StatusReply>),
    SetBucket(SetBucketTicket, BackendResult<StatusReply>),
    Buckets(BucketsTicket, BackendResult<StatusReply>),
    Listing(ListingTicket, BackendResult<Vec<ObjectEntry>>),
    FolderSize(SizeTicket, BackendResult<u64>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// Short message for the user, the equivalent of a toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Notice(Notice),
    PromptOpened(Prompt),
    PromptClosed,
    Connected(bool),
    BucketsChanged(Vec<String>),
    BucketSelected(Option<String>),
    FolderChanged(FolderPath),
    ListingReplaced {
        folder: FolderPath,
        rows: Vec<ObjectEntry>,
    },
    ListingCleared,
    RowPatched {
        key: String,
        size: u64,
    },
}

pub struct Browser {
    credentials: CredentialStore,
    connection: ConnectionManager,
    session: SessionController,
    navigator: FolderNavigator,
    listing: ObjectListingStore,
    sizes: FolderSizeAggregator,
    last_notice: Option<Notice>,
    subscribers: Vec<mpsc::UnboundedSender<Change>>,
}

impl Browser {
    pub fn new(seed: Option<Credentials>) -> Self {
        Self {
            credentials: CredentialStore::seeded(seed),
            connection: ConnectionManager::new(),
            session: SessionController::new(),
            navigator: FolderNavigator::new(),
            listing: ObjectListingStore::new(),
            sizes: FolderSizeAggregator::new(),
            last_notice: None,
            subscribers: Vec::new(),
        }
    }

    /// Receives every subsequent [`Change`], in publication order.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<Change> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.current()
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn prompt(&self) -> Option<&Prompt> {
        self.connection.prompt()
    }

    pub fn buckets(&self) -> &[String] {
        self.connection.buckets()
    }

    pub fn bucket(&self) -> Option<&str> {
        self.session.bucket()
    }

    pub fn selected_bucket(&self) -> Option<&str> {
        self.session.selected()
    }

    pub fn current_folder(&self) -> &FolderPath {
        self.navigator.current()
    }

    pub fn previous_folder(&self) -> &FolderPath {
        self.navigator.previous()
    }

    /// Folder the displayed rows belong to. Lags behind
    /// [`Browser::current_folder`] while a listing loads.
    pub fn listing_folder(&self) -> &FolderPath {
        self.listing.folder()
    }

    pub fn rows(&self) -> &[ObjectEntry] {
        self.listing.rows()
    }

    pub fn is_listing_loaded(&self) -> bool {
        self.listing.is_loaded()
    }

    pub fn is_loading(&self) -> bool {
        self.navigator.is_loading() || self.session.is_switching()
    }

    pub fn is_size_pending(&self, key: &str) -> bool {
        self.sizes.is_pending(&self.listing, key)
    }

    pub fn last_notice(&self) -> Option<&Notice> {
        self.last_notice.as_ref()
    }

    pub fn handle(&mut self, action: Action) -> Vec<Command> {
        debug!("Action: {:?}", redact(&action));
        match action {
            Action::Start => vec![Command::ProbeSession],
            Action::SubmitCredentials {
                endpoint,
                access_key,
                secret_key,
            } => self.submit(endpoint, access_key, secret_key),
            Action::DismissPrompt => {
                if let Some(prompt) = self.connection.dismiss().cloned() {
                    self.emit(Change::PromptOpened(prompt));
                }
                Vec::new()
            }
            Action::CancelPrompt => {
                self.disconnect();
                Vec::new()
            }
            Action::Reconnect => {
                let prefill = self.credentials.current().cloned().unwrap_or_default();
                self.open_prompt(prefill, None);
                Vec::new()
            }
            Action::SelectBucket(bucket) => {
                if !self.connection.is_connected() {
                    self.notify(Notice::error("Not connected, cannot select a bucket"));
                    return Vec::new();
                }
                self.select_bucket(&bucket)
            }
            Action::RefreshBuckets => match self.connection.begin_refresh() {
                Some(ticket) => vec![Command::RefreshBuckets(ticket)],
                None => {
                    self.notify(Notice::error("Not connected, cannot refresh buckets"));
                    Vec::new()
                }
            },
            Action::OpenRow(key) => {
                let Some(row) = self.listing.get(&key).cloned() else {
                    warn!("Ignoring selection of unknown row {}", key);
                    return Vec::new();
                };
                self.navigate(|nav| nav.activate(&row))
            }
            Action::EnterFolder(key) => self.navigate(|nav| nav.enter_folder(&key).map(Some)),
            Action::GoUp => self.navigate(|nav| Ok(nav.go_up())),
            Action::Refresh => self.navigate(|nav| Ok(Some(nav.refresh()))),
            Action::RequestFolderSize(key) => {
                match self.sizes.request(&self.listing, &key) {
                    Ok(ticket) => vec![Command::FolderSize(ticket)],
                    Err(e) => {
                        self.notify(Notice::error(e.to_string()));
                        Vec::new()
                    }
                }
            }
        }
    }

    pub fn apply(&mut self, reply: Reply) -> Vec<Command> {
        match reply {
            Reply::Session(result) => self.on_session(result),
            Reply::Connect(ticket, result) => self.on_connect(&ticket, result),
            Reply::SetBucket(ticket, result) => self.on_set_bucket(&ticket, result),
            Reply::Buckets(ticket, result) => {
                match self.connection.complete_refresh(&ticket, result) {
                    Ok(Some(buckets)) => self.emit(Change::BucketsChanged(buckets)),
                    Ok(None) => {}
                    Err(reason) => {
                        self.notify(Notice::error(format!("Failed to refresh buckets: {}", reason)))
                    }
                }
                Vec::new()
            }
            Reply::Listing(ticket, result) => {
                self.on_listing(&ticket, result);
                Vec::new()
            }
            Reply::FolderSize(ticket, result) => {
                self.on_folder_size(&ticket, result);
                Vec::new()
            }
        }
    }

    fn submit(&mut self, endpoint: String, access_key: String, secret_key: String) -> Vec<Command> {
        match self.credentials.submit(&endpoint, &access_key, &secret_key) {
            Ok(credentials) => {
                let ticket = self.connection.begin(credentials);
                self.emit(Change::PromptClosed);
                self.notify(Notice::info(format!("Connecting to {}", ticket.credentials.endpoint)));
                vec![Command::Connect(ticket)]
            }
            Err(e) => {
                let message = match &e {
                    BrowserError::Validation(message) => message.clone(),
                    other => other.to_string(),
                };
                self.notify(Notice::error(message.clone()));
                self.open_prompt(Credentials::new(endpoint, access_key, secret_key), Some(message));
                Vec::new()
            }
        }
    }

    fn on_session(&mut self, result: BackendResult<SessionReply>) -> Vec<Command> {
        match self.session.interpret_probe(result) {
            ProbeOutcome::Restore { bucket, buckets } => {
                self.resume(buckets);
                self.select_bucket(&bucket)
            }
            ProbeOutcome::BucketsOnly { buckets } => {
                self.resume(buckets);
                Vec::new()
            }
            ProbeOutcome::Fresh { reason } => {
                info!("No session to resume ({}), asking for credentials", reason);
                let prefill = self.credentials.current().cloned().unwrap_or_default();
                self.open_prompt(prefill, None);
                Vec::new()
            }
        }
    }

    fn resume(&mut self, buckets: Vec<String>) {
        self.connection.restore(buckets.clone());
        self.emit(Change::Connected(true));
        self.emit(Change::BucketsChanged(buckets));
        self.notify(Notice::success("Reconnected to the API"));
    }

    fn on_connect(
        &mut self,
        ticket: &ConnectTicket,
        result: BackendResult<StatusReply>,
    ) -> Vec<Command> {
        match self.connection.complete(ticket, result) {
            ConnectOutcome::Connected {
                endpoint,
                buckets,
                auto_selected,
            } => {
                self.forget_bucket();
                self.emit(Change::Connected(true));
                self.emit(Change::BucketsChanged(buckets));
                self.notify(Notice::success(format!("Connected to {}", endpoint)));
                match auto_selected {
                    Some(bucket) => self.select_bucket(&bucket),
                    None => Vec::new(),
                }
            }
            ConnectOutcome::Rejected(classified) => {
                let error = BrowserError::Connect {
                    category: classified.category,
                    message: classified.message,
                };
                self.notify(Notice::error(error.to_string()));
                if let Some(prompt) = self.connection.prompt().cloned() {
                    self.emit(Change::PromptOpened(prompt));
                }
                Vec::new()
            }
            ConnectOutcome::Stale => Vec::new(),
        }
    }

    fn select_bucket(&mut self, bucket: &str) -> Vec<Command> {
        // Nothing from the previous bucket may land after this point.
        self.navigator.invalidate();
        let ticket = self.session.select(bucket);
        self.emit(Change::BucketSelected(Some(bucket.to_string())));
        vec![Command::SetBucket(ticket)]
    }

    fn on_set_bucket(
        &mut self,
        ticket: &SetBucketTicket,
        result: BackendResult<StatusReply>,
    ) -> Vec<Command> {
        match self.session.complete_select(ticket, result) {
            SetBucketOutcome::Confirmed { bucket } => {
                let listing = self.navigator.reset_to_root();
                self.listing.clear();
                self.emit(Change::ListingCleared);
                self.emit(Change::FolderChanged(FolderPath::root()));
                self.notify(Notice::success(format!("Set bucket to {}", bucket)));
                vec![Command::ListObjects(listing)]
            }
            SetBucketOutcome::Rejected { bucket, reason } => {
                let error = BrowserError::SetBucket { bucket, reason };
                self.notify(Notice::error(error.to_string()));
                let selected = self.session.selected().map(str::to_string);
                self.emit(Change::BucketSelected(selected));
                Vec::new()
            }
            SetBucketOutcome::Stale => Vec::new(),
        }
    }

    fn navigate<F>(&mut self, transition: F) -> Vec<Command>
    where
        F: FnOnce(&mut FolderNavigator) -> crate::error::Result<Option<ListingTicket>>,
    {
        if self.session.bucket().is_none() || self.session.is_switching() {
            debug!("No active bucket, ignoring navigation");
            return Vec::new();
        }
        match transition(&mut self.navigator) {
            Ok(Some(ticket)) => {
                let folder = self.navigator.current().clone();
                self.emit(Change::FolderChanged(folder));
                vec![Command::ListObjects(ticket)]
            }
            Ok(None) => Vec::new(),
            Err(e) => {
                self.notify(Notice::error(e.to_string()));
                Vec::new()
            }
        }
    }

    fn on_listing(&mut self, ticket: &ListingTicket, result: BackendResult<Vec<ObjectEntry>>) {
        match self.navigator.complete(ticket, result) {
            ListingOutcome::Published(rows) => {
                let folder = self.navigator.current().clone();
                debug!("Publishing {} rows for {}", rows.len(), folder);
                self.listing.publish(folder.clone(), rows);
                let rows = self.listing.rows().to_vec();
                self.emit(Change::ListingReplaced { folder, rows });
            }
            ListingOutcome::Failed {
                prefix,
                reason,
                restored,
            } => {
                let error = BrowserError::Listing { prefix, reason };
                self.notify(Notice::error(error.to_string()));
                self.emit(Change::FolderChanged(restored));
            }
            ListingOutcome::Stale => {}
        }
    }

    fn on_folder_size(&mut self, ticket: &SizeTicket, result: BackendResult<u64>) {
        match self.sizes.complete(&mut self.listing, ticket, result) {
            SizeOutcome::Patched { key, size } => {
                self.notify(Notice::success(format!(
                    "Size of folder {} is {}",
                    ticket.prefix,
                    format_size(size)
                )));
                self.emit(Change::RowPatched { key, size });
            }
            SizeOutcome::Failed { reason, .. } => {
                let error = BrowserError::Size {
                    prefix: ticket.prefix.clone(),
                    reason,
                };
                self.notify(Notice::error(error.to_string()));
            }
            SizeOutcome::Stale => {}
        }
    }

    fn open_prompt(&mut self, prefill: Credentials, error: Option<String>) {
        self.connection.open_prompt(prefill, error);
        if let Some(prompt) = self.connection.prompt().cloned() {
            self.emit(Change::PromptOpened(prompt));
        }
    }

    fn disconnect(&mut self) {
        self.connection.cancel();
        self.forget_bucket();
        self.emit(Change::PromptClosed);
        self.emit(Change::Connected(false));
        self.emit(Change::BucketsChanged(Vec::new()));
        self.notify(Notice::info("Disconnected"));
    }

    fn forget_bucket(&mut self) {
        self.session.reset();
        self.navigator.invalidate();
        self.listing.clear();
        self.emit(Change::BucketSelected(None));
        self.emit(Change::ListingCleared);
    }

    fn notify(&mut self, notice: Notice) {
        match notice.level {
            NoticeLevel::Error => warn!("{}", notice.message),
            _ => info!("{}", notice.message),
        }
        self.last_notice = Some(notice.clone());
        self.emit(Change::Notice(notice));
    }

    fn emit(&mut self, change: Change) {
        self.subscribers
            .retain(|subscriber| subscriber.send(change.clone()).is_ok());
    }
}

fn redact(action: &Action) -> Action {
    match action {
        Action::SubmitCredentials {
            endpoint,
            access_key,
            ..
        } => Action::SubmitCredentials {
            endpoint: endpoint.clone(),
            access_key: access_key.clone(),
            secret_key: "***".to_string(),
        },
        other => other.clone(),
    }
}
