//! Executes browser commands against a backend on a tokio runtime.

use crate::backend::Backend;
use crate::browser::{Action, Browser, Command, Reply};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, warn};

/// Runs one command to completion and packages the result with its ticket.
pub async fn execute(backend: &dyn Backend, command: Command) -> Reply {
    match command {
        Command::ProbeSession => Reply::Session(backend.session().await),
        Command::Connect(ticket) => {
            let result = backend.connect(&ticket.credentials).await;
            Reply::Connect(ticket, result)
        }
        Command::SetBucket(ticket) => {
            let result = backend.set_bucket(&ticket.bucket).await;
            Reply::SetBucket(ticket, result)
        }
        Command::RefreshBuckets(ticket) => Reply::Buckets(ticket, backend.buckets().await),
        Command::ListObjects(ticket) => {
            let result = backend.list_objects(&ticket.prefix).await;
            Reply::Listing(ticket, result)
        }
        Command::FolderSize(ticket) => {
            let result = backend.folder_size(&ticket.prefix).await;
            Reply::FolderSize(ticket, result)
        }
    }
}

/// Spawns backend calls and feeds their replies back to a [`Browser`].
///
/// Calls run concurrently on the runtime, but replies are only applied from
/// the owner of the browser, through [`Driver::pump`] or
/// [`Driver::run_until_idle`]. A call that panics or is cancelled is
/// logged and counted as finished.
pub struct Driver {
    backend: Arc<dyn Backend>,
    handle: Handle,
    tasks: JoinSet<Reply>,
    on_reply: Option<Arc<dyn Fn() + Send + Sync>>,
}

impl Driver {
    pub fn new(backend: Arc<dyn Backend>, handle: Handle) -> Self {
        Self {
            backend,
            handle,
            tasks: JoinSet::new(),
            on_reply: None,
        }
    }

    /// Called from the runtime every time a call finishes, e.g. to wake a
    /// UI event loop.
    pub fn with_reply_hook(mut self, hook: Arc<dyn Fn() + Send + Sync>) -> Self {
        self.on_reply = Some(hook);
        self
    }

    /// Calls whose reply has not been applied yet.
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_idle(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn dispatch(&mut self, browser: &mut Browser, action: Action) {
        let commands = browser.handle(action);
        self.spawn_all(commands);
    }

    pub fn spawn_all(&mut self, commands: Vec<Command>) {
        for command in commands {
            self.spawn(command);
        }
    }

    fn spawn(&mut self, command: Command) {
        debug!("Dispatching {}", command_name(&command));
        let backend = self.backend.clone();
        let wake = WakeOnDrop(self.on_reply.clone());
        self.tasks.spawn_on(
            async move {
                let _wake = wake;
                execute(backend.as_ref(), command).await
            },
            &self.handle,
        );
    }

    /// Applies every reply that has already arrived. Returns how many were
    /// applied.
    pub fn pump(&mut self, browser: &mut Browser) -> usize {
        let mut applied = 0;
        while let Some(joined) = self.tasks.try_join_next() {
            if self.accept(browser, joined) {
                applied += 1;
            }
        }
        applied
    }

    /// Waits for every outstanding call, including the ones their replies
    /// trigger.
    pub async fn run_until_idle(&mut self, browser: &mut Browser) {
        while let Some(joined) = self.tasks.join_next().await {
            self.accept(browser, joined);
        }
    }

    fn accept(&mut self, browser: &mut Browser, joined: Result<Reply, JoinError>) -> bool {
        match joined {
            Ok(reply) => {
                let follow_ups = browser.apply(reply);
                self.spawn_all(follow_ups);
                true
            }
            Err(e) => {
                warn!("Backend call did not complete: {}", e);
                false
            }
        }
    }
}

/// Runs the reply hook when a call ends, whether it returned, panicked or
/// was cancelled.
struct WakeOnDrop(Option<Arc<dyn Fn() + Send + Sync>>);

impl Drop for WakeOnDrop {
    fn drop(&mut self) {
        if let Some(hook) = &self.0 {
            hook();
        }
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::ProbeSession => "session probe",
        Command::Connect(_) => "connect",
        Command::SetBucket(_) => "set bucket",
        Command::RefreshBuckets(_) => "refresh buckets",
        Command::ListObjects(_) => "list objects",
        Command::FolderSize(_) => "folder size",
    }
}
