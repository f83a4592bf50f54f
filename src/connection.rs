//! Connect/reconnect protocol against the backend.

use crate::backend::StatusReply;
use crate::classifier::{classify_reply, classify_unreachable, Classified};
use crate::credentials::Credentials;
use crate::error::BackendError;
use tracing::{debug, info, warn};

/// Contents of the credential prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    /// Values shown in the form, typically the last rejected submission.
    pub prefill: Credentials,
    /// Why the prompt is (re)opened, if it follows a failure.
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    AwaitingCredentials(Prompt),
    Connecting { credentials: Credentials },
    Connected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectTicket {
    generation: u64,
    pub credentials: Credentials,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketsTicket {
    generation: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    Connected {
        endpoint: String,
        buckets: Vec<String>,
        /// Set when the account holds exactly one bucket.
        auto_selected: Option<String>,
    },
    Rejected(Classified),
    Stale,
}

/// Owns the credential prompt and the single in-flight connect attempt.
///
/// Every attempt carries a generation; only the latest one may change the
/// state. The prompt stays open until a valid submission or an explicit
/// cancel.
#[derive(Debug)]
pub struct ConnectionManager {
    state: ConnectionState,
    generation: u64,
    buckets: Vec<String>,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            generation: 0,
            buckets: Vec::new(),
        }
    }
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn prompt(&self) -> Option<&Prompt> {
        match &self.state {
            ConnectionState::AwaitingCredentials(prompt) => Some(prompt),
            _ => None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn is_connecting(&self) -> bool {
        matches!(self.state, ConnectionState::Connecting { .. })
    }

    pub fn buckets(&self) -> &[String] {
        &self.buckets
    }

    pub fn open_prompt(&mut self, prefill: Credentials, error: Option<String>) {
        self.state = ConnectionState::AwaitingCredentials(Prompt { prefill, error });
    }

    /// Closing the prompt without input leaves it open.
    pub fn dismiss(&mut self) -> Option<&Prompt> {
        if self.prompt().is_some() {
            debug!("Prompt dismissed without input, asking again");
        }
        self.prompt()
    }

    /// Explicit cancel: drop the prompt and any attempt in flight.
    pub fn cancel(&mut self) {
        self.generation += 1;
        self.buckets.clear();
        self.state = ConnectionState::Disconnected;
        info!("Connection cancelled, disconnected");
    }

    /// Starts an attempt, superseding any attempt still in flight.
    pub fn begin(&mut self, credentials: Credentials) -> ConnectTicket {
        self.generation += 1;
        info!("Connecting to {} (attempt {})", credentials.endpoint, self.generation);
        self.state = ConnectionState::Connecting {
            credentials: credentials.clone(),
        };
        ConnectTicket {
            generation: self.generation,
            credentials,
        }
    }

    pub fn complete(
        &mut self,
        ticket: &ConnectTicket,
        result: std::result::Result<StatusReply, BackendError>,
    ) -> ConnectOutcome {
        if ticket.generation != self.generation || !self.is_connecting() {
            debug!("Dropping result of superseded connect attempt {}", ticket.generation);
            return ConnectOutcome::Stale;
        }

        let endpoint = &ticket.credentials.endpoint;
        let classified = match result {
            Ok(reply) if reply.is_ok() => {
                self.buckets = reply.message;
                self.state = ConnectionState::Connected;
                info!("Connected to {}, {} buckets", endpoint, self.buckets.len());
                let auto_selected = match self.buckets.as_slice() {
                    [only] => Some(only.clone()),
                    _ => None,
                };
                return ConnectOutcome::Connected {
                    endpoint: endpoint.clone(),
                    buckets: self.buckets.clone(),
                    auto_selected,
                };
            }
            Ok(reply) => classify_reply(reply.token(), endpoint),
            Err(e) => {
                warn!("Connect call to the API failed: {}", e);
                classify_unreachable(endpoint)
            }
        };

        warn!("Connect to {} rejected: {}", endpoint, classified.category);
        self.buckets.clear();
        self.open_prompt(ticket.credentials.clone(), Some(classified.message.clone()));
        ConnectOutcome::Rejected(classified)
    }

    /// Adopts the bucket list of a session the backend already holds.
    pub fn restore(&mut self, buckets: Vec<String>) {
        self.generation += 1;
        self.buckets = buckets;
        self.state = ConnectionState::Connected;
    }

    pub fn begin_refresh(&self) -> Option<BucketsTicket> {
        self.is_connected().then(|| BucketsTicket {
            generation: self.generation,
        })
    }

    /// Applies a bucket refresh. Returns the new list if it was accepted.
    pub fn complete_refresh(
        &mut self,
        ticket: &BucketsTicket,
        result: std::result::Result<StatusReply, BackendError>,
    ) -> std::result::Result<Option<Vec<String>>, String> {
        if ticket.generation != self.generation || !self.is_connected() {
            return Ok(None);
        }
        match result {
            Ok(reply) if reply.is_ok() => {
                self.buckets = reply.message;
                Ok(Some(self.buckets.clone()))
            }
            Ok(reply) => Err(format!("backend replied {}", reply.token())),
            Err(e) => Err(e.to_string()),
        }
    }
}
