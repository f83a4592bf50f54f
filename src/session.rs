//! Startup session probe and active bucket selection.

use crate::backend::{ReplyStatus, SessionReply, StatusReply};
use crate::error::BackendError;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The backend still holds a connection with an active bucket.
    Restore { bucket: String, buckets: Vec<String> },
    /// Connected, but no bucket has been chosen yet.
    BucketsOnly { buckets: Vec<String> },
    /// Nothing to resume; credentials are needed.
    Fresh { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetBucketTicket {
    generation: u64,
    pub bucket: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetBucketOutcome {
    Confirmed { bucket: String },
    Rejected { bucket: String, reason: String },
    Stale,
}

/// Keeps the backend-confirmed bucket and the locally requested one.
///
/// The two only diverge while a set-bucket call is in flight.
#[derive(Debug, Default)]
pub struct SessionController {
    bucket: Option<String>,
    selected: Option<String>,
    generation: u64,
}

impl SessionController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bucket the backend confirmed as active.
    pub fn bucket(&self) -> Option<&str> {
        self.bucket.as_deref()
    }

    /// Bucket shown as selected, possibly still awaiting confirmation.
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn is_switching(&self) -> bool {
        self.selected != self.bucket
    }

    pub fn interpret_probe(
        &self,
        result: std::result::Result<SessionReply, BackendError>,
    ) -> ProbeOutcome {
        match result {
            Ok(reply) if reply.status == ReplyStatus::Ok => {
                if reply.bucket.is_empty() {
                    info!("Resuming session with {} buckets", reply.buckets.len());
                    ProbeOutcome::BucketsOnly {
                        buckets: reply.buckets,
                    }
                } else {
                    info!("Resuming session on bucket {}", reply.bucket);
                    ProbeOutcome::Restore {
                        bucket: reply.bucket,
                        buckets: reply.buckets,
                    }
                }
            }
            Ok(reply) => {
                debug!("Session probe returned {:?}", reply.status);
                ProbeOutcome::Fresh {
                    reason: format!("no session ({:?})", reply.status),
                }
            }
            Err(e) => {
                debug!("Session probe failed: {}", e);
                ProbeOutcome::Fresh {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Requests `bucket` as the active bucket. A later selection supersedes it.
    pub fn select(&mut self, bucket: &str) -> SetBucketTicket {
        self.generation += 1;
        self.selected = Some(bucket.to_string());
        info!("Setting bucket: {}", bucket);
        SetBucketTicket {
            generation: self.generation,
            bucket: bucket.to_string(),
        }
    }

    pub fn complete_select(
        &mut self,
        ticket: &SetBucketTicket,
        result: std::result::Result<StatusReply, BackendError>,
    ) -> SetBucketOutcome {
        if ticket.generation != self.generation {
            debug!("Dropping superseded set-bucket reply for {}", ticket.bucket);
            return SetBucketOutcome::Stale;
        }

        let reason = match result {
            Ok(reply) if reply.is_ok() => {
                self.bucket = Some(ticket.bucket.clone());
                self.selected = self.bucket.clone();
                return SetBucketOutcome::Confirmed {
                    bucket: ticket.bucket.clone(),
                };
            }
            Ok(reply) => format!("backend replied {}", reply.token()),
            Err(e) => e.to_string(),
        };

        warn!("Failed to set bucket {}: {}", ticket.bucket, reason);
        self.selected = self.bucket.clone();
        SetBucketOutcome::Rejected {
            bucket: ticket.bucket.clone(),
            reason,
        }
    }

    /// Forgets the active bucket, e.g. after a new connection.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.bucket = None;
        self.selected = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(status: ReplyStatus, bucket: &str, buckets: &[&str]) -> SessionReply {
        SessionReply {
            status,
            bucket: bucket.to_string(),
            buckets: buckets.iter().map(|b| b.to_string()).collect(),
        }
    }

    #[test]
    fn probe_with_bucket_restores_it() {
        let session = SessionController::new();
        let outcome = session.interpret_probe(Ok(reply(ReplyStatus::Ok, "logs", &["logs", "media"])));
        assert_eq!(
            outcome,
            ProbeOutcome::Restore {
                bucket: "logs".into(),
                buckets: vec!["logs".into(), "media".into()]
            }
        );
    }

    #[test]
    fn probe_without_bucket_restores_list_only() {
        let session = SessionController::new();
        let outcome = session.interpret_probe(Ok(reply(ReplyStatus::Ok, "", &["a"])));
        assert_eq!(outcome, ProbeOutcome::BucketsOnly { buckets: vec!["a".into()] });
    }

    #[test]
    fn failed_or_empty_probe_is_fresh() {
        let session = SessionController::new();
        assert!(matches!(
            session.interpret_probe(Ok(reply(ReplyStatus::None, "", &[]))),
            ProbeOutcome::Fresh { .. }
        ));
        assert!(matches!(
            session.interpret_probe(Ok(reply(ReplyStatus::Error, "", &[]))),
            ProbeOutcome::Fresh { .. }
        ));
        assert!(matches!(
            session.interpret_probe(Err(BackendError::Transport("refused".into()))),
            ProbeOutcome::Fresh { .. }
        ));
    }

    #[test]
    fn confirmed_selection_updates_session_bucket() {
        let mut session = SessionController::new();
        let ticket = session.select("media");
        assert!(session.is_switching());
        let outcome = session.complete_select(&ticket, Ok(StatusReply::ok(vec![])));
        assert_eq!(outcome, SetBucketOutcome::Confirmed { bucket: "media".into() });
        assert_eq!(session.bucket(), Some("media"));
        assert_eq!(session.selected(), Some("media"));
    }

    #[test]
    fn rejected_selection_keeps_previous_bucket() {
        let mut session = SessionController::new();
        let ticket = session.select("logs");
        session.complete_select(&ticket, Ok(StatusReply::ok(vec![])));

        let ticket = session.select("secret");
        let outcome = session.complete_select(&ticket, Ok(StatusReply::error("ClientError")));
        assert!(matches!(outcome, SetBucketOutcome::Rejected { ref bucket, .. } if bucket == "secret"));
        assert_eq!(session.bucket(), Some("logs"));
        assert_eq!(session.selected(), Some("logs"));
    }

    #[test]
    fn later_selection_wins() {
        let mut session = SessionController::new();
        let first = session.select("a");
        let second = session.select("b");
        assert_eq!(
            session.complete_select(&first, Ok(StatusReply::ok(vec![]))),
            SetBucketOutcome::Stale
        );
        session.complete_select(&second, Ok(StatusReply::ok(vec![])));
        assert_eq!(session.bucket(), Some("b"));
    }
}
