//! Audit recorder.
//!
//! Decides per event whether a record is persisted, then hands it to a
//! background writer so the request path never waits on the sink. Write
//! failures are logged locally and swallowed: audit logging is
//! best-effort observability, never a failure mode of the primary action.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::net::NetworkContext;
use crate::record::{AuditAction, AuditOutcome, AuditRecord, AuthDetail, RecordDetail};
use crate::store::AuditStore;

/// Actions persisted regardless of outcome. Everything outside this set is
/// only persisted on failure, which keeps successful read traffic out of
/// the log. That asymmetry (log every listed write, log only failed reads)
/// is the core volume-control policy.
pub const ALWAYS_LOG_ACTIONS: &[AuditAction] = &[
    AuditAction::Login,
    AuditAction::Logout,
    AuditAction::Create,
    AuditAction::Update,
    AuditAction::Delete,
    AuditAction::Approve,
    AuditAction::Reject,
];

/// The sensitivity filter: whether a classified event is persisted at all.
pub fn should_persist(action: AuditAction, outcome: AuditOutcome) -> bool {
    ALWAYS_LOG_ACTIONS.contains(&action) || outcome == AuditOutcome::Failure
}

const RETRY_DELAY: Duration = Duration::from_millis(100);

enum Message {
    Record(AuditRecord),
    Flush(oneshot::Sender<()>),
}

/// Fire-and-forget audit writer.
///
/// [`AuditRecorder::record`] filters, enqueues, and returns immediately; a
/// spawned worker drains the queue into the store. Cloning shares the
/// queue.
#[derive(Clone)]
pub struct AuditRecorder {
    tx: Option<mpsc::Sender<Message>>,
}

impl AuditRecorder {
    /// Create a recorder writing to `store` through a queue of the given
    /// capacity, and spawn its worker task.
    pub fn new(store: Arc<dyn AuditStore>, queue_capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        tokio::spawn(drain(rx, store));
        Self { tx: Some(tx) }
    }

    /// Create a recorder that drops everything. Used when audit recording
    /// is disabled in configuration.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Whether records are going anywhere.
    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// Record one event.
    ///
    /// Applies the sensitivity filter, then enqueues. Never blocks and
    /// never fails from the caller's point of view: a full queue drops the
    /// record with a warning.
    pub fn record(&self, record: AuditRecord) {
        let Some(tx) = &self.tx else {
            return;
        };

        if !should_persist(record.action, record.outcome) {
            tracing::trace!(
                action = %record.action,
                resource = %record.resource,
                "suppressing successful non-write audit event"
            );
            return;
        }

        tracing::debug!(
            record_id = %record.id,
            action = %record.action,
            resource = %record.resource,
            outcome = %record.outcome,
            "audit event"
        );

        if let Err(err) = tx.try_send(Message::Record(record)) {
            match err {
                mpsc::error::TrySendError::Full(_) => {
                    tracing::warn!("audit queue full, dropping record");
                }
                mpsc::error::TrySendError::Closed(_) => {
                    tracing::warn!("audit worker gone, dropping record");
                }
            }
        }
    }

    /// Wait until every record enqueued before this call has been handed
    /// to the store. Used on graceful shutdown and by tests; the request
    /// path never calls this.
    pub async fn flush(&self) {
        let Some(tx) = &self.tx else {
            return;
        };
        let (ack_tx, ack_rx) = oneshot::channel();
        if tx.send(Message::Flush(ack_tx)).await.is_ok() {
            let _ = ack_rx.await;
        }
    }

    // ===== Manual events =====
    //
    // Side-channel entry points for flows not mediated by the request
    // pipeline, so authentication outcomes are always captured even where
    // path-exclusion or read-suppression would interfere.

    /// Record a successful login.
    pub fn login_succeeded(&self, user_id: Uuid, entity_id: Option<Uuid>, net: &NetworkContext) {
        let mut builder = AuditRecord::builder(AuditAction::Login, "auth", AuditOutcome::Success)
            .actor(user_id)
            .network(net)
            .detail(RecordDetail::Auth(AuthDetail::default()));
        if let Some(entity) = entity_id {
            builder = builder.acting_entity(entity);
        }
        self.record(builder.build());
    }

    /// Record a failed login attempt with the reason it failed.
    pub fn login_failed(&self, email: Option<&str>, reason: &str, net: &NetworkContext) {
        let record = AuditRecord::builder(AuditAction::Login, "auth", AuditOutcome::Failure)
            .network(net)
            .detail(RecordDetail::Auth(AuthDetail {
                email: email.map(|e| e.to_string()),
                reason: Some(reason.to_string()),
            }))
            .build();
        self.record(record);
    }

    /// Record a logout.
    pub fn logged_out(&self, user_id: Uuid, net: &NetworkContext) {
        let record = AuditRecord::builder(AuditAction::Logout, "auth", AuditOutcome::Success)
            .actor(user_id)
            .network(net)
            .detail(RecordDetail::Auth(AuthDetail::default()))
            .build();
        self.record(record);
    }
}

/// Worker loop: write each queued record, retrying a failure once before
/// dropping it.
async fn drain(mut rx: mpsc::Receiver<Message>, store: Arc<dyn AuditStore>) {
    while let Some(message) = rx.recv().await {
        match message {
            Message::Record(record) => {
                let id = record.id;
                if let Err(err) = store.append(record.clone()).await {
                    tracing::warn!(record_id = %id, error = %err, "audit write failed, retrying");
                    tokio::time::sleep(RETRY_DELAY).await;
                    if let Err(err) = store.append(record).await {
                        tracing::error!(
                            record_id = %id,
                            error = %err,
                            "audit write failed after retry, record dropped"
                        );
                    }
                }
            }
            Message::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
}
