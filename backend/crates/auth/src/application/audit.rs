//! Login Audit Queue
//!
//! Login records are handed to a bounded channel and persisted by a single
//! worker task. Enqueueing never waits: a full or closed queue drops the
//! record. Delivery is at most once and never affects the login outcome.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use chrono::{DateTime, Utc};

use crate::domain::entity::{login_record::LoginRecord, user::UserPatch};
use crate::domain::repository::AuthStore;
use crate::domain::value_object::user_id::UserId;
use crate::error::AuthError;

/// Where a login attempt came from
#[derive(Debug, Clone, Default)]
pub struct ClientContext {
    pub ip: String,
    pub user_agent: Option<String>,
}

impl ClientContext {
    /// Build the audit record for one attempt
    pub fn login_record(
        &self,
        identifier: &str,
        user_id: Option<UserId>,
        failure: Option<&AuthError>,
        at: DateTime<Utc>,
    ) -> LoginRecord {
        LoginRecord {
            user_id,
            identifier: identifier.to_string(),
            ip: self.ip.clone(),
            user_agent: self.user_agent.clone(),
            success: failure.is_none(),
            failure_reason: failure.map(|e| e.code().to_string()),
            created_at: at,
        }
    }
}

/// Sending half of the audit queue
#[derive(Clone)]
pub struct AuditQueue {
    tx: mpsc::Sender<LoginRecord>,
}

impl AuditQueue {
    /// Spawn the worker on the current runtime
    pub fn spawn<R>(repo: Arc<R>, capacity: usize) -> (Self, JoinHandle<()>)
    where
        R: AuthStore,
    {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(run_worker(repo, rx));
        (Self { tx }, handle)
    }

    /// Enqueue a record without waiting
    pub fn record(&self, record: LoginRecord) {
        if let Err(e) = self.tx.try_send(record) {
            let reason = match e {
                mpsc::error::TrySendError::Full(_) => "full",
                mpsc::error::TrySendError::Closed(_) => "closed",
            };
            tracing::warn!(reason, "Login audit queue rejected record, dropping");
        }
    }
}

async fn run_worker<R: AuthStore>(repo: Arc<R>, mut rx: mpsc::Receiver<LoginRecord>) {
    while let Some(record) = rx.recv().await {
        if let Err(e) = repo.insert_login_record(&record).await {
            tracing::warn!(error = %e, "Failed to persist login record");
        }

        if let (true, Some(user_id)) = (record.success, record.user_id) {
            let patch = UserPatch::last_login(record.created_at);
            if let Err(e) = repo.update_user(user_id, &patch, record.created_at).await {
                tracing::warn!(error = %e, user_id = %user_id, "Failed to update last login");
            }
        }
    }
    tracing::debug!("Login audit worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::memory::InMemoryAuthRepository;

    fn record(success: bool) -> LoginRecord {
        let client = ClientContext {
            ip: "127.0.0.1".to_string(),
            user_agent: Some("test-agent".to_string()),
        };
        let failure = AuthError::InvalidCredentials;
        client.login_record("alice", None, (!success).then_some(&failure), Utc::now())
    }

    #[test]
    fn test_failure_reason_is_error_code() {
        let failed = record(false);
        assert!(!failed.success);
        assert_eq!(failed.failure_reason.as_deref(), Some("10101"));
        assert_eq!(failed.ip, "127.0.0.1");
        assert!(record(true).failure_reason.is_none());
    }

    #[tokio::test]
    async fn test_records_are_persisted() {
        let repo = Arc::new(InMemoryAuthRepository::new());
        let (queue, handle) = AuditQueue::spawn(repo.clone(), 8);

        queue.record(record(false));
        queue.record(record(true));
        drop(queue);
        handle.await.unwrap();

        let records = repo.login_records();
        assert_eq!(records.len(), 2);
        assert!(!records[0].success);
        assert!(records[1].success);
    }

    #[tokio::test]
    async fn test_full_queue_drops_without_blocking() {
        let (tx, mut rx) = mpsc::channel(1);
        let queue = AuditQueue { tx };

        queue.record(record(true));
        queue.record(record(true));

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }
}
