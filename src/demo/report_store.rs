//! In-memory report storage with change notifications.
//!
//! [`ReportStore`] keeps reports in a `RwLock<HashMap>` and publishes a
//! [`ReportChange`] on a [`tokio::sync::broadcast`] channel for every
//! mutation. Stream producers subscribe on start and drop their receiver
//! when cancelled, so unregistering a listener is always idempotent.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, broadcast};

/// Lifecycle of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportStatus {
    /// Still running.
    Started,
    /// Completed normally.
    Finished,
    /// Cancelled while running.
    Cancelled,
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Started => "started",
            Self::Finished => "finished",
            Self::Cancelled => "cancelled",
        })
    }
}

/// A long-running report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// User-chosen identifier.
    pub id: String,
    /// Creation time.
    pub started: DateTime<Utc>,
    /// Current status.
    pub status: ReportStatus,
}

impl Report {
    /// A report that starts now.
    #[must_use]
    pub fn start(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            started: Utc::now(),
            status: ReportStatus::Started,
        }
    }
}

/// Kind of mutation a [`ReportChange`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// A report was created.
    Create,
    /// A report changed status.
    Update,
    /// A report was removed.
    Delete,
}

/// Published after every mutation of the store.
#[derive(Debug, Clone)]
pub struct ReportChange {
    /// What happened.
    pub kind: ChangeKind,
    /// The report after the change (before it, for deletions).
    pub report: Report,
}

/// Failed store operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReportError {
    /// Reports need a non-empty id.
    #[error("report id must not be empty")]
    EmptyId,

    /// The id is taken.
    #[error("report with id {0} already exists")]
    AlreadyExists(String),

    /// No report has this id.
    #[error("report with id {0} doesn't exist")]
    NotFound(String),
}

impl From<ReportError> for crate::service::ActionError {
    fn from(err: ReportError) -> Self {
        Self::new(err.to_string())
    }
}

/// Report storage shared by actions, pages and streams.
#[derive(Debug)]
pub struct ReportStore {
    reports: RwLock<HashMap<String, Report>>,
    changes: broadcast::Sender<ReportChange>,
}

impl ReportStore {
    /// Creates an empty store whose change channel buffers `capacity`
    /// events per lagging subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (changes, _) = broadcast::channel(capacity);
        Self {
            reports: RwLock::new(HashMap::new()),
            changes,
        }
    }

    /// Returns a receiver for all future changes.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ReportChange> {
        self.changes.subscribe()
    }

    /// Returns the number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.changes.receiver_count()
    }

    /// Looks up a report.
    pub async fn get(&self, id: &str) -> Option<Report> {
        self.reports.read().await.get(id).cloned()
    }

    /// Returns all reports, oldest first.
    pub async fn all(&self) -> Vec<Report> {
        let mut reports: Vec<Report> = self.reports.read().await.values().cloned().collect();
        reports.sort_by(|a, b| a.started.cmp(&b.started).then_with(|| a.id.cmp(&b.id)));
        reports
    }

    /// Inserts a new report.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::EmptyId`] or [`ReportError::AlreadyExists`].
    pub async fn create(&self, report: Report) -> Result<(), ReportError> {
        if report.id.is_empty() {
            return Err(ReportError::EmptyId);
        }
        let mut reports = self.reports.write().await;
        if reports.contains_key(&report.id) {
            return Err(ReportError::AlreadyExists(report.id));
        }
        reports.insert(report.id.clone(), report.clone());
        self.publish(ChangeKind::Create, report);
        Ok(())
    }

    /// Moves a report from `from` to `to`. Reports in any other status are
    /// left untouched and no change is published.
    ///
    /// Returns whether the status changed.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::NotFound`] if the report does not exist.
    pub async fn transition(
        &self,
        id: &str,
        from: ReportStatus,
        to: ReportStatus,
    ) -> Result<bool, ReportError> {
        let mut reports = self.reports.write().await;
        let report = reports
            .get_mut(id)
            .ok_or_else(|| ReportError::NotFound(id.to_string()))?;
        if report.status != from {
            return Ok(false);
        }
        report.status = to;
        let snapshot = report.clone();
        self.publish(ChangeKind::Update, snapshot);
        Ok(true)
    }

    /// Removes a report.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::NotFound`] if the report does not exist.
    pub async fn delete(&self, id: &str) -> Result<Report, ReportError> {
        let mut reports = self.reports.write().await;
        let report = reports
            .remove(id)
            .ok_or_else(|| ReportError::NotFound(id.to_string()))?;
        self.publish(ChangeKind::Delete, report.clone());
        Ok(report)
    }

    // Called with the write lock held so subscribers see changes in order.
    fn publish(&self, kind: ChangeKind, report: Report) {
        tracing::debug!(id = %report.id, ?kind, status = %report.status, "report changed");
        let _ = self.changes.send(ReportChange { kind, report });
    }
}

impl Default for ReportStore {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_publishes_change() {
        let store = ReportStore::default();
        let mut rx = store.subscribe();

        assert!(store.create(Report::start("q3")).await.is_ok());

        let Ok(change) = rx.recv().await else {
            panic!("expected change");
        };
        assert_eq!(change.kind, ChangeKind::Create);
        assert_eq!(change.report.id, "q3");
        assert_eq!(change.report.status, ReportStatus::Started);
    }

    #[tokio::test]
    async fn duplicate_and_empty_ids_are_rejected() {
        let store = ReportStore::default();
        assert!(store.create(Report::start("a")).await.is_ok());
        assert_eq!(
            store.create(Report::start("a")).await,
            Err(ReportError::AlreadyExists("a".into()))
        );
        assert_eq!(store.create(Report::start("")).await, Err(ReportError::EmptyId));
    }

    #[tokio::test]
    async fn transition_only_from_expected_status() {
        let store = ReportStore::default();
        assert!(store.create(Report::start("a")).await.is_ok());

        let cancelled = store
            .transition("a", ReportStatus::Started, ReportStatus::Cancelled)
            .await;
        assert_eq!(cancelled, Ok(true));

        let mut rx = store.subscribe();
        let finished = store
            .transition("a", ReportStatus::Started, ReportStatus::Finished)
            .await;
        assert_eq!(finished, Ok(false));
        assert!(rx.try_recv().is_err());

        assert_eq!(
            store.get("a").await.map(|r| r.status),
            Some(ReportStatus::Cancelled)
        );
        assert_eq!(
            store
                .transition("missing", ReportStatus::Started, ReportStatus::Finished)
                .await,
            Err(ReportError::NotFound("missing".into()))
        );
    }

    #[tokio::test]
    async fn delete_removes_and_publishes() {
        let store = ReportStore::default();
        assert!(store.create(Report::start("a")).await.is_ok());
        let mut rx = store.subscribe();

        assert!(store.delete("a").await.is_ok());
        assert!(store.get("a").await.is_none());
        let Ok(change) = rx.recv().await else {
            panic!("expected change");
        };
        assert_eq!(change.kind, ChangeKind::Delete);
    }

    #[tokio::test]
    async fn all_is_ordered_by_start_time() {
        let store = ReportStore::default();
        let mut early = Report::start("b");
        early.started = early.started - chrono::Duration::seconds(10);
        assert!(store.create(Report::start("a")).await.is_ok());
        assert!(store.create(early).await.is_ok());

        let ids: Vec<String> = store.all().await.into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn dropping_receivers_unsubscribes() {
        let store = ReportStore::default();
        let rx = store.subscribe();
        assert_eq!(store.subscriber_count(), 1);
        drop(rx);
        assert_eq!(store.subscriber_count(), 0);
    }
}
