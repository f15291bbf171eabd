//! Live idea feed
//!
//! A subscription re-reads the feed whenever the database directory
//! changes, and on a poll interval when no file events arrive. Readers only
//! see a new snapshot when the feed actually changed.

use crate::db::{Database, DbError};
use crate::model::Idea;
use crate::records::MalformedRecord;
use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;
use std::sync::mpsc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Summary that changes whenever the visible feed changes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeedFingerprint {
    pub ideas: i64,
    pub latest_id: Option<i32>,
    pub revisions: i64,
    pub votes: i64,
}

/// Ideas ordered newest first, plus rows that failed validation
#[derive(Debug, Clone, Default, Serialize)]
pub struct FeedSnapshot {
    pub ideas: Vec<Idea>,
    pub rejected: Vec<MalformedRecord>,
    pub fingerprint: FeedFingerprint,
}

/// Ordered feed that pushes a snapshot on every change
pub struct Subscription<'a> {
    db: &'a Database,
    changes: mpsc::Receiver<()>,
    // Dropping the watcher stops file events
    watcher: Option<RecommendedWatcher>,
    poll_interval: Duration,
    last: Option<FeedFingerprint>,
}

impl<'a> Subscription<'a> {
    /// Subscribe to the feed; falls back to polling if the watcher fails
    pub fn open(db: &'a Database, poll_interval: Duration) -> Self {
        let (tx, rx) = mpsc::channel();
        let watcher = match watch_dir(db, tx) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                warn!(error = %e, "file watcher unavailable, polling only");
                None
            }
        };

        Self {
            db,
            changes: rx,
            watcher,
            poll_interval,
            last: None,
        }
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.is_some()
    }

    /// Current snapshot if it differs from the last one delivered
    ///
    /// The first call always delivers.
    pub fn poll(&mut self) -> Result<Option<FeedSnapshot>, DbError> {
        // Pending file events are folded into this check
        while self.changes.try_recv().is_ok() {}

        if let Some(last) = &self.last {
            if self.db.fingerprint()? == *last {
                return Ok(None);
            }
        }
        let snapshot = self.db.feed()?;
        debug!(ideas = snapshot.ideas.len(), "feed changed");
        self.last = Some(snapshot.fingerprint.clone());
        Ok(Some(snapshot))
    }

    /// Block up to `timeout` for the next changed snapshot
    pub fn wait(&mut self, timeout: Duration) -> Result<Option<FeedSnapshot>, DbError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(snapshot) = self.poll()? {
                return Ok(Some(snapshot));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let step = self.poll_interval.min(deadline - now);
            match self.changes.recv_timeout(step) {
                Ok(()) | Err(mpsc::RecvTimeoutError::Timeout) => {}
                Err(mpsc::RecvTimeoutError::Disconnected) => std::thread::sleep(step),
            }
        }
    }

    /// Block until the feed changes
    pub fn next_snapshot(&mut self) -> Result<FeedSnapshot, DbError> {
        loop {
            if let Some(snapshot) = self.wait(self.poll_interval)? {
                return Ok(snapshot);
            }
        }
    }
}

fn watch_dir(db: &Database, tx: mpsc::Sender<()>) -> notify::Result<RecommendedWatcher> {
    let mut watcher = RecommendedWatcher::new(
        move |res: Result<notify::Event, notify::Error>| {
            if let Ok(event) = res {
                if event.kind.is_modify() || event.kind.is_create() {
                    let _ = tx.send(());
                }
            }
        },
        Config::default(),
    )?;

    // The WAL file sees writes before the main file does
    let dir = match db.path().parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::path::PathBuf::from("."),
    };
    watcher.watch(&dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachments::ContentStore;
    use crate::model::{Author, Direction, IdeaDraft, Status};
    use tempfile::TempDir;

    fn draft(title: &str) -> IdeaDraft {
        IdeaDraft {
            title: title.to_string(),
            problem: "Support tickets are triaged by hand every morning".to_string(),
            desired_outcome: "Tickets arrive pre-labelled with a suggested owner".to_string(),
            category: "AI Opportunities".to_string(),
            department: "Customer Support".to_string(),
            ..Default::default()
        }
    }

    fn author() -> Author {
        Author {
            id: "u1".to_string(),
            name: "Uma".to_string(),
            email: None,
            photo: None,
        }
    }

    #[test]
    fn test_first_poll_delivers_then_quiet() {
        let dir = TempDir::new().unwrap();
        let db = Database::open_at(dir.path().join("intake.db")).unwrap();
        let mut sub = Subscription::open(&db, Duration::from_millis(20));

        let first = sub.poll().unwrap().unwrap();
        assert!(first.ideas.is_empty());
        assert!(sub.poll().unwrap().is_none());
    }

    #[test]
    fn test_changes_are_delivered_once() {
        let dir = TempDir::new().unwrap();
        let db = Database::open_at(dir.path().join("intake.db")).unwrap();
        let store = ContentStore::new(dir.path().join("blobs"), "/files", 1024);
        let mut sub = Subscription::open(&db, Duration::from_millis(20));
        sub.poll().unwrap();

        let idea = db.submit_idea(&draft("Label tickets"), &author(), &store, &[]).unwrap();
        let snapshot = sub.wait(Duration::from_secs(2)).unwrap().unwrap();
        assert_eq!(snapshot.ideas.len(), 1);
        assert!(sub.poll().unwrap().is_none());

        db.cast_vote(idea.id, "v", Direction::Up).unwrap();
        let snapshot = sub.wait(Duration::from_secs(2)).unwrap().unwrap();
        assert_eq!(snapshot.ideas[0].score, 1);

        db.update_status(idea.id, Status::Approved, None).unwrap();
        let snapshot = sub.next_snapshot().unwrap();
        assert_eq!(snapshot.ideas[0].status, Status::Approved);
    }

    #[test]
    fn test_cancelling_votes_on_two_ideas_are_delivered() {
        let dir = TempDir::new().unwrap();
        let db = Database::open_at(dir.path().join("intake.db")).unwrap();
        let store = ContentStore::new(dir.path().join("blobs"), "/files", 1024);
        let x = db.submit_idea(&draft("Label tickets"), &author(), &store, &[]).unwrap();
        let y = db.submit_idea(&draft("Route tickets"), &author(), &store, &[]).unwrap();

        db.cast_vote(x.id, "alice", Direction::Up).unwrap();
        let mut sub = Subscription::open(&db, Duration::from_millis(10));
        sub.poll().unwrap().unwrap();

        // Net score and vote count are unchanged by this pair
        db.cast_vote(x.id, "alice", Direction::Up).unwrap();
        db.cast_vote(y.id, "bob", Direction::Up).unwrap();

        let snapshot = sub.wait(Duration::from_millis(200)).unwrap().unwrap();
        let scores: Vec<(i32, i32)> = snapshot.ideas.iter().map(|i| (i.id, i.score)).collect();
        assert_eq!(scores, vec![(y.id, 1), (x.id, 0)]);
    }

    #[test]
    fn test_wait_times_out_without_changes() {
        let dir = TempDir::new().unwrap();
        let db = Database::open_at(dir.path().join("intake.db")).unwrap();
        let mut sub = Subscription::open(&db, Duration::from_millis(10));
        sub.poll().unwrap();
        assert!(sub.wait(Duration::from_millis(50)).unwrap().is_none());
    }
}
