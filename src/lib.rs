//! Intake - idea submission and triage
//!
//! Employees submit process-improvement ideas, everyone votes them up or
//! down, and administrators move them through a review pipeline.
//!
//! # Overview
//!
//! Ideas, attachment references and votes live in an embedded SQLite
//! database. Attachment bytes live in a filesystem content store. A vote is
//! a single transaction that updates both the voter's vote record and the
//! idea's score, so the score always equals the sum of retained votes.
//!
//! # Statuses
//!
//! | Status | Meaning |
//! |--------|---------|
//! | `Submitted` | New, not yet reviewed |
//! | `In Progress` | Being worked on |
//! | `Approved` | Accepted for delivery |
//! | `Rejected` | Declined |
//! | `Done` | Delivered |
//!
//! Administrators may move an idea from any status to any other.
//!
//! # Quick Start
//!
//! ```no_run
//! use intake::{ContentStore, Database, Direction, IdeaDraft};
//! use intake::model::Author;
//!
//! let db = Database::new("intake.db").unwrap();
//! let store = ContentStore::new("blobs", "/files", 10 * 1024 * 1024);
//!
//! let draft = IdeaDraft {
//!     title: "Automate invoice matching".to_string(),
//!     problem: "Invoices are matched to purchase orders by hand".to_string(),
//!     desired_outcome: "Matching happens automatically with exceptions flagged".to_string(),
//!     category: "Automation Candidates".to_string(),
//!     department: "Finance & Accounting".to_string(),
//!     ..Default::default()
//! };
//! let author = Author { id: "u1".into(), name: "Uma".into(), email: None, photo: None };
//! let idea = db.submit_idea(&draft, &author, &store, &[]).unwrap();
//!
//! let receipt = db.cast_vote(idea.id, "u2", Direction::Up).unwrap();
//! println!("score is now {}", receipt.score);
//! ```

pub mod access;
pub mod analytics;
pub mod attachments;
pub mod board;
pub mod config;
pub mod db;
pub mod feed;
pub mod logging;
pub mod model;
pub mod records;
pub mod schema;
pub mod serve;
pub mod voting;

pub use access::{AccessError, AccessPolicy, Identity, Role, Session};
pub use analytics::Summary;
pub use attachments::{ContentStore, StorageError, Upload};
pub use board::Board;
pub use config::Config;
pub use db::{Database, DbError, ScoreCheck, CURRENT_SCHEMA};
pub use feed::{FeedFingerprint, FeedSnapshot, Subscription};
pub use model::{Direction, Idea, IdeaDraft, Status, ValidationErrors, Vote};
pub use voting::{OptimisticVote, VoteClient, VoteReceipt, VoteState};
