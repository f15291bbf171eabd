//! Vote transaction properties against a real SQLite store
//!
//! Every test opens its own temporary database, so scores start at zero
//! and nothing is shared between tests.

use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use intake::attachments::{ContentStore, Upload};
use intake::db::{Database, DbError};
use intake::model::{Author, Direction, IdeaDraft, Status};
use intake::voting::{resolve, VoteClient, VoteState};
use proptest::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

struct Fixture {
    dir: TempDir,
    db: Database,
    store: ContentStore,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let db = Database::open_at(dir.path().join("intake.db")).expect("open database");
        let store = ContentStore::new(dir.path().join("blobs"), "/files", 1024 * 1024);
        Self { dir, db, store }
    }

    fn db_path(&self) -> PathBuf {
        self.dir.path().join("intake.db")
    }

    fn idea(&self) -> i32 {
        self.db
            .submit_idea(&draft(), &author(), &self.store, &[])
            .expect("submit idea")
            .id
    }

    /// Side connection that bypasses the store API
    fn raw(&self) -> SqliteConnection {
        let mut conn =
            SqliteConnection::establish(&self.db_path().to_string_lossy()).expect("raw connection");
        // Diesel enables foreign keys on establish; the side connection must be able to
        // remove an idea out from under the store to simulate a missing record.
        diesel::sql_query("PRAGMA foreign_keys = OFF")
            .execute(&mut conn)
            .expect("disable foreign keys");
        conn
    }
}

fn draft() -> IdeaDraft {
    IdeaDraft {
        title: "Self-service password resets".to_string(),
        problem: "The service desk resets forty passwords a day by hand".to_string(),
        desired_outcome: "Employees reset their own passwords after MFA".to_string(),
        category: "Technology Enhancements".to_string(),
        department: "IT".to_string(),
        ..Default::default()
    }
}

fn author() -> Author {
    Author {
        id: "author-1".to_string(),
        name: "Author".to_string(),
        email: Some("author@example.com".to_string()),
        photo: None,
    }
}

fn direction() -> impl Strategy<Value = Direction> {
    prop_oneof![Just(Direction::Up), Just(Direction::Down)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Property: any sequence of casts by one voter leaves the score at the
    /// decision table's net delta, with at most one vote record.
    #[test]
    fn prop_single_voter_sequence(casts in prop::collection::vec(direction(), 0..12)) {
        let fx = Fixture::new();
        let idea = fx.idea();

        let mut expected: Option<Direction> = None;
        let mut net = 0;
        for cast in &casts {
            let outcome = resolve(expected, *cast);
            net += outcome.delta;
            expected = outcome.current;
            let receipt = fx.db.cast_vote(idea, "voter", *cast).unwrap();
            prop_assert_eq!(receipt.score, net);
        }

        let votes = fx.db.votes_for(idea).unwrap();
        prop_assert!(votes.len() <= 1);
        prop_assert_eq!(votes.first().map(|v| v.direction), expected);
        prop_assert_eq!(fx.db.get_idea(idea).unwrap().score, expected.map_or(0, Direction::sign));
        prop_assert!(fx.db.verify_score(idea).unwrap().is_consistent());
    }

    /// Property: with several voters, the score is the sum of retained votes.
    #[test]
    fn prop_score_is_sum_of_votes(casts in prop::collection::vec((0usize..4, direction()), 0..20)) {
        let fx = Fixture::new();
        let idea = fx.idea();

        for (voter, cast) in &casts {
            fx.db.cast_vote(idea, &format!("voter-{}", voter), *cast).unwrap();
        }

        let sum: i32 = fx.db.votes_for(idea).unwrap().iter().map(|v| v.direction.sign()).sum();
        prop_assert_eq!(fx.db.get_idea(idea).unwrap().score, sum);
    }
}

#[test]
fn test_toggle_restores_previous_score() {
    let fx = Fixture::new();
    let idea = fx.idea();
    fx.db.cast_vote(idea, "other", Direction::Down).unwrap();

    for direction in [Direction::Up, Direction::Down] {
        fx.db.cast_vote(idea, "voter", direction).unwrap();
        let receipt = fx.db.cast_vote(idea, "voter", direction).unwrap();
        assert_eq!(receipt.score, -1);
        assert_eq!(receipt.current, None);
        assert!(fx.db.get_vote(idea, "voter").unwrap().is_none());
    }
}

#[test]
fn test_scenario_two_voters() {
    let fx = Fixture::new();
    let idea = fx.idea();

    let steps = [
        ("a", Direction::Up, 1, Some(Direction::Up)),
        ("a", Direction::Down, -1, Some(Direction::Down)),
        ("a", Direction::Down, 0, None),
        ("b", Direction::Up, 1, Some(Direction::Up)),
    ];
    for (voter, direction, score, record) in steps {
        let receipt = fx.db.cast_vote(idea, voter, direction).unwrap();
        assert_eq!(receipt.score, score, "{} {:?}", voter, direction);
        assert_eq!(fx.db.get_vote(idea, voter).unwrap().map(|v| v.direction), record);
    }
    assert!(fx.db.get_vote(idea, "a").unwrap().is_none());
}

#[test]
fn test_concurrent_voters() {
    let fx = Arc::new(Fixture::new());
    let idea = fx.idea();
    let voters = 12;

    let handles: Vec<_> = (0..voters)
        .map(|i| {
            let fx = Arc::clone(&fx);
            std::thread::spawn(move || {
                let direction = if i % 3 == 0 { Direction::Down } else { Direction::Up };
                fx.db
                    .cast_vote(idea, &format!("voter-{}", i), direction)
                    .unwrap();
                direction
            })
        })
        .collect();

    let mut ups = 0;
    let mut downs = 0;
    for handle in handles {
        match handle.join().unwrap() {
            Direction::Up => ups += 1,
            Direction::Down => downs += 1,
        }
    }

    assert_eq!(fx.db.get_idea(idea).unwrap().score, ups - downs);
    assert_eq!(fx.db.votes_for(idea).unwrap().len(), voters);
    assert!(fx.db.verify_score(idea).unwrap().is_consistent());
}

#[test]
fn test_concurrent_toggles_by_one_voter() {
    let fx = Arc::new(Fixture::new());
    let idea = fx.idea();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let fx = Arc::clone(&fx);
            std::thread::spawn(move || {
                fx.db.cast_vote(idea, "same-voter", Direction::Up).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // Eight serialized toggles end where they started
    assert_eq!(fx.db.get_idea(idea).unwrap().score, 0);
    assert!(fx.db.get_vote(idea, "same-voter").unwrap().is_none());
}

#[test]
fn test_vote_on_deleted_idea_aborts() {
    let fx = Fixture::new();
    let idea = fx.idea();
    fx.db.cast_vote(idea, "a", Direction::Up).unwrap();

    let mut raw = fx.raw();
    diesel::sql_query(format!("DELETE FROM ideas WHERE id = {}", idea))
        .execute(&mut raw)
        .unwrap();

    let err = fx.db.cast_vote(idea, "b", Direction::Up).unwrap_err();
    assert!(matches!(err, DbError::IdeaNotFound(id) if id == idea));
    let err = fx.db.cast_vote(idea, "a", Direction::Down).unwrap_err();
    assert!(matches!(err, DbError::IdeaNotFound(_)));

    // Vote records are exactly as before the failed casts
    let votes = fx.db.votes_for(idea).unwrap();
    assert_eq!(votes.len(), 1);
    assert_eq!(votes[0].voter_id, "a");
    assert_eq!(votes[0].direction, Direction::Up);
}

#[test]
fn test_client_resyncs_after_failed_cast() {
    let fx = Fixture::new();
    let idea = fx.idea();
    fx.db.cast_vote(idea, "other", Direction::Up).unwrap();

    let mut client = VoteClient::load(&fx.db, idea, "me").unwrap();
    assert_eq!(client.view().displayed(), VoteState { score: 1, own_vote: None });

    let receipt = client.cast(Direction::Up).unwrap();
    assert_eq!(receipt.score, 2);
    assert_eq!(client.view().displayed(), VoteState { score: 2, own_vote: Some(Direction::Up) });

    let mut raw = fx.raw();
    diesel::sql_query(format!("DELETE FROM ideas WHERE id = {}", idea))
        .execute(&mut raw)
        .unwrap();

    // Store cannot be read either: the view falls back to its last confirmed state
    assert!(client.cast(Direction::Down).is_err());
    assert!(!client.view().is_pending());
    assert_eq!(client.view().displayed(), VoteState { score: 2, own_vote: Some(Direction::Up) });
}

#[test]
fn test_client_confirms_with_committed_score() {
    let fx = Fixture::new();
    let idea = fx.idea();
    let mut client = VoteClient::load(&fx.db, idea, "me").unwrap();

    // Someone else votes after the client loaded; the receipt carries their vote too
    fx.db.cast_vote(idea, "other", Direction::Down).unwrap();

    let receipt = client.cast(Direction::Up).unwrap();
    assert_eq!(receipt.score, 0);
    assert_eq!(client.view().displayed(), VoteState { score: 0, own_vote: Some(Direction::Up) });
}

#[test]
fn test_client_adopts_store_state_when_only_the_write_fails() {
    let fx = Fixture::new();
    let idea = fx.idea();
    let mut client = VoteClient::load(&fx.db, idea, "me").unwrap();
    assert_eq!(client.view().displayed(), VoteState { score: 0, own_vote: None });

    fx.db.cast_vote(idea, "other", Direction::Down).unwrap();

    let mut raw = fx.raw();
    diesel::sql_query(
        "CREATE TRIGGER refuse_votes BEFORE INSERT ON votes \
         BEGIN SELECT RAISE(ABORT, 'votes offline'); END",
    )
    .execute(&mut raw)
    .unwrap();

    let err = client.cast(Direction::Up).unwrap_err();
    assert!(matches!(err, DbError::Query(_)));

    // The store is still readable, so the view shows what it holds
    let stored = fx.db.vote_state(idea, "me").unwrap();
    assert_eq!(stored, VoteState { score: -1, own_vote: None });
    assert_eq!(client.view().displayed(), stored);
    assert_ne!(client.view().displayed(), VoteState { score: 1, own_vote: Some(Direction::Up) });
    assert!(!client.view().is_pending());
}

#[test]
fn test_submitted_straight_to_done() {
    let fx = Fixture::new();
    let idea = fx.idea();
    let done = fx.db.update_status(idea, Status::Done, None).unwrap();
    assert_eq!(done.status, Status::Done);
    let back = fx.db.update_status(idea, Status::InProgress, None).unwrap();
    assert_eq!(back.status, Status::InProgress);
}

#[test]
fn test_failed_record_write_discards_uploads() {
    let fx = Fixture::new();
    let mut raw = fx.raw();
    diesel::sql_query(
        "CREATE TRIGGER refuse_attachments BEFORE INSERT ON idea_attachments \
         BEGIN SELECT RAISE(ABORT, 'attachments offline'); END",
    )
    .execute(&mut raw)
    .unwrap();

    let uploads = [
        Upload {
            file_name: "before.png".to_string(),
            bytes: vec![0x89, b'P', b'N', b'G'],
            mime_type: None,
        },
        Upload {
            file_name: "after.png".to_string(),
            bytes: vec![0x89, b'P', b'N', b'G'],
            mime_type: Some("image/png".to_string()),
        },
    ];
    let err = fx
        .db
        .submit_idea(&draft(), &author(), &fx.store, &uploads)
        .unwrap_err();
    assert!(matches!(err, DbError::Query(_)));

    // Neither the idea nor its blobs survive
    assert!(fx.db.feed().unwrap().ideas.is_empty());
    assert!(fx.store.keys().unwrap().is_empty());
}
