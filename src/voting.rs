//! Vote decision table and optimistic client reconciliation
//!
//! The score of an idea is maintained incrementally: a transaction only
//! needs the voter's own previous vote to know how the score moves.
//!
//! | existing | requested | delta | vote record |
//! |----------|-----------|-------|-------------|
//! | none     | up        | +1    | create up   |
//! | none     | down      | -1    | create down |
//! | up       | up        | -1    | delete      |
//! | down     | down      | +1    | delete      |
//! | up       | down      | -2    | overwrite   |
//! | down     | up        | +2    | overwrite   |

use crate::db::{Database, DbError};
use crate::model::Direction;
use serde::Serialize;
use tracing::{debug, warn};

/// What happens to the vote record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteAction {
    Create(Direction),
    Overwrite(Direction),
    Delete,
}

/// Effect of one cast on the score and on the voter's record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteOutcome {
    pub delta: i32,
    pub action: VoteAction,
    /// Voter's vote after the cast
    pub current: Option<Direction>,
}

/// Apply the decision table
pub fn resolve(existing: Option<Direction>, requested: Direction) -> VoteOutcome {
    match existing {
        None => VoteOutcome {
            delta: requested.sign(),
            action: VoteAction::Create(requested),
            current: Some(requested),
        },
        Some(previous) if previous == requested => VoteOutcome {
            delta: -previous.sign(),
            action: VoteAction::Delete,
            current: None,
        },
        Some(_) => VoteOutcome {
            delta: 2 * requested.sign(),
            action: VoteAction::Overwrite(requested),
            current: Some(requested),
        },
    }
}

/// Committed result of a vote transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoteReceipt {
    pub idea_id: i32,
    pub voter_id: String,
    pub previous: Option<Direction>,
    pub current: Option<Direction>,
    pub delta: i32,
    /// Idea score after commit
    pub score: i32,
}

/// Score and own vote as seen by one voter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VoteState {
    pub score: i32,
    pub own_vote: Option<Direction>,
}

impl VoteState {
    /// State after applying a cast locally
    pub fn apply(self, direction: Direction) -> VoteState {
        let outcome = resolve(self.own_vote, direction);
        VoteState {
            score: self.score + outcome.delta,
            own_vote: outcome.current,
        }
    }
}

impl From<&VoteReceipt> for VoteState {
    fn from(receipt: &VoteReceipt) -> Self {
        VoteState {
            score: receipt.score,
            own_vote: receipt.current,
        }
    }
}

/// Client-side view of one idea's vote state
///
/// `displayed` runs ahead of the store while casts are in flight;
/// `confirmed` only ever holds state read from or committed to the store.
#[derive(Debug, Clone)]
pub struct OptimisticVote {
    idea_id: i32,
    confirmed: VoteState,
    displayed: VoteState,
    in_flight: usize,
}

impl OptimisticVote {
    pub fn new(idea_id: i32, confirmed: VoteState) -> Self {
        Self {
            idea_id,
            confirmed,
            displayed: confirmed,
            in_flight: 0,
        }
    }

    pub fn idea_id(&self) -> i32 {
        self.idea_id
    }

    pub fn displayed(&self) -> VoteState {
        self.displayed
    }

    pub fn confirmed(&self) -> VoteState {
        self.confirmed
    }

    pub fn is_pending(&self) -> bool {
        self.in_flight > 0
    }

    /// Show the cast before the store has answered
    pub fn apply(&mut self, direction: Direction) -> VoteState {
        self.displayed = self.displayed.apply(direction);
        self.in_flight += 1;
        self.displayed
    }

    /// The store committed a cast
    pub fn confirm(&mut self, receipt: &VoteReceipt) {
        self.confirmed = VoteState::from(receipt);
        self.settle();
    }

    /// A cast failed and a fresh read of the store is available
    pub fn resync(&mut self, server: VoteState) {
        self.confirmed = server;
        self.settle();
    }

    /// A cast failed and the store could not be read either
    pub fn revert(&mut self) {
        self.settle();
    }

    fn settle(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
        if self.in_flight == 0 {
            self.displayed = self.confirmed;
        }
    }
}

/// Casts votes for one voter on one idea with optimistic display
pub struct VoteClient<'a> {
    db: &'a Database,
    voter_id: String,
    view: OptimisticVote,
}

impl<'a> VoteClient<'a> {
    /// Start from the voter's current committed state
    pub fn load(db: &'a Database, idea_id: i32, voter_id: &str) -> Result<Self, DbError> {
        let state = db.vote_state(idea_id, voter_id)?;
        Ok(Self {
            db,
            voter_id: voter_id.to_string(),
            view: OptimisticVote::new(idea_id, state),
        })
    }

    pub fn view(&self) -> &OptimisticVote {
        &self.view
    }

    /// Cast a vote; on failure the view is resynchronized from the store
    pub fn cast(&mut self, direction: Direction) -> Result<VoteReceipt, DbError> {
        let idea_id = self.view.idea_id();
        let shown = self.view.apply(direction);
        debug!(idea_id, score = shown.score, "optimistic vote applied");

        match self.db.cast_vote(idea_id, &self.voter_id, direction) {
            Ok(receipt) => {
                self.view.confirm(&receipt);
                Ok(receipt)
            }
            Err(err) => {
                warn!(idea_id, error = %err, "vote failed, resynchronizing");
                match self.db.vote_state(idea_id, &self.voter_id) {
                    Ok(state) => self.view.resync(state),
                    Err(read_err) => {
                        warn!(idea_id, error = %read_err, "resync failed, showing last confirmed state");
                        self.view.revert();
                    }
                }
                Err(err)
            }
        }
    }
}
