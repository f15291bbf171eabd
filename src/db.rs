//! SQLite database with Diesel ORM
//!
//! Stores ideas, their attachment references and per-voter votes. The
//! vote transaction here is the only place an idea's score changes.

use crate::attachments::{ContentStore, StagedBlob, Upload};
use crate::config::VotingConfig;
use crate::feed::{FeedFingerprint, FeedSnapshot};
use crate::model::{Author, Direction, Idea, IdeaDraft, Status, ValidationErrors, Vote};
use crate::records::{
    AttachmentRow, IdeaRow, MalformedRecord, NewAttachment, NewIdea, NewVote, VoteRow,
};
use crate::schema::*;
use crate::voting::{self, VoteAction, VoteReceipt, VoteState};
use crate::attachments::StorageError;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool, PooledConnection};
use diesel::sqlite::SqliteConnection;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Walk up directory tree to find .intake folder (like git finds .git)
/// Can be overridden with INTAKE_DB_PATH env var
fn get_db_path() -> PathBuf {
    // Check env var first - always takes priority
    if let Ok(path) = std::env::var("INTAKE_DB_PATH") {
        return PathBuf::from(path);
    }

    if let Ok(current_dir) = std::env::current_dir() {
        let mut dir = current_dir.as_path();
        loop {
            let intake_dir = dir.join(".intake");
            if intake_dir.is_dir() {
                return intake_dir.join("intake.db");
            }
            match dir.parent() {
                Some(parent) => dir = parent,
                None => break,
            }
        }
    }

    // No .intake found - default to current directory
    // (intake init will create it here)
    PathBuf::from(".intake/intake.db")
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Current schema version for intake
pub const CURRENT_SCHEMA: StoreSchema = StoreSchema {
    major: 1,
    minor: 0,
    patch: 0,
    name: "idea-intake",
    features: &["ideas", "idea_attachments", "votes"],
};

/// Describes the version and capabilities of the schema
#[derive(Debug, Clone)]
pub struct StoreSchema {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub name: &'static str,
    pub features: &'static [&'static str],
}

impl StoreSchema {
    pub fn version_string(&self) -> String {
        format!("{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl std::fmt::Display for StoreSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{} ({})", self.version_string(), self.name)
    }
}

/// Insertable schema version
#[derive(Insertable)]
#[diesel(table_name = schema_versions)]
struct NewSchemaVersion<'a> {
    version: &'a str,
    name: &'a str,
    features: &'a str,
    introduced_at: &'a str,
}

// ============================================================================
// Database Connection
// ============================================================================

type DbPool = Pool<ConnectionManager<SqliteConnection>>;
type DbConn = PooledConnection<ConnectionManager<SqliteConnection>>;

/// Per-connection pragmas, applied once when the pool opens a new connection
#[derive(Debug, Clone, Copy)]
struct ConnectionPragmas {
    busy_timeout_ms: u32,
}

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ConnectionPragmas {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> std::result::Result<(), diesel::r2d2::Error> {
        conn.batch_execute(&format!(
            "PRAGMA busy_timeout = {}; PRAGMA foreign_keys = ON;",
            self.busy_timeout_ms
        ))
        .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Error type for database operations
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(#[from] diesel::result::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] diesel::r2d2::Error),

    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("{0}")]
    InvalidInput(String),

    #[error("idea {0} does not exist")]
    IdeaNotFound(i32),

    #[error(transparent)]
    Malformed(#[from] MalformedRecord),

    #[error("vote on idea {idea_id} still conflicting after {attempts} attempts")]
    Conflict { idea_id: i32, attempts: u32 },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, DbError>;

/// SQLite "database is locked" / "database is busy"
fn is_busy(err: &DbError) -> bool {
    match err {
        DbError::Query(diesel::result::Error::DatabaseError(_, info)) => {
            let message = info.message();
            message.contains("locked") || message.contains("busy")
        }
        _ => false,
    }
}

/// Stored score next to the score recomputed from votes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScoreCheck {
    pub idea_id: i32,
    pub stored: i32,
    pub recomputed: i32,
}

impl ScoreCheck {
    pub fn is_consistent(&self) -> bool {
        self.stored == self.recomputed
    }
}

/// Database connection wrapper with connection pool
pub struct Database {
    pool: DbPool,
    path: PathBuf,
    vote_retries: u32,
}

impl Database {
    /// Get the database path that will be used
    pub fn db_path() -> PathBuf {
        get_db_path()
    }

    /// Create a new database at a custom path
    pub fn new(path: &str) -> Result<Self> {
        Self::open_at(path)
    }

    /// Open database at default path (respects INTAKE_DB_PATH env var)
    pub fn open() -> Result<Self> {
        Self::open_with(get_db_path(), &VotingConfig::default())
    }

    /// Open database at specified path
    pub fn open_at<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, &VotingConfig::default())
    }

    /// Open database at specified path with explicit vote tuning
    pub fn open_with<P: AsRef<Path>>(path: P, voting: &VotingConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| DbError::Connection(format!("{}: {}", parent.display(), e)))?;
            }
        }

        let manager = ConnectionManager::<SqliteConnection>::new(path.to_string_lossy());
        let pool = Pool::builder()
            .max_size(8)
            .connection_customizer(Box::new(ConnectionPragmas {
                busy_timeout_ms: voting.busy_timeout_ms,
            }))
            .build(manager)
            .map_err(|e| DbError::Connection(e.to_string()))?;

        let db = Self {
            pool,
            path,
            vote_retries: voting.retries,
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Path of the underlying database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn get_conn(&self) -> Result<DbConn> {
        self.pool.get().map_err(|e| DbError::Connection(e.to_string()))
    }

    fn init_schema(&self) -> Result<()> {
        let mut conn = self.get_conn()?;

        conn.batch_execute("PRAGMA journal_mode = WAL;")?;

        diesel::sql_query(r#"
            CREATE TABLE IF NOT EXISTS schema_versions (
                id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
                version TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                features TEXT NOT NULL,
                introduced_at TEXT NOT NULL
            )
        "#).execute(&mut conn)?;

        diesel::sql_query(r#"
            CREATE TABLE IF NOT EXISTS ideas (
                id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
                title TEXT NOT NULL,
                problem TEXT NOT NULL,
                desired_outcome TEXT NOT NULL,
                category TEXT NOT NULL,
                department TEXT NOT NULL,
                impact_type TEXT,
                automation_fit TEXT,
                status TEXT NOT NULL DEFAULT 'Submitted',
                score INTEGER NOT NULL DEFAULT 0,
                author_id TEXT NOT NULL,
                author_name TEXT NOT NULL,
                author_email TEXT,
                author_photo TEXT,
                process_frequency TEXT,
                time_spent_hours_per_week REAL,
                estimated_benefit TEXT,
                review_notes TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                revision INTEGER NOT NULL DEFAULT 0
            )
        "#).execute(&mut conn)?;

        diesel::sql_query(r#"
            CREATE TABLE IF NOT EXISTS idea_attachments (
                id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
                idea_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                url TEXT NOT NULL,
                mime_type TEXT NOT NULL,
                size_bytes INTEGER NOT NULL,
                storage_key TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL,
                FOREIGN KEY (idea_id) REFERENCES ideas(id)
            )
        "#).execute(&mut conn)?;

        // One row per (idea, voter): the primary key is the invariant
        diesel::sql_query(r#"
            CREATE TABLE IF NOT EXISTS votes (
                idea_id INTEGER NOT NULL,
                voter_id TEXT NOT NULL,
                direction TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (idea_id, voter_id),
                FOREIGN KEY (idea_id) REFERENCES ideas(id)
            )
        "#).execute(&mut conn)?;

        diesel::sql_query("CREATE INDEX IF NOT EXISTS idx_ideas_created_at ON ideas(created_at)").execute(&mut conn)?;
        diesel::sql_query("CREATE INDEX IF NOT EXISTS idx_ideas_status ON ideas(status)").execute(&mut conn)?;
        diesel::sql_query("CREATE INDEX IF NOT EXISTS idx_attachments_idea ON idea_attachments(idea_id)").execute(&mut conn)?;
        diesel::sql_query("CREATE INDEX IF NOT EXISTS idx_votes_voter ON votes(voter_id)").execute(&mut conn)?;

        self.register_schema(&mut conn, &CURRENT_SCHEMA)?;
        Ok(())
    }

    fn register_schema(&self, conn: &mut SqliteConnection, schema: &StoreSchema) -> Result<()> {
        let now = now();
        let features_json = serde_json::to_string(&schema.features).unwrap_or_default();

        let new_schema = NewSchemaVersion {
            version: &schema.version_string(),
            name: schema.name,
            features: &features_json,
            introduced_at: &now,
        };

        diesel::insert_or_ignore_into(schema_versions::table)
            .values(&new_schema)
            .execute(conn)?;

        Ok(())
    }

    // ========================================================================
    // Idea Operations
    // ========================================================================

    /// Submit a new idea with optional attachments
    ///
    /// Uploads are staged first; the idea and every attachment reference
    /// are then written in one transaction. If that transaction fails the
    /// staged blobs are removed again.
    pub fn submit_idea(
        &self,
        draft: &IdeaDraft,
        author: &Author,
        store: &ContentStore,
        uploads: &[Upload],
    ) -> Result<Idea> {
        draft.validate()?;
        if author.id.trim().is_empty() || author.name.trim().is_empty() {
            return Err(DbError::InvalidInput("author id and name are required".to_string()));
        }

        let staged = store.stage_all(&author.id, uploads)?;
        let idea_id = match self.insert_idea(draft, author, &staged) {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, staged = staged.len(), "idea write failed, discarding uploads");
                store.discard(&staged);
                return Err(e);
            }
        };

        info!(idea_id, author = %author.id, attachments = staged.len(), "idea submitted");
        self.get_idea(idea_id)
    }

    fn insert_idea(&self, draft: &IdeaDraft, author: &Author, staged: &[StagedBlob]) -> Result<i32> {
        let mut conn = self.get_conn()?;
        let now = now();

        conn.transaction::<_, DbError, _>(|conn| {
            let new_idea = NewIdea {
                title: draft.title.trim(),
                problem: draft.problem.trim(),
                desired_outcome: draft.desired_outcome.trim(),
                category: draft.category.trim(),
                department: draft.department.trim(),
                impact_type: draft.impact_type.map(|t| t.as_str()),
                automation_fit: draft.automation_fit.map(|f| f.as_str()),
                status: Status::Submitted.as_str(),
                score: 0,
                author_id: &author.id,
                author_name: &author.name,
                author_email: author.email.as_deref(),
                author_photo: author.photo.as_deref(),
                process_frequency: draft.process_frequency.map(|f| f.as_str()),
                time_spent_hours_per_week: draft.time_spent_hours_per_week,
                estimated_benefit: draft
                    .estimated_benefit
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty()),
                review_notes: None,
                created_at: &now,
                updated_at: &now,
            };

            diesel::insert_into(ideas::table)
                .values(&new_idea)
                .execute(conn)?;

            let id: i32 = diesel::select(diesel::dsl::sql::<diesel::sql_types::Integer>("last_insert_rowid()"))
                .first(conn)?;

            for blob in staged {
                let size_bytes = i64::try_from(blob.attachment.size)
                    .map_err(|_| DbError::InvalidInput(format!("attachment {} is too large", blob.attachment.name)))?;
                diesel::insert_into(idea_attachments::table)
                    .values(&NewAttachment {
                        idea_id: id,
                        name: &blob.attachment.name,
                        url: &blob.attachment.url,
                        mime_type: &blob.attachment.mime_type,
                        size_bytes,
                        storage_key: &blob.key,
                        created_at: &now,
                    })
                    .execute(conn)?;
            }

            Ok(id)
        })
    }

    /// Get one idea with its attachments
    pub fn get_idea(&self, idea_id: i32) -> Result<Idea> {
        let mut conn = self.get_conn()?;
        let row = ideas::table
            .find(idea_id)
            .first::<IdeaRow>(&mut conn)
            .optional()?
            .ok_or(DbError::IdeaNotFound(idea_id))?;
        let attachments = idea_attachments::table
            .filter(idea_attachments::idea_id.eq(idea_id))
            .order(idea_attachments::id.asc())
            .load::<AttachmentRow>(&mut conn)?;
        Ok(row.into_idea(attachments)?)
    }

    /// All ideas, newest first; malformed rows are reported, not returned
    pub fn feed(&self) -> Result<FeedSnapshot> {
        let mut conn = self.get_conn()?;
        conn.transaction::<_, DbError, _>(|conn| {
            let rows = ideas::table
                .order(ideas::id.desc())
                .load::<IdeaRow>(conn)?;

            let mut attachments: HashMap<i32, Vec<AttachmentRow>> = HashMap::new();
            for row in idea_attachments::table
                .order(idea_attachments::id.asc())
                .load::<AttachmentRow>(conn)?
            {
                attachments.entry(row.idea_id).or_default().push(row);
            }

            let mut ideas = Vec::with_capacity(rows.len());
            let mut rejected = Vec::new();
            for row in rows {
                let owned = attachments.remove(&row.id).unwrap_or_default();
                match row.into_idea(owned) {
                    Ok(idea) => ideas.push(idea),
                    Err(malformed) => {
                        warn!("{}", malformed);
                        rejected.push(malformed);
                    }
                }
            }

            Ok(FeedSnapshot {
                ideas,
                rejected,
                fingerprint: load_fingerprint(conn)?,
            })
        })
    }

    /// Cheap summary that changes whenever the feed would change
    pub fn fingerprint(&self) -> Result<FeedFingerprint> {
        let mut conn = self.get_conn()?;
        load_fingerprint(&mut conn)
    }

    /// Move an idea to any status; `notes` replaces the review notes when given
    pub fn update_status(&self, idea_id: i32, status: Status, notes: Option<&str>) -> Result<Idea> {
        let mut conn = self.get_conn()?;
        let now = now();
        let target = ideas::table.find(idea_id);

        let updated = match notes {
            Some(notes) => diesel::update(target)
                .set((
                    ideas::status.eq(status.as_str()),
                    ideas::review_notes.eq(notes),
                    ideas::updated_at.eq(&now),
                    ideas::revision.eq(ideas::revision + 1),
                ))
                .execute(&mut conn)?,
            None => diesel::update(target)
                .set((
                    ideas::status.eq(status.as_str()),
                    ideas::updated_at.eq(&now),
                    ideas::revision.eq(ideas::revision + 1),
                ))
                .execute(&mut conn)?,
        };
        drop(conn);

        if updated == 0 {
            return Err(DbError::IdeaNotFound(idea_id));
        }
        info!(idea_id, status = %status, "status changed");
        self.get_idea(idea_id)
    }

    // ========================================================================
    // Vote Operations
    // ========================================================================

    /// Apply one voter's cast to an idea's score and vote record atomically
    pub fn cast_vote(&self, idea_id: i32, voter_id: &str, direction: Direction) -> Result<VoteReceipt> {
        if voter_id.trim().is_empty() {
            return Err(DbError::InvalidInput("voter id is required".to_string()));
        }

        let mut attempt = 0;
        loop {
            let mut conn = self.get_conn()?;
            let result = conn.immediate_transaction::<_, DbError, _>(|conn| {
                apply_vote(conn, idea_id, voter_id, direction)
            });

            match result {
                Err(err) if is_busy(&err) => {
                    attempt += 1;
                    if attempt > self.vote_retries {
                        return Err(DbError::Conflict {
                            idea_id,
                            attempts: attempt,
                        });
                    }
                    warn!(idea_id, attempt, "vote transaction busy, retrying");
                    drop(conn);
                    std::thread::sleep(Duration::from_millis(5 * u64::from(attempt)));
                }
                Ok(receipt) => {
                    debug!(
                        idea_id,
                        voter = %voter_id,
                        delta = receipt.delta,
                        score = receipt.score,
                        "vote committed"
                    );
                    return Ok(receipt);
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Score and own vote for one voter, read together
    pub fn vote_state(&self, idea_id: i32, voter_id: &str) -> Result<VoteState> {
        let mut conn = self.get_conn()?;
        conn.transaction::<_, DbError, _>(|conn| {
            let score = load_score(conn, idea_id)?;
            let own_vote = load_direction(conn, idea_id, voter_id)?;
            Ok(VoteState { score, own_vote })
        })
    }

    /// A voter's vote on an idea, if any
    pub fn get_vote(&self, idea_id: i32, voter_id: &str) -> Result<Option<Vote>> {
        let mut conn = self.get_conn()?;
        let row = votes::table
            .find((idea_id, voter_id))
            .first::<VoteRow>(&mut conn)
            .optional()?;
        Ok(row.map(Vote::try_from).transpose()?)
    }

    /// Every vote on an idea
    pub fn votes_for(&self, idea_id: i32) -> Result<Vec<Vote>> {
        let mut conn = self.get_conn()?;
        let rows = votes::table
            .filter(votes::idea_id.eq(idea_id))
            .order(votes::created_at.asc())
            .load::<VoteRow>(&mut conn)?;
        Ok(rows
            .into_iter()
            .map(Vote::try_from)
            .collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Directions of all of one voter's votes, keyed by idea
    pub fn voter_directions(&self, voter_id: &str) -> Result<HashMap<i32, Direction>> {
        let mut conn = self.get_conn()?;
        let rows = votes::table
            .filter(votes::voter_id.eq(voter_id))
            .load::<VoteRow>(&mut conn)?;
        let mut directions = HashMap::with_capacity(rows.len());
        for row in rows {
            let vote = Vote::try_from(row)?;
            directions.insert(vote.idea_id, vote.direction);
        }
        Ok(directions)
    }

    /// Compare an idea's stored score to the sum of its votes
    pub fn verify_score(&self, idea_id: i32) -> Result<ScoreCheck> {
        let mut conn = self.get_conn()?;
        conn.transaction::<_, DbError, _>(|conn| score_check(conn, idea_id))
    }

    /// Score checks for every idea
    pub fn check_scores(&self) -> Result<Vec<ScoreCheck>> {
        let mut conn = self.get_conn()?;
        conn.transaction::<_, DbError, _>(|conn| {
            let ids: Vec<i32> = ideas::table
                .select(ideas::id)
                .order(ideas::id.asc())
                .load(conn)?;
            ids.into_iter().map(|id| score_check(conn, id)).collect()
        })
    }

    // ========================================================================
    // Attachment Bookkeeping
    // ========================================================================

    /// Storage keys referenced by any idea
    pub fn attachment_keys(&self) -> Result<HashSet<String>> {
        let mut conn = self.get_conn()?;
        let keys: Vec<String> = idea_attachments::table
            .select(idea_attachments::storage_key)
            .load(&mut conn)?;
        Ok(keys.into_iter().collect())
    }

    /// MIME type recorded for a storage key
    pub fn attachment_mime(&self, storage_key: &str) -> Result<Option<String>> {
        let mut conn = self.get_conn()?;
        Ok(idea_attachments::table
            .filter(idea_attachments::storage_key.eq(storage_key))
            .select(idea_attachments::mime_type)
            .first::<String>(&mut conn)
            .optional()?)
    }
}

// ============================================================================
// Transaction Bodies
// ============================================================================

fn load_score(conn: &mut SqliteConnection, idea_id: i32) -> Result<i32> {
    ideas::table
        .find(idea_id)
        .select(ideas::score)
        .first::<i32>(conn)
        .optional()?
        .ok_or(DbError::IdeaNotFound(idea_id))
}

fn load_direction(conn: &mut SqliteConnection, idea_id: i32, voter_id: &str) -> Result<Option<Direction>> {
    let row = votes::table
        .find((idea_id, voter_id))
        .first::<VoteRow>(conn)
        .optional()?;
    Ok(row.map(|r| Vote::try_from(r).map(|v| v.direction)).transpose()?)
}

fn apply_vote(
    conn: &mut SqliteConnection,
    idea_id: i32,
    voter_id: &str,
    direction: Direction,
) -> Result<VoteReceipt> {
    let score = load_score(conn, idea_id)?;
    let previous = load_direction(conn, idea_id, voter_id)?;
    let outcome = voting::resolve(previous, direction);
    let now = now();

    match outcome.action {
        VoteAction::Create(direction) => {
            diesel::insert_into(votes::table)
                .values(&NewVote {
                    idea_id,
                    voter_id,
                    direction: direction.as_str(),
                    created_at: &now,
                    updated_at: &now,
                })
                .execute(conn)?;
        }
        VoteAction::Overwrite(direction) => {
            diesel::update(votes::table.find((idea_id, voter_id)))
                .set((
                    votes::direction.eq(direction.as_str()),
                    votes::updated_at.eq(&now),
                ))
                .execute(conn)?;
        }
        VoteAction::Delete => {
            diesel::delete(votes::table.find((idea_id, voter_id))).execute(conn)?;
        }
    }

    let score = score + outcome.delta;
    diesel::update(ideas::table.find(idea_id))
        .set((
            ideas::score.eq(score),
            ideas::revision.eq(ideas::revision + 1),
        ))
        .execute(conn)?;

    Ok(VoteReceipt {
        idea_id,
        voter_id: voter_id.to_string(),
        previous,
        current: outcome.current,
        delta: outcome.delta,
        score,
    })
}

fn score_check(conn: &mut SqliteConnection, idea_id: i32) -> Result<ScoreCheck> {
    let stored = load_score(conn, idea_id)?;
    let rows = votes::table
        .filter(votes::idea_id.eq(idea_id))
        .load::<VoteRow>(conn)?;
    let mut recomputed = 0;
    for row in rows {
        recomputed += Vote::try_from(row)?.direction.sign();
    }
    Ok(ScoreCheck {
        idea_id,
        stored,
        recomputed,
    })
}

fn load_fingerprint(conn: &mut SqliteConnection) -> Result<FeedFingerprint> {
    let ideas: i64 = ideas::table.count().get_result(conn)?;
    let latest_id: Option<i32> = ideas::table
        .select(diesel::dsl::max(ideas::id))
        .first(conn)?;
    // Revisions only grow, so any vote or status change moves the sum
    let revisions: Option<i64> = ideas::table
        .select(diesel::dsl::sum(ideas::revision))
        .first(conn)?;
    let votes: i64 = votes::table.count().get_result(conn)?;

    Ok(FeedFingerprint {
        ideas,
        latest_id,
        revisions: revisions.unwrap_or(0),
        votes,
    })
}
