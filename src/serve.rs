//! HTTP API for the idea board
//!
//! `intake serve` → JSON API plus attachment downloads. Identity comes from
//! headers set by the upstream identity-aware proxy; every route requires a
//! session accepted by the access policy.

use crate::access::{AccessError, AccessPolicy, Identity, Session};
use crate::analytics::Summary;
use crate::attachments::{guess_mime, ContentStore, StorageError, Upload};
use crate::board::Board;
use crate::config::ServerConfig;
use crate::db::{Database, DbError};
use crate::model::{Direction, Idea, IdeaDraft, Status};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::sync::Arc;
use thiserror::Error;
use tiny_http::{Header, Method, Request, Response, Server};
use tracing::{error, info, warn};

/// Request bodies larger than this are refused
const MAX_BODY_BYTES: u64 = 64 * 1024 * 1024;

#[derive(Serialize)]
struct ApiResponse<T> {
    ok: bool,
    data: Option<T>,
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn failure(message: String) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message),
        }
    }
}

/// Everything a request handler needs
pub struct AppState {
    pub db: Database,
    pub store: ContentStore,
    pub policy: AccessPolicy,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("not found")]
    NotFound,
}

impl ApiError {
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::Access(AccessError::MissingIdentity) => 401,
            ApiError::Access(_) => 403,
            ApiError::NotFound => 404,
            ApiError::Db(DbError::Validation(_)) | ApiError::Db(DbError::InvalidInput(_)) => 400,
            ApiError::Db(DbError::IdeaNotFound(_)) => 404,
            ApiError::Db(DbError::Conflict { .. }) => 409,
            ApiError::Db(DbError::Storage(e)) | ApiError::Storage(e) => storage_status(e),
            ApiError::Db(_) => 500,
        }
    }

    /// Message safe to return to the caller
    fn public_message(&self) -> String {
        if self.status_code() == 500 {
            "internal error".to_string()
        } else {
            self.to_string()
        }
    }
}

fn storage_status(err: &StorageError) -> u16 {
    match err {
        StorageError::TooLarge { .. } => 413,
        StorageError::InvalidKey(_) => 400,
        StorageError::NotFound(_) => 404,
        StorageError::Io { .. } => 500,
    }
}

/// A rendered response, independent of the transport
#[derive(Debug)]
pub struct Reply {
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
}

impl Reply {
    fn json<T: Serialize>(data: T) -> Result<Self, ApiError> {
        let body = serde_json::to_vec(&ApiResponse::success(data))
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        Ok(Self {
            status: 200,
            content_type: "application/json".to_string(),
            body,
        })
    }

    fn error(err: &ApiError) -> Self {
        let body = serde_json::to_vec(&ApiResponse::failure(err.public_message())).unwrap_or_default();
        Self {
            status: err.status_code(),
            content_type: "application/json".to_string(),
            body,
        }
    }
}

/// Idea plus the caller's own vote on it
#[derive(Debug, Serialize)]
pub struct IdeaView {
    #[serde(flatten)]
    pub idea: Idea,
    pub own_vote: Option<Direction>,
}

#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    status: Option<String>,
    category: Option<String>,
    department: Option<String>,
    /// "newest" (default) or "score"
    sort: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadBody {
    name: String,
    content_base64: String,
    #[serde(default, rename = "type")]
    mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubmitBody {
    #[serde(flatten)]
    draft: IdeaDraft,
    #[serde(default)]
    attachments: Vec<UploadBody>,
}

#[derive(Debug, Deserialize)]
struct VoteBody {
    direction: Direction,
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    status: String,
    #[serde(default)]
    review_notes: Option<String>,
}

/// Start the API server with `workers` request threads
pub fn start_server(state: AppState, config: &ServerConfig) -> std::io::Result<()> {
    let addr = format!("127.0.0.1:{}", config.port);
    let server = Server::http(&addr)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    let server = Arc::new(server);
    let state = Arc::new(state);

    info!(%addr, workers = config.workers, "intake API listening");

    let mut handles = Vec::new();
    for _ in 0..config.workers.max(1) {
        let server = Arc::clone(&server);
        let state = Arc::clone(&state);
        handles.push(std::thread::spawn(move || loop {
            match server.recv() {
                Ok(request) => {
                    if let Err(e) = handle_request(&state, request) {
                        warn!(error = %e, "failed to send response");
                    }
                }
                Err(e) => {
                    error!(error = %e, "server stopped accepting requests");
                    break;
                }
            }
        }));
    }

    for handle in handles {
        let _ = handle.join();
    }
    Ok(())
}

fn header_value(request: &Request, name: &'static str) -> Option<String> {
    request
        .headers()
        .iter()
        .find(|h| h.field.equiv(name))
        .map(|h| h.value.as_str().trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Identity asserted by the proxy headers, if any
fn request_identity(request: &Request) -> Option<Identity> {
    let email = header_value(request, "X-Auth-Email")?;
    Some(Identity {
        uid: header_value(request, "X-Auth-Uid").unwrap_or_else(|| email.clone()),
        email,
        display_name: header_value(request, "X-Auth-Name"),
        photo_url: header_value(request, "X-Auth-Photo"),
    })
}

fn handle_request(state: &AppState, mut request: Request) -> std::io::Result<()> {
    let method = request.method().clone();
    let url = request.url().to_string();
    let identity = request_identity(&request);

    let mut body = Vec::new();
    let read = request
        .as_reader()
        .take(MAX_BODY_BYTES)
        .read_to_end(&mut body);

    let reply = match read {
        Ok(_) => match route(state, &method, &url, identity, &body) {
            Ok(reply) => reply,
            Err(err) => {
                if err.status_code() == 500 {
                    error!(%method, %url, error = %err, "request failed");
                } else {
                    warn!(%method, %url, status = err.status_code(), error = %err, "request rejected");
                }
                Reply::error(&err)
            }
        },
        Err(e) => Reply::error(&ApiError::BadRequest(format!("Failed to read body: {}", e))),
    };

    let mut response = Response::from_data(reply.body).with_status_code(reply.status);
    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], reply.content_type.as_bytes()) {
        response.add_header(header);
    }
    request.respond(response)
}

/// Dispatch one request
pub fn route(
    state: &AppState,
    method: &Method,
    url: &str,
    identity: Option<Identity>,
    body: &[u8],
) -> Result<Reply, ApiError> {
    let (path, query) = match url.split_once('?') {
        Some((path, query)) => (path, query),
        None => (url, ""),
    };

    let session = state
        .policy
        .sign_in(identity.ok_or(AccessError::MissingIdentity)?)?;

    if let Some(key) = path.strip_prefix("/files/") {
        return match method {
            Method::Get => serve_file(state, key),
            _ => Err(ApiError::NotFound),
        };
    }

    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    match (method, segments.as_slice()) {
        (Method::Get, ["api", "me"]) => Reply::json(&session),
        (Method::Get, ["api", "ideas"]) => list_ideas(state, &session, query),
        (Method::Post, ["api", "ideas"]) => submit_idea(state, &session, body),
        (Method::Get, ["api", "ideas", id]) => {
            let idea_id = parse_id(id)?;
            let idea = state.db.get_idea(idea_id)?;
            let own_vote = state.db.get_vote(idea_id, &session.identity.uid)?.map(|v| v.direction);
            Reply::json(IdeaView { idea, own_vote })
        }
        (Method::Post, ["api", "ideas", id, "vote"]) => {
            let idea_id = parse_id(id)?;
            let vote: VoteBody = parse_body(body)?;
            let receipt = state.db.cast_vote(idea_id, &session.identity.uid, vote.direction)?;
            Reply::json(receipt)
        }
        (Method::Post, ["api", "ideas", id, "status"]) => {
            session.require_admin()?;
            let idea_id = parse_id(id)?;
            let change: StatusBody = parse_body(body)?;
            let status: Status = change
                .status
                .parse()
                .map_err(|e: crate::model::ParseLabelError| ApiError::BadRequest(e.to_string()))?;
            let idea = state
                .db
                .update_status(idea_id, status, change.review_notes.as_deref())?;
            Reply::json(idea)
        }
        (Method::Get, ["api", "board"]) => {
            let feed = state.db.feed()?;
            Reply::json(Board::from_ideas(feed.ideas))
        }
        (Method::Get, ["api", "analytics"]) => {
            let feed = state.db.feed()?;
            Reply::json(Summary::compute(&feed.ideas))
        }
        _ => Err(ApiError::NotFound),
    }
}

fn parse_id(raw: &str) -> Result<i32, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid idea id '{}'", raw)))
}

fn parse_body<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("Invalid JSON: {}", e)))
}

fn list_ideas(state: &AppState, session: &Session, query: &str) -> Result<Reply, ApiError> {
    let query: ListQuery = serde_urlencoded::from_str(query)
        .map_err(|e| ApiError::BadRequest(format!("invalid query: {}", e)))?;
    let status: Option<Status> = query
        .status
        .as_deref()
        .map(str::parse)
        .transpose()
        .map_err(|e: crate::model::ParseLabelError| ApiError::BadRequest(e.to_string()))?;

    let feed = state.db.feed()?;
    let own_votes = state.db.voter_directions(&session.identity.uid)?;

    let mut ideas: Vec<Idea> = feed
        .ideas
        .into_iter()
        .filter(|i| status.map_or(true, |s| i.status == s))
        .filter(|i| query.category.as_deref().map_or(true, |c| i.category == c))
        .filter(|i| query.department.as_deref().map_or(true, |d| i.department == d))
        .collect();

    match query.sort.as_deref() {
        None | Some("newest") => {}
        Some("score") => ideas.sort_by(|a, b| b.score.cmp(&a.score)),
        Some(other) => return Err(ApiError::BadRequest(format!("unknown sort '{}'", other))),
    }

    let views: Vec<IdeaView> = ideas
        .into_iter()
        .map(|idea| IdeaView {
            own_vote: own_votes.get(&idea.id).copied(),
            idea,
        })
        .collect();
    Reply::json(views)
}

fn submit_idea(state: &AppState, session: &Session, body: &[u8]) -> Result<Reply, ApiError> {
    let submission: SubmitBody = parse_body(body)?;
    let uploads = submission
        .attachments
        .into_iter()
        .map(|a| {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(a.content_base64.as_bytes())
                .map_err(|e| ApiError::BadRequest(format!("attachment '{}': {}", a.name, e)))?;
            Ok(Upload {
                file_name: a.name,
                bytes,
                mime_type: a.mime_type,
            })
        })
        .collect::<Result<Vec<_>, ApiError>>()?;

    let idea = state
        .db
        .submit_idea(&submission.draft, &session.author(), &state.store, &uploads)?;
    Reply::json(idea)
}

fn serve_file(state: &AppState, key: &str) -> Result<Reply, ApiError> {
    let body = state.store.read(key)?;
    let content_type = match state.db.attachment_mime(key)? {
        Some(mime) => mime,
        None => guess_mime(key).to_string(),
    };
    Ok(Reply {
        status: 200,
        content_type,
        body,
    })
}
