//! Row types and the validation boundary between SQLite and the model
//!
//! Rows come out of diesel as plain strings and numbers. Every row is
//! converted into a [`crate::model`] type here, and rows that do not fit the
//! model are reported as [`MalformedRecord`] instead of being trusted.

use crate::model::{Attachment, Author, Idea, ParseLabelError, Vote};
use crate::schema::*;
use chrono::{DateTime, FixedOffset};
use diesel::prelude::*;
use serde::Serialize;
use std::str::FromStr;
use thiserror::Error;

/// A stored record that failed validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("malformed {table} record {id}: field '{field}' {reason}")]
pub struct MalformedRecord {
    pub table: &'static str,
    pub id: String,
    pub field: &'static str,
    pub reason: String,
}

// ============================================================================
// Diesel Models
// ============================================================================

/// Insertable idea
#[derive(Insertable)]
#[diesel(table_name = ideas)]
pub struct NewIdea<'a> {
    pub title: &'a str,
    pub problem: &'a str,
    pub desired_outcome: &'a str,
    pub category: &'a str,
    pub department: &'a str,
    pub impact_type: Option<&'a str>,
    pub automation_fit: Option<&'a str>,
    pub status: &'a str,
    pub score: i32,
    pub author_id: &'a str,
    pub author_name: &'a str,
    pub author_email: Option<&'a str>,
    pub author_photo: Option<&'a str>,
    pub process_frequency: Option<&'a str>,
    pub time_spent_hours_per_week: Option<f64>,
    pub estimated_benefit: Option<&'a str>,
    pub review_notes: Option<&'a str>,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

/// Queryable idea, fields in table order
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = ideas)]
pub struct IdeaRow {
    pub id: i32,
    pub title: String,
    pub problem: String,
    pub desired_outcome: String,
    pub category: String,
    pub department: String,
    pub impact_type: Option<String>,
    pub automation_fit: Option<String>,
    pub status: String,
    pub score: i32,
    pub author_id: String,
    pub author_name: String,
    pub author_email: Option<String>,
    pub author_photo: Option<String>,
    pub process_frequency: Option<String>,
    pub time_spent_hours_per_week: Option<f64>,
    pub estimated_benefit: Option<String>,
    pub review_notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    /// Bumped by every vote and status change
    pub revision: i32,
}

/// Insertable attachment reference
#[derive(Insertable)]
#[diesel(table_name = idea_attachments)]
pub struct NewAttachment<'a> {
    pub idea_id: i32,
    pub name: &'a str,
    pub url: &'a str,
    pub mime_type: &'a str,
    pub size_bytes: i64,
    pub storage_key: &'a str,
    pub created_at: &'a str,
}

/// Queryable attachment reference
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = idea_attachments)]
pub struct AttachmentRow {
    pub id: i32,
    pub idea_id: i32,
    pub name: String,
    pub url: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub storage_key: String,
    pub created_at: String,
}

/// Insertable vote
#[derive(Insertable)]
#[diesel(table_name = votes)]
pub struct NewVote<'a> {
    pub idea_id: i32,
    pub voter_id: &'a str,
    pub direction: &'a str,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

/// Queryable vote
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = votes)]
pub struct VoteRow {
    pub idea_id: i32,
    pub voter_id: String,
    pub direction: String,
    pub created_at: String,
    pub updated_at: String,
}

// ============================================================================
// Conversions
// ============================================================================

struct Checker {
    table: &'static str,
    id: String,
}

impl Checker {
    fn new(table: &'static str, id: impl ToString) -> Self {
        Self {
            table,
            id: id.to_string(),
        }
    }

    fn reject(&self, field: &'static str, reason: impl Into<String>) -> MalformedRecord {
        MalformedRecord {
            table: self.table,
            id: self.id.clone(),
            field,
            reason: reason.into(),
        }
    }

    fn label<T>(&self, field: &'static str, raw: &str) -> Result<T, MalformedRecord>
    where
        T: FromStr<Err = ParseLabelError>,
    {
        raw.parse::<T>()
            .map_err(|e| self.reject(field, e.to_string()))
    }

    /// Blank optional labels read as absent
    fn optional_label<T>(&self, field: &'static str, raw: Option<&str>) -> Result<Option<T>, MalformedRecord>
    where
        T: FromStr<Err = ParseLabelError>,
    {
        match raw.map(str::trim) {
            None | Some("") => Ok(None),
            Some(value) => self.label(field, value).map(Some),
        }
    }

    fn timestamp(&self, field: &'static str, raw: &str) -> Result<DateTime<FixedOffset>, MalformedRecord> {
        DateTime::parse_from_rfc3339(raw)
            .map_err(|e| self.reject(field, format!("is not an RFC 3339 timestamp ({})", e)))
    }

    fn non_empty(&self, field: &'static str, raw: &str) -> Result<(), MalformedRecord> {
        if raw.trim().is_empty() {
            Err(self.reject(field, "is empty"))
        } else {
            Ok(())
        }
    }
}

impl TryFrom<AttachmentRow> for Attachment {
    type Error = MalformedRecord;

    fn try_from(row: AttachmentRow) -> Result<Self, Self::Error> {
        let check = Checker::new("idea_attachments", row.id);
        check.non_empty("name", &row.name)?;
        check.non_empty("url", &row.url)?;
        let size = u64::try_from(row.size_bytes)
            .map_err(|_| check.reject("size_bytes", format!("is negative ({})", row.size_bytes)))?;

        Ok(Attachment {
            name: row.name,
            url: row.url,
            mime_type: row.mime_type,
            size,
        })
    }
}

impl TryFrom<VoteRow> for Vote {
    type Error = MalformedRecord;

    fn try_from(row: VoteRow) -> Result<Self, Self::Error> {
        let check = Checker::new("votes", format!("{}_{}", row.idea_id, row.voter_id));
        check.non_empty("voter_id", &row.voter_id)?;

        Ok(Vote {
            idea_id: row.idea_id,
            direction: check.label("direction", &row.direction)?,
            created_at: check.timestamp("created_at", &row.created_at)?,
            voter_id: row.voter_id,
        })
    }
}

impl IdeaRow {
    /// Validate the row and its attachment rows into an [`Idea`]
    pub fn into_idea(self, attachments: Vec<AttachmentRow>) -> Result<Idea, MalformedRecord> {
        let check = Checker::new("ideas", self.id);
        check.non_empty("title", &self.title)?;
        check.non_empty("author_id", &self.author_id)?;
        if let Some(hours) = self.time_spent_hours_per_week {
            if !hours.is_finite() || hours < 0.0 {
                return Err(check.reject("time_spent_hours_per_week", format!("is out of range ({})", hours)));
            }
        }

        let attachments = attachments
            .into_iter()
            .map(Attachment::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Idea {
            id: self.id,
            status: check.label("status", &self.status)?,
            impact_type: check.optional_label("impact_type", self.impact_type.as_deref())?,
            automation_fit: check.optional_label("automation_fit", self.automation_fit.as_deref())?,
            process_frequency: check.optional_label("process_frequency", self.process_frequency.as_deref())?,
            created_at: check.timestamp("created_at", &self.created_at)?,
            updated_at: check.timestamp("updated_at", &self.updated_at)?,
            title: self.title,
            problem: self.problem,
            desired_outcome: self.desired_outcome,
            category: self.category,
            department: self.department,
            score: self.score,
            author: Author {
                id: self.author_id,
                name: self.author_name,
                email: self.author_email,
                photo: self.author_photo,
            },
            attachments,
            time_spent_hours_per_week: self.time_spent_hours_per_week,
            estimated_benefit: self.estimated_benefit.filter(|s| !s.trim().is_empty()),
            review_notes: self.review_notes.filter(|s| !s.trim().is_empty()),
        })
    }
}
