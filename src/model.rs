//! Typed data model for ideas, votes and submission drafts
//!
//! Everything read back from storage is converted into these types through
//! the checks in [`crate::records`]; nothing downstream works on raw rows.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default category catalog offered by the submission form
pub const CATEGORIES: &[&str] = &[
    "Process & Policy Improvement",
    "Productivity & Collaboration",
    "Data Quality & Reporting",
    "Customer Experience",
    "Cost Optimization",
    "Risk, Compliance & Controls",
    "AI Adoption Opportunities",
    "Automation Candidates",
    "Knowledge Management",
    "Internal Tools",
    "Infrastructure & DevOps",
];

/// Default department catalog offered by the submission form
pub const DEPARTMENTS: &[&str] = &[
    "Customer Support & CX Ops",
    "Logistics & Fleet Operations",
    "Warehouse & Fulfillment",
    "Commercial / Sales",
    "Marketing & Growth",
    "Product / UX",
    "Finance & Accounting",
    "Procurement",
    "HR & People Operations",
    "Legal",
    "IT & Security",
    "Corporate Services",
];

pub const TITLE_MIN_CHARS: usize = 5;
pub const TITLE_MAX_CHARS: usize = 100;
pub const DESCRIPTION_MIN_CHARS: usize = 20;

/// A label that did not match any variant of a closed set
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseLabelError {
    pub kind: &'static str,
    pub value: String,
}

/// Case, space and punctuation insensitive form used for label matching,
/// so "In Progress", "in-progress" and "in_progress" all agree.
fn normalize_label(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

macro_rules! labelled_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $label)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Stored and displayed label
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseLabelError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = normalize_label(s);
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| normalize_label(v.as_str()) == wanted)
                    .ok_or_else(|| ParseLabelError {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }
    };
}

labelled_enum! {
    /// Review stage of an idea; one kanban column per variant.
    ///
    /// Any status may move to any other status.
    Status, "status" {
        Submitted => "Submitted",
        InProgress => "In Progress",
        Approved => "Approved",
        Rejected => "Rejected",
        Done => "Done",
    }
}

labelled_enum! {
    /// Direction of a single vote
    Direction, "vote direction" {
        Up => "up",
        Down => "down",
    }
}

labelled_enum! {
    ImpactType, "impact type" {
        Time => "Time",
        Cost => "Cost",
        Quality => "Quality",
        Risk => "Risk",
        Revenue => "Revenue",
        Cx => "CX",
        Other => "Other",
    }
}

labelled_enum! {
    /// How well the proposal lends itself to automation or AI support
    AutomationFit, "automation fit" {
        Automation => "Automation",
        AiAssist => "AI Assist",
        AiAgent => "AI Agent",
        Unsure => "Unsure",
    }
}

labelled_enum! {
    ProcessFrequency, "process frequency" {
        Hourly => "Hourly",
        Daily => "Daily",
        Weekly => "Weekly",
        Monthly => "Monthly",
        AdHoc => "Ad-hoc",
    }
}

impl Direction {
    /// +1 for up, -1 for down
    pub fn sign(self) -> i32 {
        match self {
            Direction::Up => 1,
            Direction::Down => -1,
        }
    }
}

/// Who submitted an idea
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub photo: Option<String>,
}

/// Reference to an uploaded blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub url: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub size: u64,
}

/// A submitted process-improvement proposal
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Idea {
    pub id: i32,
    pub title: String,
    pub problem: String,
    pub desired_outcome: String,
    pub category: String,
    pub department: String,
    pub impact_type: Option<ImpactType>,
    pub automation_fit: Option<AutomationFit>,
    pub status: Status,
    pub score: i32,
    pub author: Author,
    pub attachments: Vec<Attachment>,
    pub process_frequency: Option<ProcessFrequency>,
    pub time_spent_hours_per_week: Option<f64>,
    pub estimated_benefit: Option<String>,
    pub review_notes: Option<String>,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
}

/// One voter's opinion on one idea
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Vote {
    pub idea_id: i32,
    pub voter_id: String,
    pub direction: Direction,
    pub created_at: DateTime<FixedOffset>,
}

/// Form data for a new idea, before validation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdeaDraft {
    pub title: String,
    pub problem: String,
    pub desired_outcome: String,
    pub category: String,
    pub department: String,
    #[serde(default)]
    pub impact_type: Option<ImpactType>,
    #[serde(default)]
    pub automation_fit: Option<AutomationFit>,
    #[serde(default)]
    pub estimated_benefit: Option<String>,
    #[serde(default)]
    pub process_frequency: Option<ProcessFrequency>,
    #[serde(default)]
    pub time_spent_hours_per_week: Option<f64>,
}

/// A single rejected form field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// All problems found in a draft, reported together
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid submission: {}", summarize(.errors))]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationErrors {
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }
}

impl IdeaDraft {
    /// Check the draft against the submission rules
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = Vec::new();
        let mut reject = |field: &'static str, message: &str| {
            errors.push(FieldError {
                field,
                message: message.to_string(),
            })
        };

        let title_len = self.title.trim().chars().count();
        if title_len < TITLE_MIN_CHARS {
            reject("title", "Title must be at least 5 characters");
        } else if title_len > TITLE_MAX_CHARS {
            reject("title", "Title is too long");
        }
        if self.problem.trim().chars().count() < DESCRIPTION_MIN_CHARS {
            reject(
                "problem",
                "Please describe the problem in more detail (min 20 chars)",
            );
        }
        if self.desired_outcome.trim().chars().count() < DESCRIPTION_MIN_CHARS {
            reject(
                "desired_outcome",
                "Please describe the desired outcome (min 20 chars)",
            );
        }
        if self.category.trim().is_empty() {
            reject("category", "Please select a category");
        }
        if self.department.trim().is_empty() {
            reject("department", "Please select a department");
        }
        if let Some(hours) = self.time_spent_hours_per_week {
            if !hours.is_finite() || hours < 0.0 {
                reject(
                    "time_spent_hours_per_week",
                    "Time spent must be zero or more hours",
                );
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors { errors })
        }
    }
}
