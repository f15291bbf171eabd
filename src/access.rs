//! Sign-in policy and sessions
//!
//! Identities are asserted by an external identity provider. This module
//! only decides whether an asserted identity may use the board, and with
//! which role.

use crate::config::AccessConfig;
use crate::model::Author;
use chrono::{DateTime, Local};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

/// Message shown when a sign-in is refused for its email domain
pub const RESTRICTED_MESSAGE: &str = "Access restricted to company emails only.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("sign in required")]
    MissingIdentity,

    #[error("Access restricted to company emails only. ({email})")]
    DomainNotAllowed { email: String },

    #[error("{email} is not an administrator")]
    NotAdmin { email: String },
}

/// Identity asserted by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

impl Identity {
    /// Identity keyed by email, for callers without a separate uid
    pub fn from_email(email: &str) -> Self {
        Self {
            uid: email.to_string(),
            email: email.to_string(),
            display_name: None,
            photo_url: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Member,
    Admin,
}

/// An accepted sign-in
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: Uuid,
    pub identity: Identity,
    pub role: Role,
    pub started_at: DateTime<Local>,
}

impl Session {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> Result<(), AccessError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AccessError::NotAdmin {
                email: self.identity.email.clone(),
            })
        }
    }

    /// Author record for ideas submitted in this session
    pub fn author(&self) -> Author {
        let name = self
            .identity
            .display_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| local_part(&self.identity.email).to_string());
        Author {
            id: self.identity.uid.clone(),
            name,
            email: Some(self.identity.email.clone()),
            photo: self.identity.photo_url.clone(),
        }
    }
}

/// Domain allow-list plus designated administrators
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    allowed_domains: Vec<String>,
    admin_emails: Vec<String>,
}

impl AccessPolicy {
    pub fn new<D, A>(allowed_domains: D, admin_emails: A) -> Self
    where
        D: IntoIterator,
        D::Item: AsRef<str>,
        A: IntoIterator,
        A::Item: AsRef<str>,
    {
        Self {
            allowed_domains: allowed_domains
                .into_iter()
                .map(|d| d.as_ref().trim().trim_start_matches('@').to_ascii_lowercase())
                .collect(),
            admin_emails: admin_emails
                .into_iter()
                .map(|e| e.as_ref().trim().to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn from_config(config: &AccessConfig) -> Self {
        Self::new(&config.allowed_domains, &config.admin_emails)
    }

    /// Accept or refuse an identity; a refused identity gets no session
    pub fn sign_in(&self, identity: Identity) -> Result<Session, AccessError> {
        let email = identity.email.trim().to_ascii_lowercase();
        if email.is_empty() {
            return Err(AccessError::MissingIdentity);
        }
        let allowed = domain_of(&email)
            .map(|domain| self.allowed_domains.iter().any(|d| d == domain))
            .unwrap_or(false);
        if !allowed {
            warn!(email = %email, "sign-in refused for domain");
            return Err(AccessError::DomainNotAllowed { email });
        }

        let role = if self.admin_emails.iter().any(|a| *a == email) {
            Role::Admin
        } else {
            Role::Member
        };
        info!(email = %email, ?role, "signed in");

        Ok(Session {
            id: Uuid::new_v4(),
            identity: Identity {
                uid: if identity.uid.trim().is_empty() {
                    email.clone()
                } else {
                    identity.uid
                },
                email,
                display_name: identity.display_name,
                photo_url: identity.photo_url,
            },
            role,
            started_at: Local::now(),
        })
    }
}

fn domain_of(email: &str) -> Option<&str> {
    email
        .rsplit_once('@')
        .map(|(_, domain)| domain)
        .filter(|d| !d.is_empty())
}

fn local_part(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}
