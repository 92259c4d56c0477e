//! Tenancy scopes and collection naming.
//!
//! Every piece of indexed content belongs to exactly one [`Scope`]: the
//! shared `common` scope or a per-user scope. A scope maps to exactly one
//! collection name, used both as the vector store file stem and the
//! file-store subdirectory.

use sha2::{Digest, Sha256};

use crate::error::{RagError, Result};

/// Ownership scope for documents, chunks, and collections.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Shared corpus visible to every tenant.
    Common,
    /// Private corpus for a single user, keyed by an opaque user id
    /// (typically an email address).
    User(String),
}

impl Scope {
    /// Parse a CLI/API scope specifier: `common` or `user:<id>`.
    pub fn parse(s: &str) -> Result<Scope> {
        if s == "common" {
            return Ok(Scope::Common);
        }
        if let Some(id) = s.strip_prefix("user:") {
            if id.is_empty() {
                return Err(RagError::InvalidUpload(
                    "user scope requires an id: user:<id>".to_string(),
                ));
            }
            return Ok(Scope::User(id.to_string()));
        }
        Err(RagError::InvalidUpload(format!(
            "invalid scope '{}': expected 'common' or 'user:<id>'",
            s
        )))
    }

    pub fn is_common(&self) -> bool {
        matches!(self, Scope::Common)
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Scope::Common => None,
            Scope::User(id) => Some(id),
        }
    }

    /// Stable, filesystem-safe collection name for this scope.
    ///
    /// User ids are sanitized character-by-character; when sanitization
    /// loses information (two distinct ids could collapse to the same
    /// string), a short content hash of the raw id is appended so distinct
    /// ids never share a collection.
    pub fn collection_name(&self) -> String {
        match self {
            Scope::Common => "common".to_string(),
            Scope::User(id) => format!("user_{}", sanitize_id(id)),
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::Common => write!(f, "common"),
            Scope::User(id) => write!(f, "user:{}", id),
        }
    }
}

fn sanitize_id(id: &str) -> String {
    let sanitized: String = id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized == id {
        return sanitized;
    }

    let mut hasher = Sha256::new();
    hasher.update(id.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("{}_{}", sanitized, &digest[..8])
}
