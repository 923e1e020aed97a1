//! Entity reference type representing an optionally-qualified domain.object_id pair

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for malformed entity references
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EntityRefError {
    #[error("entity reference must contain at most one '.' separator")]
    InvalidFormat,

    #[error("domain cannot be empty")]
    EmptyDomain,

    #[error("object_id cannot be empty")]
    EmptyObjectId,

    #[error("entity reference contains invalid characters (alphanumeric, underscore or '*' only)")]
    InvalidChars,
}

/// A reference to an entity as written in HGL source (e.g. "light.porch" or "porch")
///
/// Unlike a fully-resolved entity ID the domain is optional at parse time;
/// it is filled in later by domain defaulting. Either part may hold the
/// wildcard placeholder `*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityRef {
    domain: Option<String>,
    object_id: String,
}

impl EntityRef {
    /// Create a reference with no domain
    pub fn bare(object_id: impl Into<String>) -> Result<Self, EntityRefError> {
        let object_id = object_id.into();
        if object_id.is_empty() {
            return Err(EntityRefError::EmptyObjectId);
        }
        Self::check_part(&object_id)?;
        Ok(Self {
            domain: None,
            object_id,
        })
    }

    /// Get the domain part, if written
    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    /// Fill in `default_domain` when no domain was written; a no-op otherwise
    pub fn qualified(mut self, default_domain: &str) -> Self {
        if self.domain.is_none() {
            self.domain = Some(default_domain.to_string());
        }
        self
    }

    fn check_part(s: &str) -> Result<(), EntityRefError> {
        if s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '*')
        {
            Ok(())
        } else {
            Err(EntityRefError::InvalidChars)
        }
    }
}

impl FromStr for EntityRef {
    type Err = EntityRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        match parts.as_slice() {
            [object_id] => Self::bare(*object_id),
            [domain, object_id] => {
                if domain.is_empty() {
                    return Err(EntityRefError::EmptyDomain);
                }
                Self::check_part(domain)?;
                Self::bare(*object_id).map(|r| r.qualified(domain))
            }
            _ => Err(EntityRefError::InvalidFormat),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.domain {
            Some(domain) => write!(f, "{}.{}", domain, self.object_id),
            None => f.write_str(&self.object_id),
        }
    }
}
