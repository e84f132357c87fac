//! Key encoding and decoding for the storage layer.
//!
//! Key format: `{prefix}:{project}:{id}`
//! - prefix: identifies the record type (vec, tkt, theme, member)
//! - project: project key, never containing ':'
//! - id: ticket id or theme id
//!
//! Project keys cannot contain ':' so `{prefix}:{project}:` is an exact
//! prefix for one project's records.

use crate::error::StorageError;

fn encode(prefix: &str, project: &str, id: &str) -> Vec<u8> {
    format!("{prefix}:{project}:{id}").into_bytes()
}

fn project_prefix(prefix: &str, project: &str) -> Vec<u8> {
    format!("{prefix}:{project}:").into_bytes()
}

fn decode(prefix: &str, bytes: &[u8]) -> Result<(String, String), StorageError> {
    let s = std::str::from_utf8(bytes)
        .map_err(|e| StorageError::Key(format!("Invalid UTF-8: {}", e)))?;
    let rest = s
        .strip_prefix(prefix)
        .and_then(|r| r.strip_prefix(':'))
        .ok_or_else(|| StorageError::Key(format!("Expected {prefix} key, got {s}")))?;
    // Ids may contain ':' (theme ids do); the project may not.
    let (project, id) = rest
        .split_once(':')
        .ok_or_else(|| StorageError::Key(format!("Invalid {prefix} key format: {s}")))?;
    if project.is_empty() || id.is_empty() {
        return Err(StorageError::Key(format!("Invalid {prefix} key format: {s}")));
    }
    Ok((project.to_string(), id.to_string()))
}

/// Key for a ticket vector.
/// Format: vec:{project}:{ticket_id}
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorKey {
    pub project: String,
    pub ticket_id: String,
}

impl VectorKey {
    const PREFIX: &'static str = "vec";

    pub fn new(project: impl Into<String>, ticket_id: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            ticket_id: ticket_id.into(),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        encode(Self::PREFIX, &self.project, &self.ticket_id)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StorageError> {
        let (project, ticket_id) = decode(Self::PREFIX, bytes)?;
        Ok(Self { project, ticket_id })
    }

    /// Prefix covering every vector of a project
    pub fn project_prefix(project: &str) -> Vec<u8> {
        project_prefix(Self::PREFIX, project)
    }
}

/// Key for a ticket doc.
/// Format: tkt:{project}:{ticket_id}
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketKey {
    pub project: String,
    pub ticket_id: String,
}

impl TicketKey {
    const PREFIX: &'static str = "tkt";

    pub fn new(project: impl Into<String>, ticket_id: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            ticket_id: ticket_id.into(),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        encode(Self::PREFIX, &self.project, &self.ticket_id)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StorageError> {
        let (project, ticket_id) = decode(Self::PREFIX, bytes)?;
        Ok(Self { project, ticket_id })
    }

    pub fn project_prefix(project: &str) -> Vec<u8> {
        project_prefix(Self::PREFIX, project)
    }
}

/// Key for a theme record.
/// Format: theme:{project}:{theme_id}
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeKey {
    pub project: String,
    pub theme_id: String,
}

impl ThemeKey {
    const PREFIX: &'static str = "theme";

    pub fn new(project: impl Into<String>, theme_id: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            theme_id: theme_id.into(),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        encode(Self::PREFIX, &self.project, &self.theme_id)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StorageError> {
        let (project, theme_id) = decode(Self::PREFIX, bytes)?;
        Ok(Self { project, theme_id })
    }

    pub fn project_prefix(project: &str) -> Vec<u8> {
        project_prefix(Self::PREFIX, project)
    }
}

/// Key for a ticket's theme membership.
/// Format: member:{project}:{ticket_id}
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipKey {
    pub project: String,
    pub ticket_id: String,
}

impl MembershipKey {
    const PREFIX: &'static str = "member";

    pub fn new(project: impl Into<String>, ticket_id: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            ticket_id: ticket_id.into(),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        encode(Self::PREFIX, &self.project, &self.ticket_id)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StorageError> {
        let (project, ticket_id) = decode(Self::PREFIX, bytes)?;
        Ok(Self { project, ticket_id })
    }

    pub fn project_prefix(project: &str) -> Vec<u8> {
        project_prefix(Self::PREFIX, project)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_key_roundtrip() {
        let key = VectorKey::new("PAY", "PAY-12");
        let bytes = key.to_bytes();
        assert_eq!(bytes, b"vec:PAY:PAY-12");
        assert_eq!(VectorKey::from_bytes(&bytes).unwrap(), key);
    }

    #[test]
    fn test_theme_id_may_contain_separator() {
        let key = ThemeKey::new("PAY", "thm:PAY-1");
        let decoded = ThemeKey::from_bytes(&key.to_bytes()).unwrap();
        assert_eq!(decoded.project, "PAY");
        assert_eq!(decoded.theme_id, "thm:PAY-1");
    }

    #[test]
    fn test_project_prefix_is_exact() {
        let prefix = VectorKey::project_prefix("PAY");
        assert!(VectorKey::new("PAY", "PAY-1").to_bytes().starts_with(&prefix));
        assert!(!VectorKey::new("PAYX", "PAYX-1").to_bytes().starts_with(&prefix));
    }

    #[test]
    fn test_wrong_prefix_rejected() {
        let bytes = TicketKey::new("PAY", "PAY-1").to_bytes();
        assert!(VectorKey::from_bytes(&bytes).is_err());
        assert!(MembershipKey::from_bytes(b"member:PAY").is_err());
    }
}
