use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Shared error type for pipeline-level failures that have no richer home.
#[derive(Debug, Error, Clone)]
pub enum CoreError {
    #[error("{message}")]
    Message { message: String },
}

impl CoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct PageId(pub String);

impl PageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for PageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Route binding a fill session to the page it owns exclusively.
///
/// One session owns one page for its whole duration; the mutex key is the
/// serialization point for everything that touches that page.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct FillRoute {
    pub session: SessionId,
    pub page: PageId,
    pub mutex_key: String,
}

impl FillRoute {
    pub fn new(session: SessionId, page: PageId) -> Self {
        let mutex_key = format!("page:{}", page.0);
        Self {
            session,
            page,
            mutex_key,
        }
    }
}

impl fmt::Display for FillRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "session={} page={} mutex={}",
            self.session.0, self.page.0, self.mutex_key
        )
    }
}

/// User-supplied identity record a session fills forms with.
///
/// `company` defaults to empty: standalone company fields are a common
/// decoy and are only filled when analysis marks them critical.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UserData {
    pub email: String,
    #[serde(default)]
    pub password: Option<String>,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
}

impl UserData {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// Username fallback: explicit username, else the email local part.
    pub fn username_or_derived(&self) -> String {
        match &self.username {
            Some(name) if !name.is_empty() => name.clone(),
            _ => self
                .email
                .split('@')
                .next()
                .unwrap_or_default()
                .to_string(),
        }
    }
}

/// Aggregate outcome of one fill session (the session output contract).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub success: bool,
    pub fields_processed: usize,
    pub checkboxes_processed: usize,
    pub honeypots_avoided: usize,
    pub validation_errors: usize,
    pub submitted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_route_mutex_key_tracks_page() {
        let page = PageId::new();
        let route = FillRoute::new(SessionId::new(), page.clone());
        assert_eq!(route.mutex_key, format!("page:{}", page.0));
    }

    #[test]
    fn username_derives_from_email_when_missing() {
        let user = UserData {
            email: "jane.doe@example.com".into(),
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            ..Default::default()
        };
        assert_eq!(user.username_or_derived(), "jane.doe");
        assert_eq!(user.full_name(), "Jane Doe");
    }

    #[test]
    fn username_prefers_explicit_value() {
        let user = UserData {
            email: "jane@example.com".into(),
            username: Some("jdoe42".into()),
            ..Default::default()
        };
        assert_eq!(user.username_or_derived(), "jdoe42");
    }
}
