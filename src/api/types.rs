//! SonarQube Web API request and response types.
//!
//! These types model the subset of the SonarQube Web API used to look up
//! users and assign security hotspots.

use serde::{Deserialize, Serialize};
use std::fmt;

fn default_true() -> bool {
    true
}

/// A user from the SonarQube user directory.
///
/// Returned in the `users` array of `GET /api/users/search`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    /// The unique login of the user.
    pub login: String,
    /// The user's display name.
    #[serde(default)]
    pub name: String,
    /// The user's email address (hidden for non-admin callers).
    #[serde(default)]
    pub email: Option<String>,
    /// Gravatar hash of the user's email.
    #[serde(default)]
    pub avatar: Option<String>,
    /// Whether the user is active.
    #[serde(default = "default_true")]
    pub active: bool,
}

impl User {
    /// Name to show in lists, falling back to the login.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.login
        } else {
            &self.name
        }
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}", self.login)
        } else {
            write!(f, "{} ({})", self.name, self.login)
        }
    }
}

/// Pagination block shared by SonarQube search endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Paging {
    /// The 1-based page index.
    pub page_index: u32,
    /// The page size.
    pub page_size: u32,
    /// The total number of matching elements.
    pub total: u32,
}

/// Response of `GET /api/users/search`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSearchResponse {
    /// Pagination info.
    pub paging: Paging,
    /// The matching users.
    #[serde(default)]
    pub users: Vec<User>,
}

/// Response of `GET /api/authentication/validate`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ValidateResponse {
    /// Whether the supplied credentials are valid.
    pub valid: bool,
}

/// The component a hotspot was raised on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HotspotComponent {
    /// The component key (e.g. "project:src/main.rs").
    pub key: String,
    /// Long name (usually the file path).
    #[serde(default)]
    pub long_name: Option<String>,
}

/// A security hotspot as returned by `GET /api/hotspots/show`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Hotspot {
    /// The hotspot key.
    pub key: String,
    /// The hotspot message.
    #[serde(default)]
    pub message: String,
    /// Review status (TO_REVIEW, REVIEWED).
    #[serde(default)]
    pub status: String,
    /// Login of the current assignee, if any.
    #[serde(default)]
    pub assignee: Option<String>,
    /// The component the hotspot belongs to.
    pub component: HotspotComponent,
}

impl Hotspot {
    /// The file or component name to show in the header.
    pub fn location(&self) -> &str {
        self.component
            .long_name
            .as_deref()
            .unwrap_or(&self.component.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_search_response_deserialize() {
        let json = r#"{
            "paging": {"pageIndex": 1, "pageSize": 20, "total": 2},
            "users": [
                {"login": "jo", "name": "Jo Doe", "active": true, "avatar": "abc123"},
                {"login": "john", "name": "John Smith", "active": false, "email": "john@example.com"}
            ]
        }"#;

        let response: UserSearchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.paging.total, 2);
        assert_eq!(response.users.len(), 2);
        assert_eq!(response.users[0].login, "jo");
        assert_eq!(response.users[0].avatar.as_deref(), Some("abc123"));
        assert!(!response.users[1].active);
        assert_eq!(response.users[1].email.as_deref(), Some("john@example.com"));
    }

    #[test]
    fn test_user_defaults() {
        let user: User = serde_json::from_str(r#"{"login": "ghost"}"#).unwrap();
        assert_eq!(user.name, "");
        assert!(user.active);
        assert!(user.email.is_none());
    }

    #[test]
    fn test_user_display() {
        let user: User = serde_json::from_str(r#"{"login": "jo", "name": "Jo Doe"}"#).unwrap();
        assert_eq!(user.to_string(), "Jo Doe (jo)");
        assert_eq!(user.display_name(), "Jo Doe");

        let nameless: User = serde_json::from_str(r#"{"login": "jo"}"#).unwrap();
        assert_eq!(nameless.to_string(), "jo");
        assert_eq!(nameless.display_name(), "jo");
    }

    #[test]
    fn test_hotspot_deserialize() {
        let json = r#"{
            "key": "AXhs1",
            "message": "Make sure this weak hash is safe here.",
            "status": "TO_REVIEW",
            "assignee": "jo",
            "component": {"key": "proj:src/crypto.rs", "longName": "src/crypto.rs"},
            "rule": {"key": "rust:S4790"}
        }"#;

        let hotspot: Hotspot = serde_json::from_str(json).unwrap();
        assert_eq!(hotspot.key, "AXhs1");
        assert_eq!(hotspot.assignee.as_deref(), Some("jo"));
        assert_eq!(hotspot.location(), "src/crypto.rs");
    }

    #[test]
    fn test_hotspot_location_falls_back_to_key() {
        let json = r#"{"key": "AXhs2", "component": {"key": "proj:lib.rs"}}"#;
        let hotspot: Hotspot = serde_json::from_str(json).unwrap();
        assert!(hotspot.assignee.is_none());
        assert_eq!(hotspot.location(), "proj:lib.rs");
    }
}
