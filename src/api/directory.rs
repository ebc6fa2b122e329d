//! The user directory seam used by the assignee search.

use std::future::Future;

use super::client::SonarClient;
use super::error::Result;
use super::types::User;

/// A remote directory that can look users up by a free-text query.
///
/// Each returned user carries a unique `login`.
pub trait UserDirectory: Clone + Send + Sync + 'static {
    /// Search for users matching `query`.
    fn search_users(&self, query: &str) -> impl Future<Output = Result<Vec<User>>> + Send;
}

impl UserDirectory for SonarClient {
    fn search_users(&self, query: &str) -> impl Future<Output = Result<Vec<User>>> + Send {
        SonarClient::search_users(self, query, self.page_size())
    }
}
