//! Async task management for non-blocking API operations.
//!
//! Network calls run on background tokio tasks while the UI keeps
//! rendering. Each task sends exactly one `ApiMessage` back through an
//! unbounded channel, which the main loop drains with `try_recv()`.
//!
//! User searches carry the generation of the [`SearchRequest`] that started
//! them so the assignee select can drop answers to superseded queries.

use tokio::sync::mpsc;
use tracing::debug;

use crate::api::types::{Hotspot, User};
use crate::api::{SonarClient, UserDirectory};
use crate::config::Profile;
use crate::ui::SearchRequest;

/// Messages sent from background tasks to the main event loop.
#[derive(Debug)]
pub enum ApiMessage {
    /// Initial client connection result
    ClientConnected(Result<SonarClient, String>),

    /// The hotspot being assigned
    HotspotFetched(Result<Hotspot, String>),

    /// User directory search results
    UsersFound {
        generation: u64,
        query: String,
        result: Result<Vec<User>, String>,
    },

    /// Assignment result; `assignee` is `None` for an unassignment
    AssigneeChanged {
        assignee: Option<User>,
        result: Result<(), String>,
    },
}

/// Spawns background tasks for async operations.
#[derive(Clone)]
pub struct TaskSpawner {
    tx: mpsc::UnboundedSender<ApiMessage>,
}

impl TaskSpawner {
    /// Create a new TaskSpawner with the given channel sender.
    pub fn new(tx: mpsc::UnboundedSender<ApiMessage>) -> Self {
        Self { tx }
    }

    /// Spawn a task to connect to SonarQube with the given profile.
    pub fn spawn_connect(&self, profile: Profile, token: Option<String>, page_size: u32) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = SonarClient::new(&profile, token.as_deref())
                .await
                .map(|client| client.with_page_size(page_size))
                .map_err(|e| e.to_string());
            let _ = tx.send(ApiMessage::ClientConnected(result));
        });
    }

    /// Spawn a task to fetch the hotspot being assigned.
    pub fn spawn_fetch_hotspot(&self, client: &SonarClient, hotspot_key: String) {
        let tx = self.tx.clone();
        let client = client.clone();
        tokio::spawn(async move {
            let result = client
                .get_hotspot(&hotspot_key)
                .await
                .map_err(|e| e.to_string());
            let _ = tx.send(ApiMessage::HotspotFetched(result));
        });
    }

    /// Spawn a task to run a user search against a directory.
    pub fn spawn_search_users<D: UserDirectory>(&self, directory: &D, request: SearchRequest) {
        let tx = self.tx.clone();
        let directory = directory.clone();
        tokio::spawn(async move {
            let SearchRequest { generation, query } = request;
            let result = directory
                .search_users(&query)
                .await
                .map_err(|e| e.to_string());
            debug!(generation, query = %query, ok = result.is_ok(), "User search finished");
            let _ = tx.send(ApiMessage::UsersFound {
                generation,
                query,
                result,
            });
        });
    }

    /// Spawn a task to assign a hotspot, or unassign it when `assignee` is `None`.
    pub fn spawn_assign(&self, client: &SonarClient, hotspot_key: String, assignee: Option<User>) {
        let tx = self.tx.clone();
        let client = client.clone();
        tokio::spawn(async move {
            let login = assignee.as_ref().map(|u| u.login.as_str());
            let result = client
                .assign_hotspot(&hotspot_key, login)
                .await
                .map_err(|e| e.to_string());
            let _ = tx.send(ApiMessage::AssigneeChanged { assignee, result });
        });
    }
}

/// Create a new task channel and spawner.
///
/// Returns a tuple of (receiver, spawner). The receiver should be polled
/// in the main event loop, and the spawner should be used to spawn tasks.
pub fn create_task_channel() -> (mpsc::UnboundedReceiver<ApiMessage>, TaskSpawner) {
    let (tx, rx) = mpsc::unbounded_channel();
    (rx, TaskSpawner::new(tx))
}
