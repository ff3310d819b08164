//! Shared state handed to every handler.

use git_host::GitLabClient;
use job_queue::Queue;
use review_store::Store;

use crate::activity::ActivityBuffer;
use crate::core::config::AppConfig;

/// The provider wired into this deployment. Multi-host federation is out of
/// scope; the string still flows through entities and job identities.
pub const PROVIDER: &str = "gitlab";

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub queue: Queue,
    pub host: GitLabClient,
    pub activity: ActivityBuffer,
    pub config: AppConfig,
}
