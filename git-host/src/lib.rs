//! Host adapter: the abstract code-host operations the pipeline consumes.
//!
//! Only GitLab is wired today; the client struct is the dispatch seam if
//! another provider ever lands. All transport classification lives in
//! [`errors::HostError`] so callers never match on reqwest internals.

pub mod errors;
pub mod gitlab;
pub mod types;

pub use errors::{HostError, HostResult};
pub use gitlab::{CHANGES_TIMEOUT, GitLabClient, MAX_ATTEMPTS, REQUEST_TIMEOUT};
pub use types::{HostApprovals, HostChange, HostMergeRequest, HostNote, HostUser};
