//! Normalized host-side types plus the GitLab response subsets they are
//! built from. Only fields the pipeline consumes are deserialized.

use serde::Deserialize;

/// The authenticated API user (used by connectivity checks).
#[derive(Debug, Clone, Deserialize)]
pub struct HostUser {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Normalized MR metadata.
#[derive(Debug, Clone)]
pub struct HostMergeRequest {
    pub iid: u64,
    pub title: String,
    pub description: String,
    /// Provider state string: "opened", "merged", "closed", "locked".
    pub state: String,
    pub web_url: String,
    pub source_branch: String,
    pub target_branch: String,
    /// Head SHA at the time of the fetch.
    pub head_sha: String,
    pub author_username: Option<String>,
}

impl HostMergeRequest {
    pub fn is_merged(&self) -> bool {
        self.state == "merged"
    }
}

/// One changed file as the host reports it.
#[derive(Debug, Clone)]
pub struct HostChange {
    pub old_path: String,
    pub new_path: String,
    pub new_file: bool,
    pub renamed_file: bool,
    pub deleted_file: bool,
    /// Unified diff; absent for binary or oversized files.
    pub diff: Option<String>,
}

impl HostChange {
    /// `(path, diff)` normalized for the check engine; binary files yield
    /// an empty diff rather than disappearing from the changeset.
    pub fn as_path_diff(&self) -> (String, String) {
        (self.new_path.clone(), self.diff.clone().unwrap_or_default())
    }
}

/// Approval state; `None` from the client means "approvals unknown".
#[derive(Debug, Clone)]
pub struct HostApprovals {
    pub approved_count: u32,
    pub approvals_required: Option<u32>,
}

/// A created or updated MR note.
#[derive(Debug, Clone)]
pub struct HostNote {
    pub id: u64,
}

// --- GitLab response shapes (subset of fields we actually use) ---

#[derive(Debug, Deserialize)]
pub(crate) struct GitLabMr {
    pub iid: u64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub state: String,
    pub web_url: String,
    pub source_branch: String,
    pub target_branch: String,
    #[serde(default)]
    pub sha: Option<String>,
    #[serde(default)]
    pub diff_refs: Option<GitLabDiffRefs>,
    #[serde(default)]
    pub author: Option<GitLabUser>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GitLabDiffRefs {
    #[serde(default)]
    pub head_sha: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GitLabUser {
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GitLabChangesResponse {
    #[serde(default)]
    pub changes: Vec<GitLabChange>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GitLabChange {
    pub old_path: String,
    pub new_path: String,
    pub new_file: bool,
    pub renamed_file: bool,
    pub deleted_file: bool,
    #[serde(default)]
    pub diff: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GitLabApprovals {
    #[serde(default)]
    pub approved_by: Vec<serde_json::Value>,
    #[serde(default)]
    pub approvals_required: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GitLabNote {
    pub id: u64,
}

impl From<GitLabMr> for HostMergeRequest {
    fn from(raw: GitLabMr) -> Self {
        // `sha` is the head of the MR; diff_refs.head_sha is the fallback on
        // older instances.
        let head_sha = raw
            .sha
            .or(raw.diff_refs.and_then(|d| d.head_sha))
            .unwrap_or_default();
        Self {
            iid: raw.iid,
            title: raw.title,
            description: raw.description.unwrap_or_default(),
            state: raw.state,
            web_url: raw.web_url,
            source_branch: raw.source_branch,
            target_branch: raw.target_branch,
            head_sha,
            author_username: raw.author.map(|a| a.username),
        }
    }
}

impl From<GitLabChange> for HostChange {
    fn from(raw: GitLabChange) -> Self {
        Self {
            old_path: raw.old_path,
            new_path: raw.new_path,
            new_file: raw.new_file,
            renamed_file: raw.renamed_file,
            deleted_file: raw.deleted_file,
            diff: raw.diff,
        }
    }
}

impl From<GitLabApprovals> for HostApprovals {
    fn from(raw: GitLabApprovals) -> Self {
        Self {
            approved_count: raw.approved_by.len() as u32,
            approvals_required: raw.approvals_required,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mr_fixture_deserializes_and_normalizes() {
        let raw = r#"{
            "iid": 2,
            "title": "Add login",
            "description": null,
            "state": "merged",
            "web_url": "https://gitlab.example.com/g/p/-/merge_requests/2",
            "source_branch": "feat/login",
            "target_branch": "main",
            "sha": "abc123",
            "author": {"username": "alice", "id": 9}
        }"#;
        let mr: HostMergeRequest = serde_json::from_str::<GitLabMr>(raw).unwrap().into();
        assert_eq!(mr.head_sha, "abc123");
        assert!(mr.is_merged());
        assert_eq!(mr.description, "");
        assert_eq!(mr.author_username.as_deref(), Some("alice"));
    }

    #[test]
    fn head_sha_falls_back_to_diff_refs() {
        let raw = r#"{
            "iid": 3, "title": "t", "state": "opened",
            "web_url": "u", "source_branch": "s", "target_branch": "t",
            "diff_refs": {"head_sha": "def456", "base_sha": "x", "start_sha": "y"}
        }"#;
        let mr: HostMergeRequest = serde_json::from_str::<GitLabMr>(raw).unwrap().into();
        assert_eq!(mr.head_sha, "def456");
    }

    #[test]
    fn approvals_count_from_approved_by() {
        let raw = r#"{"approved_by": [{"user": {"id": 1}}, {"user": {"id": 2}}],
                       "approvals_required": 1}"#;
        let a: HostApprovals = serde_json::from_str::<GitLabApprovals>(raw).unwrap().into();
        assert_eq!(a.approved_count, 2);
        assert_eq!(a.approvals_required, Some(1));
    }

    #[test]
    fn binary_change_normalizes_to_empty_diff() {
        let raw = r#"{"old_path": "a.png", "new_path": "a.png",
            "new_file": false, "renamed_file": false, "deleted_file": false}"#;
        let c: HostChange = serde_json::from_str::<GitLabChange>(raw).unwrap().into();
        assert_eq!(c.as_path_diff(), ("a.png".to_string(), String::new()));
    }
}
