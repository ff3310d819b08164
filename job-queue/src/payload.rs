//! The review job payload and the job identity string.

use serde::{Deserialize, Serialize};

/// Payload carried through the queue for one review job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReviewJobPayload {
    pub tenant_slug: String,
    pub provider: String,
    pub project_id: String,
    pub mr_iid: i64,
    pub head_sha: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub is_merged_candidate: bool,
    /// Mandatory: intake asserts it before calling the queue.
    pub review_run_id: String,
}

/// Builds the job identity. Double underscores separate the parts; the
/// `review_run_id` suffix makes every retry/manual enqueue addressable and
/// every fresh manual run unique.
pub fn build_job_id(
    tenant_slug: &str,
    provider: &str,
    project_id: &str,
    mr_iid: i64,
    head_sha: &str,
    review_run_id: Option<&str>,
) -> String {
    let mut id = format!("{tenant_slug}__{provider}__{project_id}__{mr_iid}__{head_sha}");
    if let Some(run) = review_run_id {
        id.push_str("__");
        id.push_str(run);
    }
    id
}

impl ReviewJobPayload {
    /// The identity this payload enqueues under.
    pub fn job_id(&self) -> String {
        build_job_id(
            &self.tenant_slug,
            &self.provider,
            &self.project_id,
            self.mr_iid,
            &self.head_sha,
            Some(&self.review_run_id),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(run_id: &str) -> ReviewJobPayload {
        ReviewJobPayload {
            tenant_slug: "t1".into(),
            provider: "gitlab".into(),
            project_id: "77381939".into(),
            mr_iid: 2,
            head_sha: "abc123".into(),
            title: None,
            is_merged_candidate: false,
            review_run_id: run_id.into(),
        }
    }

    #[test]
    fn job_id_shape() {
        assert_eq!(
            build_job_id("t1", "gitlab", "77381939", 2, "abc123", None),
            "t1__gitlab__77381939__2__abc123"
        );
        assert_eq!(
            payload("r-9").job_id(),
            "t1__gitlab__77381939__2__abc123__r-9"
        );
    }

    #[test]
    fn distinct_run_ids_give_distinct_job_ids() {
        assert_ne!(payload("r-1").job_id(), payload("r-2").job_id());
    }

    #[test]
    fn payload_wire_format_is_camel_case() {
        let json = serde_json::to_value(payload("r-1")).unwrap();
        assert_eq!(json["tenantSlug"], "t1");
        assert_eq!(json["mrIid"], 2);
        assert_eq!(json["headSha"], "abc123");
        assert_eq!(json["reviewRunId"], "r-1");
        assert_eq!(json["isMergedCandidate"], false);

        let back: ReviewJobPayload = serde_json::from_value(json).unwrap();
        assert_eq!(back, payload("r-1"));
    }
}
