//! Defensive extraction of MR lifecycle events.
//!
//! Webhook payloads are dynamically shaped and drift across host versions,
//! so every attribute is read through a chain of candidate fields. Unknown
//! event kinds and incomplete payloads are "ignored", never errors.

use serde_json::Value;

/// A normalized MR event, extracted field by field.
#[derive(Debug, Clone, Default)]
pub struct MrEvent {
    pub project_id: String,
    pub mr_iid: i64,
    pub head_sha: Option<String>,
    pub title: String,
    pub description: String,
    pub web_url: String,
    pub author: Option<String>,
    pub source_branch: String,
    pub target_branch: String,
    pub state: String,
    pub action: String,
    pub project_namespace: String,
    pub project_name: String,
    pub default_branch: String,
}

/// What intake should do with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventDecision {
    /// Schedule a review; `merged_candidate` marks the GOLD-evaluation path.
    Trigger { merged_candidate: bool },
    Ignore(&'static str),
}

fn str_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    let mut cur = value;
    for key in path {
        cur = cur.get(key)?;
    }
    cur.as_str().filter(|s| !s.is_empty())
}

fn first_str(value: &Value, candidates: &[&[&str]]) -> Option<String> {
    candidates
        .iter()
        .find_map(|path| str_at(value, path))
        .map(str::to_string)
}

fn first_i64(value: &Value, candidates: &[&[&str]]) -> Option<i64> {
    for path in candidates {
        let mut cur = value;
        let mut ok = true;
        for key in *path {
            match cur.get(key) {
                Some(next) => cur = next,
                None => {
                    ok = false;
                    break;
                }
            }
        }
        if !ok {
            continue;
        }
        if let Some(n) = cur.as_i64() {
            return Some(n);
        }
        if let Some(s) = cur.as_str() {
            if let Ok(n) = s.parse() {
                return Some(n);
            }
        }
    }
    None
}

impl MrEvent {
    /// Extracts an MR event, or `None` for non-MR event kinds.
    pub fn from_value(body: &Value) -> Option<MrEvent> {
        let kind = first_str(body, &[&["object_kind"], &["event_type"]]).unwrap_or_default();
        if kind != "merge_request" {
            return None;
        }

        let project_id = first_i64(
            body,
            &[
                &["project", "id"],
                &["object_attributes", "target_project_id"],
                &["object_attributes", "source_project_id"],
            ],
        )?
        .to_string();

        let mr_iid = first_i64(body, &[&["object_attributes", "iid"]])?;

        Some(MrEvent {
            project_id,
            mr_iid,
            head_sha: first_str(
                body,
                &[
                    &["object_attributes", "last_commit", "id"],
                    &["object_attributes", "sha"],
                    &["checkout_sha"],
                ],
            ),
            title: first_str(body, &[&["object_attributes", "title"]]).unwrap_or_default(),
            description: first_str(body, &[&["object_attributes", "description"]])
                .unwrap_or_default(),
            web_url: first_str(
                body,
                &[&["object_attributes", "url"], &["object_attributes", "web_url"]],
            )
            .unwrap_or_default(),
            author: first_str(body, &[&["user", "username"], &["user", "name"]]),
            source_branch: first_str(body, &[&["object_attributes", "source_branch"]])
                .unwrap_or_default(),
            target_branch: first_str(body, &[&["object_attributes", "target_branch"]])
                .unwrap_or_default(),
            state: first_str(body, &[&["object_attributes", "state"]]).unwrap_or_default(),
            action: first_str(body, &[&["object_attributes", "action"]]).unwrap_or_default(),
            project_namespace: first_str(
                body,
                &[&["project", "path_with_namespace"], &["project", "namespace"]],
            )
            .unwrap_or_default(),
            project_name: first_str(body, &[&["project", "name"]]).unwrap_or_default(),
            default_branch: first_str(body, &[&["project", "default_branch"]])
                .unwrap_or_default(),
        })
    }

    /// The action filter of the intake contract.
    pub fn decision(&self) -> EventDecision {
        match self.action.as_str() {
            "open" | "update" | "reopen" => {
                if self.head_sha.is_none() {
                    EventDecision::Ignore("event carries no head sha")
                } else {
                    EventDecision::Trigger {
                        merged_candidate: false,
                    }
                }
            }
            // A merge event still carries the final commits; review them and
            // evaluate GOLD promotion. Without a sha there is nothing to do.
            "merge" => {
                if self.head_sha.is_none() {
                    EventDecision::Ignore("merge event without head sha")
                } else {
                    EventDecision::Trigger {
                        merged_candidate: true,
                    }
                }
            }
            "close" => EventDecision::Ignore("closed merge requests are not reviewed"),
            _ => EventDecision::Ignore("unhandled merge request action"),
        }
    }
}
