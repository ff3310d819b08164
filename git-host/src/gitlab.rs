//! GitLab client (REST v4) for the review pipeline.
//!
//! Endpoints used:
//! - GET  /projects/:id/merge_requests/:iid
//! - GET  /projects/:id/merge_requests/:iid/changes
//! - GET  /projects/:id/merge_requests/:iid/approvals
//! - POST /projects/:id/merge_requests/:iid/notes
//! - PUT  /projects/:id/merge_requests/:iid/notes/:note_id
//! - GET  /projects/:id/repository/files/:path/raw?ref=
//! - GET  /user
//!
//! Transport contract: 10 s per-request timeout (30 s for the changes
//! fetch), up to 3 attempts on 429/5xx/network with 1 s/2 s/4 s backoff
//! capped at 10 s, `Retry-After` honored on 429. Other 4xx propagate
//! immediately with the status attached. Log lines carry event names and
//! statuses only; never bodies or the token.

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Serialize;
use tracing::{debug, warn};

use crate::errors::{HostError, HostResult};
use crate::types::*;

/// Per-request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Diff fetches get a longer deadline; changesets can be large.
pub const CHANGES_TIMEOUT: Duration = Duration::from_secs(30);
/// Attempts per operation (first try + retries).
pub const MAX_ATTEMPTS: u32 = 3;
/// Backoff cap between attempts.
pub const BACKOFF_CAP: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct GitLabClient {
    http: Client,
    base_api: String,
    token: String,
}

impl GitLabClient {
    /// Builds a client for the given API base (e.g. "https://gitlab.com/api/v4").
    pub fn new(base_api: String, token: String) -> HostResult<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(REQUEST_TIMEOUT)
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .build()?;
        Ok(Self {
            http,
            base_api: base_api.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// The authenticated user; cheap connectivity/credential check.
    pub async fn get_user(&self) -> HostResult<HostUser> {
        let url = format!("{}/user", self.base_api);
        self.get_json("get_user", &url, REQUEST_TIMEOUT).await
    }

    /// Fetches MR metadata.
    pub async fn get_merge_request(
        &self,
        project_id: &str,
        iid: u64,
    ) -> HostResult<HostMergeRequest> {
        let url = format!(
            "{}/projects/{}/merge_requests/{}",
            self.base_api,
            urlencoding::encode(project_id),
            iid
        );
        let raw: GitLabMr = self.get_json("get_merge_request", &url, REQUEST_TIMEOUT).await?;
        Ok(raw.into())
    }

    /// Fetches the changeset (file-level unified diffs).
    pub async fn get_merge_request_changes(
        &self,
        project_id: &str,
        iid: u64,
    ) -> HostResult<Vec<HostChange>> {
        let url = format!(
            "{}/projects/{}/merge_requests/{}/changes",
            self.base_api,
            urlencoding::encode(project_id),
            iid
        );
        let raw: GitLabChangesResponse = self
            .get_json("get_merge_request_changes", &url, CHANGES_TIMEOUT)
            .await?;
        Ok(raw.changes.into_iter().map(Into::into).collect())
    }

    /// Fetches approval state. 403/404 mean the instance hides approvals
    /// (tier or config); that is "approvals unknown", not an error.
    pub async fn get_merge_request_approvals(
        &self,
        project_id: &str,
        iid: u64,
    ) -> HostResult<Option<HostApprovals>> {
        let url = format!(
            "{}/projects/{}/merge_requests/{}/approvals",
            self.base_api,
            urlencoding::encode(project_id),
            iid
        );
        match self
            .get_json::<GitLabApprovals>("get_merge_request_approvals", &url, REQUEST_TIMEOUT)
            .await
        {
            Ok(raw) => Ok(Some(raw.into())),
            Err(HostError::Forbidden) | Err(HostError::NotFound) => {
                debug!(event = "get_merge_request_approvals", "approvals unknown");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Creates a general note (comment) on the MR.
    pub async fn create_merge_request_note(
        &self,
        project_id: &str,
        iid: u64,
        body: &str,
    ) -> HostResult<HostNote> {
        let url = format!(
            "{}/projects/{}/merge_requests/{}/notes",
            self.base_api,
            urlencoding::encode(project_id),
            iid
        );
        let raw: GitLabNote = self
            .send_json(
                "create_merge_request_note",
                Method::POST,
                &url,
                &NoteBody { body },
                REQUEST_TIMEOUT,
            )
            .await?;
        Ok(HostNote { id: raw.id })
    }

    /// Updates an existing note in place.
    pub async fn update_merge_request_note(
        &self,
        project_id: &str,
        iid: u64,
        note_id: u64,
        body: &str,
    ) -> HostResult<HostNote> {
        let url = format!(
            "{}/projects/{}/merge_requests/{}/notes/{}",
            self.base_api,
            urlencoding::encode(project_id),
            iid,
            note_id
        );
        let raw: GitLabNote = self
            .send_json(
                "update_merge_request_note",
                Method::PUT,
                &url,
                &NoteBody { body },
                REQUEST_TIMEOUT,
            )
            .await?;
        Ok(HostNote { id: raw.id })
    }

    /// Raw file contents at a ref.
    pub async fn get_project_file_raw(
        &self,
        project_id: &str,
        path: &str,
        git_ref: &str,
    ) -> HostResult<String> {
        let url = format!(
            "{}/projects/{}/repository/files/{}/raw?ref={}",
            self.base_api,
            urlencoding::encode(project_id),
            urlencoding::encode(path),
            urlencoding::encode(git_ref)
        );
        let resp = self
            .execute_with_retry("get_project_file_raw", REQUEST_TIMEOUT, || {
                self.http.get(url.as_str())
            })
            .await?;
        Ok(resp.text().await?)
    }

    // --- transport helpers ---

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        event: &'static str,
        url: &str,
        timeout: Duration,
    ) -> HostResult<T> {
        let resp = self
            .execute_with_retry(event, timeout, || self.http.get(url))
            .await?;
        resp.json::<T>()
            .await
            .map_err(|e| HostError::InvalidResponse(e.to_string()))
    }

    async fn send_json<B: Serialize, T: serde::de::DeserializeOwned>(
        &self,
        event: &'static str,
        method: Method,
        url: &str,
        body: &B,
        timeout: Duration,
    ) -> HostResult<T> {
        let resp = self
            .execute_with_retry(event, timeout, || {
                self.http.request(method.clone(), url).json(body)
            })
            .await?;
        resp.json::<T>()
            .await
            .map_err(|e| HostError::InvalidResponse(e.to_string()))
    }

    /// One operation, up to [`MAX_ATTEMPTS`] attempts. Requests are rebuilt
    /// per attempt via `build` (a sent request cannot be replayed).
    async fn execute_with_retry(
        &self,
        event: &'static str,
        timeout: Duration,
        build: impl Fn() -> RequestBuilder,
    ) -> HostResult<reqwest::Response> {
        let mut last_err = HostError::Timeout;

        for attempt in 1..=MAX_ATTEMPTS {
            let request = build()
                .header("PRIVATE-TOKEN", &self.token)
                .header(reqwest::header::ACCEPT, "application/json")
                .timeout(timeout);

            let err = match request.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        debug!(event, status = status.as_u16(), attempt, "host request ok");
                        return Ok(resp);
                    }
                    self.classify_status(status, &resp)
                }
                Err(e) => HostError::from(e),
            };
            if !err.is_transient() || attempt == MAX_ATTEMPTS {
                warn!(event, attempt, error = %err, "host request failed");
                return Err(err);
            }

            let delay = backoff_delay(attempt, &err);
            debug!(
                event,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "host request retrying"
            );
            last_err = err;
            tokio::time::sleep(delay).await;
        }

        Err(last_err)
    }

    fn classify_status(&self, status: StatusCode, resp: &reqwest::Response) -> HostError {
        let retry_after = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        HostError::from_status(status.as_u16(), retry_after)
    }
}

/// 1 s, 2 s, 4 s, capped; a `Retry-After` on 429 wins (still capped).
fn backoff_delay(attempt: u32, err: &HostError) -> Duration {
    if let HostError::RateLimited {
        retry_after_secs: Some(secs),
    } = err
    {
        return Duration::from_secs(*secs).min(BACKOFF_CAP);
    }
    Duration::from_secs(1u64 << (attempt - 1)).min(BACKOFF_CAP)
}

#[derive(Serialize)]
struct NoteBody<'a> {
    body: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_progression_and_cap() {
        let e = HostError::Server(500);
        assert_eq!(backoff_delay(1, &e), Duration::from_secs(1));
        assert_eq!(backoff_delay(2, &e), Duration::from_secs(2));
        assert_eq!(backoff_delay(3, &e), Duration::from_secs(4));
        assert_eq!(backoff_delay(5, &e), BACKOFF_CAP);
    }

    #[test]
    fn retry_after_honored_and_capped() {
        let e = HostError::RateLimited {
            retry_after_secs: Some(3),
        };
        assert_eq!(backoff_delay(1, &e), Duration::from_secs(3));

        let e = HostError::RateLimited {
            retry_after_secs: Some(120),
        };
        assert_eq!(backoff_delay(1, &e), BACKOFF_CAP);
    }

    #[test]
    fn client_builds_with_trailing_slash() {
        let c = GitLabClient::new("https://gitlab.example.com/api/v4/".into(), "t".into()).unwrap();
        assert_eq!(c.base_api, "https://gitlab.example.com/api/v4");
    }
}
