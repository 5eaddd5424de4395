//! The slice of the GitHub REST v3 API the code-host provider needs.

use crate::error::TributaryError;
use crate::providers::http::UpstreamClient;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use url::Url;

use super::repo::RepoRef;

const ACCEPT_JSON: &str = "application/vnd.github+json";
const ACCEPT_RAW: &str = "application/vnd.github.raw";

#[derive(Debug, Deserialize)]
pub(super) struct RepoInfo {
    pub default_branch: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct CommitInfo {
    pub sha: String,
    #[serde(default)]
    pub commit: Option<CommitDetail>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CommitDetail {
    #[serde(default)]
    pub committer: Option<Signature>,
}

#[derive(Debug, Deserialize)]
pub(super) struct Signature {
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

impl CommitInfo {
    pub fn committed_at(&self) -> Option<DateTime<Utc>> {
        self.commit.as_ref()?.committer.as_ref()?.date
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct TreeResponse {
    #[serde(default)]
    pub tree: Vec<TreeEntry>,
    #[serde(default)]
    pub truncated: bool,
}

#[derive(Debug, Deserialize)]
pub(super) struct TreeEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CompareResponse {
    #[serde(default)]
    pub files: Vec<CompareFile>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CompareFile {
    pub filename: String,
    pub status: String,
}

/// File candidate after listing, before ignore filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Candidate {
    pub path: String,
    pub size: Option<u64>,
}

pub(super) struct CodeHostApi {
    pub http: UpstreamClient,
    pub base: Url,
    pub token: Option<String>,
}

impl CodeHostApi {
    fn endpoint(&self, repo: &RepoRef, tail: &[&str]) -> Result<Url, TributaryError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| TributaryError::invalid("code-host api_url cannot be a base"))?
            .pop_if_empty()
            .extend(["repos", repo.owner.as_str(), repo.name.as_str()])
            .extend(tail.iter().copied());
        Ok(url)
    }

    fn request(
        &self,
        client: &reqwest::Client,
        url: &Url,
        accept: &'static str,
    ) -> reqwest::RequestBuilder {
        let req = client
            .get(url.clone())
            .header(ACCEPT, accept)
            .header("X-GitHub-Api-Version", "2022-11-28");
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T, TributaryError> {
        let resp = self
            .http
            .send(|c| self.request(c, &url, ACCEPT_JSON))
            .await?;
        Ok(resp.json::<T>().await?)
    }

    pub async fn default_branch(&self, repo: &RepoRef) -> Result<String, TributaryError> {
        let info: RepoInfo = self.get_json(self.endpoint(repo, &[])?).await?;
        Ok(info.default_branch)
    }

    pub async fn head(&self, repo: &RepoRef, branch: &str) -> Result<CommitInfo, TributaryError> {
        self.get_json(self.endpoint(repo, &["commits", branch])?)
            .await
    }

    pub async fn tree(&self, repo: &RepoRef, sha: &str) -> Result<Vec<Candidate>, TributaryError> {
        let mut url = self.endpoint(repo, &["git", "trees", sha])?;
        url.query_pairs_mut().append_pair("recursive", "1");
        let tree: TreeResponse = self.get_json(url).await?;
        if tree.truncated {
            tracing::warn!(repo = %repo, sha, "tree listing truncated by upstream");
        }
        Ok(tree
            .tree
            .into_iter()
            .filter(|entry| entry.kind == "blob")
            .map(|entry| Candidate {
                path: entry.path,
                size: entry.size,
            })
            .collect())
    }

    /// Paths touched between `base` and `head`, removed files excluded.
    pub async fn compare(
        &self,
        repo: &RepoRef,
        base: &str,
        head: &str,
    ) -> Result<Vec<Candidate>, TributaryError> {
        let range = format!("{base}...{head}");
        let compare: CompareResponse = self
            .get_json(self.endpoint(repo, &["compare", range.as_str()])?)
            .await?;
        Ok(compare
            .files
            .into_iter()
            .filter(|file| file.status != "removed" && file.status != "unchanged")
            .map(|file| Candidate {
                path: file.filename,
                size: None,
            })
            .collect())
    }

    /// Raw file bytes at `sha`; `None` when the file does not exist.
    pub async fn raw_file(
        &self,
        repo: &RepoRef,
        path: &str,
        sha: &str,
    ) -> Result<Option<Vec<u8>>, TributaryError> {
        let mut tail = vec!["contents"];
        tail.extend(path.split('/').filter(|s| !s.is_empty()));
        let mut url = self.endpoint(repo, &tail)?;
        url.query_pairs_mut().append_pair("ref", sha);

        let resp = self
            .http
            .send_raw(|c| self.request(c, &url, ACCEPT_RAW))
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = crate::providers::http::ensure_success("code_host", resp).await?;
        Ok(Some(resp.bytes().await?.to_vec()))
    }
}
