//! Reference resolution: branch, tag or commit-ish to an immutable revision.
use crate::config::Upstream;
use crate::error::PipelineError;
use crate::transport::Transport;
use anyhow::Result;
use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use serde_json::Value;

/// Length of the abbreviated hash used in file names.
pub const SHORT_ID_LEN: usize = 7;

/// A concrete commit and the date it was committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionInfo {
    pub identifier: String,
    pub commit_date: NaiveDate,
}

impl RevisionInfo {
    pub fn short_identifier(&self) -> &str {
        short_identifier(&self.identifier)
    }
}

/// Abbreviate a full hash to its first seven characters.
pub fn short_identifier(identifier: &str) -> &str {
    match identifier.char_indices().nth(SHORT_ID_LEN) {
        Some((end, _)) => &identifier[..end],
        None => identifier,
    }
}

/// Commit-listing endpoint of the upstream repository.
pub fn commits_url(upstream: &Upstream) -> String {
    format!(
        "{}/repos/{}/commits",
        upstream.api_base.trim_end_matches('/'),
        upstream.repo
    )
}

/// Query selecting the newest commit reachable from `reference`.
pub fn commits_query(reference: &str) -> [(&'static str, &str); 2] {
    [("sha", reference), ("per_page", "1")]
}

/// Resolve `reference` to the most recent commit reachable from it.
pub fn resolve(
    transport: &dyn Transport,
    upstream: &Upstream,
    reference: &str,
) -> Result<RevisionInfo> {
    let url = commits_url(upstream);
    let body = transport
        .get_json(&url, &commits_query(reference))
        .map_err(|err| PipelineError::Resolution {
            reference: reference.to_string(),
            message: format!("{err:#}"),
        })?;
    let info = parse_commits(reference, &body)?;
    tracing::info!(
        reference,
        revision = %info.identifier,
        short = info.short_identifier(),
        date = %info.commit_date,
        "resolved ref"
    );
    Ok(info)
}

/// One entry of the commit listing; only the fields used here.
#[derive(Debug, Deserialize)]
struct CommitEntry {
    sha: Option<String>,
    commit: Option<CommitDetail>,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    committer: Option<Signature>,
}

#[derive(Debug, Deserialize)]
struct Signature {
    date: Option<String>,
}

/// Extract the first commit's hash and committer date from a listing.
pub fn parse_commits(reference: &str, body: &Value) -> Result<RevisionInfo, PipelineError> {
    let fail = |message: String| PipelineError::Resolution {
        reference: reference.to_string(),
        message,
    };

    let entries = Vec::<CommitEntry>::deserialize(body)
        .map_err(|err| fail(format!("unexpected commit listing: {err}")))?;
    let first = entries
        .into_iter()
        .next()
        .ok_or_else(|| fail("no commits found".to_string()))?;
    let identifier = first
        .sha
        .filter(|sha| !sha.is_empty())
        .ok_or_else(|| fail("commit entry has no sha".to_string()))?;
    let raw_date = first
        .commit
        .and_then(|commit| commit.committer)
        .and_then(|committer| committer.date)
        .ok_or_else(|| fail("commit entry has no committer date".to_string()))?;
    let commit_date = DateTime::parse_from_rfc3339(&raw_date)
        .map_err(|err| fail(format!("invalid committer date '{raw_date}': {err}")))?
        .date_naive();

    Ok(RevisionInfo {
        identifier,
        commit_date,
    })
}
