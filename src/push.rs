//! Canonical push event, independent of the provider that sent it

use crate::error::PayloadError;
use crate::provider::github::GithubPushPayload;
use crate::provider::gitlab::GitlabPushPayload;

/// Number of leading id characters shown for a commit
pub const SHORT_ID_LEN: usize = 7;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub id: String,
    pub message: String,
    pub committer_name: String,
}

impl Commit {
    pub fn short_id(&self) -> &str {
        // ids are validated to hold at least SHORT_ID_LEN chars on construction
        let end = self
            .id
            .char_indices()
            .nth(SHORT_ID_LEN)
            .map(|(idx, _)| idx)
            .unwrap_or(self.id.len());
        &self.id[..end]
    }

    /// Message up to its first line break.
    pub fn title(&self) -> &str {
        self.message
            .split(['\n', '\r'])
            .next()
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushEvent {
    pub repo_short_name: String,
    pub repo_full_name: String,
    pub pusher_name: String,
    pub forced: bool,
    pub commit_count: i64,
    pub branch: String,
    /// Oldest first, as delivered.
    pub commits: Vec<Commit>,
    /// Web link for the pushed change, when the payload carries one.
    pub link: Option<String>,
}

impl PushEvent {
    pub fn from_github(push: &GithubPushPayload) -> Result<Self, PayloadError> {
        let commits = push
            .commits
            .iter()
            .map(|c| commit(&c.id, &c.message, &c.committer.name))
            .collect::<Result<Vec<_>, _>>()?;

        let link = if commits.len() == 1 {
            push.head_commit
                .as_ref()
                .and_then(|c| c.url.clone())
                .or_else(|| push.commits[0].url.clone())
        } else {
            push.compare.clone()
        };

        Ok(Self {
            repo_short_name: push.repository.name.clone(),
            repo_full_name: push.repository.full_name.clone(),
            pusher_name: push.pusher.name.clone(),
            forced: push.forced,
            commit_count: commits.len() as i64,
            branch: branch_name(&push.reference).to_string(),
            commits,
            link,
        })
    }

    /// GitLab payloads carry no force-push flag, so `forced` is always false.
    pub fn from_gitlab(push: &GitlabPushPayload) -> Result<Self, PayloadError> {
        let commits = push
            .commits
            .iter()
            .map(|c| commit(&c.id, &c.message, &c.author.name))
            .collect::<Result<Vec<_>, _>>()?;

        let link = match (push.total_commits_count, push.commits.first()) {
            (1, Some(first)) => first.url.clone(),
            _ => push
                .project
                .web_url
                .as_ref()
                .map(|base| format!("{}/compare/{}...{}", base, push.before, push.after)),
        };

        Ok(Self {
            repo_short_name: push.project.name.clone(),
            repo_full_name: push.project.path_with_namespace.clone(),
            pusher_name: push.user_name.clone(),
            forced: false,
            commit_count: push.total_commits_count,
            branch: branch_name(&push.reference).to_string(),
            commits,
            link,
        })
    }
}

/// Last segment of a ref path: `refs/heads/feature/x` -> `x`.
pub fn branch_name(reference: &str) -> &str {
    reference.rsplit('/').next().unwrap_or(reference)
}

fn commit(id: &str, message: &str, committer_name: &str) -> Result<Commit, PayloadError> {
    if id.chars().count() < SHORT_ID_LEN {
        return Err(PayloadError::MalformedCommitId(id.to_string()));
    }
    Ok(Commit {
        id: id.to_string(),
        message: message.to_string(),
        committer_name: committer_name.to_string(),
    })
}
