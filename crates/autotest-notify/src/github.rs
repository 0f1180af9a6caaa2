//! Posts markdown comments through the GitHub REST API.

use async_trait::async_trait;
use autotest_core::ports::CommentChannel;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

const USER_AGENT: &str = "AutoTest";
const LOG_PREVIEW_LEN: usize = 80;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Invalid message: {0}")]
    InvalidMessage(String),
    #[error("Delivery rejected: {0}")]
    Rejected(String),
}

impl From<NotifyError> for autotest_core::Error {
    fn from(err: NotifyError) -> Self {
        autotest_core::Error::Notify(err.to_string())
    }
}

#[derive(Debug, Serialize)]
struct CommentBody<'a> {
    body: &'a str,
}

/// First line of a message, clipped for logs.
fn preview(markdown: &str) -> String {
    let line = markdown.lines().next().unwrap_or_default();
    if line.chars().count() > LOG_PREVIEW_LEN {
        let clipped: String = line.chars().take(LOG_PREVIEW_LEN).collect();
        format!("{}...", clipped)
    } else {
        line.to_string()
    }
}

/// Comment channel for GitHub commit comments.
///
/// With `postback` disabled, messages are validated and logged but never sent.
pub struct GitHubCommentChannel {
    client: reqwest::Client,
    token: Option<String>,
    postback: bool,
}

impl GitHubCommentChannel {
    pub fn new(token: Option<String>, postback: bool) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            postback,
        }
    }

    /// Value for the `Authorization` header; bare tokens get the `token ` scheme.
    fn authorization(&self) -> Option<String> {
        self.token.as_ref().map(|t| {
            if t.starts_with("token ") || t.starts_with("Bearer ") {
                t.clone()
            } else {
                format!("token {}", t)
            }
        })
    }

    pub async fn post_markdown(&self, url: &str, markdown: &str) -> Result<(), NotifyError> {
        if url.is_empty() {
            return Err(NotifyError::InvalidMessage("url is required".to_string()));
        }
        if markdown.is_empty() {
            return Err(NotifyError::InvalidMessage("message is required".to_string()));
        }

        info!(url = %url, message = %preview(markdown), "Posting markdown");
        if !self.postback {
            info!(url = %url, "Send skipped; postback disabled");
            return Ok(());
        }

        let mut request = self
            .client
            .post(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .json(&CommentBody { body: markdown });
        if let Some(auth) = self.authorization() {
            request = request.header(reqwest::header::AUTHORIZATION, auth);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected(format!("{}: {}", status, body)));
        }

        debug!(url = %url, "Comment posted");
        Ok(())
    }
}

#[async_trait]
impl CommentChannel for GitHubCommentChannel {
    async fn post_message(&self, url: &str, markdown: &str) -> autotest_core::Result<bool> {
        match self.post_markdown(url, markdown).await {
            Ok(()) => Ok(true),
            Err(NotifyError::Rejected(reason)) => {
                warn!(url = %url, reason = %reason, "Comment rejected");
                Ok(false)
            }
            Err(NotifyError::InvalidMessage(reason)) => {
                error!(url = %url, reason = %reason, "Comment not posted");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_clips_first_line() {
        assert_eq!(preview("short\nsecond"), "short");
        let long = "x".repeat(100);
        assert_eq!(preview(&long).len(), LOG_PREVIEW_LEN + 3);
    }

    #[test]
    fn test_authorization_scheme() {
        let channel = GitHubCommentChannel::new(Some("abc".to_string()), true);
        assert_eq!(channel.authorization().as_deref(), Some("token abc"));
        let channel = GitHubCommentChannel::new(Some("token abc".to_string()), true);
        assert_eq!(channel.authorization().as_deref(), Some("token abc"));
        assert!(GitHubCommentChannel::new(None, true).authorization().is_none());
    }
}
