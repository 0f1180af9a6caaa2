//! Git and filesystem ownership via the host's command-line tools.

use async_trait::async_trait;
use autotest_core::ports::SourceControl;
use autotest_core::{Error, Result};
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info};
use url::Url;

/// Shells out to `git` and `chown`.
pub struct GitClient {
    token: Option<String>,
}

impl GitClient {
    /// `token` may carry the `token ` prefix used in API headers; it is stripped.
    pub fn new(token: Option<String>) -> Self {
        let token = token
            .map(|t| t.trim_start_matches("token ").trim().to_string())
            .filter(|t| !t.is_empty());
        Self { token }
    }

    async fn run(&self, program: &str, args: &[&str], what: &str) -> Result<()> {
        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|e| Error::Git(format!("Failed to spawn {}: {}", program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = match &self.token {
                Some(token) => stderr.replace(token.as_str(), "***"),
                None => stderr.into_owned(),
            };
            return Err(Error::Git(format!(
                "{} failed ({}): {}",
                what,
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

/// Put `token` in the userinfo of an http(s) clone URL.
pub fn authenticated_url(clone_url: &str, token: Option<&str>) -> Result<String> {
    let Some(token) = token else {
        return Ok(clone_url.to_string());
    };
    let mut url = Url::parse(clone_url)
        .map_err(|e| Error::InvalidTarget(format!("Bad clone url: {}", e)))?;
    url.set_username(token)
        .map_err(|_| Error::InvalidTarget("Clone url cannot carry credentials".to_string()))?;
    Ok(url.to_string())
}

/// Arguments for `git clone`; `--` keeps a hostile URL from parsing as an option.
fn clone_args<'a>(url: &'a str, dir: &'a str) -> [&'a str; 5] {
    ["clone", "--quiet", "--", url, dir]
}

/// A commit to check out must look like a revision, not a flag.
pub fn validate_revision(commit_sha: &str) -> Result<()> {
    if commit_sha.is_empty() || commit_sha.starts_with('-') {
        return Err(Error::InvalidTarget(format!(
            "Refusing to check out revision {:?}",
            commit_sha
        )));
    }
    Ok(())
}

#[async_trait]
impl SourceControl for GitClient {
    async fn clone_repo(&self, clone_url: &str, dir: &Path) -> Result<()> {
        info!(url = %clone_url, dir = %dir.display(), "Cloning repository");
        let authed = authenticated_url(clone_url, self.token.as_deref())?;
        let dir = dir.to_string_lossy();
        self.run("git", &clone_args(&authed, &dir), "git clone")
            .await
    }

    async fn checkout(&self, dir: &Path, commit_sha: &str) -> Result<()> {
        validate_revision(commit_sha)?;
        debug!(dir = %dir.display(), sha = %commit_sha, "Checking out commit");
        let dir = dir.to_string_lossy();
        self.run(
            "git",
            &["-C", &dir, "checkout", "--quiet", commit_sha],
            "git checkout",
        )
        .await
    }

    async fn chown(&self, dir: &Path, uid: u32) -> Result<()> {
        let uid = uid.to_string();
        let dir = dir.to_string_lossy();
        self.run("chown", &["-R", "--", &uid, &dir], "chown").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_injected_into_clone_url() {
        let url = authenticated_url("https://github.com/org/repo.git", Some("s3cret")).unwrap();
        assert_eq!(url, "https://s3cret@github.com/org/repo.git");
    }

    #[test]
    fn test_no_token_leaves_url() {
        let url = authenticated_url("https://github.com/org/repo.git", None).unwrap();
        assert_eq!(url, "https://github.com/org/repo.git");
    }

    #[test]
    fn test_token_prefix_stripped() {
        let client = GitClient::new(Some("token abc".to_string()));
        assert_eq!(client.token.as_deref(), Some("abc"));
        assert!(GitClient::new(Some("  ".to_string())).token.is_none());
    }

    #[test]
    fn test_bad_clone_url() {
        assert!(authenticated_url("not a url", Some("t")).is_err());
    }

    #[test]
    fn test_clone_url_follows_separator() {
        let args = clone_args("--upload-pack=touch /tmp/x", "/work/assn");
        assert_eq!(args, ["clone", "--quiet", "--", "--upload-pack=touch /tmp/x", "/work/assn"]);
    }

    #[test]
    fn test_revision_must_not_look_like_flag() {
        assert!(validate_revision("abc123").is_ok());
        assert!(matches!(validate_revision("--orphan"), Err(Error::InvalidTarget(_))));
        assert!(matches!(validate_revision(""), Err(Error::InvalidTarget(_))));
    }

    #[tokio::test]
    async fn test_checkout_rejects_flag_before_running_git() {
        let dir = tempfile::TempDir::new().unwrap();
        let git = GitClient::new(None);
        let result = git.checkout(dir.path(), "-b").await;
        assert!(matches!(result, Err(Error::InvalidTarget(_))));
    }
}
