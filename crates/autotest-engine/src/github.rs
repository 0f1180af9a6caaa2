//! Push and comment handling for GitHub-hosted courses.
//!
//! Pushes are graded speculatively. Results are only shown when a student asks
//! for them in a commit comment, subject to a per-deliverable quota, or when the
//! grader flags them for unconditional postback (build and lint failures).

use crate::autotest::AutoTest;
use async_trait::async_trait;
use autotest_core::ports::{CommentChannel, DataStore, ExecutionProcessor};
use autotest_core::util::{sha_human, took_human};
use autotest_core::{
    AuthInfo, CommitKey, CommitTarget, ContainerConfig, Error, ExecutionResult, FeedbackGrant,
    JobDescriptor, Result, Tier,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub const MSG_SPECIFY_DELIVERABLE: &str =
    "Please specify a deliverable so AutoTest knows what to run against (e.g., #c0).";
pub const MSG_PRIOR_COURSE: &str =
    "This commit appears to be from a prior version of the course; AutoTest request cancelled.";
pub const MSG_FORCE_ADMIN_ONLY: &str = "Only admins can use the #force flag.";
pub const MSG_SILENT_ADMIN_ONLY: &str = "Only admins can use the #silent flag.";
pub const MSG_NOT_OPEN: &str = "This deliverable is not yet open for grading.";
pub const MSG_CLOSED: &str = "This deliverable is closed to grading.";

pub fn still_queued_message(deliv_id: &str) -> String {
    format!(
        "This commit is still queued for processing against {}. \
         Your results will be posted here as soon as they are ready.",
        deliv_id
    )
}

pub fn queued_message(deliv_id: &str) -> String {
    format!(
        "This commit has been queued for processing against {}. \
         Your results will be posted here as soon as they are ready.",
        deliv_id
    )
}

pub fn wait_message(delay: &str) -> String {
    format!("You must wait {} before requesting feedback.", delay)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// Account the grader comments as; its own comments are ignored.
    pub bot_name: String,
    /// Events from any other org are refused.
    #[serde(default)]
    pub org: Option<String>,
}

/// Post `message` to the target's postback URL. `#silent` targets succeed without posting.
async fn post_to_github(channel: &dyn CommentChannel, target: &CommitTarget, message: &str) -> bool {
    if target.is_silent() {
        info!(
            sha = %sha_human(&target.commit_sha),
            "Post skipped; #silent"
        );
        return true;
    }
    match channel.post_message(&target.postback_url, message).await {
        Ok(posted) => posted,
        Err(e) => {
            error!(url = %target.postback_url, error = %e, "Failed to post comment");
            false
        }
    }
}

/// Result text shown to students.
fn format_feedback(result: &ExecutionResult) -> &str {
    result.feedback()
}

/// Checked-out comment: the deliverable it targets and who asked.
struct CommentContext {
    deliv_id: String,
    container: ContainerConfig,
    auth: AuthInfo,
}

/// The push/comment state machine.
pub struct GitHubAutoTest {
    autotest: Arc<AutoTest>,
    channel: Arc<dyn CommentChannel>,
    config: GitHubConfig,
}

impl GitHubAutoTest {
    pub fn new(autotest: Arc<AutoTest>, channel: Arc<dyn CommentChannel>, config: GitHubConfig) -> Self {
        Self {
            autotest,
            channel,
            config,
        }
    }

    pub fn autotest(&self) -> &Arc<AutoTest> {
        &self.autotest
    }

    fn store(&self) -> &dyn DataStore {
        self.autotest.store().as_ref()
    }

    async fn post(&self, target: &CommitTarget, message: &str) -> bool {
        post_to_github(self.channel.as_ref(), target, message).await
    }

    fn org_mismatch(&self, target: &CommitTarget) -> bool {
        matches!(
            (&self.config.org, &target.org_id),
            (Some(expected), Some(actual)) if expected != actual
        )
    }

    async fn container_config(&self, deliv_id: &str) -> Option<ContainerConfig> {
        match self.autotest.portal().container_config(deliv_id).await {
            Ok(config) => config,
            Err(e) => {
                error!(deliv = %deliv_id, error = %e, "Failed to fetch container config");
                None
            }
        }
    }

    async fn auth(&self, person_id: &str) -> AuthInfo {
        match self.autotest.portal().is_staff(person_id).await {
            Ok(auth) => auth,
            Err(e) => {
                error!(person = %person_id, error = %e, "Failed to look up staff status");
                AuthInfo::default()
            }
        }
    }

    async fn default_deliverable(&self) -> Option<String> {
        match self.autotest.portal().default_deliverable_id().await {
            Ok(deliv) => deliv,
            Err(e) => {
                error!(error = %e, "Failed to fetch default deliverable");
                None
            }
        }
    }

    /// The deliverable a push is graded against (explicit, else the course
    /// default) and its container config.
    async fn resolve_push(&self, target: &CommitTarget) -> Result<(String, ContainerConfig)> {
        let deliv_id = match target.deliv_id.clone() {
            Some(deliv) => deliv,
            None => self
                .default_deliverable()
                .await
                .ok_or_else(|| Error::DeliverableNotFound(target.repo_id.clone()))?,
        };
        let container = self
            .container_config(&deliv_id)
            .await
            .ok_or_else(|| Error::ContainerConfigMissing(deliv_id.clone()))?;
        Ok((deliv_id, container))
    }

    async fn save_push(&self, target: &CommitTarget) {
        if let Err(e) = self.store().save_push(target).await {
            error!(commit = %target.commit_url, error = %e, "Failed to save push");
        }
    }

    async fn save_comment(&self, target: &CommitTarget) {
        if let Err(e) = self.store().save_comment(target).await {
            error!(commit = %target.commit_url, error = %e, "Failed to save comment");
        }
    }

    /// Grade a pushed commit against the applicable deliverable and its regressions.
    ///
    /// Returns `Ok(false)` when nothing was scheduled. Only a target with no
    /// commit identity is an error.
    pub async fn handle_push_event(&self, target: CommitTarget) -> Result<bool> {
        target.validate()?;
        info!(
            repo = %target.repo_id,
            sha = %sha_human(&target.commit_sha),
            ref_name = %target.ref_name,
            "Push received"
        );

        if self.org_mismatch(&target) {
            warn!(repo = %target.repo_id, org = ?target.org_id, "Push from another org ignored");
            return Ok(false);
        }

        self.save_push(&target).await;

        let (deliv_id, container) = match self.resolve_push(&target).await {
            Ok(resolved) => resolved,
            Err(e) => {
                info!(repo = %target.repo_id, error = %e, "Push not scheduled");
                return Ok(false);
            }
        };
        if container.is_closed_at(target.timestamp) {
            info!(deliv = %deliv_id, repo = %target.repo_id, "Push not scheduled; deliverable closed");
            return Ok(false);
        }

        let regressions = container.regression_deliv_ids.clone();
        let job = JobDescriptor::new(deliv_id.clone(), target.clone(), container);
        self.autotest.enqueue(Tier::Standard, job).await;

        for regression_id in regressions {
            match self.container_config(&regression_id).await {
                Some(regression) => {
                    let job = JobDescriptor::new(regression_id, target.clone(), regression);
                    self.autotest.enqueue(Tier::Regression, job).await;
                }
                None => warn!(deliv = %regression_id, "Regression skipped; no container config"),
            }
        }

        self.autotest.tick().await;
        Ok(true)
    }

    /// Gate a comment. Posts an explanation where the commenter deserves one.
    async fn check_comment_preconditions(&self, target: &CommitTarget) -> Option<CommentContext> {
        let person = target.person_id.as_deref().unwrap_or_default();

        if person == self.config.bot_name && !target.is_force() {
            debug!("Comment by bot ignored");
            return None;
        }
        if !target.bot_mentioned {
            debug!(person = %person, "Comment does not mention bot");
            return None;
        }

        let container = match &target.deliv_id {
            Some(deliv) => self.container_config(deliv).await.map(|c| (deliv.clone(), c)),
            None => None,
        };
        let Some((deliv_id, container)) = container else {
            info!(person = %person, deliv = ?target.deliv_id, "Comment names no known deliverable");
            self.post(target, MSG_SPECIFY_DELIVERABLE).await;
            return None;
        };

        if self.org_mismatch(target) {
            info!(person = %person, org = ?target.org_id, "Comment from another org");
            self.post(target, MSG_PRIOR_COURSE).await;
            return None;
        }

        let auth = self.auth(person).await;
        if !auth.is_privileged() {
            let refusal = if target.is_force() {
                Some(MSG_FORCE_ADMIN_ONLY)
            } else if target.is_silent() {
                Some(MSG_SILENT_ADMIN_ONLY)
            } else if !container.is_open_at(target.timestamp) {
                Some(MSG_NOT_OPEN)
            } else if container.is_closed_at(target.timestamp) {
                Some(MSG_CLOSED)
            } else {
                None
            };
            if let Some(message) = refusal {
                info!(person = %person, deliv = %deliv_id, reason = %message, "Comment refused");
                self.post(target, message).await;
                return None;
            }
        }

        Some(CommentContext {
            deliv_id,
            container,
            auth,
        })
    }

    /// Handle a commit comment mentioning the bot.
    ///
    /// Returns `Ok(false)` when the comment failed its preconditions.
    pub async fn handle_comment_event(&self, target: CommitTarget) -> Result<bool> {
        target.validate()?;
        info!(
            person = ?target.person_id,
            sha = %sha_human(&target.commit_sha),
            "Comment received"
        );

        let Some(ctx) = self.check_comment_preconditions(&target).await else {
            return Ok(false);
        };

        let mut target = target;
        target.ref_name = match self.store().get_push_record(&target.commit_url).await {
            Ok(Some(push)) => push.ref_name,
            Ok(None) => String::new(),
            Err(e) => {
                warn!(commit = %target.commit_url, error = %e, "Failed to read push record");
                String::new()
            }
        };

        let previous = match self.store().get_result(&target.commit_url, &ctx.deliv_id).await {
            Ok(result) => result,
            Err(e) => {
                error!(commit = %target.commit_url, error = %e, "Failed to read result");
                None
            }
        };

        if ctx.auth.is_privileged() {
            target.admin_request = true;
            if target.is_force() {
                info!(person = ?target.person_id, deliv = %ctx.deliv_id, "Staff request with #force");
                self.process_comment(&target, &ctx, None).await;
            } else {
                self.process_comment(&target, &ctx, previous).await;
            }
        } else {
            target.admin_request = false;
            self.handle_comment_student(&target, &ctx, previous).await;
        }

        self.autotest.tick().await;
        Ok(true)
    }

    async fn handle_comment_student(
        &self,
        target: &CommitTarget,
        ctx: &CommentContext,
        previous: Option<ExecutionResult>,
    ) {
        let person = target.person_id.as_deref().unwrap_or_default();
        let delay = self
            .request_feedback_delay(&ctx.deliv_id, person, target.timestamp)
            .await;
        let paid = match self
            .store()
            .get_feedback_grant_for_commit(&target.commit_url, &ctx.deliv_id, person)
            .await
        {
            Ok(grant) => grant.is_some(),
            Err(e) => {
                error!(person = %person, error = %e, "Failed to read feedback grant");
                false
            }
        };

        if !paid && let Some(delay) = delay {
            info!(
                person = %person,
                deliv = %ctx.deliv_id,
                delay = %delay,
                sha = %sha_human(&target.commit_sha),
                "Feedback request too early"
            );
            self.post(target, &wait_message(&delay)).await;
            return;
        }

        self.process_comment(target, ctx, previous).await;
    }

    async fn process_comment(
        &self,
        target: &CommitTarget,
        ctx: &CommentContext,
        previous: Option<ExecutionResult>,
    ) {
        match previous {
            Some(result) => self.process_comment_exists(target, ctx, &result).await,
            None => self.process_comment_new(target, ctx).await,
        }
    }

    async fn process_comment_exists(&self, target: &CommitTarget, ctx: &CommentContext, result: &ExecutionResult) {
        let person = target.person_id.as_deref().unwrap_or_default();
        info!(person = %person, deliv = %ctx.deliv_id, "Result exists; posting");

        self.post(target, format_feedback(result)).await;
        self.save_comment(target).await;

        if result.output.postback_on_complete {
            debug!(person = %person, "Free postback result; quota not charged");
            return;
        }
        match self
            .store()
            .get_feedback_grant_for_commit(&target.commit_url, &ctx.deliv_id, person)
            .await
        {
            Ok(Some(_)) => debug!(person = %person, "Already charged for this commit"),
            Ok(None) => {
                let grant = FeedbackGrant::standard(
                    person,
                    ctx.deliv_id.clone(),
                    target.commit_url.clone(),
                    target.timestamp,
                );
                if let Err(e) = self.store().save_feedback_grant(&grant).await {
                    error!(person = %person, error = %e, "Failed to save feedback grant");
                }
            }
            Err(e) => error!(person = %person, error = %e, "Failed to read feedback grant"),
        }
    }

    async fn process_comment_new(&self, target: &CommitTarget, ctx: &CommentContext) {
        let key = CommitKey::new(target.commit_url.clone(), ctx.deliv_id.clone());
        let message = if self.autotest.scheduler().is_on_queue(&key).await {
            still_queued_message(&ctx.deliv_id)
        } else {
            match self.store().get_push_record(&target.commit_url).await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    warn!(commit = %target.commit_url, "No push recorded for comment; saving one");
                    self.save_push(target).await;
                }
                Err(e) => warn!(commit = %target.commit_url, error = %e, "Failed to read push record"),
            }
            queued_message(&ctx.deliv_id)
        };

        self.save_comment(target).await;
        self.post(target, &message).await;

        let job = JobDescriptor::new(ctx.deliv_id.clone(), target.clone(), ctx.container.clone());
        self.autotest.enqueue(Tier::Standard, job).await;
        self.autotest.scheduler().promote_if_needed(&key).await;
    }

    /// Time a student must still wait before their next chargeable request,
    /// or `None` if they may ask now. Staff never wait.
    pub async fn request_feedback_delay(
        &self,
        deliv_id: &str,
        person_id: &str,
        requested_at: DateTime<Utc>,
    ) -> Option<String> {
        if self.auth(person_id).await.is_privileged() {
            return None;
        }

        let latest = match self.store().get_latest_feedback_grant(deliv_id, person_id).await {
            Ok(latest) => latest?,
            Err(e) => {
                error!(person = %person_id, error = %e, "Failed to read latest feedback grant");
                return None;
            }
        };
        let student_delay = self
            .container_config(deliv_id)
            .await
            .map(|c| c.student_delay)
            .unwrap_or(0);

        let next_allowed = latest.timestamp + Duration::seconds(student_delay);
        if requested_at > next_allowed {
            None
        } else {
            Some(took_human(requested_at, next_allowed))
        }
    }
}

/// Posts finished results: free postbacks always, quota-gated results only
/// when someone asked for them.
pub struct GitHubExecutionProcessor {
    store: Arc<dyn DataStore>,
    channel: Arc<dyn CommentChannel>,
}

impl GitHubExecutionProcessor {
    pub fn new(store: Arc<dyn DataStore>, channel: Arc<dyn CommentChannel>) -> Self {
        Self { store, channel }
    }
}

#[async_trait]
impl ExecutionProcessor for GitHubExecutionProcessor {
    async fn process_execution(&self, result: &ExecutionResult) -> Result<()> {
        let target = &result.input.target;

        if result.output.postback_on_complete {
            info!(
                deliv = %result.deliv_id,
                repo = %result.repo_id,
                sha = %sha_human(&result.commit_sha),
                "Posting free result"
            );
            post_to_github(self.channel.as_ref(), target, format_feedback(result)).await;
            return Ok(());
        }

        let Some(requester) = self
            .store
            .get_comment_record(&result.commit_url, &result.deliv_id)
            .await?
        else {
            info!(
                deliv = %result.deliv_id,
                repo = %result.repo_id,
                sha = %sha_human(&result.commit_sha),
                "Result not requested; held"
            );
            return Ok(());
        };

        let person = requester.person_id.clone().unwrap_or_default();
        info!(
            deliv = %result.deliv_id,
            sha = %sha_human(&result.commit_sha),
            person = %person,
            "Posting requested result"
        );
        post_to_github(self.channel.as_ref(), target, format_feedback(result)).await;

        let charged = self
            .store
            .get_feedback_grant_for_commit(&result.commit_url, &result.deliv_id, &person)
            .await?
            .is_some();
        if !charged {
            let grant = FeedbackGrant::standard(
                person,
                result.deliv_id.clone(),
                result.commit_url.clone(),
                requester.timestamp,
            );
            self.store.save_feedback_grant(&grant).await?;
        }
        Ok(())
    }
}
