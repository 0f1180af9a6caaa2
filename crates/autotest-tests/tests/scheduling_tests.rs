//! Scheduling through the push and comment entry points.

use autotest_core::result::FEEDBACK_DEFAULT_FAIL;
use autotest_engine::github::still_queued_message;
use autotest_scheduler::SchedulerConfig;
use autotest_tests::{ConfigFixture, ScriptedRunner, TargetFixture, TestContext};
use pretty_assertions::assert_eq;
use tokio_test::assert_ok;

fn no_capacity() -> SchedulerConfig {
    SchedulerConfig {
        express: 0,
        standard: 0,
        regression: 0,
    }
}

#[tokio::test]
async fn test_fresh_push_queues_on_standard() {
    let ctx = TestContext::new(ConfigFixture::course(0), no_capacity(), ScriptedRunner::new());
    let push = TargetFixture::push("repo1", "c1c1c1c1");

    assert!(assert_ok!(ctx.github.handle_push_event(push.clone()).await));

    let record = ctx.push_record(&push.commit_url).await;
    assert_eq!(record.map(|r| r.commit_sha), Some("c1c1c1c1".to_string()));
    let status = ctx.status().await;
    assert_eq!(status.standard, 1);
    assert_eq!(status.express + status.regression + status.running, 0);
}

#[tokio::test]
async fn test_push_enqueues_regression_deliverables() {
    let ctx = TestContext::new(
        ConfigFixture::course_with_regression(),
        no_capacity(),
        ScriptedRunner::new(),
    );

    assert!(assert_ok!(ctx.github.handle_push_event(TargetFixture::push("repo1", "abc")).await));

    let status = ctx.status().await;
    assert_eq!(status.standard, 1);
    assert_eq!(status.regression, 1);
}

#[tokio::test]
async fn test_push_without_container_config_dropped() {
    let mut course = ConfigFixture::course(0);
    course.default_deliverable = Some("d9".to_string());
    let ctx = TestContext::with_course(course);
    let push = TargetFixture::push("repo1", "abc");

    assert!(!assert_ok!(ctx.github.handle_push_event(push.clone()).await));
    assert!(ctx.push_record(&push.commit_url).await.is_some());
    assert!(ctx.wait_idle().await);
    assert!(ctx.runner.executed().is_empty());
}

#[tokio::test]
async fn test_capacity_never_exceeded() {
    let capacities = SchedulerConfig {
        express: 1,
        standard: 1,
        regression: 1,
    };
    let ctx = TestContext::new(ConfigFixture::course(0), capacities, ScriptedRunner::held());

    for i in 0..8 {
        let sha = format!("sha{:04}", i);
        ctx.github
            .handle_push_event(TargetFixture::push("repo1", &sha))
            .await
            .unwrap();
        assert!(ctx.status().await.running <= 3);
    }

    ctx.runner.release(8);
    assert!(ctx.wait_idle().await);
    assert_eq!(ctx.runner.executed().len(), 8);
    assert!(ctx.runner.peak() <= 3);
}

#[tokio::test]
async fn test_same_commit_scheduled_once() {
    let ctx = TestContext::new(ConfigFixture::course(0), no_capacity(), ScriptedRunner::new());
    let push = TargetFixture::push("repo1", "dupe01");

    ctx.github.handle_push_event(push.clone()).await.unwrap();
    ctx.github.handle_push_event(push).await.unwrap();
    ctx.github
        .handle_comment_event(TargetFixture::comment("student", "repo1", "dupe01"))
        .await
        .unwrap();

    let status = ctx.status().await;
    assert_eq!(
        status.express + status.standard + status.regression + status.running,
        1
    );
    assert_eq!(ctx.channel.messages(), vec![still_queued_message("d1")]);
}

#[tokio::test]
async fn test_second_tick_changes_nothing() {
    let ctx = TestContext::new(ConfigFixture::course(0), SchedulerConfig::default(), ScriptedRunner::held());
    for sha in ["a1", "a2", "a3", "a4", "a5", "a6"] {
        ctx.github
            .handle_push_event(TargetFixture::push("repo1", sha))
            .await
            .unwrap();
    }

    let before = ctx.status().await;
    assert_eq!(ctx.autotest().tick().await, 0);
    assert_eq!(ctx.status().await, before);

    ctx.runner.release(6);
    assert!(ctx.wait_idle().await);
}

#[tokio::test]
async fn test_panicking_grader_releases_slot() {
    let broken = TargetFixture::push("repo1", "bad000");
    let ctx = TestContext::new(
        ConfigFixture::course(0),
        SchedulerConfig::default(),
        ScriptedRunner::new().panicking_on(&broken.commit_url),
    );

    ctx.github.handle_push_event(broken).await.unwrap();
    assert!(ctx.wait_idle().await);
    assert_eq!(ctx.channel.messages(), vec![FEEDBACK_DEFAULT_FAIL.to_string()]);

    ctx.github
        .handle_push_event(TargetFixture::push("repo1", "good00"))
        .await
        .unwrap();
    assert!(ctx.wait_idle().await);
    assert_eq!(ctx.runner.executed().len(), 2);
}
