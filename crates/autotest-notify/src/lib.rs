//! Comment channel for AutoTest.

pub mod github;

pub use github::{GitHubCommentChannel, NotifyError};
