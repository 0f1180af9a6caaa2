//! Inbound events as read by `autotest serve`.

use autotest_core::CommitTarget;
use serde::Deserialize;

/// One line of input: a parsed webhook, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InboundEvent {
    Push(CommitTarget),
    Comment(CommitTarget),
}
