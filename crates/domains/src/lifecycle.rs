//! Recipe lifecycle state machine
//!
//! Pure decision logic - NO IO, only state transitions.
//!
//! ```text
//!   private --submit--> pending --approve--> public (locked)
//!      ^                   |
//!      +------reject-------+
//! ```
//!
//! Every (state, action) pair not drawn above is rejected.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, Result};
use crate::models::Visibility;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleAction {
    SubmitForReview,
    Approve,
    Reject,
}

impl fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LifecycleAction::SubmitForReview => "submit for review",
            LifecycleAction::Approve => "approve",
            LifecycleAction::Reject => "reject",
        })
    }
}

/// The state a recipe lands in after a legal action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: Visibility,
    pub to: Visibility,
    /// Value of `is_immutable` after the transition
    pub lock: bool,
}

/// Decides the outcome of `action` on a recipe currently in `from`.
pub fn decide(from: Visibility, action: LifecycleAction) -> Result<Transition> {
    let (to, lock) = match (from, action) {
        (Visibility::Private, LifecycleAction::SubmitForReview) => (Visibility::Pending, false),
        (Visibility::Pending, LifecycleAction::Approve) => (Visibility::Public, true),
        (Visibility::Pending, LifecycleAction::Reject) => (Visibility::Private, false),
        _ => return Err(DomainError::InvalidTransition { from, action }),
    };
    Ok(Transition { from, to, lock })
}
