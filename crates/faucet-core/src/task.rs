//! Task catalog entries.

use serde::{Deserialize, Serialize};

/// A one-off task users complete for a fixed reward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task name.
    pub name: String,
    /// Shown to the user.
    #[serde(default)]
    pub description: String,
    /// Points paid on completion.
    pub reward: i64,
}

impl Task {
    /// Create a task.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>, reward: i64) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            reward,
        }
    }
}
