use serde::{Deserialize, Serialize};

/// Lifecycle status shared by scan passes and per-site execution logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Queued,
    Running,
    Succeeded,
    /// Site finished cleanly but yielded no listings.
    Empty,
    /// Site failed after some listings were already reconciled.
    Partial,
    Failed,
    Cancelled,
}

impl RunStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::Running => "running",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Empty => "empty",
            RunStatus::Partial => "partial",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal status of one site run.
    #[must_use]
    pub fn for_site(item_count: usize, failed: bool) -> Self {
        match (item_count, failed) {
            (0, true) => RunStatus::Failed,
            (_, true) => RunStatus::Partial,
            (0, false) => RunStatus::Empty,
            (_, false) => RunStatus::Succeeded,
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, RunStatus::Queued | RunStatus::Running)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    Manual,
    Scheduled,
}

impl Trigger {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Trigger::Manual => "manual",
            Trigger::Scheduled => "scheduled",
        }
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn site_status_reflects_items_and_failure() {
        assert_eq!(RunStatus::for_site(0, true), RunStatus::Failed);
        assert_eq!(RunStatus::for_site(12, true), RunStatus::Partial);
        assert_eq!(RunStatus::for_site(0, false), RunStatus::Empty);
        assert_eq!(RunStatus::for_site(3, false), RunStatus::Succeeded);
    }

    #[test]
    fn terminal_statuses() {
        assert!(!RunStatus::Queued.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Cancelled.is_terminal());
    }

    #[test]
    fn serde_uses_lowercase_names() {
        assert_eq!(
            serde_json::to_string(&RunStatus::Partial).unwrap(),
            "\"partial\""
        );
        assert_eq!(Trigger::Scheduled.to_string(), "scheduled");
    }
}
