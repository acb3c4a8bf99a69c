//! Per-run tool context

use std::sync::{Arc, Mutex};

use crate::repository::Repository;
use crate::tracker::Tracker;

/// The feature branch the current run is working on
///
/// Set when a branch is created or a pull request head is looked up; used
/// as the default ref for reads and writes. Cloning shares the cursor.
#[derive(Debug, Clone, Default)]
pub struct BranchCursor(Arc<Mutex<Option<String>>>);

impl BranchCursor {
    pub fn get(&self) -> Option<String> {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn set(&self, branch: impl Into<String>) {
        *self.0.lock().unwrap_or_else(|e| e.into_inner()) = Some(branch.into());
    }
}

/// Shared collaborators for the tools of one pipeline run
#[derive(Clone)]
pub struct RunContext {
    tracker: Arc<dyn Tracker>,
    repo: Arc<dyn Repository>,
    base_branch: String,
    branch: BranchCursor,
}

impl RunContext {
    pub fn new(
        tracker: Arc<dyn Tracker>,
        repo: Arc<dyn Repository>,
        base_branch: impl Into<String>,
    ) -> Self {
        Self {
            tracker,
            repo,
            base_branch: base_branch.into(),
            branch: BranchCursor::default(),
        }
    }

    pub fn tracker(&self) -> &dyn Tracker {
        self.tracker.as_ref()
    }

    pub fn repo(&self) -> &dyn Repository {
        self.repo.as_ref()
    }

    pub fn base_branch(&self) -> &str {
        &self.base_branch
    }

    pub fn branch(&self) -> &BranchCursor {
        &self.branch
    }

    /// Explicit ref if given, else the current feature branch, else base
    pub fn resolve_ref(&self, explicit: Option<&str>) -> String {
        explicit
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .or_else(|| self.branch.get())
            .unwrap_or_else(|| self.base_branch.clone())
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("base_branch", &self.base_branch)
            .field("branch", &self.branch.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeRepository, FakeTracker};

    #[test]
    fn test_resolve_ref() {
        let ctx = RunContext::new(
            Arc::new(FakeTracker::new()),
            Arc::new(FakeRepository::new()),
            "dev",
        );
        assert_eq!(ctx.resolve_ref(None), "dev");

        ctx.branch().set("feature/ABC-1-login");
        assert_eq!(ctx.resolve_ref(None), "feature/ABC-1-login");
        assert_eq!(ctx.resolve_ref(Some("  ")), "feature/ABC-1-login");
        assert_eq!(ctx.resolve_ref(Some("main")), "main");
    }

    #[test]
    fn test_cursor_is_shared_between_clones() {
        let ctx = RunContext::new(
            Arc::new(FakeTracker::new()),
            Arc::new(FakeRepository::new()),
            "dev",
        );
        let clone = ctx.clone();
        clone.branch().set("feature/x");
        assert_eq!(ctx.branch().get().as_deref(), Some("feature/x"));
    }
}
