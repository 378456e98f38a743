//! Stage specification: a named stage plus its prerequisite edges.

use crate::stages::Stage;
use std::collections::HashSet;
use std::sync::Arc;

/// Specification for a single stage in the graph.
///
/// Prerequisites are first-class edges, identifiers rather than ordering
/// side effects, so the scheduler can be unit-tested against synthetic
/// graphs independent of the real stage set.
#[derive(Debug, Clone)]
pub struct StageSpec {
    /// The unique name of the stage.
    pub name: String,
    /// The stage implementation.
    pub runner: Arc<dyn Stage>,
    /// Names of stages that must pass before this one starts.
    pub prerequisites: HashSet<String>,
}

impl StageSpec {
    /// Creates a stage specification with no prerequisites.
    #[must_use]
    pub fn new(name: impl Into<String>, runner: Arc<dyn Stage>) -> Self {
        Self {
            name: name.into(),
            runner,
            prerequisites: HashSet::new(),
        }
    }

    /// Adds a prerequisite.
    #[must_use]
    pub fn with_prerequisite(mut self, prerequisite: impl Into<String>) -> Self {
        self.prerequisites.insert(prerequisite.into());
        self
    }

    /// Sets all prerequisites at once.
    #[must_use]
    pub fn with_prerequisites(
        mut self,
        prerequisites: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.prerequisites = prerequisites.into_iter().map(Into::into).collect();
        self
    }
}
