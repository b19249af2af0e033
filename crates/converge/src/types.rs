//! Core types for declarative reconciliation

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Whether a configured entity should exist
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ensure {
    /// Entity should exist
    #[default]
    Present,
    /// Entity should be deleted
    Absent,
}

/// One attribute that differs between observed and desired state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    /// Configuration field name
    pub field: String,
    /// Observed value, rendered for display
    pub from: String,
    /// Desired value, rendered for display
    pub to: String,
}

impl Change {
    /// Create a change
    pub fn new(field: impl Into<String>, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            from: from.into(),
            to: to.into(),
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} → {}", self.field, self.from, self.to)
    }
}

/// Collects attribute changes. A desired value of `None` means the field is
/// not managed and never produces a change.
#[derive(Debug, Default)]
pub struct ChangeSet {
    changes: Vec<Change>,
}

impl ChangeSet {
    /// Start an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare a scalar field
    pub fn field<T: PartialEq + fmt::Debug>(
        &mut self,
        name: &str,
        current: Option<&T>,
        desired: Option<&T>,
    ) -> &mut Self {
        if let Some(desired) = desired
            && current != Some(desired)
        {
            self.changes.push(Change::new(name, render(current), format!("{desired:?}")));
        }
        self
    }

    /// Compare a field with set semantics (order and duplicates ignored)
    pub fn set(&mut self, name: &str, current: &[String], desired: Option<&[String]>) -> &mut Self {
        if let Some(desired) = desired {
            let have: BTreeSet<&String> = current.iter().collect();
            let want: BTreeSet<&String> = desired.iter().collect();
            if have != want {
                self.changes.push(Change::new(
                    name,
                    format!("{:?}", have.into_iter().collect::<Vec<_>>()),
                    format!("{:?}", want.into_iter().collect::<Vec<_>>()),
                ));
            }
        }
        self
    }

    /// Compare object IDs with set semantics, ignoring ASCII case
    pub fn ids(&mut self, name: &str, current: &[String], desired: Option<&[String]>) -> &mut Self {
        if let Some(desired) = desired {
            let have: BTreeSet<String> = current.iter().map(|id| id.to_ascii_lowercase()).collect();
            let want: BTreeSet<String> = desired.iter().map(|id| id.to_ascii_lowercase()).collect();
            if have != want {
                self.changes.push(Change::new(
                    name,
                    format!("{:?}", have.into_iter().collect::<Vec<_>>()),
                    format!("{:?}", want.into_iter().collect::<Vec<_>>()),
                ));
            }
        }
        self
    }

    /// Compare a field that is only summarized, such as a nested collection
    pub fn summary(&mut self, name: &str, differs: bool, from: impl Into<String>, to: impl Into<String>) -> &mut Self {
        if differs {
            self.changes.push(Change::new(name, from, to));
        }
        self
    }

    /// Whether nothing differs
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Finish and return the changes
    pub fn into_changes(self) -> Vec<Change> {
        self.changes
    }
}

fn render<T: fmt::Debug>(value: Option<&T>) -> String {
    value.map_or_else(|| "(unset)".to_string(), |value| format!("{value:?}"))
}

/// What a plan intends to do with one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Already converged
    None,
    /// Entity will be created
    Create,
    /// Entity will be updated
    Update(Vec<Change>),
    /// Entity will be deleted
    Delete,
}

impl Action {
    /// Whether the action touches the remote system
    pub fn is_change(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Result of applying a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyResult {
    /// No changes needed
    NoChange,
    /// Entity was created with this object ID
    Created { id: String },
    /// Entity was modified
    Modified,
    /// Entity was removed
    Removed,
    /// Apply failed
    Failed { error: String, advice: String },
    /// Apply was skipped
    Skipped { reason: String },
}

impl ApplyResult {
    /// Check if the result represents success (no failure)
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    /// Check if the result represents a change
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Created { .. } | Self::Modified | Self::Removed)
    }
}

/// Result of one resource in an execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceOutcome {
    /// Resource address, e.g. `group.admins`
    pub address: String,
    /// What happened
    pub result: ApplyResult,
}

/// Summary of execution results
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecuteSummary {
    pub created: usize,
    pub modified: usize,
    pub removed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub no_change: usize,
    /// Per-resource results in completion order
    pub outcomes: Vec<ResourceOutcome>,
}

impl ExecuteSummary {
    /// Total number of actual changes made
    pub fn total_changes(&self) -> usize {
        self.created + self.modified + self.removed
    }

    /// Check if execution was fully successful (no failures)
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Total number of resources processed
    pub fn total(&self) -> usize {
        self.created + self.modified + self.removed + self.skipped + self.failed + self.no_change
    }

    /// Add a result to the summary
    pub fn add_result(&mut self, address: &str, result: ApplyResult) {
        match &result {
            ApplyResult::NoChange => self.no_change += 1,
            ApplyResult::Created { .. } => self.created += 1,
            ApplyResult::Modified => self.modified += 1,
            ApplyResult::Removed => self.removed += 1,
            ApplyResult::Failed { .. } => self.failed += 1,
            ApplyResult::Skipped { .. } => self.skipped += 1,
        }
        self.outcomes.push(ResourceOutcome {
            address: address.to_string(),
            result,
        });
    }

    /// Object IDs of created entities, by address
    pub fn created_ids(&self) -> impl Iterator<Item = (&str, &str)> {
        self.outcomes.iter().filter_map(|outcome| match &outcome.result {
            ApplyResult::Created { id } => Some((outcome.address.as_str(), id.as_str())),
            _ => None,
        })
    }

    /// Failed resources with their errors
    pub fn failures(&self) -> impl Iterator<Item = &ResourceOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.result.is_success())
    }
}

/// Options for execution
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Don't make changes, just show what would happen
    pub dry_run: bool,
    /// Number of parallel jobs
    pub jobs: usize,
    /// Log every result at info and list each unconverged change in full
    pub verbose: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            jobs: 4,
            verbose: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_set_ignores_unmanaged() {
        let mut set = ChangeSet::new();
        set.field::<String>("description", Some(&"a".to_string()), None);
        set.set("tags", &["x".to_string()], None);
        assert!(set.is_empty());
    }

    #[test]
    fn test_change_set_field() {
        let mut set = ChangeSet::new();
        set.field("display_name", Some(&"Old".to_string()), Some(&"New".to_string()))
            .field("security_enabled", None, Some(&true))
            .field("mail_enabled", Some(&false), Some(&false));

        let changes = set.into_changes();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0], Change::new("display_name", "\"Old\"", "\"New\""));
        assert_eq!(changes[1].from, "(unset)");
    }

    #[test]
    fn test_change_set_set_semantics() {
        let mut set = ChangeSet::new();
        let current = vec!["b".to_string(), "a".to_string()];
        let same = vec!["a".to_string(), "b".to_string(), "a".to_string()];
        set.set("members", &current, Some(same.as_slice()));
        assert!(set.is_empty());

        let other = vec!["a".to_string()];
        set.set("members", &current, Some(other.as_slice()));
        assert_eq!(set.into_changes().len(), 1);
    }

    #[test]
    fn test_change_set_ids_ignore_case() {
        let mut set = ChangeSet::new();
        let current = vec!["abcdef01-0000-4000-8000-000000000001".to_string()];
        let upper = vec!["ABCDEF01-0000-4000-8000-000000000001".to_string()];
        set.ids("owners", &current, Some(upper.as_slice()));
        assert!(set.is_empty());

        let nobody: Vec<String> = Vec::new();
        set.ids("owners", &current, Some(nobody.as_slice()));
        assert_eq!(set.into_changes().len(), 1);
    }

    #[test]
    fn test_summary_add_result() {
        let mut summary = ExecuteSummary::default();
        summary.add_result("group.a", ApplyResult::Created { id: "g1".into() });
        summary.add_result("group.b", ApplyResult::Modified);
        summary.add_result(
            "group.c",
            ApplyResult::Failed {
                error: "boom".into(),
                advice: String::new(),
            },
        );

        assert_eq!(summary.total(), 3);
        assert_eq!(summary.total_changes(), 2);
        assert!(!summary.is_success());
        assert_eq!(summary.created_ids().collect::<Vec<_>>(), vec![("group.a", "g1")]);
        assert_eq!(summary.failures().count(), 1);
    }

    #[test]
    fn test_ensure_default() {
        assert_eq!(Ensure::default(), Ensure::Present);
    }
}
