//! Filtered, grouped presentation of a collection.

use roster_remote::Record;
use serde::{Deserialize, Serialize};

/// Group key for records without a course.
pub const UNASSIGNED: &str = "Unassigned";

/// How course names are folded into group keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKeyPolicy {
    /// Courses differing only in case share a group named after the first
    /// spelling encountered
    #[default]
    CaseInsensitive,
    /// Exact (trimmed) course names
    CaseSensitive,
}

impl GroupKeyPolicy {
    fn fold(self, course: &str) -> String {
        match self {
            GroupKeyPolicy::CaseInsensitive => course.to_lowercase(),
            GroupKeyPolicy::CaseSensitive => course.to_string(),
        }
    }
}

/// Records sharing one course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Group {
    pub key: String,
    pub records: Vec<Record>,
    #[serde(skip)]
    folded: String,
}

impl Group {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Derived view: groups in first-encountered order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct View {
    term: String,
    total: usize,
    groups: Vec<Group>,
}

impl View {
    /// Trimmed search term the view was derived with.
    pub fn term(&self) -> &str {
        &self.term
    }

    /// Size of the collection the view was derived from.
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn group(&self, key: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.key == key)
    }

    pub fn keys(&self) -> Vec<&str> {
        self.groups.iter().map(|g| g.key.as_str()).collect()
    }

    /// Number of records across all groups.
    pub fn matched_count(&self) -> usize {
        self.groups.iter().map(Group::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn is_filtered(&self) -> bool {
        !self.term.is_empty()
    }
}

/// Does `record` match `term`?
///
/// An empty (trimmed) term matches everything. Otherwise the lowercased term
/// must be a substring of the lowercased name, email, course or phone.
pub fn matches(record: &Record, term: &str) -> bool {
    let term = term.trim();
    if term.is_empty() {
        return true;
    }
    let needle = term.to_lowercase();

    [
        Some(record.name.as_str()),
        Some(record.email.as_str()),
        record.course.as_deref(),
        record.phone.as_deref(),
    ]
    .into_iter()
    .flatten()
    .any(|field| field.to_lowercase().contains(&needle))
}

/// Derive the grouped view of `records` for `term`.
pub fn derive(records: &[Record], term: &str, policy: GroupKeyPolicy) -> View {
    let term = term.trim();
    let mut groups: Vec<Group> = Vec::new();

    for record in records.iter().filter(|r| matches(r, term)) {
        let display = record.course().map(str::trim).unwrap_or(UNASSIGNED);
        let folded = policy.fold(display);

        match groups.iter_mut().find(|g| g.folded == folded) {
            Some(group) => group.records.push(record.clone()),
            None => groups.push(Group {
                key: display.to_string(),
                records: vec![record.clone()],
                folded,
            }),
        }
    }

    View {
        term: term.to_string(),
        total: records.len(),
        groups,
    }
}
