//! Rows and predicates of the permission table.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// A predicate column of the permission table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    ObjectType,
    ObjectId,
    SubjectType,
    SubjectId,
    Relation,
}

impl Column {
    /// All predicate columns, in table order.
    pub const ALL: [Column; 5] = [
        Column::ObjectType,
        Column::ObjectId,
        Column::SubjectType,
        Column::SubjectId,
        Column::Relation,
    ];

    /// The column name as exposed to callers.
    pub fn as_str(self) -> &'static str {
        match self {
            Column::ObjectType => "object_type",
            Column::ObjectId => "object_id",
            Column::SubjectType => "subject_type",
            Column::SubjectId => "subject_id",
            Column::Relation => "relation",
        }
    }

    /// Look up a column by name.
    pub fn from_name(name: &str) -> Option<Column> {
        Column::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Equality predicates supplied by the caller for one query.
///
/// Empty strings are treated as unbound.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryPredicate {
    object_type: Option<String>,
    object_id: Option<String>,
    subject_type: Option<String>,
    subject_id: Option<String>,
    relation: Option<String>,
}

impl QueryPredicate {
    /// An empty predicate set (every column unbound).
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `column` to `value`. An empty value unbinds the column.
    pub fn with(mut self, column: Column, value: impl Into<String>) -> Self {
        self.set(column, value);
        self
    }

    /// Bind the object columns.
    pub fn object(self, kind: impl Into<String>, id: impl Into<String>) -> Self {
        self.with(Column::ObjectType, kind).with(Column::ObjectId, id)
    }

    /// Bind the subject columns.
    pub fn subject(self, kind: impl Into<String>, id: impl Into<String>) -> Self {
        self.with(Column::SubjectType, kind).with(Column::SubjectId, id)
    }

    /// Bind the relation column.
    pub fn relation(self, relation: impl Into<String>) -> Self {
        self.with(Column::Relation, relation)
    }

    /// Bind `column` to `value` in place.
    pub fn set(&mut self, column: Column, value: impl Into<String>) {
        let value = value.into();
        let value = if value.is_empty() { None } else { Some(value) };
        *self.slot_mut(column) = value;
    }

    /// The bound value of `column`, if any.
    pub fn get(&self, column: Column) -> Option<&str> {
        match column {
            Column::ObjectType => self.object_type.as_deref(),
            Column::ObjectId => self.object_id.as_deref(),
            Column::SubjectType => self.subject_type.as_deref(),
            Column::SubjectId => self.subject_id.as_deref(),
            Column::Relation => self.relation.as_deref(),
        }
    }

    /// Whether both object columns are bound.
    pub fn has_object(&self) -> bool {
        self.object_type.is_some() && self.object_id.is_some()
    }

    /// Whether both subject columns are bound.
    pub fn has_subject(&self) -> bool {
        self.subject_type.is_some() && self.subject_id.is_some()
    }

    /// Whether `fact` satisfies every bound predicate.
    pub fn matches(&self, fact: &PermissionFact) -> bool {
        Column::ALL.into_iter().all(|column| match self.get(column) {
            Some(expected) => fact.column(column) == expected,
            None => true,
        })
    }

    fn slot_mut(&mut self, column: Column) -> &mut Option<String> {
        match column {
            Column::ObjectType => &mut self.object_type,
            Column::ObjectId => &mut self.object_id,
            Column::SubjectType => &mut self.subject_type,
            Column::SubjectId => &mut self.subject_id,
            Column::Relation => &mut self.relation,
        }
    }
}

/// One row of the permission table.
///
/// Depending on the strategy that produced it, a fact is either an evaluated
/// "allowed" decision or a stored relationship tuple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionFact {
    pub object_type: String,
    pub object_id: String,
    pub subject_type: String,
    pub subject_id: String,
    pub relation: String,
    /// Only set by a single check.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed: Option<bool>,
    /// Authorization model the decision was evaluated with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_version: Option<String>,
    pub evaluated_at: Option<DateTime<Utc>>,
}

impl PermissionFact {
    /// Build a fact with no decision metadata.
    pub fn new(
        object_type: impl Into<String>,
        object_id: impl Into<String>,
        subject_type: impl Into<String>,
        subject_id: impl Into<String>,
        relation: impl Into<String>,
    ) -> Self {
        Self {
            object_type: object_type.into(),
            object_id: object_id.into(),
            subject_type: subject_type.into(),
            subject_id: subject_id.into(),
            relation: relation.into(),
            allowed: None,
            policy_version: None,
            evaluated_at: None,
        }
    }

    pub fn with_allowed(mut self, allowed: bool) -> Self {
        self.allowed = Some(allowed);
        self
    }

    pub fn with_policy_version(mut self, version: Option<&str>) -> Self {
        self.policy_version = version.map(str::to_string);
        self
    }

    pub fn with_evaluated_at(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.evaluated_at = at;
        self
    }

    /// The value of a predicate column.
    pub fn column(&self, column: Column) -> &str {
        match column {
            Column::ObjectType => &self.object_type,
            Column::ObjectId => &self.object_id,
            Column::SubjectType => &self.subject_type,
            Column::SubjectId => &self.subject_id,
            Column::Relation => &self.relation,
        }
    }
}
