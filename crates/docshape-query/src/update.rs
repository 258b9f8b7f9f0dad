use bson::Bson;
use serde::{Deserialize, Serialize};

use crate::filter::FilterGroup;

/// A single field-level update operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateOp {
    /// Set a field to a value. Creates the field (and missing parents) if it doesn't exist.
    Set(Bson),
    /// Append a suffix to a string field, computed from the field's current value.
    /// A missing or non-string field becomes null.
    AppendStr(String),
}

/// A single field + operator pair within an Update.
///
/// A path segment of the form `$[name]` addresses every element of the array
/// at that point which matches the array filter registered under `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldUpdate {
    pub field: String,
    pub op: UpdateOp,
}

/// Filter applied to array elements. Field paths in `filter` are relative to
/// the element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayFilter {
    pub identifier: String,
    pub filter: FilterGroup,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Update {
    pub ops: Vec<FieldUpdate>,
    pub array_filters: Vec<ArrayFilter>,
}

impl Update {
    pub fn set(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::default().and_set(field, value)
    }

    pub fn append_str(field: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self::default().and_append_str(field, suffix)
    }

    pub fn and_set(mut self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.ops.push(FieldUpdate {
            field: field.into(),
            op: UpdateOp::Set(value.into()),
        });
        self
    }

    pub fn and_append_str(mut self, field: impl Into<String>, suffix: impl Into<String>) -> Self {
        self.ops.push(FieldUpdate {
            field: field.into(),
            op: UpdateOp::AppendStr(suffix.into()),
        });
        self
    }

    pub fn array_filter(mut self, identifier: impl Into<String>, filter: FilterGroup) -> Self {
        self.array_filters.push(ArrayFilter {
            identifier: identifier.into(),
            filter,
        });
        self
    }

    /// True when any operator derives its new value from the current document.
    pub fn is_computed(&self) -> bool {
        self.ops
            .iter()
            .any(|op| matches!(op.op, UpdateOp::AppendStr(_)))
    }

    pub fn array_filter_for(&self, identifier: &str) -> Option<&FilterGroup> {
        self.array_filters
            .iter()
            .find(|f| f.identifier == identifier)
            .map(|f| &f.filter)
    }
}

/// Returns the identifier of a `$[name]` path segment, or `""` for `$[]`.
pub fn positional_identifier(segment: &str) -> Option<&str> {
    segment.strip_prefix("$[")?.strip_suffix(']')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Operator;

    #[test]
    fn builder_keeps_operator_order() {
        let update = Update::set("age", 30).and_append_str("name", " Company");
        assert_eq!(update.ops.len(), 2);
        assert_eq!(update.ops[0].field, "age");
        assert!(update.is_computed());
    }

    #[test]
    fn array_filter_lookup_by_identifier() {
        let update = Update::set("employees.$[e].age", 30).array_filter(
            "e",
            FilterGroup::condition("birth_date", Operator::Lt, 10i64),
        );
        assert!(update.array_filter_for("e").is_some());
        assert!(update.array_filter_for("x").is_none());
        assert!(!update.is_computed());
    }

    #[test]
    fn positional_segments() {
        assert_eq!(positional_identifier("$[e]"), Some("e"));
        assert_eq!(positional_identifier("$[]"), Some(""));
        assert_eq!(positional_identifier("employees"), None);
    }
}
