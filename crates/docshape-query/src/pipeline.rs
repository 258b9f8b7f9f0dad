use bson::Bson;
use serde::{Deserialize, Serialize};

use crate::filter::FilterGroup;
use crate::sort::Sort;

/// Value expression evaluated against one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    /// Dotted path into the current document. Missing paths produce no value.
    Field(String),
    Literal(Bson),
    /// String concatenation; null if any operand is null or missing.
    Concat(Vec<Expr>),
    /// Length of an array operand.
    Size(Box<Expr>),
    /// Builds an embedded document from named sub-expressions.
    Object(Vec<(String, Expr)>),
}

impl Expr {
    pub fn field(path: impl Into<String>) -> Self {
        Expr::Field(path.into())
    }

    pub fn literal(value: impl Into<Bson>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn size(inner: Expr) -> Self {
        Expr::Size(Box::new(inner))
    }

    pub fn object<K: Into<String>>(fields: impl IntoIterator<Item = (K, Expr)>) -> Self {
        Expr::Object(fields.into_iter().map(|(k, e)| (k.into(), e)).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Accumulator {
    /// Number of documents in the group.
    Count,
    /// Collects one value per document, in input order.
    Push(Expr),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Match(FilterGroup),
    /// Left outer join: every input document gets `as_field` set to the
    /// (possibly empty) array of `from` documents whose `foreign_field`
    /// equals its `local_field`.
    Lookup {
        from: String,
        local_field: String,
        foreign_field: String,
        as_field: String,
    },
    /// One output document per element of the array at the path. Documents
    /// whose array is missing or empty are dropped.
    Unwind(String),
    /// Replaces each document with the named expressions. `_id` is not
    /// carried over unless listed.
    Project(Vec<(String, Expr)>),
    Group {
        key: Expr,
        fields: Vec<(String, Accumulator)>,
    },
    Sort(Vec<Sort>),
    Limit(usize),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Pipeline {
    pub stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn matching(mut self, filter: FilterGroup) -> Self {
        self.stages.push(Stage::Match(filter));
        self
    }

    pub fn lookup(
        mut self,
        from: impl Into<String>,
        local_field: impl Into<String>,
        foreign_field: impl Into<String>,
        as_field: impl Into<String>,
    ) -> Self {
        self.stages.push(Stage::Lookup {
            from: from.into(),
            local_field: local_field.into(),
            foreign_field: foreign_field.into(),
            as_field: as_field.into(),
        });
        self
    }

    pub fn unwind(mut self, path: impl Into<String>) -> Self {
        self.stages.push(Stage::Unwind(path.into()));
        self
    }

    pub fn project<K: Into<String>>(mut self, fields: impl IntoIterator<Item = (K, Expr)>) -> Self {
        self.stages.push(Stage::Project(
            fields.into_iter().map(|(k, e)| (k.into(), e)).collect(),
        ));
        self
    }

    pub fn group<K: Into<String>>(
        mut self,
        key: Expr,
        fields: impl IntoIterator<Item = (K, Accumulator)>,
    ) -> Self {
        self.stages.push(Stage::Group {
            key,
            fields: fields.into_iter().map(|(k, a)| (k.into(), a)).collect(),
        });
        self
    }

    pub fn sort(mut self, sort: Sort) -> Self {
        match self.stages.last_mut() {
            Some(Stage::Sort(keys)) => keys.push(sort),
            _ => self.stages.push(Stage::Sort(vec![sort])),
        }
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.stages.push(Stage::Limit(limit));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AggregateOptions {
    /// Lets the server spill large grouping stages to disk.
    pub allow_disk_use: bool,
    pub batch_size: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consecutive_sorts_merge_into_one_stage() {
        let pipeline = Pipeline::new()
            .sort(Sort::desc("count"))
            .sort(Sort::asc("name"))
            .limit(5);
        assert_eq!(pipeline.stages.len(), 2);
        match &pipeline.stages[0] {
            Stage::Sort(keys) => assert_eq!(keys.len(), 2),
            other => panic!("expected sort stage, got {other:?}"),
        }
    }
}
