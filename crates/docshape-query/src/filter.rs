use bson::Bson;
use serde::{Deserialize, Serialize};

use crate::operator::Operator;

/// A single `field <operator> value` condition. Dotted field paths reach into
/// embedded documents and fan out over arrays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub operator: Operator,
    pub value: Bson,
}

impl Filter {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<Bson>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterNode {
    Condition(Filter),
    Group(FilterGroup),
}

/// An empty `And` group matches every document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterGroup {
    pub logical: LogicalOp,
    pub children: Vec<FilterNode>,
}

impl FilterGroup {
    pub fn all() -> Self {
        Self {
            logical: LogicalOp::And,
            children: Vec::new(),
        }
    }

    pub fn condition(field: impl Into<String>, operator: Operator, value: impl Into<Bson>) -> Self {
        Self {
            logical: LogicalOp::And,
            children: vec![FilterNode::Condition(Filter::new(field, operator, value))],
        }
    }

    pub fn or(children: Vec<FilterNode>) -> Self {
        Self {
            logical: LogicalOp::Or,
            children,
        }
    }
}

impl Default for FilterGroup {
    fn default() -> Self {
        Self::all()
    }
}

impl From<Filter> for FilterNode {
    fn from(filter: Filter) -> Self {
        FilterNode::Condition(filter)
    }
}

impl From<FilterGroup> for FilterNode {
    fn from(group: FilterGroup) -> Self {
        FilterNode::Group(group)
    }
}
