use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Value must be an array; matches when the field equals any element.
    In,
    /// True unless the field is a string ending with the value (case
    /// sensitive). Also matches documents missing the field.
    NotEndsWith,
}
