use std::cmp::Ordering;

use bson::oid::ObjectId;
use bson::{Bson, Document};
use docshape_query::{Expr, Filter, FilterGroup, FilterNode, LogicalOp, Operator};

use crate::error::StoreError;

pub(crate) fn matches(doc: &Document, group: &FilterGroup) -> bool {
    match group.logical {
        LogicalOp::And => group.children.iter().all(|child| node_matches(doc, child)),
        LogicalOp::Or => group.children.iter().any(|child| node_matches(doc, child)),
    }
}

fn node_matches(doc: &Document, node: &FilterNode) -> bool {
    match node {
        FilterNode::Condition(filter) => condition_matches(doc, filter),
        FilterNode::Group(group) => matches(doc, group),
    }
}

fn condition_matches(doc: &Document, filter: &Filter) -> bool {
    let values = resolve(doc, &filter.field);
    match filter.operator {
        Operator::Eq => {
            // Eq null matches both missing fields and explicit null values
            if std::matches!(filter.value, Bson::Null) {
                return values.is_empty() || values.iter().any(|v| std::matches!(v, Bson::Null));
            }
            values
                .iter()
                .any(|v| any_candidate(v, |c| value_eq(c, &filter.value)))
        }
        Operator::Gt => compare_any(&values, &filter.value, |o| o == Ordering::Greater),
        Operator::Gte => compare_any(&values, &filter.value, |o| o != Ordering::Less),
        Operator::Lt => compare_any(&values, &filter.value, |o| o == Ordering::Less),
        Operator::Lte => compare_any(&values, &filter.value, |o| o != Ordering::Greater),
        Operator::In => match &filter.value {
            Bson::Array(options) => values
                .iter()
                .any(|v| any_candidate(v, |c| options.iter().any(|option| value_eq(c, option)))),
            _ => false,
        },
        Operator::NotEndsWith => !ends_with(&values, &filter.value),
    }
}

/// An array field matches when the array itself or any of its elements does.
fn any_candidate(value: &Bson, predicate: impl Fn(&Bson) -> bool) -> bool {
    match value {
        Bson::Array(items) => predicate(value) || items.iter().any(&predicate),
        other => predicate(other),
    }
}

fn compare_any(values: &[&Bson], query_val: &Bson, predicate: fn(Ordering) -> bool) -> bool {
    values
        .iter()
        .any(|v| any_candidate(v, |c| value_cmp(c, query_val).is_some_and(predicate)))
}

fn ends_with(values: &[&Bson], suffix: &Bson) -> bool {
    let Bson::String(suffix) = suffix else {
        return false;
    };
    values.iter().any(|v| {
        any_candidate(
            v,
            |c| std::matches!(c, Bson::String(s) if s.ends_with(suffix.as_str())),
        )
    })
}

/// Resolves a dotted path to its leaf values. Arrays met before the last
/// segment fan out over their document elements.
pub(crate) fn resolve<'a>(doc: &'a Document, path: &str) -> Vec<&'a Bson> {
    let segments: Vec<&str> = path.split('.').collect();
    let mut out = Vec::new();
    collect(doc, &segments, &mut out);
    out
}

fn collect<'a>(doc: &'a Document, segments: &[&str], out: &mut Vec<&'a Bson>) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    let Some(value) = doc.get(*head) else {
        return;
    };
    if rest.is_empty() {
        out.push(value);
        return;
    }
    match value {
        Bson::Document(inner) => collect(inner, rest, out),
        Bson::Array(items) => {
            for item in items {
                if let Bson::Document(inner) = item {
                    collect(inner, rest, out);
                }
            }
        }
        _ => {}
    }
}

/// Walks a dotted path through embedded documents only.
pub(crate) fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = doc.get(segments.next()?)?;
    for segment in segments {
        match current {
            Bson::Document(inner) => current = inner.get(segment)?,
            _ => return None,
        }
    }
    Some(current)
}

/// Sets a dotted path, replacing any non-document value met on the way.
pub(crate) fn set_path(doc: &mut Document, path: &str, value: Bson) {
    match path.split_once('.') {
        None => {
            doc.insert(path, value);
        }
        Some((head, rest)) => {
            if !std::matches!(doc.get(head), Some(Bson::Document(_))) {
                doc.insert(head, Document::new());
            }
            if let Some(Bson::Document(inner)) = doc.get_mut(head) {
                set_path(inner, rest, value);
            }
        }
    }
}

pub(crate) fn value_eq(a: &Bson, b: &Bson) -> bool {
    match (a, b) {
        (Bson::String(a), Bson::String(b)) => a == b,
        (Bson::ObjectId(a), Bson::ObjectId(b)) => a == b,
        (Bson::DateTime(a), Bson::DateTime(b)) => a.timestamp_millis() == b.timestamp_millis(),
        (Bson::Boolean(a), Bson::Boolean(b)) => a == b,
        (Bson::Null, Bson::Null) => true,
        _ => match (as_number(a), as_number(b)) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
    }
}

/// Same-type ordering; `None` when the two values are not comparable.
pub(crate) fn value_cmp(a: &Bson, b: &Bson) -> Option<Ordering> {
    match (a, b) {
        (Bson::String(a), Bson::String(b)) => Some(a.cmp(b)),
        (Bson::ObjectId(a), Bson::ObjectId(b)) => Some(a.cmp(b)),
        (Bson::DateTime(a), Bson::DateTime(b)) => {
            Some(a.timestamp_millis().cmp(&b.timestamp_millis()))
        }
        (Bson::Boolean(a), Bson::Boolean(b)) => Some(a.cmp(b)),
        _ => {
            let (x, y) = (as_number(a)?, as_number(b)?);
            Some(x.partial_cmp(&y).unwrap_or(Ordering::Equal))
        }
    }
}

fn as_number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(v) => Some(*v as f64),
        Bson::Int64(v) => Some(*v as f64),
        Bson::Double(v) => Some(*v),
        _ => None,
    }
}

fn type_rank(value: Option<&Bson>) -> u8 {
    match value {
        None | Some(Bson::Null) | Some(Bson::Undefined) => 0,
        Some(Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_)) => 1,
        Some(Bson::String(_) | Bson::Symbol(_)) => 2,
        Some(Bson::Document(_)) => 3,
        Some(Bson::Array(_)) => 4,
        Some(Bson::Binary(_)) => 5,
        Some(Bson::ObjectId(_)) => 6,
        Some(Bson::Boolean(_)) => 7,
        Some(Bson::DateTime(_)) => 8,
        Some(Bson::Timestamp(_)) => 9,
        Some(_) => 10,
    }
}

/// Total order used by sort stages: missing and null first, then by type
/// bracket, then by value.
pub(crate) fn sort_cmp(a: Option<&Bson>, b: Option<&Bson>) -> Ordering {
    type_rank(a).cmp(&type_rank(b)).then_with(|| match (a, b) {
        (Some(a), Some(b)) => value_cmp(a, b).unwrap_or(Ordering::Equal),
        _ => Ordering::Equal,
    })
}

/// Hashable projection of a value, consistent with [`value_eq`] for the
/// types used as join and group keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum HashKey {
    Null,
    Bool(bool),
    Number(i64),
    Float(u64),
    String(String),
    ObjectId(ObjectId),
    DateTime(i64),
    Other(String),
}

impl HashKey {
    pub(crate) fn of(value: Option<&Bson>) -> Self {
        match value {
            None | Some(Bson::Null) | Some(Bson::Undefined) => HashKey::Null,
            Some(Bson::Boolean(b)) => HashKey::Bool(*b),
            Some(Bson::Int32(v)) => HashKey::Number(i64::from(*v)),
            Some(Bson::Int64(v)) => HashKey::Number(*v),
            Some(Bson::Double(v)) => {
                if v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
                    HashKey::Number(*v as i64)
                } else {
                    HashKey::Float(v.to_bits())
                }
            }
            Some(Bson::String(s)) => HashKey::String(s.clone()),
            Some(Bson::ObjectId(oid)) => HashKey::ObjectId(*oid),
            Some(Bson::DateTime(dt)) => HashKey::DateTime(dt.timestamp_millis()),
            Some(other) => HashKey::Other(other.to_string()),
        }
    }
}

/// Evaluates an expression. `Ok(None)` means the value is missing, which
/// projections and accumulators skip.
pub(crate) fn eval_expr(doc: &Document, expr: &Expr) -> Result<Option<Bson>, StoreError> {
    match expr {
        Expr::Field(path) => {
            let segments: Vec<&str> = path.split('.').collect();
            let Some((head, rest)) = segments.split_first() else {
                return Ok(None);
            };
            Ok(doc.get(*head).and_then(|v| field_value(v, rest)))
        }
        Expr::Literal(value) => Ok(Some(value.clone())),
        Expr::Concat(parts) => {
            let mut out = String::new();
            for part in parts {
                match eval_expr(doc, part)? {
                    None | Some(Bson::Null) => return Ok(Some(Bson::Null)),
                    Some(Bson::String(s)) => out.push_str(&s),
                    Some(other) => {
                        return Err(StoreError::InvalidQuery(format!(
                            "concat only supports strings, not {:?}",
                            other.element_type()
                        )));
                    }
                }
            }
            Ok(Some(Bson::String(out)))
        }
        Expr::Size(inner) => match eval_expr(doc, inner)? {
            Some(Bson::Array(items)) => Ok(Some(match i32::try_from(items.len()) {
                Ok(n) => Bson::Int32(n),
                Err(_) => Bson::Int64(items.len() as i64),
            })),
            other => Err(StoreError::InvalidQuery(format!(
                "the argument to size must be an array, got {:?}",
                other.map(|v| v.element_type())
            ))),
        },
        Expr::Object(fields) => {
            let mut out = Document::new();
            for (name, field) in fields {
                if let Some(value) = eval_expr(doc, field)? {
                    out.insert(name.clone(), value);
                }
            }
            Ok(Some(Bson::Document(out)))
        }
    }
}

/// Path traversal for expressions: crossing an array yields the array of
/// values found in its elements.
fn field_value(value: &Bson, segments: &[&str]) -> Option<Bson> {
    let Some((head, rest)) = segments.split_first() else {
        return Some(value.clone());
    };
    match value {
        Bson::Document(doc) => field_value(doc.get(*head)?, rest),
        Bson::Array(items) => Some(Bson::Array(
            items
                .iter()
                .filter_map(|item| field_value(item, segments))
                .collect(),
        )),
        _ => None,
    }
}
