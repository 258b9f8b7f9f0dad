use bson::{Bson, Document, doc};
use docshape_query::{
    Accumulator, Expr, Filter, FilterGroup, FilterNode, LogicalOp, Operator, Pipeline, Query, Sort,
    SortDirection, Stage, Update, UpdateOp,
};

use crate::error::StoreError;
use crate::store::{IndexKey, IndexSpec};

pub(crate) fn filter(group: &FilterGroup) -> Result<Document, StoreError> {
    filter_with_prefix(group, None)
}

/// Translates a filter whose field paths are relative to `prefix`, as array
/// filters require (`e.birth_date`).
fn filter_with_prefix(group: &FilterGroup, prefix: Option<&str>) -> Result<Document, StoreError> {
    let mut clauses = Vec::with_capacity(group.children.len());
    for child in &group.children {
        clauses.push(match child {
            FilterNode::Condition(condition) => self::condition(condition, prefix)?,
            FilterNode::Group(inner) => filter_with_prefix(inner, prefix)?,
        });
    }
    Ok(match group.logical {
        LogicalOp::And if clauses.is_empty() => Document::new(),
        LogicalOp::And if clauses.len() == 1 => clauses.remove(0),
        LogicalOp::And => doc! { "$and": clauses },
        LogicalOp::Or => doc! { "$or": clauses },
    })
}

fn condition(condition: &Filter, prefix: Option<&str>) -> Result<Document, StoreError> {
    let field = match prefix {
        Some(prefix) => format!("{prefix}.{}", condition.field),
        None => condition.field.clone(),
    };
    let value = condition.value.clone();
    let predicate = match condition.operator {
        Operator::Eq => doc! { "$eq": value },
        Operator::Gt => doc! { "$gt": value },
        Operator::Gte => doc! { "$gte": value },
        Operator::Lt => doc! { "$lt": value },
        Operator::Lte => doc! { "$lte": value },
        Operator::In => match value {
            Bson::Array(_) => doc! { "$in": value },
            other => {
                return Err(StoreError::InvalidQuery(format!(
                    "in on '{field}' needs an array, got {:?}",
                    other.element_type()
                )));
            }
        },
        Operator::NotEndsWith => doc! { "$not": { "$regex": suffix_pattern(&field, &value)? } },
    };
    let mut out = Document::new();
    out.insert(field, predicate);
    Ok(out)
}

fn suffix_pattern(field: &str, value: &Bson) -> Result<String, StoreError> {
    match value {
        Bson::String(suffix) => Ok(format!("{}$", regex::escape(suffix))),
        other => Err(StoreError::InvalidQuery(format!(
            "suffix match on '{field}' needs a string, got {:?}",
            other.element_type()
        ))),
    }
}

pub(crate) fn sort(keys: &[Sort]) -> Document {
    let mut out = Document::new();
    for key in keys {
        let direction = match key.direction {
            SortDirection::Asc => 1,
            SortDirection::Desc => -1,
        };
        out.insert(key.field.clone(), direction);
    }
    out
}

pub(crate) fn find_sort(query: &Query) -> Option<Document> {
    (!query.sort.is_empty()).then(|| sort(&query.sort))
}

/// Update document or pipeline. Computed updates (`AppendStr`) need the
/// pipeline form; plain `$set` keeps the operator form so array filters work.
pub(crate) enum Modifications {
    Operators(Document),
    Pipeline(Vec<Document>),
}

pub(crate) fn update(update: &Update) -> Result<(Modifications, Vec<Document>), StoreError> {
    let array_filters = update
        .array_filters
        .iter()
        .map(|af| filter_with_prefix(&af.filter, Some(&af.identifier)))
        .collect::<Result<Vec<_>, _>>()?;

    let mut set = Document::new();
    if update.is_computed() {
        if !array_filters.is_empty() {
            return Err(StoreError::InvalidQuery(
                "array filters cannot be combined with computed updates".into(),
            ));
        }
        for op in &update.ops {
            let value = match &op.op {
                UpdateOp::Set(value) => Bson::Document(doc! { "$literal": value.clone() }),
                UpdateOp::AppendStr(suffix) => Bson::Document(doc! {
                    "$concat": [format!("${}", op.field), suffix.clone()]
                }),
            };
            set.insert(op.field.clone(), value);
        }
        return Ok((
            Modifications::Pipeline(vec![doc! { "$set": set }]),
            array_filters,
        ));
    }

    for op in &update.ops {
        if let UpdateOp::Set(value) = &op.op {
            set.insert(op.field.clone(), value.clone());
        }
    }
    Ok((
        Modifications::Operators(doc! { "$set": set }),
        array_filters,
    ))
}

fn expr(expr: &Expr) -> Bson {
    match expr {
        Expr::Field(path) => Bson::String(format!("${path}")),
        // Strings starting with '$' would be read as field paths.
        Expr::Literal(Bson::String(s)) if s.starts_with('$') => {
            Bson::Document(doc! { "$literal": s.clone() })
        }
        Expr::Literal(value) => value.clone(),
        Expr::Concat(parts) => Bson::Document(doc! {
            "$concat": parts.iter().map(self::expr).collect::<Vec<_>>()
        }),
        Expr::Size(inner) => Bson::Document(doc! { "$size": self::expr(inner) }),
        Expr::Object(fields) => {
            let mut out = Document::new();
            for (name, field) in fields {
                out.insert(name.clone(), self::expr(field));
            }
            Bson::Document(out)
        }
    }
}

fn accumulator(acc: &Accumulator) -> Document {
    match acc {
        Accumulator::Count => doc! { "$sum": 1 },
        Accumulator::Push(e) => doc! { "$push": expr(e) },
    }
}

pub(crate) fn pipeline(pipeline: &Pipeline) -> Result<Vec<Document>, StoreError> {
    pipeline
        .stages
        .iter()
        .map(|stage| -> Result<Document, StoreError> {
            Ok(match stage {
                Stage::Match(group) => doc! { "$match": filter(group)? },
                Stage::Lookup {
                    from,
                    local_field,
                    foreign_field,
                    as_field,
                } => doc! {
                    "$lookup": {
                        "from": from.as_str(),
                        "localField": local_field.as_str(),
                        "foreignField": foreign_field.as_str(),
                        "as": as_field.as_str(),
                    }
                },
                Stage::Unwind(path) => doc! { "$unwind": format!("${path}") },
                Stage::Project(fields) => {
                    let mut projection = Document::new();
                    if !fields.iter().any(|(name, _)| name == "_id") {
                        projection.insert("_id", 0);
                    }
                    for (name, field) in fields {
                        projection.insert(name.clone(), expr(field));
                    }
                    doc! { "$project": projection }
                }
                Stage::Group { key, fields } => {
                    let mut group = doc! { "_id": expr(key) };
                    for (name, acc) in fields {
                        group.insert(name.clone(), accumulator(acc));
                    }
                    doc! { "$group": group }
                }
                Stage::Sort(keys) => doc! { "$sort": sort(keys) },
                Stage::Limit(limit) => doc! { "$limit": i64::try_from(*limit).unwrap_or(i64::MAX) },
            })
        })
        .collect()
}

pub(crate) fn index_keys(index: &IndexSpec) -> Document {
    let mut keys = Document::new();
    for key in &index.keys {
        match key {
            IndexKey::Asc(field) => keys.insert(field.clone(), 1),
            IndexKey::Text(field) => keys.insert(field.clone(), "text"),
        };
    }
    keys
}

/// `$jsonSchema` validator requiring the given top-level fields.
pub(crate) fn validator(required: &[String]) -> Document {
    doc! {
        "$jsonSchema": {
            "bsonType": "object",
            "required": required.to_vec(),
        }
    }
}
