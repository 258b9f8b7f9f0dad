use std::collections::{BTreeSet, HashMap};

use bson::{Bson, Document};
use docshape_query::{Accumulator, Expr, Pipeline, Sort, SortDirection, Stage};

use super::eval::{self, HashKey};
use crate::error::StoreError;

/// Runs `pipeline` over `docs`. `collection` resolves lookup sources to
/// their current contents.
pub(crate) fn run(
    mut docs: Vec<Document>,
    pipeline: &Pipeline,
    collection: &dyn Fn(&str) -> Result<Vec<Document>, StoreError>,
) -> Result<Vec<Document>, StoreError> {
    for stage in &pipeline.stages {
        docs = match stage {
            Stage::Match(filter) => {
                docs.retain(|doc| eval::matches(doc, filter));
                docs
            }
            Stage::Lookup {
                from,
                local_field,
                foreign_field,
                as_field,
            } => lookup(
                docs,
                &collection(from)?,
                local_field,
                foreign_field,
                as_field,
            ),
            Stage::Unwind(path) => unwind(docs, path),
            Stage::Project(fields) => project(docs, fields)?,
            Stage::Group { key, fields } => group(docs, key, fields)?,
            Stage::Sort(keys) => {
                sort_documents(&mut docs, keys);
                docs
            }
            Stage::Limit(limit) => {
                docs.truncate(*limit);
                docs
            }
        };
    }
    Ok(docs)
}

/// Stable multi-key sort.
pub(crate) fn sort_documents(docs: &mut [Document], keys: &[Sort]) {
    docs.sort_by(|a, b| {
        keys.iter()
            .map(|key| {
                let ord =
                    eval::sort_cmp(eval::get_path(a, &key.field), eval::get_path(b, &key.field));
                match key.direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            })
            .find(|ord| ord.is_ne())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Keys a document contributes for a join field: one per array element,
/// null when the field is missing.
fn join_keys(doc: &Document, path: &str) -> Vec<HashKey> {
    let values = eval::resolve(doc, path);
    if values.is_empty() {
        return vec![HashKey::Null];
    }
    let mut keys = Vec::with_capacity(values.len());
    for value in values {
        match value {
            Bson::Array(items) => keys.extend(items.iter().map(|item| HashKey::of(Some(item)))),
            other => keys.push(HashKey::of(Some(other))),
        }
    }
    keys
}

fn lookup(
    docs: Vec<Document>,
    foreign: &[Document],
    local_field: &str,
    foreign_field: &str,
    as_field: &str,
) -> Vec<Document> {
    let mut index: HashMap<HashKey, Vec<usize>> = HashMap::new();
    for (position, doc) in foreign.iter().enumerate() {
        for key in join_keys(doc, foreign_field) {
            index.entry(key).or_default().push(position);
        }
    }

    docs.into_iter()
        .map(|mut doc| {
            let positions: BTreeSet<usize> = join_keys(&doc, local_field)
                .iter()
                .filter_map(|key| index.get(key))
                .flatten()
                .copied()
                .collect();
            let joined = positions
                .into_iter()
                .map(|p| Bson::Document(foreign[p].clone()))
                .collect();
            eval::set_path(&mut doc, as_field, Bson::Array(joined));
            doc
        })
        .collect()
}

fn unwind(docs: Vec<Document>, path: &str) -> Vec<Document> {
    let mut out = Vec::with_capacity(docs.len());
    for doc in docs {
        match eval::get_path(&doc, path) {
            Some(Bson::Array(items)) => {
                for item in items {
                    let mut row = doc.clone();
                    eval::set_path(&mut row, path, item.clone());
                    out.push(row);
                }
            }
            None | Some(Bson::Null) => {}
            Some(_) => out.push(doc),
        }
    }
    out
}

fn project(docs: Vec<Document>, fields: &[(String, Expr)]) -> Result<Vec<Document>, StoreError> {
    docs.iter()
        .map(|doc| {
            let mut row = Document::new();
            for (name, expr) in fields {
                if let Some(value) = eval::eval_expr(doc, expr)? {
                    eval::set_path(&mut row, name, value);
                }
            }
            Ok(row)
        })
        .collect()
}

enum AccState {
    Count(i64),
    Push(Vec<Bson>),
}

impl AccState {
    fn new(acc: &Accumulator) -> Self {
        match acc {
            Accumulator::Count => AccState::Count(0),
            Accumulator::Push(_) => AccState::Push(Vec::new()),
        }
    }

    fn add(&mut self, acc: &Accumulator, doc: &Document) -> Result<(), StoreError> {
        match (self, acc) {
            (AccState::Count(n), _) => *n += 1,
            (AccState::Push(values), Accumulator::Push(expr)) => {
                if let Some(value) = eval::eval_expr(doc, expr)? {
                    values.push(value);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn finish(self) -> Bson {
        match self {
            AccState::Count(n) => match i32::try_from(n) {
                Ok(n) => Bson::Int32(n),
                Err(_) => Bson::Int64(n),
            },
            AccState::Push(values) => Bson::Array(values),
        }
    }
}

/// Groups in first-seen key order.
fn group(
    docs: Vec<Document>,
    key: &Expr,
    fields: &[(String, Accumulator)],
) -> Result<Vec<Document>, StoreError> {
    let mut slots: HashMap<HashKey, usize> = HashMap::new();
    let mut groups: Vec<(Bson, Vec<AccState>)> = Vec::new();

    for doc in &docs {
        let key_value = eval::eval_expr(doc, key)?.unwrap_or(Bson::Null);
        let slot = *slots
            .entry(HashKey::of(Some(&key_value)))
            .or_insert_with(|| {
                groups.push((
                    key_value.clone(),
                    fields.iter().map(|(_, acc)| AccState::new(acc)).collect(),
                ));
                groups.len() - 1
            });
        for (state, (_, acc)) in groups[slot].1.iter_mut().zip(fields) {
            state.add(acc, doc)?;
        }
    }

    Ok(groups
        .into_iter()
        .map(|(key_value, states)| {
            let mut row = Document::new();
            row.insert("_id", key_value);
            for ((name, _), state) in fields.iter().zip(states) {
                row.insert(name.clone(), state.finish());
            }
            row
        })
        .collect())
}
