use bson::{Bson, Document};
use docshape_query::update::positional_identifier;
use docshape_query::{Update, UpdateOp};

use super::eval;
use crate::error::StoreError;

/// Applies every operator of `update` to `doc`. Returns whether anything changed.
pub(crate) fn apply(doc: &mut Document, update: &Update) -> Result<bool, StoreError> {
    let mut changed = false;
    for field_update in &update.ops {
        let segments: Vec<&str> = field_update.field.split('.').collect();
        changed |= apply_at(doc, &segments, &field_update.op, update)?;
    }
    Ok(changed)
}

fn apply_at(
    doc: &mut Document,
    segments: &[&str],
    op: &UpdateOp,
    update: &Update,
) -> Result<bool, StoreError> {
    let (head, rest) = segments
        .split_first()
        .ok_or_else(|| StoreError::InvalidQuery("empty update path".into()))?;
    if positional_identifier(head).is_some() {
        return Err(StoreError::InvalidQuery(format!(
            "positional segment '{head}' must follow an array field"
        )));
    }
    let Some((next, after)) = rest.split_first() else {
        return Ok(apply_leaf(doc, head, op));
    };

    if let Some(identifier) = positional_identifier(next) {
        let filter = if identifier.is_empty() {
            None
        } else {
            Some(update.array_filter_for(identifier).ok_or_else(|| {
                StoreError::InvalidQuery(format!(
                    "no array filter found for identifier '{identifier}'"
                ))
            })?)
        };
        if after.is_empty() {
            return Err(StoreError::InvalidQuery(format!(
                "'{head}.{next}' would replace whole array elements"
            )));
        }
        let Some(Bson::Array(items)) = doc.get_mut(*head) else {
            return Ok(false);
        };
        let mut changed = false;
        for item in items.iter_mut() {
            let Bson::Document(element) = item else {
                continue;
            };
            if filter.is_none_or(|f| eval::matches(element, f)) {
                changed |= apply_at(element, after, op, update)?;
            }
        }
        return Ok(changed);
    }

    if doc.get(*head).is_none() {
        doc.insert(*head, Document::new());
    }
    match doc.get_mut(*head) {
        Some(Bson::Document(inner)) => apply_at(inner, rest, op, update),
        _ => Err(StoreError::InvalidQuery(format!(
            "cannot create field '{next}' in non-document value at '{head}'"
        ))),
    }
}

/// Returns false when the field already holds the resulting value.
fn apply_leaf(doc: &mut Document, field: &str, op: &UpdateOp) -> bool {
    let next = match op {
        UpdateOp::Set(value) => value.clone(),
        UpdateOp::AppendStr(suffix) => match doc.get(field) {
            Some(Bson::String(current)) => Bson::String(format!("{current}{suffix}")),
            _ => Bson::Null,
        },
    };
    if doc.get(field) == Some(&next) {
        return false;
    }
    doc.insert(field, next);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use docshape_query::{FilterGroup, Operator};

    #[test]
    fn set_unchanged_value_reports_no_change() {
        let mut doc = doc! { "age": 30 };
        assert!(!apply(&mut doc, &Update::set("age", 30)).unwrap());
        assert!(apply(&mut doc, &Update::set("age", 31)).unwrap());
        assert_eq!(doc, doc! { "age": 31 });
    }

    #[test]
    fn set_creates_missing_parents() {
        let mut doc = doc! {};
        assert!(apply(&mut doc, &Update::set("company.name", "Acme")).unwrap());
        assert_eq!(doc, doc! { "company": { "name": "Acme" } });
    }

    #[test]
    fn append_str_on_nested_field() {
        let mut doc = doc! { "company": { "name": "Acme" } };
        assert!(apply(&mut doc, &Update::append_str("company.name", " Company")).unwrap());
        assert_eq!(doc, doc! { "company": { "name": "Acme Company" } });
    }

    #[test]
    fn array_filter_touches_matching_elements_only() {
        let mut doc = doc! {
            "employees": [
                { "age": 50, "born": 1 },
                { "age": 20, "born": 9 },
            ]
        };
        let update = Update::set("employees.$[e].age", 30)
            .array_filter("e", FilterGroup::condition("born", Operator::Lt, 5));
        assert!(apply(&mut doc, &update).unwrap());
        assert_eq!(
            doc,
            doc! {
                "employees": [
                    { "age": 30, "born": 1 },
                    { "age": 20, "born": 9 },
                ]
            }
        );
    }

    #[test]
    fn unknown_array_filter_is_rejected() {
        let mut doc = doc! { "employees": [{ "age": 50 }] };
        let update = Update::set("employees.$[x].age", 30);
        assert!(matches!(
            apply(&mut doc, &update),
            Err(StoreError::InvalidQuery(_))
        ));
    }

    #[test]
    fn nested_set_through_scalar_is_rejected() {
        let mut doc = doc! { "company": "Acme" };
        assert!(apply(&mut doc, &Update::set("company.name", "x")).is_err());
    }
}
