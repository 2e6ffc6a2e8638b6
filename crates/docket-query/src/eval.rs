use std::cmp::Ordering;

use bson::{Bson, Document};

use crate::expression::Expression;

/// Evaluate whether a document matches the given expression.
pub fn matches(doc: &Document, expr: &Expression) -> bool {
    match expr {
        Expression::And(children) => children.iter().all(|c| matches(doc, c)),
        Expression::Or(children) => children.iter().any(|c| matches(doc, c)),
        Expression::Nor(children) => !children.iter().any(|c| matches(doc, c)),
        Expression::Eq(field, val) => eq_matches(doc, field, val),
        Expression::Ne(field, val) => !eq_matches(doc, field, val),
        Expression::Gt(field, val)
        | Expression::Gte(field, val)
        | Expression::Lt(field, val)
        | Expression::Lte(field, val) => {
            let predicate: fn(Ordering) -> bool = match expr {
                Expression::Gt(..) => |o| o == Ordering::Greater,
                Expression::Gte(..) => |o| o != Ordering::Less,
                Expression::Lt(..) => |o| o == Ordering::Less,
                _ => |o| o != Ordering::Greater,
            };
            candidates(doc, field)
                .into_iter()
                .any(|v| compare(v, val).is_some_and(predicate))
        }
        Expression::In(field, values) => values.iter().any(|v| eq_matches(doc, field, v)),
        Expression::Nin(field, values) => !values.iter().any(|v| eq_matches(doc, field, v)),
        Expression::Regex(field, re) => candidates(doc, field)
            .into_iter()
            .any(|v| std::matches!(v, Bson::String(s) if re.is_match(s))),
        Expression::Exists(field, expected) => {
            // A null value still counts as present.
            !resolve_path(doc, field).is_empty() == *expected
        }
        Expression::Type(field, types) => candidates(doc, field)
            .into_iter()
            .any(|v| types.contains(&v.element_type())),
    }
}

/// Resolve a dotted path to every value it reaches.
///
/// Descends into sub-documents, and into each sub-document of an array when
/// the next segment is a field name. A numeric segment indexes into an array.
/// An empty result means the path does not exist.
pub fn resolve_path<'a>(doc: &'a Document, path: &str) -> Vec<&'a Bson> {
    let mut out = Vec::new();
    collect_path(doc, path, &mut out);
    out
}

fn collect_path<'a>(doc: &'a Document, path: &str, out: &mut Vec<&'a Bson>) {
    let (head, rest) = match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };
    let Some(value) = doc.get(head) else {
        return;
    };
    match rest {
        None => out.push(value),
        Some(rest) => collect_value(value, rest, out),
    }
}

fn collect_value<'a>(value: &'a Bson, rest: &str, out: &mut Vec<&'a Bson>) {
    match value {
        Bson::Document(sub) => collect_path(sub, rest, out),
        Bson::Array(items) => {
            let (head, tail) = match rest.split_once('.') {
                Some((head, tail)) => (head, Some(tail)),
                None => (rest, None),
            };
            if let Ok(idx) = head.parse::<usize>() {
                if let Some(item) = items.get(idx) {
                    match tail {
                        None => out.push(item),
                        Some(tail) => collect_value(item, tail, out),
                    }
                }
                return;
            }
            for item in items {
                if let Bson::Document(sub) = item {
                    collect_path(sub, rest, out);
                }
            }
        }
        _ => {}
    }
}

/// Values a field predicate is tested against: each resolved value, plus the
/// elements of any resolved array.
fn candidates<'a>(doc: &'a Document, field: &str) -> Vec<&'a Bson> {
    let mut out = Vec::new();
    for value in resolve_path(doc, field) {
        out.push(value);
        if let Bson::Array(items) = value {
            out.extend(items.iter());
        }
    }
    out
}

fn eq_matches(doc: &Document, field: &str, val: &Bson) -> bool {
    let found = candidates(doc, field);
    // $eq: null matches both missing fields and explicit null values
    if std::matches!(val, Bson::Null) {
        return found.is_empty() || found.iter().any(|v| std::matches!(v, Bson::Null));
    }
    found.into_iter().any(|v| values_equal(v, val))
}

#[derive(Clone, Copy)]
enum Number {
    Int(i64),
    Float(f64),
}

fn as_number(v: &Bson) -> Option<Number> {
    match v {
        Bson::Int32(n) => Some(Number::Int(i64::from(*n))),
        Bson::Int64(n) => Some(Number::Int(*n)),
        Bson::Double(n) => Some(Number::Float(*n)),
        _ => None,
    }
}

fn compare_numbers(a: Number, b: Number) -> Option<Ordering> {
    match (a, b) {
        (Number::Int(a), Number::Int(b)) => Some(a.cmp(&b)),
        (Number::Int(a), Number::Float(b)) => (a as f64).partial_cmp(&b),
        (Number::Float(a), Number::Int(b)) => a.partial_cmp(&(b as f64)),
        (Number::Float(a), Number::Float(b)) => a.partial_cmp(&b),
    }
}

/// Equality with numeric values compared across int32 / int64 / double.
fn values_equal(stored: &Bson, query: &Bson) -> bool {
    match (as_number(stored), as_number(query)) {
        (Some(a), Some(b)) => compare_numbers(a, b) == Some(Ordering::Equal),
        _ => stored == query,
    }
}

/// Ordering within a type bracket. Values of different brackets never compare.
fn compare(stored: &Bson, query: &Bson) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (as_number(stored), as_number(query)) {
        return compare_numbers(a, b);
    }
    match (stored, query) {
        (Bson::String(a), Bson::String(b)) => Some(a.cmp(b)),
        (Bson::Boolean(a), Bson::Boolean(b)) => Some(a.cmp(b)),
        (Bson::DateTime(a), Bson::DateTime(b)) => {
            Some(a.timestamp_millis().cmp(&b.timestamp_millis()))
        }
        (Bson::ObjectId(a), Bson::ObjectId(b)) => Some(a.bytes().cmp(&b.bytes())),
        (Bson::Timestamp(a), Bson::Timestamp(b)) => {
            Some((a.time, a.increment).cmp(&(b.time, b.increment)))
        }
        _ => None,
    }
}
