use bson::spec::ElementType;
use bson::{Bson, Document};
use regex::Regex;

use crate::expression::Expression;

/// Parse error for filter documents.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("filter parse error: {0}")]
pub struct FilterParseError(pub String);

/// Parse a BSON filter document into an [`Expression`] tree.
///
/// Follows MongoDB query semantics:
/// - Top-level document is an implicit AND of all entries; `{}` matches everything
/// - `{ "field": value }` is implicit `$eq`
/// - `{ "field": { "$gt": v } }` uses operator sub-documents
/// - `{ "$or": [...] }` / `{ "$and": [...] }` / `{ "$nor": [...] }` for logical ops
/// - `{ "field": { "$regex": "pattern", "$options": "i" } }` for regex
/// - `{ "field": { "$exists": true } }` for field existence checks
/// - `{ "field": { "$type": "string" } }` for BSON type checks
pub fn parse_filter(doc: &Document) -> Result<Expression, FilterParseError> {
    let mut children = Vec::with_capacity(doc.len());

    for (key, value) in doc {
        match key.as_str() {
            "$and" => children.push(Expression::And(parse_logical_array(key, value)?)),
            "$or" => children.push(Expression::Or(parse_logical_array(key, value)?)),
            "$nor" => children.push(Expression::Nor(parse_logical_array(key, value)?)),
            k if k.starts_with('$') => {
                return Err(FilterParseError(format!("unknown top-level operator: {k}")));
            }
            _ => children.push(parse_field_condition(key, value)?),
        }
    }

    Ok(match <[Expression; 1]>::try_from(children) {
        Ok([only]) => only,
        Err(children) => Expression::And(children),
    })
}

/// Parse a `$and` / `$or` / `$nor` array value into its child expressions.
fn parse_logical_array(op: &str, value: &Bson) -> Result<Vec<Expression>, FilterParseError> {
    let arr = match value {
        Bson::Array(a) => a,
        _ => return Err(FilterParseError(format!("{op} value must be an array"))),
    };

    let mut children = Vec::with_capacity(arr.len());
    for elem in arr {
        match elem {
            Bson::Document(sub_doc) => children.push(parse_filter(sub_doc)?),
            _ => {
                return Err(FilterParseError(format!(
                    "{op} array elements must be documents"
                )));
            }
        }
    }

    if children.is_empty() {
        return Err(FilterParseError(format!("{op} array must not be empty")));
    }

    Ok(children)
}

/// Parse a field condition: either implicit $eq or an operator sub-document.
fn parse_field_condition(field: &str, value: &Bson) -> Result<Expression, FilterParseError> {
    if let Bson::Document(sub_doc) = value {
        let starts_with_op = sub_doc.keys().next().is_some_and(|k| k.starts_with('$'));
        if starts_with_op {
            return parse_operator_doc(field, sub_doc);
        }
    }

    Ok(Expression::Eq(field.to_string(), value.clone()))
}

/// Parse an operator sub-document like `{ "$gt": 21, "$lte": 100 }`.
fn parse_operator_doc(field: &str, doc: &Document) -> Result<Expression, FilterParseError> {
    let mut conditions: Vec<Expression> = Vec::new();
    let owned = || field.to_string();

    for (op_key, op_value) in doc {
        let expr = match op_key.as_str() {
            "$eq" => Expression::Eq(owned(), op_value.clone()),
            "$ne" => Expression::Ne(owned(), op_value.clone()),
            "$gt" => Expression::Gt(owned(), op_value.clone()),
            "$gte" => Expression::Gte(owned(), op_value.clone()),
            "$lt" => Expression::Lt(owned(), op_value.clone()),
            "$lte" => Expression::Lte(owned(), op_value.clone()),
            "$in" => Expression::In(owned(), parse_value_list(op_key, op_value)?),
            "$nin" => Expression::Nin(owned(), parse_value_list(op_key, op_value)?),
            "$exists" => Expression::Exists(owned(), truthy(op_value)),
            "$type" => Expression::Type(owned(), parse_types(op_value)?),
            "$regex" => parse_regex(field, op_value, doc.get("$options"))?,
            "$options" if doc.contains_key("$regex") => continue,
            "$options" => return Err(FilterParseError("$options without $regex".into())),
            k if k.starts_with('$') => {
                return Err(FilterParseError(format!("unknown field operator: {k}")));
            }
            k => {
                return Err(FilterParseError(format!(
                    "cannot mix operators and plain fields under {field}: {k}"
                )));
            }
        };
        conditions.push(expr);
    }

    Ok(match <[Expression; 1]>::try_from(conditions) {
        Ok([only]) => only,
        Err(conditions) => Expression::And(conditions),
    })
}

fn parse_value_list(op: &str, value: &Bson) -> Result<Vec<Bson>, FilterParseError> {
    match value {
        Bson::Array(values) => Ok(values.clone()),
        _ => Err(FilterParseError(format!("{op} needs an array"))),
    }
}

/// `$exists` accepts any value; numbers and booleans are interpreted by truthiness.
fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => *b,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(n) => *n != 0.0,
        Bson::Null | Bson::Undefined => false,
        _ => true,
    }
}

fn parse_types(value: &Bson) -> Result<Vec<ElementType>, FilterParseError> {
    let mut types = Vec::new();
    match value {
        Bson::Array(items) => {
            if items.is_empty() {
                return Err(FilterParseError("$type array must not be empty".into()));
            }
            for item in items {
                types.extend(parse_type(item)?);
            }
        }
        other => types.extend(parse_type(other)?),
    }
    Ok(types)
}

fn parse_type(value: &Bson) -> Result<Vec<ElementType>, FilterParseError> {
    match value {
        Bson::String(alias) => type_from_alias(alias)
            .ok_or_else(|| FilterParseError(format!("unknown type name alias: {alias}"))),
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) => {
            let code = match value {
                Bson::Int32(n) => i64::from(*n),
                Bson::Int64(n) => *n,
                Bson::Double(n) if n.fract() == 0.0 => *n as i64,
                _ => return Err(FilterParseError("$type code must be an integer".into())),
            };
            type_from_code(code)
                .map(|t| vec![t])
                .ok_or_else(|| FilterParseError(format!("invalid numerical type code: {code}")))
        }
        _ => Err(FilterParseError(
            "$type must be a string alias or a numeric type code".into(),
        )),
    }
}

fn type_from_alias(alias: &str) -> Option<Vec<ElementType>> {
    let single = match alias {
        "double" => ElementType::Double,
        "string" => ElementType::String,
        "object" => ElementType::EmbeddedDocument,
        "array" => ElementType::Array,
        "binData" => ElementType::Binary,
        "undefined" => ElementType::Undefined,
        "objectId" => ElementType::ObjectId,
        "bool" => ElementType::Boolean,
        "date" => ElementType::DateTime,
        "null" => ElementType::Null,
        "regex" => ElementType::RegularExpression,
        "javascript" => ElementType::JavaScriptCode,
        "int" => ElementType::Int32,
        "timestamp" => ElementType::Timestamp,
        "long" => ElementType::Int64,
        "decimal" => ElementType::Decimal128,
        "minKey" => ElementType::MinKey,
        "maxKey" => ElementType::MaxKey,
        "number" => {
            return Some(vec![
                ElementType::Double,
                ElementType::Int32,
                ElementType::Int64,
                ElementType::Decimal128,
            ]);
        }
        _ => return None,
    };
    Some(vec![single])
}

fn type_from_code(code: i64) -> Option<ElementType> {
    Some(match code {
        1 => ElementType::Double,
        2 => ElementType::String,
        3 => ElementType::EmbeddedDocument,
        4 => ElementType::Array,
        5 => ElementType::Binary,
        6 => ElementType::Undefined,
        7 => ElementType::ObjectId,
        8 => ElementType::Boolean,
        9 => ElementType::DateTime,
        10 => ElementType::Null,
        11 => ElementType::RegularExpression,
        13 => ElementType::JavaScriptCode,
        16 => ElementType::Int32,
        17 => ElementType::Timestamp,
        18 => ElementType::Int64,
        19 => ElementType::Decimal128,
        -1 => ElementType::MinKey,
        127 => ElementType::MaxKey,
        _ => return None,
    })
}

/// Build a `$regex` expression, folding `$options` flags into the pattern.
fn parse_regex(
    field: &str,
    pattern: &Bson,
    options: Option<&Bson>,
) -> Result<Expression, FilterParseError> {
    let pat = match pattern {
        Bson::String(s) => s.as_str(),
        _ => return Err(FilterParseError("$regex value must be a string".into())),
    };

    let full_pattern = match options {
        None => pat.to_string(),
        Some(Bson::String(opts)) => {
            let mut prefix = String::with_capacity(4 + opts.len() + pat.len());
            prefix.push_str("(?");
            for ch in opts.chars() {
                match ch {
                    'i' | 's' | 'm' | 'x' => prefix.push(ch),
                    c => return Err(FilterParseError(format!("unknown regex option: {c}"))),
                }
            }
            prefix.push(')');
            if opts.is_empty() {
                pat.to_string()
            } else {
                prefix.push_str(pat);
                prefix
            }
        }
        Some(_) => return Err(FilterParseError("$options value must be a string".into())),
    };

    let re = Regex::new(&full_pattern)
        .map_err(|e| FilterParseError(format!("invalid regex pattern: {e}")))?;

    Ok(Expression::Regex(field.to_string(), re))
}
