use bson::{Bson, Document};

use crate::error::DbError;

/// Fields any command may carry. They are accepted and ignored.
pub(crate) const GENERIC_ARGS: &[&str] = &[
    "$db",
    "lsid",
    "txnNumber",
    "writeConcern",
    "comment",
    "maxTimeMS",
    "apiVersion",
    "apiStrict",
    "apiDeprecationErrors",
];

pub(crate) fn is_generic(field: &str) -> bool {
    GENERIC_ARGS.contains(&field)
}

/// Read an integer argument. Doubles are accepted when integral.
pub(crate) fn int(field: &str, value: &Bson) -> Result<i64, DbError> {
    match value {
        Bson::Int32(n) => Ok(i64::from(*n)),
        Bson::Int64(n) => Ok(*n),
        Bson::Double(f) if f.fract() == 0.0 && f.is_finite() => Ok(*f as i64),
        other => Err(type_mismatch(field, "a whole number", other)),
    }
}

/// Read a non-negative integer argument.
pub(crate) fn count(field: &str, value: &Bson) -> Result<usize, DbError> {
    let n = int(field, value)?;
    usize::try_from(n)
        .map_err(|_| DbError::BadValue(format!("BSON field '{field}' value must be >= 0, actual value '{n}'")))
}

pub(crate) fn boolean(field: &str, value: &Bson) -> Result<bool, DbError> {
    match value {
        Bson::Boolean(b) => Ok(*b),
        Bson::Int32(n) => Ok(*n != 0),
        Bson::Int64(n) => Ok(*n != 0),
        Bson::Double(f) => Ok(*f != 0.0),
        other => Err(type_mismatch(field, "a bool", other)),
    }
}

pub(crate) fn string<'a>(field: &str, value: &'a Bson) -> Result<&'a str, DbError> {
    match value {
        Bson::String(s) => Ok(s),
        other => Err(type_mismatch(field, "a string", other)),
    }
}

pub(crate) fn document<'a>(field: &str, value: &'a Bson) -> Result<&'a Document, DbError> {
    match value {
        Bson::Document(d) => Ok(d),
        other => Err(type_mismatch(field, "an object", other)),
    }
}

pub(crate) fn array<'a>(field: &str, value: &'a Bson) -> Result<&'a [Bson], DbError> {
    match value {
        Bson::Array(a) => Ok(a),
        other => Err(type_mismatch(field, "an array", other)),
    }
}

pub(crate) fn missing(field: &str) -> DbError {
    DbError::FailedToParse(format!(
        "BSON field '{field}' is missing but a required field"
    ))
}

pub(crate) fn unknown(command: &str, field: &str) -> DbError {
    DbError::FailedToParse(format!(
        "BSON field '{command}.{field}' is an unknown field."
    ))
}

fn type_mismatch(field: &str, expected: &str, actual: &Bson) -> DbError {
    DbError::FailedToParse(format!(
        "BSON field '{field}' is the wrong type '{:?}', expected {expected}",
        actual.element_type()
    ))
}
