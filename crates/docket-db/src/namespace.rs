use std::fmt;
use std::str::FromStr;

use crate::error::DbError;

const DB_FORBIDDEN: &[char] = &['/', '\\', '.', '"', '$', ' ', '\0'];

/// A database-qualified collection name, `<db>.<collection>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Namespace {
    db: String,
    coll: String,
}

impl Namespace {
    pub fn new(db: impl Into<String>, coll: impl Into<String>) -> Result<Self, DbError> {
        let db = db.into();
        let coll = coll.into();
        if db.is_empty() || db.contains(DB_FORBIDDEN) {
            return Err(DbError::InvalidNamespace(format!("invalid database name: {db:?}")));
        }
        if coll.is_empty() || coll.contains(['$', '\0']) {
            return Err(DbError::InvalidNamespace(format!("invalid collection name: {coll:?}")));
        }
        Ok(Self { db, coll })
    }

    /// Parse `"db.collection"`. The database is everything before the first dot.
    pub fn parse(ns: &str) -> Result<Self, DbError> {
        let (db, coll) = ns
            .split_once('.')
            .ok_or_else(|| DbError::InvalidNamespace(format!("{ns:?} has no collection part")))?;
        Self::new(db, coll)
    }

    pub fn db(&self) -> &str {
        &self.db
    }

    pub fn coll(&self) -> &str {
        &self.coll
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.db, self.coll)
    }
}

impl FromStr for Namespace {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
