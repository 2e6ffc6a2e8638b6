use std::fmt;
use std::str::FromStr;

use bson::Document;
use docket_store::Transaction;
use serde::{Deserialize, Serialize};

use crate::error::DbError;
use crate::namespace::Namespace;

pub(crate) const SYS_CF: &str = "_sys";
const COL_PREFIX: &[u8] = b"col:";

fn col_key(ns: &Namespace) -> Vec<u8> {
    let mut key = COL_PREFIX.to_vec();
    key.extend_from_slice(ns.to_string().as_bytes());
    key
}

/// Whether the validator is enforced on writes to a collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationLevel {
    Off,
    #[default]
    Strict,
    Moderate,
}

/// What happens when a document fails the validator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationAction {
    #[default]
    Error,
    Warn,
}

impl ValidationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationLevel::Off => "off",
            ValidationLevel::Strict => "strict",
            ValidationLevel::Moderate => "moderate",
        }
    }
}

impl ValidationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationAction::Error => "error",
            ValidationAction::Warn => "warn",
        }
    }
}

impl fmt::Display for ValidationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ValidationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValidationLevel {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(ValidationLevel::Off),
            "strict" => Ok(ValidationLevel::Strict),
            "moderate" => Ok(ValidationLevel::Moderate),
            other => Err(DbError::BadValue(format!(
                "invalid validationLevel: {other}"
            ))),
        }
    }
}

impl FromStr for ValidationAction {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "error" => Ok(ValidationAction::Error),
            "warn" => Ok(ValidationAction::Warn),
            other => Err(DbError::BadValue(format!(
                "invalid validationAction: {other}"
            ))),
        }
    }
}

/// Per-collection metadata persisted in the catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validator: Option<Document>,
    #[serde(default)]
    pub validation_level: ValidationLevel,
    #[serde(default)]
    pub validation_action: ValidationAction,
}

impl CollectionOptions {
    pub fn with_validator(validator: Document) -> Self {
        Self {
            validator: Some(validator),
            ..Default::default()
        }
    }
}

/// Partial update applied by `collMod`. `None` leaves the setting unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollMod {
    pub validator: Option<Document>,
    pub validation_level: Option<ValidationLevel>,
    pub validation_action: Option<ValidationAction>,
}

impl CollMod {
    pub(crate) fn apply(self, options: &mut CollectionOptions) {
        if let Some(validator) = self.validator {
            // An empty validator document removes validation.
            options.validator = if validator.is_empty() {
                None
            } else {
                Some(validator)
            };
        }
        if let Some(level) = self.validation_level {
            options.validation_level = level;
        }
        if let Some(action) = self.validation_action {
            options.validation_action = action;
        }
    }
}

/// Collection registry stored in the `_sys` column family.
pub struct Catalog;

impl Catalog {
    pub fn get<T: Transaction>(
        &self,
        txn: &T,
        sys: &T::Cf,
        ns: &Namespace,
    ) -> Result<Option<CollectionOptions>, DbError> {
        match txn.get(sys, &col_key(ns))? {
            Some(bytes) => Ok(Some(bson::deserialize_from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put<T: Transaction>(
        &self,
        txn: &T,
        sys: &T::Cf,
        ns: &Namespace,
        options: &CollectionOptions,
    ) -> Result<(), DbError> {
        let value = bson::serialize_to_vec(options)?;
        txn.put(sys, &col_key(ns), &value)?;
        Ok(())
    }

    pub fn remove<T: Transaction>(
        &self,
        txn: &T,
        sys: &T::Cf,
        ns: &Namespace,
    ) -> Result<(), DbError> {
        txn.delete(sys, &col_key(ns))?;
        Ok(())
    }

    /// All registered namespaces, sorted.
    pub fn list<T: Transaction>(&self, txn: &T, sys: &T::Cf) -> Result<Vec<Namespace>, DbError> {
        let mut namespaces = Vec::new();
        for result in txn.scan_prefix(sys, COL_PREFIX)? {
            let (key, _) = result?;
            let Some(name) = key.strip_prefix(COL_PREFIX) else {
                continue;
            };
            let name = std::str::from_utf8(name)
                .map_err(|e| DbError::Internal(format!("corrupt catalog key: {e}")))?;
            namespaces.push(Namespace::parse(name)?);
        }
        Ok(namespaces)
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;

    #[test]
    fn coll_mod_replaces_only_named_settings() {
        let mut options = CollectionOptions::with_validator(doc! { "a": { "$exists": true } });
        CollMod {
            validation_action: Some(ValidationAction::Warn),
            ..Default::default()
        }
        .apply(&mut options);
        assert!(options.validator.is_some());
        assert_eq!(options.validation_action, ValidationAction::Warn);
        assert_eq!(options.validation_level, ValidationLevel::Strict);
    }

    #[test]
    fn empty_validator_clears_validation() {
        let mut options = CollectionOptions::with_validator(doc! { "a": 1 });
        CollMod {
            validator: Some(doc! {}),
            ..Default::default()
        }
        .apply(&mut options);
        assert!(options.validator.is_none());
    }

    #[test]
    fn levels_and_actions_parse_from_strings() {
        assert_eq!("moderate".parse::<ValidationLevel>().unwrap(), ValidationLevel::Moderate);
        assert_eq!("warn".parse::<ValidationAction>().unwrap(), ValidationAction::Warn);
        assert_eq!("loud".parse::<ValidationAction>().unwrap_err().code(), 2);
    }

    #[test]
    fn options_serialize_through_bson() {
        let options = CollectionOptions {
            validator: Some(doc! { "a": { "$exists": true } }),
            validation_level: ValidationLevel::Off,
            validation_action: ValidationAction::Warn,
        };
        let bytes = bson::serialize_to_vec(&options).unwrap();
        let back: CollectionOptions = bson::deserialize_from_slice(&bytes).unwrap();
        assert_eq!(back, options);
    }
}
