use std::cell::RefCell;
use std::collections::HashMap;

use bson::Document;
use docket_query::{Expression, matches, parse_filter};
use tracing::warn;

use crate::catalog::{CollectionOptions, ValidationAction, ValidationLevel};
use crate::error::DbError;
use crate::namespace::Namespace;

/// Reject validators that do not parse, so a bad `create` / `collMod` never
/// leaves a collection that refuses every insert.
pub(crate) fn check_validator(validator: &Document) -> Result<(), DbError> {
    parse_filter(validator).map_err(|e| DbError::BadValue(format!("invalid validator: {}", e.0)))?;
    Ok(())
}

/// Enforces collection validators on inserts.
///
/// Compiled validators are cached per namespace for the life of the gate and
/// recompiled only when the collection's validator document changes.
#[derive(Debug)]
pub(crate) struct ValidationGate {
    bypass: bool,
    compiled: RefCell<HashMap<Namespace, (Document, Expression)>>,
}

impl ValidationGate {
    pub(crate) fn new(bypass: bool) -> Self {
        Self {
            bypass,
            compiled: RefCell::new(HashMap::new()),
        }
    }

    pub(crate) fn check(
        &self,
        ns: &Namespace,
        options: &CollectionOptions,
        doc: &Document,
    ) -> Result<(), DbError> {
        if self.bypass || options.validation_level == ValidationLevel::Off {
            return Ok(());
        }
        let Some(validator) = &options.validator else {
            return Ok(());
        };

        if self.passes(ns, validator, doc)? {
            return Ok(());
        }

        match options.validation_action {
            ValidationAction::Error => Err(DbError::DocumentValidationFailure { ns: ns.to_string() }),
            ValidationAction::Warn => {
                warn!(%ns, id = ?doc.get("_id"), "document failed validation");
                Ok(())
            }
        }
    }

    fn passes(&self, ns: &Namespace, validator: &Document, doc: &Document) -> Result<bool, DbError> {
        let mut compiled = self.compiled.borrow_mut();
        let stale = compiled.get(ns).is_none_or(|(source, _)| source != validator);
        if stale {
            let expr = parse_filter(validator)?;
            compiled.insert(ns.clone(), (validator.clone(), expr));
        }
        Ok(compiled.get(ns).is_some_and(|(_, expr)| matches(doc, expr)))
    }

    #[cfg(test)]
    fn compiled_count(&self) -> usize {
        self.compiled.borrow().len()
    }
}
