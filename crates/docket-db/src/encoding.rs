use bson::oid::ObjectId;
use bson::{Bson, Document, doc};

use crate::error::DbError;

/// Prefix for document records inside a collection's column family.
pub(crate) const DOC_PREFIX: &[u8] = b"d:";

/// Storage key for a document with the given `_id`.
///
/// The id is encoded as a one-field BSON document so that values of different
/// BSON types never collide.
pub(crate) fn record_key(id: &Bson) -> Result<Vec<u8>, DbError> {
    let mut key = DOC_PREFIX.to_vec();
    key.extend(bson::serialize_to_vec(&doc! { "_id": id.clone() })?);
    Ok(key)
}

pub(crate) fn encode_document(doc: &Document) -> Result<Vec<u8>, DbError> {
    Ok(bson::serialize_to_vec(doc)?)
}

pub(crate) fn decode_document(bytes: &[u8]) -> Result<Document, DbError> {
    Ok(bson::deserialize_from_slice(bytes)?)
}

/// Move `_id` to the front of the document, generating an ObjectId when absent.
pub(crate) fn with_id_first(mut doc: Document) -> Result<(Bson, Document), DbError> {
    let id = match doc.remove("_id") {
        Some(Bson::Array(_)) => {
            return Err(DbError::BadValue("can't use an array for _id".into()));
        }
        Some(Bson::RegularExpression(_)) => {
            return Err(DbError::BadValue("can't use a regex for _id".into()));
        }
        Some(id) => id,
        None => Bson::ObjectId(ObjectId::new()),
    };

    let mut out = Document::new();
    out.insert("_id", id.clone());
    for (k, v) in doc {
        out.insert(k, v);
    }
    Ok((id, out))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_object_id_when_missing() {
        let (id, doc) = with_id_first(doc! { "skey": "MongoDB" }).unwrap();
        assert!(matches!(id, Bson::ObjectId(_)));
        assert_eq!(doc.keys().next().map(String::as_str), Some("_id"));
        assert_eq!(doc.get_str("skey").unwrap(), "MongoDB");
    }

    #[test]
    fn moves_existing_id_to_front() {
        let (id, doc) = with_id_first(doc! { "skey": "MongoDB", "_id": 3 }).unwrap();
        assert_eq!(id, Bson::Int32(3));
        let keys: Vec<&str> = doc.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["_id", "skey"]);
    }

    #[test]
    fn rejects_array_id() {
        let err = with_id_first(doc! { "_id": [1, 2] }).unwrap_err();
        assert_eq!(err.code(), 2);
    }

    #[test]
    fn record_keys_distinguish_types() {
        let a = record_key(&Bson::Int32(1)).unwrap();
        let b = record_key(&Bson::String("1".into())).unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with(DOC_PREFIX));
    }

    #[test]
    fn document_round_trips_through_bytes() {
        let doc = doc! { "_id": 1, "nested": { "a": [1, 2] } };
        let bytes = encode_document(&doc).unwrap();
        assert_eq!(decode_document(&bytes).unwrap(), doc);
    }
}
